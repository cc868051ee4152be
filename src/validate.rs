// SQLGate - Statement & Namespace Validator
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Statement allow-list and namespace isolation
//!
//! Three independent checks, all of which must pass before a query may be
//! bound: no forbidden keyword anywhere in the token stream, every table
//! reference inside the caller's namespace, and writes only with
//! `allow_write`. Failing one check reports that check's error even if the
//! others would also fail.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::GatewayError;
use crate::sql::tokenizer::{Token, TokenKind};
use crate::sql::{ParsedQuery, StatementPlan};

/// Keywords rejected anywhere in a statement, not only at its head. Schema
/// changes belong to the migration subsystem, never to plugin queries.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "TRUNCATE", "PRAGMA", "ATTACH", "DETACH", "VACUUM", "REINDEX",
    "GRANT", "REVOKE",
];

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("namespace regex"));

/// Check that a namespace string from the identity provider is a sane
/// identifier before it is ever spliced into a table-name prefix.
pub fn check_namespace_identifier(namespace: &str) -> Result<(), GatewayError> {
    if NAMESPACE_RE.is_match(namespace) {
        Ok(())
    } else {
        Err(GatewayError::Internal(anyhow::anyhow!(
            "Invalid namespace identifier from transport: {namespace:?}"
        )))
    }
}

/// The table-name prefix a namespace is confined to. Characters that are
/// not valid in a bare SQL identifier ('-' in plugin names, typically) map
/// to '_', and matching is case-insensitive, so plugin "analytics-db" owns
/// tables named `analytics_db__*`.
pub fn table_prefix(namespace: &str) -> String {
    let mut prefix: String = namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    prefix.push_str("__");
    prefix
}

/// Run all validation checks against a parsed query.
pub fn validate(
    parsed: &ParsedQuery,
    namespace: &str,
    allow_write: bool,
) -> Result<(), GatewayError> {
    check_forbidden_keywords(&parsed.tokens)?;
    check_table_namespace(&parsed.plan, namespace)?;
    check_write_permission(&parsed.plan, allow_write)?;
    Ok(())
}

/// Scan the full token stream for DDL keywords. Comments were stripped and
/// string literals are data, so only genuine keyword positions can match;
/// quoted identifiers are exempt.
pub fn check_forbidden_keywords(tokens: &[Token]) -> Result<(), GatewayError> {
    for token in tokens {
        if token.kind != TokenKind::Ident || token.quoted {
            continue;
        }
        let upper = token.text.to_ascii_uppercase();
        if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
            return Err(GatewayError::Forbidden { keyword: upper });
        }
        // pragma_table_info() and friends expose schema the PRAGMA keyword
        // check would otherwise block
        if upper.starts_with("PRAGMA_") {
            return Err(GatewayError::Forbidden {
                keyword: "PRAGMA".to_string(),
            });
        }
    }
    Ok(())
}

/// Every referenced table must live under the caller's prefix. The first
/// violation is reported; there is no cross-namespace whitelist.
pub fn check_table_namespace(plan: &StatementPlan, namespace: &str) -> Result<(), GatewayError> {
    let prefix = table_prefix(namespace);
    for table in &plan.table_refs {
        if !table.to_ascii_lowercase().starts_with(&prefix) {
            return Err(GatewayError::NamespaceViolation {
                table: table.clone(),
                namespace: namespace.to_string(),
            });
        }
    }
    Ok(())
}

/// Reads are always allowed; writes need the explicit flag. Independent of
/// the namespace check: a write to one's own tables without the flag is
/// rejected just as loudly.
pub fn check_write_permission(plan: &StatementPlan, allow_write: bool) -> Result<(), GatewayError> {
    if plan.kind.is_write() && !allow_write {
        return Err(GatewayError::WriteDenied { kind: plan.kind });
    }
    Ok(())
}
