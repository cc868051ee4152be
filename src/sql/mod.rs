// SQLGate - SQL Analysis
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Query analysis: tokenizing, statement classification, table extraction
//!
//! This stage never touches the database. It turns raw query text into a
//! [`StatementPlan`] that the validator and binder operate on.

pub mod tables;
pub mod tokenizer;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::GatewayError;
use tokenizer::{Token, TokenKind};

/// The coarse SQL operation kind. DDL is never a valid kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn is_write(self) -> bool {
        !matches!(self, StatementKind::Select)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the parser learned about one statement
#[derive(Debug, Clone)]
pub struct StatementPlan {
    pub kind: StatementKind,
    /// Every referenced table, flattened across all nesting levels
    pub table_refs: BTreeSet<String>,
    /// Highest `$N` index referenced, 0 when the query has no placeholders
    pub placeholder_max_index: usize,
}

/// A parsed query: the plan plus the token stream the validator and binder
/// keep working on.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub plan: StatementPlan,
    pub tokens: Vec<Token>,
}

/// Tokenize and analyze one statement.
///
/// Fails with `SyntaxError` on malformed input, `MultiStatementRejected` on
/// stacked statements, and `ForbiddenStatement` when the leading keyword is
/// outside the Select/Insert/Update/Delete allow-list.
pub fn parse(query: &str) -> Result<ParsedQuery, GatewayError> {
    let tokens = tokenizer::tokenize(query)?;
    tables::reject_multi_statement(&tokens)?;
    let kind = tables::classify(&tokens)?;
    let table_refs = tables::extract_tables(&tokens)?;
    let placeholder_max_index = tokens
        .iter()
        .filter_map(|t| match t.kind {
            TokenKind::Placeholder(n) => Some(n),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    Ok(ParsedQuery {
        plan: StatementPlan {
            kind,
            table_refs,
            placeholder_max_index,
        },
        tokens,
    })
}
