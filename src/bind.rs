// SQLGate - Parameter Binder
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Placeholder rewriting and parameter binding
//!
//! Rewrites `$N` ordinals to SQLite's native `?N` form and coerces the
//! supplied JSON values into primitive [`ParamValue`]s. Values reach SQLite
//! exclusively through the driver's binding API; the inline-literal scan
//! below is a secondary heuristic, not the injection guarantee.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};

use crate::core::error::GatewayError;
use crate::sql::tokenizer::{Token, TokenKind};
use crate::sql::{ParsedQuery, StatementPlan};

/// A primitive value bindable to a statement
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ParamValue {
    /// Type name used in redacted audit records
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "boolean",
            ParamValue::Integer(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
            ParamValue::Blob(_) => "blob",
        }
    }

    /// Coerce one wire value. Only JSON primitives and the `{"blob": base64}`
    /// envelope are accepted; anything structured is a type error.
    pub fn from_json(value: &serde_json::Value, index: usize) -> Result<Self, GatewayError> {
        match value {
            serde_json::Value::Null => Ok(ParamValue::Null),
            serde_json::Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(ParamValue::Float(f))
                } else {
                    Err(type_error(index, "number out of range"))
                }
            }
            serde_json::Value::String(s) => Ok(ParamValue::Text(s.clone())),
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(encoded)) = map.get("blob") {
                        return BASE64
                            .decode(encoded)
                            .map(ParamValue::Blob)
                            .map_err(|_| type_error(index, "invalid base64 in blob value"));
                    }
                }
                Err(type_error(index, "objects are not bindable"))
            }
            serde_json::Value::Array(_) => Err(type_error(index, "arrays are not bindable")),
        }
    }
}

impl ToSql for ParamValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            ParamValue::Null => SqlValue::Null,
            // SQLite has no boolean type; the conventional encoding is 0/1
            ParamValue::Bool(b) => SqlValue::Integer(*b as i64),
            ParamValue::Integer(i) => SqlValue::Integer(*i),
            ParamValue::Float(f) => SqlValue::Real(*f),
            ParamValue::Text(s) => SqlValue::Text(s.clone()),
            ParamValue::Blob(b) => SqlValue::Blob(b.clone()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

fn type_error(index: usize, detail: &str) -> GatewayError {
    GatewayError::ParameterType {
        index,
        detail: detail.to_string(),
    }
}

/// The only artifact the execution engine accepts: a validated plan, the
/// driver-native query text, and the values to bind.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub plan: StatementPlan,
    pub normalized_text: String,
    pub bound_params: Vec<ParamValue>,
}

/// Bind parameters against a parsed, validated query.
pub fn bind(
    query: &str,
    parsed: &ParsedQuery,
    params: &[serde_json::Value],
) -> Result<ValidatedQuery, GatewayError> {
    reject_foreign_placeholders(&parsed.tokens)?;
    scan_inline_literals(&parsed.tokens)?;

    let expected = parsed.plan.placeholder_max_index;
    if expected > params.len() {
        return Err(GatewayError::ParameterCount {
            expected,
            supplied: params.len(),
        });
    }

    // `$k` repeats legally; `?k` lets SQLite resolve every occurrence to the
    // k-th bound value, so one value per distinct index is enough.
    let mut bound_params = Vec::with_capacity(expected);
    for (index, value) in params.iter().take(expected).enumerate() {
        bound_params.push(ParamValue::from_json(value, index + 1)?);
    }

    Ok(ValidatedQuery {
        plan: parsed.plan.clone(),
        normalized_text: rewrite_placeholders(query),
        bound_params,
    })
}

/// Only `$N` ordinals are supported; SQLite's other placeholder syntaxes
/// would bypass the count check and bind NULLs silently.
fn reject_foreign_placeholders(tokens: &[Token]) -> Result<(), GatewayError> {
    for token in tokens {
        if token.kind == TokenKind::Operator && matches!(token.text.as_str(), "?" | ":" | "@") {
            return Err(GatewayError::Syntax {
                message: format!(
                    "Unsupported placeholder syntax '{}'; use $N ordinals",
                    token.text
                ),
            });
        }
    }
    Ok(())
}

/// Rewrite every `$N` outside strings and comments to `?N`.
///
/// This is a raw-text pass rather than a token-stream reassembly so the
/// executed statement stays byte-for-byte what the caller wrote, except for
/// the placeholder markers themselves.
pub fn rewrite_placeholders(query: &str) -> String {
    let bytes = query.as_bytes();
    let mut out = String::with_capacity(query.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                let quote = bytes[i];
                let start = i;
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                out.push_str(&query[start..i]);
            }
            b'[' => {
                let start = i;
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                out.push_str(&query[start..i]);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                out.push_str(&query[start..i]);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                out.push_str(&query[start..i]);
            }
            b'$' if bytes.get(i + 1).map(|b| b.is_ascii_digit()) == Some(true) => {
                out.push('?');
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    out.push(bytes[i] as char);
                    i += 1;
                }
            }
            _ => {
                let c = query[i..].chars().next().unwrap_or('\u{FFFD}');
                out.push(c);
                i += c.len_utf8();
            }
        }
    }

    out
}

/// Operators whose operand should be a placeholder, not a literal
fn is_comparison(token: &Token) -> bool {
    (token.kind == TokenKind::Operator
        && matches!(
            token.text.as_str(),
            "=" | "==" | "!=" | "<>" | "<" | ">" | "<=" | ">="
        ))
        || token.is_keyword("like")
}

fn is_literal(token: &Token) -> bool {
    matches!(token.kind, TokenKind::StringLit | TokenKind::Number)
}

/// Best-effort scan for literals where a placeholder belongs: next to a
/// comparison in WHERE/SET/HAVING/ON, or inside a VALUES row. Literals in a
/// SELECT column list pass. Parameter binding carries the real guarantee;
/// this only surfaces sloppy query construction early.
pub fn scan_inline_literals(tokens: &[Token]) -> Result<(), GatewayError> {
    let mut in_predicate = false;
    let mut depth = 0usize;
    let mut values_depth: Option<usize> = None;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                if values_depth.map(|d| depth < d) == Some(true) {
                    values_depth = None;
                }
            }
            TokenKind::Ident if !token.quoted => {
                let lower = token.text.to_ascii_lowercase();
                match lower.as_str() {
                    "where" | "having" | "on" | "set" => in_predicate = true,
                    "values" => values_depth = Some(depth),
                    _ => {}
                }
            }
            _ => {}
        }

        if !is_literal(token) {
            continue;
        }

        let inside_values = values_depth.map(|d| depth > d) == Some(true);
        let next_to_comparison = in_predicate
            && (i > 0 && is_comparison(&tokens[i - 1])
                || tokens.get(i + 1).map(is_comparison) == Some(true));

        if inside_values || next_to_comparison {
            let mut near = token.text.clone();
            near.truncate(24);
            return Err(GatewayError::InlineLiteral { near });
        }
    }

    Ok(())
}
