// SQLGate - Statement Classification & Table Extraction
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Statement classification and recursive table-reference extraction
//!
//! Works on the token stream from [`super::tokenizer`]. Classification looks
//! at the leading keyword (recursing through `WITH` prefixes); extraction
//! walks the whole stream, descending into every parenthesized group, and
//! records each table identifier following FROM, JOIN, INTO, or UPDATE.
//!
//! Names declared by `WITH name AS (...)` are query-local and excluded from
//! the result; SQLite resolves such a name to the CTE, never to a stored
//! table, so only the tables referenced inside CTE bodies matter.

use std::collections::{BTreeSet, HashSet};

use crate::core::error::GatewayError;
use crate::sql::tokenizer::{Token, TokenKind};
use crate::sql::StatementKind;

/// Keywords that can follow a table reference and therefore are never an
/// alias. Lowercase for case-insensitive comparison.
const CLAUSE_KEYWORDS: &[&str] = &[
    "where", "group", "order", "limit", "offset", "having", "join", "inner", "left", "right",
    "full", "outer", "cross", "natural", "on", "using", "union", "except", "intersect", "set",
    "values", "returning", "window", "as", "indexed", "not", "with", "do", "by", "and", "or",
    "when", "then", "else", "end", "select", "from", "into", "update", "delete", "insert",
];

fn is_clause_keyword(token: &Token) -> bool {
    token.kind == TokenKind::Ident
        && !token.quoted
        && CLAUSE_KEYWORDS.contains(&token.text.to_ascii_lowercase().as_str())
}

fn syntax_error(message: impl Into<String>) -> GatewayError {
    GatewayError::Syntax {
        message: message.into(),
    }
}

/// Reject stacked statements: any token following a top-level semicolon.
pub fn reject_multi_statement(tokens: &[Token]) -> Result<(), GatewayError> {
    let mut depth = 0usize;
    let mut terminated = false;
    for token in tokens {
        if terminated && token.kind != TokenKind::Semicolon {
            return Err(GatewayError::MultiStatement);
        }
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Semicolon if depth == 0 => terminated = true,
            _ => {}
        }
    }
    Ok(())
}

/// Classify the statement by its leading keyword. `WITH` recurses past the
/// CTE list to the statement it wraps. Anything outside the allow-list is a
/// [`GatewayError::Forbidden`] naming the keyword.
pub fn classify(tokens: &[Token]) -> Result<StatementKind, GatewayError> {
    let mut i = 0;
    loop {
        let head = tokens
            .get(i)
            .ok_or_else(|| syntax_error("Empty query"))?;
        if head.kind != TokenKind::Ident || head.quoted {
            return Err(syntax_error("Query must start with a statement keyword"));
        }

        match head.text.to_ascii_uppercase().as_str() {
            "SELECT" => return Ok(StatementKind::Select),
            "INSERT" => return Ok(StatementKind::Insert),
            "UPDATE" => return Ok(StatementKind::Update),
            "DELETE" => return Ok(StatementKind::Delete),
            "WITH" => {
                i = skip_cte_list(tokens, i + 1)?;
            }
            other => {
                return Err(GatewayError::Forbidden {
                    keyword: other.to_string(),
                });
            }
        }
    }
}

/// Skip `[RECURSIVE] name [(cols)] AS [NOT|MATERIALIZED] (...) [, ...]`,
/// returning the index of the wrapped statement's first token.
fn skip_cte_list(tokens: &[Token], mut i: usize) -> Result<usize, GatewayError> {
    if tokens.get(i).map(|t| t.is_keyword("recursive")) == Some(true) {
        i += 1;
    }
    loop {
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Ident => i += 1,
            _ => return Err(syntax_error("Expected a name after WITH")),
        }
        if tokens.get(i).map(|t| t.kind == TokenKind::LParen) == Some(true) {
            i = skip_group(tokens, i)?;
        }
        match tokens.get(i) {
            Some(t) if t.is_keyword("as") => i += 1,
            _ => return Err(syntax_error("Expected AS in WITH clause")),
        }
        while tokens
            .get(i)
            .map(|t| t.is_keyword("not") || t.is_keyword("materialized"))
            == Some(true)
        {
            i += 1;
        }
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::LParen => i = skip_group(tokens, i)?,
            _ => return Err(syntax_error("Expected a parenthesized body in WITH clause")),
        }
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Comma => i += 1,
            _ => return Ok(i),
        }
    }
}

/// Index just past the group starting at the `(` at `i`.
fn skip_group(tokens: &[Token], i: usize) -> Result<usize, GatewayError> {
    debug_assert_eq!(tokens[i].kind, TokenKind::LParen);
    let mut depth = 0usize;
    for (j, token) in tokens.iter().enumerate().skip(i) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(j + 1);
                }
            }
            _ => {}
        }
    }
    Err(syntax_error("Unbalanced parentheses"))
}

/// Collect every table referenced anywhere in the statement, across all
/// nesting levels, CTE names excluded.
pub fn extract_tables(tokens: &[Token]) -> Result<BTreeSet<String>, GatewayError> {
    let mut tables = BTreeSet::new();
    let mut cte_names = HashSet::new();
    walk(tokens, 0, tokens.len(), &mut cte_names, &mut tables)?;
    Ok(tables)
}

fn walk(
    tokens: &[Token],
    start: usize,
    end: usize,
    cte_names: &mut HashSet<String>,
    tables: &mut BTreeSet<String>,
) -> Result<(), GatewayError> {
    let mut i = start;
    while i < end {
        let token = &tokens[i];
        match token.kind {
            TokenKind::LParen => {
                let close = skip_group(tokens, i)?;
                walk(tokens, i + 1, close - 1, cte_names, tables)?;
                i = close;
            }
            TokenKind::Ident if !token.quoted => {
                let upper = token.text.to_ascii_uppercase();
                match upper.as_str() {
                    "WITH" => {
                        i = collect_cte_list(tokens, i + 1, cte_names, tables)?;
                    }
                    "FROM" => {
                        i = collect_table_list(tokens, i + 1, end, cte_names, tables)?;
                    }
                    "JOIN" | "INTO" => {
                        i = collect_table(tokens, i + 1, end, cte_names, tables)?;
                    }
                    "UPDATE" => {
                        let mut j = i + 1;
                        // UPDATE OR ROLLBACK|ABORT|REPLACE|FAIL|IGNORE table
                        if tokens.get(j).map(|t| t.is_keyword("or")) == Some(true) {
                            j += 2;
                        }
                        i = collect_table(tokens, j, end, cte_names, tables)?;
                    }
                    _ => i += 1,
                }
            }
            _ => i += 1,
        }
    }
    Ok(())
}

/// Like [`skip_cte_list`] but records each CTE name and walks each body.
fn collect_cte_list(
    tokens: &[Token],
    mut i: usize,
    cte_names: &mut HashSet<String>,
    tables: &mut BTreeSet<String>,
) -> Result<usize, GatewayError> {
    if tokens.get(i).map(|t| t.is_keyword("recursive")) == Some(true) {
        i += 1;
    }
    loop {
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Ident => {
                cte_names.insert(t.text.to_ascii_lowercase());
                i += 1;
            }
            _ => return Err(syntax_error("Expected a name after WITH")),
        }
        if tokens.get(i).map(|t| t.kind == TokenKind::LParen) == Some(true) {
            i = skip_group(tokens, i)?;
        }
        match tokens.get(i) {
            Some(t) if t.is_keyword("as") => i += 1,
            _ => return Err(syntax_error("Expected AS in WITH clause")),
        }
        while tokens
            .get(i)
            .map(|t| t.is_keyword("not") || t.is_keyword("materialized"))
            == Some(true)
        {
            i += 1;
        }
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::LParen => {
                let close = skip_group(tokens, i)?;
                walk(tokens, i + 1, close - 1, cte_names, tables)?;
                i = close;
            }
            _ => return Err(syntax_error("Expected a parenthesized body in WITH clause")),
        }
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Comma => i += 1,
            _ => return Ok(i),
        }
    }
}

/// Collect a comma-separated table list (the FROM clause form).
fn collect_table_list(
    tokens: &[Token],
    mut i: usize,
    end: usize,
    cte_names: &mut HashSet<String>,
    tables: &mut BTreeSet<String>,
) -> Result<usize, GatewayError> {
    loop {
        i = collect_table(tokens, i, end, cte_names, tables)?;
        match tokens.get(i) {
            Some(t) if i < end && t.kind == TokenKind::Comma => i += 1,
            _ => return Ok(i),
        }
    }
}

/// Collect a single table reference: a possibly-dotted identifier, a
/// parenthesized subquery, or a table-valued function call. Skips aliases.
fn collect_table(
    tokens: &[Token],
    mut i: usize,
    end: usize,
    cte_names: &mut HashSet<String>,
    tables: &mut BTreeSet<String>,
) -> Result<usize, GatewayError> {
    let token = match tokens.get(i) {
        Some(t) if i < end => t,
        _ => return Ok(i),
    };

    match token.kind {
        TokenKind::LParen => {
            let close = skip_group(tokens, i)?;
            walk(tokens, i + 1, close - 1, cte_names, tables)?;
            i = close;
        }
        TokenKind::Ident => {
            if is_clause_keyword(token) {
                // e.g. the UPDATE in "ON CONFLICT DO UPDATE SET"
                return Ok(i);
            }
            let mut name = token.text.clone();
            i += 1;
            while tokens.get(i).map(|t| t.kind == TokenKind::Dot) == Some(true)
                && tokens
                    .get(i + 1)
                    .map(|t| t.kind == TokenKind::Ident)
                    == Some(true)
            {
                name.push('.');
                name.push_str(&tokens[i + 1].text);
                i += 2;
            }
            if tokens.get(i).map(|t| t.kind == TokenKind::LParen) == Some(true) {
                // Table-valued function: not a stored table, but its
                // arguments may contain subqueries worth walking.
                let close = skip_group(tokens, i)?;
                walk(tokens, i + 1, close - 1, cte_names, tables)?;
                i = close;
            } else if !cte_names.contains(&name.to_ascii_lowercase()) {
                tables.insert(name);
            }
        }
        _ => return Ok(i),
    }

    skip_alias(tokens, i, end)
}

fn skip_alias(tokens: &[Token], mut i: usize, end: usize) -> Result<usize, GatewayError> {
    let token = match tokens.get(i) {
        Some(t) if i < end => t,
        _ => return Ok(i),
    };
    if token.is_keyword("as") {
        if tokens.get(i + 1).map(|t| t.kind == TokenKind::Ident) == Some(true) {
            return Ok(i + 2);
        }
        return Ok(i + 1);
    }
    if token.kind == TokenKind::Ident && (token.quoted || !is_clause_keyword(token)) {
        i += 1;
    }
    Ok(i)
}
