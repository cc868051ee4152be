// SQLGate - Wire Types & Result Formatter
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Request/response payload shapes at the bus boundary
//!
//! The transport (message bus, in the surrounding platform) is out of
//! scope; these types only pin down the payload. Unexpected internal
//! failures collapse to a generic `InternalError` on the wire; full detail
//! goes to the log and the audit trail, never to the caller.

use serde::{Deserialize, Serialize};

use crate::core::error::GatewayError;
use crate::db::executor::ExecutionResult;

/// Longest query echo included in error detail
const DETAIL_QUERY_CHARS: usize = 200;

/// One SQL call as submitted by a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlRequest {
    pub query: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    #[serde(default)]
    pub allow_write: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_rows: Option<u64>,
}

/// Successful execution payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutput {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub row_count: usize,
    pub truncated: bool,
    pub execution_time_ms: f64,
}

/// Structured context attached to an error response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// The submitted query, truncated
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Error payload with a stable code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub detail: ErrorDetail,
    pub retryable: bool,
}

/// The response payload: exactly one of the two shapes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlResponse {
    Ok(QueryOutput),
    Err(ErrorBody),
}

impl SqlResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, SqlResponse::Ok(_))
    }

    pub fn as_ok(&self) -> Option<&QueryOutput> {
        match self {
            SqlResponse::Ok(output) => Some(output),
            SqlResponse::Err(_) => None,
        }
    }

    pub fn as_err(&self) -> Option<&ErrorBody> {
        match self {
            SqlResponse::Ok(_) => None,
            SqlResponse::Err(body) => Some(body),
        }
    }
}

/// Convert a finished execution into the success shape.
pub fn format_success(result: ExecutionResult) -> SqlResponse {
    SqlResponse::Ok(QueryOutput {
        row_count: result.row_count,
        truncated: result.truncated,
        execution_time_ms: result.execution_time.as_secs_f64() * 1_000.0,
        rows: result.rows,
    })
}

/// Convert any pipeline failure into the error shape. Matches exhaustively
/// so a new error variant cannot ship without a wire mapping.
pub fn format_error(err: &GatewayError, query: &str) -> SqlResponse {
    let mut detail = ErrorDetail {
        query: truncate_query(query),
        ..Default::default()
    };

    let message = match err {
        GatewayError::Syntax { .. }
        | GatewayError::MultiStatement
        | GatewayError::WriteDenied { .. }
        | GatewayError::ParameterType { .. }
        | GatewayError::InlineLiteral { .. }
        | GatewayError::Timeout { .. }
        | GatewayError::Execution { .. } => err.to_string(),
        GatewayError::Forbidden { keyword } => {
            detail.keyword = Some(keyword.clone());
            err.to_string()
        }
        GatewayError::NamespaceViolation { table, .. } => {
            detail.offending_table = Some(table.clone());
            err.to_string()
        }
        GatewayError::ParameterCount { expected, supplied } => {
            detail.expected = Some(*expected);
            detail.supplied = Some(*supplied);
            err.to_string()
        }
        GatewayError::RateLimited { retry_after_ms, .. } => {
            detail.retry_after_ms = Some(*retry_after_ms);
            err.to_string()
        }
        // Never leak internals to the caller
        GatewayError::Internal(_) => "An internal error occurred".to_string(),
    };

    SqlResponse::Err(ErrorBody {
        error: err.code().to_string(),
        message,
        detail,
        retryable: err.retryable(),
    })
}

fn truncate_query(query: &str) -> String {
    if query.chars().count() <= DETAIL_QUERY_CHARS {
        query.to_string()
    } else {
        let truncated: String = query.chars().take(DETAIL_QUERY_CHARS).collect();
        format!("{truncated}...")
    }
}
