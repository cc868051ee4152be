// SQLGate - Error Taxonomy
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the SQL gateway
//!
//! Every failure a caller can observe is one of these variants. The wire
//! formatter and the audit logger both match on this enum exhaustively, so
//! adding a variant forces every boundary to handle it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sql::StatementKind;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    #[error("Multiple SQL statements are not permitted")]
    MultiStatement,

    #[error("Forbidden statement keyword: {keyword}")]
    Forbidden { keyword: String },

    #[error("Table '{table}' is outside the '{namespace}' namespace")]
    NamespaceViolation { table: String, namespace: String },

    #[error("{kind} requires allow_write")]
    WriteDenied { kind: StatementKind },

    #[error("Query references parameter ${expected} but only {supplied} values were supplied")]
    ParameterCount { expected: usize, supplied: usize },

    #[error("Unsupported parameter type at position {index}: {detail}")]
    ParameterType { index: usize, detail: String },

    #[error("Inline literal near '{near}'; use a $N placeholder instead")]
    InlineLiteral { near: String },

    #[error("Rate limit exceeded for namespace '{namespace}'")]
    RateLimited { namespace: String, retry_after_ms: u64 },

    #[error("Query exceeded {timeout_ms} ms and was interrupted")]
    Timeout { timeout_ms: u64 },

    #[error("Execution failed: {message}")]
    Execution { message: String },

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable wire code for this error. These strings are part of the
    /// response contract and must never change between releases.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Syntax { .. } => "SyntaxError",
            GatewayError::MultiStatement => "MultiStatementRejected",
            GatewayError::Forbidden { .. } => "ForbiddenStatement",
            GatewayError::NamespaceViolation { .. } => "NamespaceViolation",
            GatewayError::WriteDenied { .. } => "WritePermissionDenied",
            GatewayError::ParameterCount { .. } => "ParameterCountMismatch",
            GatewayError::ParameterType { .. } => "ParameterTypeError",
            GatewayError::InlineLiteral { .. } => "InlineLiteralRejected",
            GatewayError::RateLimited { .. } => "RateLimitExceeded",
            GatewayError::Timeout { .. } => "QueryTimeout",
            GatewayError::Execution { .. } => "ExecutionError",
            GatewayError::Internal(_) => "InternalError",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::Internal(_)
        )
    }

    /// Audit outcome bucket for this error.
    pub fn outcome(&self) -> AuditOutcome {
        match self {
            GatewayError::Syntax { .. }
            | GatewayError::MultiStatement
            | GatewayError::Forbidden { .. }
            | GatewayError::NamespaceViolation { .. }
            | GatewayError::WriteDenied { .. }
            | GatewayError::ParameterCount { .. }
            | GatewayError::ParameterType { .. }
            | GatewayError::InlineLiteral { .. } => AuditOutcome::ValidationRejected,
            GatewayError::RateLimited { .. } => AuditOutcome::RateLimited,
            GatewayError::Timeout { .. } => AuditOutcome::Timeout,
            GatewayError::Execution { .. } | GatewayError::Internal(_) => {
                AuditOutcome::ExecutionError
            }
        }
    }
}

/// Outcome classification recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    ValidationRejected,
    ExecutionError,
    Timeout,
    RateLimited,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::ValidationRejected => "validation_rejected",
            AuditOutcome::ExecutionError => "execution_error",
            AuditOutcome::Timeout => "timeout",
            AuditOutcome::RateLimited => "rate_limited",
        }
    }
}
