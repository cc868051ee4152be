// SQLGate - Audit Logger
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Append-only audit trail, written before the response leaves
//!
//! Exactly one record per call attempt, success or failure, and the record
//! is on disk before the caller sees the response. Sink failure is handled
//! asymmetrically: a read result still goes out (with a logged warning), a
//! write is reported as failed, because an unaudited write is worse than a
//! rejected one.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::core::error::AuditOutcome;
use crate::log_info;
use crate::sql::StatementKind;

/// One call attempt, as recorded in the trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    pub query_text: String,
    /// Raw values, or type descriptors when redaction is on
    pub params: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_kind: Option<StatementKind>,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    pub duration_ms: u64,
}

/// Where audit records go. The gateway only needs an append that can fail.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<()>;
}

impl<T: AuditSink + ?Sized> AuditSink for std::sync::Arc<T> {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        (**self).record(record)
    }
}

/// JSON-lines file sink, flushed per record
pub struct FileAuditSink {
    file: Mutex<File>,
}

impl FileAuditSink {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit directory {}", parent.display())
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize audit record")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("Audit sink poisoned"))?;
        writeln!(file, "{}", line).context("Failed to append audit record")?;
        file.flush().context("Failed to flush audit record")?;
        Ok(())
    }
}

/// Fallback sink that routes records through the process logger
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize audit record")?;
        log_info!("audit: {}", line);
        Ok(())
    }
}

/// Replace parameter values with type descriptors, keeping lengths for
/// text and blobs so operators can still correlate sizes.
pub fn redact_params(params: &[serde_json::Value]) -> serde_json::Value {
    let redacted: Vec<serde_json::Value> = params
        .iter()
        .map(|value| {
            let descriptor = match value {
                serde_json::Value::Null => "null".to_string(),
                serde_json::Value::Bool(_) => "boolean".to_string(),
                serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
                    "integer".to_string()
                }
                serde_json::Value::Number(_) => "float".to_string(),
                serde_json::Value::String(s) => format!("text[{}]", s.chars().count()),
                serde_json::Value::Object(map) => match map.get("blob") {
                    Some(serde_json::Value::String(encoded)) => {
                        format!("blob[{}]", encoded.len())
                    }
                    _ => "unsupported".to_string(),
                },
                serde_json::Value::Array(_) => "unsupported".to_string(),
            };
            serde_json::Value::String(descriptor)
        })
        .collect();
    serde_json::Value::Array(redacted)
}

/// In-memory sink for tests
#[cfg(test)]
pub struct MemoryAuditSink {
    pub records: Mutex<Vec<AuditRecord>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("sink unavailable");
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
