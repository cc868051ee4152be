// SQLGate - Execution Engine
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded statement execution with active cancellation
//!
//! The blocking work (pool acquisition, statement step) runs on a
//! `spawn_blocking` thread. The async side arms a watchdog on the effective
//! timeout and on the caller's cancellation token; when either fires, the
//! in-flight statement is interrupted at the SQLite level via the
//! connection's interrupt handle, not merely abandoned. A write that
//! already committed is returned as a success even if the deadline passed
//! during the response path; cancellation never rolls back a commit.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, params_from_iter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::bind::ValidatedQuery;
use crate::core::error::GatewayError;
use crate::db::pool::{AcquireError, Pool};
use crate::policy::SecurityContext;

/// The outcome of one successful execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub row_count: usize,
    pub truncated: bool,
    pub execution_time: Duration,
}

/// Execute a validated query under the given security context.
pub async fn execute(
    pool: Arc<Pool>,
    validated: ValidatedQuery,
    ctx: SecurityContext,
    cancel: CancellationToken,
) -> Result<ExecutionResult, GatewayError> {
    let timeout_ms = ctx.effective_timeout.as_millis() as u64;
    let deadline = Instant::now() + ctx.effective_timeout;
    let abort = Arc::new(AtomicBool::new(false));
    let interrupt_slot: Arc<Mutex<Option<InterruptHandle>>> = Arc::new(Mutex::new(None));

    let mut task = {
        let abort = Arc::clone(&abort);
        let slot = Arc::clone(&interrupt_slot);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            run_blocking(pool, validated, ctx, deadline, abort, slot, cancel)
        })
    };

    tokio::select! {
        joined = &mut task => {
            return joined.map_err(|e| GatewayError::Internal(anyhow::anyhow!("Executor task failed: {e}")))?;
        }
        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
        _ = cancel.cancelled() => {}
    }

    // Watchdog fired: interrupt the statement, then collect the task's
    // verdict. If the statement finished (and a write committed) in the
    // meantime, that success stands.
    abort.store(true, Ordering::SeqCst);
    if let Some(handle) = interrupt_slot.lock().unwrap().take() {
        handle.interrupt();
    }
    task.await
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("Executor task failed: {e}")))?
        .map_err(|err| match err {
            // The interrupt surfaced through SQLite; report it as the
            // timeout/cancellation it was.
            GatewayError::Execution { .. } => GatewayError::Timeout { timeout_ms },
            other => other,
        })
}

fn run_blocking(
    pool: Arc<Pool>,
    validated: ValidatedQuery,
    ctx: SecurityContext,
    deadline: Instant,
    abort: Arc<AtomicBool>,
    interrupt_slot: Arc<Mutex<Option<InterruptHandle>>>,
    cancel: CancellationToken,
) -> Result<ExecutionResult, GatewayError> {
    let timeout_ms = ctx.effective_timeout.as_millis() as u64;
    let wait = deadline.saturating_duration_since(Instant::now());

    let mut pooled = pool
        .acquire(wait, || {
            abort.load(Ordering::SeqCst) || cancel.is_cancelled()
        })
        .map_err(|err| match err {
            AcquireError::Timeout | AcquireError::Cancelled => {
                GatewayError::Timeout { timeout_ms }
            }
            AcquireError::Open(error) => GatewayError::Internal(error),
        })?;

    *interrupt_slot.lock().unwrap() = Some(pooled.get_interrupt_handle());
    if abort.load(Ordering::SeqCst) {
        // The watchdog fired while we were still queued for a connection
        return Err(GatewayError::Timeout { timeout_ms });
    }

    let started = Instant::now();
    let outcome = if validated.plan.kind.is_write() {
        run_write(&mut pooled, &validated)
    } else {
        run_read(&pooled, &validated, ctx.effective_row_cap)
    };

    match outcome {
        Ok(mut result) => {
            result.execution_time = started.elapsed();
            Ok(result)
        }
        Err(error) => {
            let interrupted = is_interrupt(&error);
            let mapped = map_sqlite_error(error, abort.load(Ordering::SeqCst), timeout_ms);
            if interrupted && probe(&pooled).is_err() {
                // The connection cannot be proven idle; replace it rather
                // than hand a possibly still-running statement to the next
                // caller.
                pooled.discard();
            }
            Err(mapped)
        }
    }
}

fn run_read(
    conn: &Connection,
    validated: &ValidatedQuery,
    row_cap: usize,
) -> rusqlite::Result<ExecutionResult> {
    let mut stmt = conn.prepare_cached(&validated.normalized_text)?;
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut rows = stmt.query(params_from_iter(validated.bound_params.iter()))?;
    let mut out: Vec<serde_json::Map<String, serde_json::Value>> = Vec::new();
    let mut truncated = false;

    // Fetch one past the cap so truncation is detectable without
    // materializing the rest of the result set.
    while let Some(row) = rows.next()? {
        if out.len() == row_cap {
            truncated = true;
            break;
        }
        let mut record = serde_json::Map::with_capacity(column_names.len());
        for (i, name) in column_names.iter().enumerate() {
            record.insert(name.clone(), value_to_json(row.get_ref(i)?));
        }
        out.push(record);
    }

    Ok(ExecutionResult {
        row_count: out.len(),
        rows: out,
        truncated,
        execution_time: Duration::ZERO,
    })
}

fn run_write(
    conn: &mut Connection,
    validated: &ValidatedQuery,
) -> rusqlite::Result<ExecutionResult> {
    let tx = conn.transaction()?;
    let affected = {
        let mut stmt = tx.prepare_cached(&validated.normalized_text)?;
        stmt.execute(params_from_iter(validated.bound_params.iter()))?
    };
    // Dropping an uncommitted transaction rolls it back, so a failure
    // anywhere above leaves nothing behind.
    tx.commit()?;

    Ok(ExecutionResult {
        rows: Vec::new(),
        row_count: affected,
        truncated: false,
        execution_time: Duration::ZERO,
    })
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(text) => {
            serde_json::Value::String(String::from_utf8_lossy(text).into_owned())
        }
        ValueRef::Blob(blob) => serde_json::json!({ "blob": BASE64.encode(blob) }),
    }
}

fn is_interrupt(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::OperationInterrupted
    )
}

fn map_sqlite_error(error: rusqlite::Error, aborted: bool, timeout_ms: u64) -> GatewayError {
    if is_interrupt(&error) && aborted {
        return GatewayError::Timeout { timeout_ms };
    }
    match error {
        rusqlite::Error::InvalidParameterCount(supplied, expected) => {
            GatewayError::ParameterCount { expected, supplied }
        }
        other => GatewayError::Execution {
            message: other.to_string(),
        },
    }
}

fn probe(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |_| Ok(()))
}
