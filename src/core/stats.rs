// SQLGate - Gateway Statistics
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-namespace gateway counters
//!
//! Lightweight counters the embedding server exposes on its dashboard.
//! These are process-local tallies, not a metrics pipeline.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::error::AuditOutcome;

/// Counters for a single namespace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub attempts: u64,
    pub successes: u64,
    pub validation_rejections: u64,
    pub execution_errors: u64,
    pub timeouts: u64,
    pub rate_limited: u64,
    pub rows_returned: u64,
    pub rows_written: u64,
    pub total_execution_ms: u64,
}

/// Shared gateway statistics, keyed by namespace
#[derive(Debug, Default)]
pub struct GatewayStats {
    namespaces: DashMap<String, NamespaceStats>,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call attempt.
    pub fn record(
        &self,
        namespace: &str,
        outcome: AuditOutcome,
        rows: u64,
        wrote: bool,
        duration: Duration,
    ) {
        let mut entry = self.namespaces.entry(namespace.to_string()).or_default();
        entry.attempts += 1;
        entry.total_execution_ms += duration.as_millis() as u64;
        match outcome {
            AuditOutcome::Success => {
                entry.successes += 1;
                if wrote {
                    entry.rows_written += rows;
                } else {
                    entry.rows_returned += rows;
                }
            }
            AuditOutcome::ValidationRejected => entry.validation_rejections += 1,
            AuditOutcome::ExecutionError => entry.execution_errors += 1,
            AuditOutcome::Timeout => entry.timeouts += 1,
            AuditOutcome::RateLimited => entry.rate_limited += 1,
        }
    }

    /// Snapshot all namespaces for display.
    pub fn snapshot(&self) -> Vec<(String, NamespaceStats)> {
        let mut all: Vec<(String, NamespaceStats)> = self
            .namespaces
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Snapshot a single namespace, if it has been seen.
    pub fn namespace(&self, namespace: &str) -> Option<NamespaceStats> {
        self.namespaces.get(namespace).map(|entry| entry.clone())
    }
}
