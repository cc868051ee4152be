// SQLGate - Resource & Rate Policy
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-namespace rate limiting and resource clamping
//!
//! One token bucket per namespace, debited on every call attempt before any
//! other work so rejected calls cannot be used to probe for free. Request
//! hints for timeout and row cap are clamped against configured ceilings
//! into a per-call [`SecurityContext`].

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::{GatewayConfig, MIN_ROW_CAP, MIN_TIMEOUT_MS};
use crate::core::error::GatewayError;
use crate::wire::SqlRequest;

/// Per-call security context, computed fresh for each request
#[derive(Debug, Clone)]
pub struct SecurityContext {
    pub namespace: String,
    pub effective_timeout: Duration,
    pub effective_row_cap: usize,
    pub write_allowed: bool,
}

/// Token bucket state for one namespace
#[derive(Debug)]
pub struct RateBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateBucket {
    fn new(capacity: u32, refill_per_min: f64, now: Instant) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec: refill_per_min / 60.0,
            last_refill: now,
        }
    }

    /// Take one token, refilling for elapsed time first. On exhaustion,
    /// returns the wait until a token becomes available.
    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }

    /// Remaining whole tokens, for introspection
    pub fn level(&self) -> u64 {
        self.tokens as u64
    }
}

/// Process-wide policy state shared across all concurrent calls
#[derive(Debug)]
pub struct ResourcePolicy {
    buckets: DashMap<String, RateBucket>,
    rate_capacity: u32,
    rate_refill_per_min: f64,
    default_timeout_ms: u64,
    max_timeout_ms: u64,
    default_row_cap: u64,
    max_row_cap: u64,
}

impl ResourcePolicy {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rate_capacity: config.rate_capacity,
            rate_refill_per_min: config.rate_refill_per_min,
            default_timeout_ms: config.default_timeout_ms,
            max_timeout_ms: config.max_timeout_ms,
            default_row_cap: config.default_row_cap,
            max_row_cap: config.max_row_cap,
        }
    }

    /// Debit one token for this attempt. Called for every request, including
    /// ones that will fail validation afterwards.
    pub fn check_rate(&self, namespace: &str) -> Result<(), GatewayError> {
        self.check_rate_at(namespace, Instant::now())
    }

    pub(crate) fn check_rate_at(&self, namespace: &str, now: Instant) -> Result<(), GatewayError> {
        let mut bucket = self
            .buckets
            .entry(namespace.to_string())
            .or_insert_with(|| RateBucket::new(self.rate_capacity, self.rate_refill_per_min, now));

        bucket.try_acquire(now).map_err(|wait| GatewayError::RateLimited {
            namespace: namespace.to_string(),
            retry_after_ms: wait.as_millis() as u64,
        })
    }

    /// Clamp request hints into the effective per-call limits.
    pub fn security_context(&self, namespace: &str, request: &SqlRequest) -> SecurityContext {
        let timeout_ms = request
            .timeout_ms
            .unwrap_or(self.default_timeout_ms)
            .clamp(MIN_TIMEOUT_MS, self.max_timeout_ms);
        let row_cap = request
            .max_rows
            .unwrap_or(self.default_row_cap)
            .clamp(MIN_ROW_CAP, self.max_row_cap);

        SecurityContext {
            namespace: namespace.to_string(),
            effective_timeout: Duration::from_millis(timeout_ms),
            effective_row_cap: row_cap as usize,
            write_allowed: request.allow_write,
        }
    }

    /// Current bucket levels for the dashboard
    pub fn bucket_levels(&self) -> Vec<(String, u64)> {
        let mut levels: Vec<(String, u64)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().level()))
            .collect();
        levels.sort();
        levels
    }
}
