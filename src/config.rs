// SQLGate - Configuration
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Deployment configuration for the gateway
//!
//! Values are read once at startup from an optional TOML file, then
//! overridden by `SQLGATE_*` environment variables. Per-call request hints
//! are clamped against the ceilings configured here; the hard floors and
//! ceilings themselves are compile-time constants.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Hard limits requests can never exceed, regardless of configuration
pub const MIN_TIMEOUT_MS: u64 = 100;
pub const HARD_TIMEOUT_CEILING_MS: u64 = 60_000;
pub const MIN_ROW_CAP: u64 = 1;
pub const HARD_ROW_CAP_CEILING: u64 = 100_000;

// Maximum accepted query text size in bytes
pub const MAX_QUERY_BYTES: usize = 10 * 1024;

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Path of the shared SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Connections per namespace pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Default statement timeout when the request carries no hint (ms)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Ceiling for request timeout hints (ms)
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Default row cap when the request carries no hint
    #[serde(default = "default_row_cap")]
    pub default_row_cap: u64,

    /// Ceiling for request row-cap hints
    #[serde(default = "default_max_row_cap")]
    pub max_row_cap: u64,

    /// Token bucket capacity per namespace
    #[serde(default = "default_rate_capacity")]
    pub rate_capacity: u32,

    /// Token bucket refill per minute
    #[serde(default = "default_rate_refill_per_min")]
    pub rate_refill_per_min: f64,

    /// Prepared statement cache entries per connection
    #[serde(default = "default_stmt_cache_capacity")]
    pub stmt_cache_capacity: usize,

    /// Replace parameter values with type names in audit records
    #[serde(default)]
    pub redact_params: bool,

    /// Audit trail destination (JSON lines). None logs records instead.
    #[serde(default)]
    pub audit_path: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/plugins.db")
}

fn default_pool_size() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_timeout_ms() -> u64 {
    HARD_TIMEOUT_CEILING_MS
}

fn default_row_cap() -> u64 {
    10_000
}

fn default_max_row_cap() -> u64 {
    HARD_ROW_CAP_CEILING
}

fn default_rate_capacity() -> u32 {
    100
}

fn default_rate_refill_per_min() -> f64 {
    100.0
}

fn default_stmt_cache_capacity() -> usize {
    32
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: default_pool_size(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            default_row_cap: default_row_cap(),
            max_row_cap: default_max_row_cap(),
            rate_capacity: default_rate_capacity(),
            rate_refill_per_min: default_rate_refill_per_min(),
            stmt_cache_capacity: default_stmt_cache_capacity(),
            redact_params: false,
            audit_path: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: GatewayConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        config.clamp_to_hard_limits();
        Ok(config)
    }

    /// Build configuration from defaults and environment only.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = GatewayConfig::default();
        config.apply_env_overrides();
        config.clamp_to_hard_limits();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SQLGATE_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(size) = env_parse("SQLGATE_POOL_SIZE") {
            self.pool_size = size;
        }
        if let Some(ms) = env_parse("SQLGATE_DEFAULT_TIMEOUT_MS") {
            self.default_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("SQLGATE_MAX_TIMEOUT_MS") {
            self.max_timeout_ms = ms;
        }
        if let Some(cap) = env_parse("SQLGATE_DEFAULT_ROW_CAP") {
            self.default_row_cap = cap;
        }
        if let Some(cap) = env_parse("SQLGATE_MAX_ROW_CAP") {
            self.max_row_cap = cap;
        }
        if let Some(cap) = env_parse("SQLGATE_RATE_CAPACITY") {
            self.rate_capacity = cap;
        }
        if let Some(refill) = env_parse("SQLGATE_RATE_REFILL_PER_MIN") {
            self.rate_refill_per_min = refill;
        }
        if let Some(redact) = env_parse("SQLGATE_REDACT_PARAMS") {
            self.redact_params = redact;
        }
        if let Ok(path) = std::env::var("SQLGATE_AUDIT_PATH") {
            self.audit_path = Some(PathBuf::from(path));
        }
    }

    fn clamp_to_hard_limits(&mut self) {
        self.pool_size = self.pool_size.max(1);
        self.default_timeout_ms = self
            .default_timeout_ms
            .clamp(MIN_TIMEOUT_MS, HARD_TIMEOUT_CEILING_MS);
        self.max_timeout_ms = self
            .max_timeout_ms
            .clamp(MIN_TIMEOUT_MS, HARD_TIMEOUT_CEILING_MS);
        self.default_row_cap = self.default_row_cap.clamp(MIN_ROW_CAP, HARD_ROW_CAP_CEILING);
        self.max_row_cap = self.max_row_cap.clamp(MIN_ROW_CAP, HARD_ROW_CAP_CEILING);
        self.rate_capacity = self.rate_capacity.max(1);
        if self.rate_refill_per_min <= 0.0 {
            self.rate_refill_per_min = default_rate_refill_per_min();
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.default_row_cap, 10_000);
        assert_eq!(config.rate_capacity, 100);
        assert_eq!(config.pool_size, 4);
        assert!(!config.redact_params);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pool_size = 2\nrate_capacity = 10").unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.rate_capacity, 10);
        // Untouched fields keep their defaults
        assert_eq!(config.default_row_cap, 10_000);
    }

    #[test]
    fn test_hard_limits_clamp_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_timeout_ms = 999999\nmax_row_cap = 9999999\npool_size = 0"
        )
        .unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();
        assert_eq!(config.default_timeout_ms, HARD_TIMEOUT_CEILING_MS);
        assert_eq!(config.max_row_cap, HARD_ROW_CAP_CEILING);
        assert_eq!(config.pool_size, 1);
    }
}
