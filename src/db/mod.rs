// SQLGate - Database Access
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared SQLite database with per-namespace connection pools

pub mod executor;
pub mod pool;

use anyhow::{Context, Result};
use dashmap::DashMap;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::log_info;
use pool::Pool;

const BUSY_TIMEOUT: Duration = Duration::from_millis(2_000);

/// The shared store: one SQLite file, one bounded pool per namespace
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    pool_size: usize,
    stmt_cache_capacity: usize,
    pools: DashMap<String, Arc<Pool>>,
}

impl Database {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
                log_info!("Created database directory: {}", parent.display());
            }
        }

        Ok(Self {
            path: config.db_path.clone(),
            pool_size: config.pool_size,
            stmt_cache_capacity: config.stmt_cache_capacity,
            pools: DashMap::new(),
        })
    }

    /// The pool serving one namespace, created on first use.
    pub fn pool_for(&self, namespace: &str) -> Arc<Pool> {
        self.pools
            .entry(namespace.to_string())
            .or_insert_with(|| {
                let path = self.path.clone();
                let cache = self.stmt_cache_capacity;
                Pool::new(self.pool_size, move || open_connection(&path, cache))
            })
            .clone()
    }

    /// Open-connection counts per namespace, for the dashboard
    pub fn pool_levels(&self) -> Vec<(String, usize)> {
        let mut levels: Vec<(String, usize)> = self
            .pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().open_connections()))
            .collect();
        levels.sort();
        levels
    }
}

/// Open one configured connection to the shared store.
///
/// Public so the migration subsystem and test harnesses can reach the same
/// file with the same pragmas; plugin queries never get a raw connection.
pub fn open_connection(path: &Path, stmt_cache_capacity: usize) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // journal_mode returns the resulting mode as a row
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.set_prepared_statement_cache_capacity(stmt_cache_capacity);
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> GatewayConfig {
        GatewayConfig {
            db_path: dir.path().join("store.db"),
            pool_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig {
            db_path: dir.path().join("nested/deep/store.db"),
            ..Default::default()
        };
        let _db = Database::new(&config).unwrap();
        assert!(dir.path().join("nested/deep").exists());
    }

    #[test]
    fn test_pools_are_per_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&config_in(&dir)).unwrap();

        let a = db.pool_for("music");
        let b = db.pool_for("quotes");
        let a_again = db.pool_for("music");

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_open_connection_applies_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_connection(&dir.path().join("store.db"), 8).unwrap();

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
