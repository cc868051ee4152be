//! # SQLGate
//!
//! A namespace-isolated SQL execution gateway for sandboxed plugins:
//! - Structure-aware query analysis (quotes, comments, subqueries, CTEs)
//! - Table-namespace isolation: a plugin only ever touches `<namespace>__*`
//! - Statement allow-list (SELECT/INSERT/UPDATE/DELETE, DDL always rejected)
//! - Native parameter binding for `$N` placeholders, never text splicing
//! - Per-namespace rate limiting, timeout and row-cap clamping
//! - Interrupt-based cancellation of runaway statements
//! - Write-ahead audit trail for every call attempt
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! sqlgate = { git = "https://github.com/Akaere-NetWorks/sqlgate.git" }
//! tokio = { version = "1.35", features = ["full"] }
//! serde_json = "1.0"
//! ```
//!
//! Basic usage:
//! ```no_run
//! use sqlgate::{Gateway, GatewayConfig, SqlRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = Gateway::new(GatewayConfig::from_env())?;
//!
//!     let request = SqlRequest {
//!         query: "SELECT * FROM music__tracks WHERE artist = $1".to_string(),
//!         params: vec![serde_json::json!("daft punk")],
//!         allow_write: false,
//!         timeout_ms: None,
//!         max_rows: None,
//!     };
//!
//!     // The namespace comes from the transport (e.g. the bus subject
//!     // `db.sql.music.execute`), never from the request payload.
//!     let response = gateway.execute("music", request).await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## What callers can and cannot do
//!
//! A plugin in namespace `music` can query `music__tracks`, `music__queue`,
//! and any other table under its prefix, including through JOINs, subqueries
//! and CTEs. It cannot reach another plugin's tables, run DDL, stack
//! statements, or splice values into query text: parameters cross into
//! SQLite exclusively through the driver's binding channel. Schema changes
//! belong to the platform's migration subsystem, not to this crate.

pub mod audit;
pub mod bind;
pub mod config;
pub mod core;
pub mod db;
pub mod engine;
pub mod policy;
pub mod sql;
pub mod validate;
pub mod wire;

// Re-export the types most embedders need
pub use audit::{AuditRecord, AuditSink, FileAuditSink, LogAuditSink};
pub use config::GatewayConfig;
pub use core::error::{AuditOutcome, GatewayError};
pub use db::open_connection;
pub use engine::{Gateway, GatewaySnapshot};
pub use sql::StatementKind;
pub use wire::{ErrorBody, QueryOutput, SqlRequest, SqlResponse};
