// SQLGate - Gateway Engine
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The request pipeline, from rate debit through analysis, validation,
//! binding, execution, and the audit write. Every byte of plugin SQL and
//! every parameter value passes through [`Gateway::execute`]; nothing
//! reaches a database connection unless the whole validation chain accepted
//! it, and nothing is answered before the audit record is down.

use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditRecord, AuditSink, FileAuditSink, LogAuditSink, redact_params};
use crate::bind;
use crate::config::{GatewayConfig, MAX_QUERY_BYTES};
use crate::core::error::{AuditOutcome, GatewayError};
use crate::core::stats::{GatewayStats, NamespaceStats};
use crate::db::{Database, executor};
use crate::policy::ResourcePolicy;
use crate::sql::{self, StatementKind};
use crate::validate;
use crate::wire::{self, SqlRequest, SqlResponse};
use crate::{log_debug, log_error, log_warn};

/// Point-in-time view of shared gateway state, for the dashboard
#[derive(Debug, serde::Serialize)]
pub struct GatewaySnapshot {
    pub namespaces: Vec<(String, NamespaceStats)>,
    pub rate_buckets: Vec<(String, u64)>,
    pub pools: Vec<(String, usize)>,
}

/// The SQL execution gateway
pub struct Gateway {
    config: GatewayConfig,
    policy: ResourcePolicy,
    database: Database,
    audit: Box<dyn AuditSink>,
    stats: GatewayStats,
}

impl Gateway {
    /// Build a gateway from configuration, wiring the audit sink from
    /// `audit_path` (JSON-lines file) or falling back to the process log.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let audit: Box<dyn AuditSink> = match &config.audit_path {
            Some(path) => Box::new(FileAuditSink::new(path)?),
            None => Box::new(LogAuditSink),
        };
        Self::with_audit_sink(config, audit)
    }

    /// Build a gateway with a caller-supplied audit sink.
    pub fn with_audit_sink(config: GatewayConfig, audit: Box<dyn AuditSink>) -> Result<Self> {
        let policy = ResourcePolicy::new(&config);
        let database = Database::new(&config)?;
        Ok(Self {
            config,
            policy,
            database,
            audit,
            stats: GatewayStats::new(),
        })
    }

    /// Execute one request for `namespace`. Infallible at the type level:
    /// every failure becomes the wire error shape.
    pub async fn execute(&self, namespace: &str, request: SqlRequest) -> SqlResponse {
        self.execute_with_cancel(namespace, request, CancellationToken::new())
            .await
    }

    /// Execute with a cancellation token from the transport. Cancelling
    /// aborts the in-flight statement; a write that already committed is
    /// reported as committed.
    pub async fn execute_with_cancel(
        &self,
        namespace: &str,
        request: SqlRequest,
        cancel: CancellationToken,
    ) -> SqlResponse {
        let started = Instant::now();
        let mut kind: Option<StatementKind> = None;

        let mut result = self.process(namespace, &request, cancel, &mut kind).await;
        let duration = started.elapsed();

        let (outcome, error_kind, row_count) = match &result {
            Ok(res) => (AuditOutcome::Success, None, Some(res.row_count)),
            Err(err) => (err.outcome(), Some(err.code().to_string()), None),
        };

        let record = AuditRecord {
            timestamp: Utc::now(),
            namespace: namespace.to_string(),
            query_text: bounded_query_text(&request.query),
            params: if self.config.redact_params {
                redact_params(&request.params)
            } else {
                serde_json::Value::Array(request.params.clone())
            },
            statement_kind: kind,
            outcome,
            error_kind,
            row_count,
            duration_ms: duration.as_millis() as u64,
        };

        // Log-then-respond: the record must be down before the caller hears
        // anything. A sink failure downgrades a read to a warning but turns
        // a committed write into an error response.
        if let Err(sink_err) = self.audit.record(&record) {
            let write_succeeded =
                result.is_ok() && kind.map(StatementKind::is_write).unwrap_or(false);
            if write_succeeded {
                log_error!(
                    "Audit sink failed after committed write for '{}': {:#}",
                    namespace,
                    sink_err
                );
                result = Err(GatewayError::Internal(anyhow::anyhow!(
                    "Audit sink failed after committed write: {sink_err}"
                )));
            } else {
                log_warn!("Audit sink failed for '{}': {:#}", namespace, sink_err);
            }
        }

        match result {
            Ok(res) => {
                log_debug!(
                    "{} {} rows={} truncated={} in {:?}",
                    namespace,
                    kind.map(|k| k.as_str()).unwrap_or("?"),
                    res.row_count,
                    res.truncated,
                    duration
                );
                self.stats.record(
                    namespace,
                    AuditOutcome::Success,
                    res.row_count as u64,
                    kind.map(StatementKind::is_write).unwrap_or(false),
                    duration,
                );
                wire::format_success(res)
            }
            Err(err) => {
                if let GatewayError::Internal(ref inner) = err {
                    log_error!("Internal error for '{}': {:#}", namespace, inner);
                } else {
                    log_debug!("{} rejected: {}", namespace, err);
                }
                self.stats
                    .record(namespace, err.outcome(), 0, false, duration);
                wire::format_error(&err, &request.query)
            }
        }
    }

    async fn process(
        &self,
        namespace: &str,
        request: &SqlRequest,
        cancel: CancellationToken,
        kind: &mut Option<StatementKind>,
    ) -> Result<executor::ExecutionResult, GatewayError> {
        validate::check_namespace_identifier(namespace)?;

        // Every attempt pays a token, including ones rejected below
        self.policy.check_rate(namespace)?;

        if request.query.len() > MAX_QUERY_BYTES {
            return Err(GatewayError::Syntax {
                message: format!("Query exceeds {} bytes", MAX_QUERY_BYTES),
            });
        }

        let parsed = sql::parse(&request.query)?;
        *kind = Some(parsed.plan.kind);

        validate::validate(&parsed, namespace, request.allow_write)?;
        let validated = bind::bind(&request.query, &parsed, &request.params)?;

        let ctx = self.policy.security_context(namespace, request);
        let pool = self.database.pool_for(namespace);
        executor::execute(pool, validated, ctx, cancel).await
    }

    /// Shared-state snapshot for the embedding server's dashboard.
    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            namespaces: self.stats.snapshot(),
            rate_buckets: self.policy.bucket_levels(),
            pools: self.database.pool_levels(),
        }
    }
}

/// Bound the query text stored in audit records; oversized queries are
/// rejected but still audited.
fn bounded_query_text(query: &str) -> String {
    if query.len() <= MAX_QUERY_BYTES {
        return query.to_string();
    }
    let mut end = MAX_QUERY_BYTES;
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    query[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::db::open_connection;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// Known injection payloads, passed as ordinary parameter values. Every
    /// one must behave exactly like a non-matching user id.
    const INJECTION_CORPUS: &[&str] = &[
        "alice' OR '1'='1",
        "alice' OR '1'='1' --",
        "alice' OR '1'='1' /*",
        "alice'--",
        "alice'#",
        "alice'/*",
        "' OR 1=1--",
        "\" OR 1=1--",
        "' OR 'a'='a",
        "\" OR \"a\"=\"a",
        "') OR ('a'='a",
        "'; DROP TABLE analytics_db__events; --",
        "\"; DROP TABLE analytics_db__events; --",
        "1; DELETE FROM analytics_db__events",
        "'; DELETE FROM analytics_db__events WHERE 1=1; --",
        "'; INSERT INTO analytics_db__events (user_id) VALUES ('pwned'); --",
        "' UNION SELECT * FROM quote_db__quotes --",
        "' UNION SELECT NULL, NULL --",
        "' UNION ALL SELECT user_id, event_type FROM analytics_db__events --",
        "1' UNION SELECT name FROM sqlite_master --",
        "' UNION SELECT sql FROM sqlite_master WHERE type='table' --",
        "x' AND 1=(SELECT COUNT(*) FROM sqlite_master); --",
        "' AND (SELECT COUNT(*) FROM quote_db__quotes) > 0 --",
        "' OR EXISTS(SELECT 1 FROM quote_db__quotes) --",
        "admin' AND substr(user_id,1,1)='a",
        "' OR user_id LIKE '%",
        "%' OR '1'='1",
        "_' OR '1'='1",
        "' OR 1=1 LIMIT 1; --",
        "' OR 1=1 ORDER BY 1 --",
        "'; ATTACH DATABASE '/tmp/evil.db' AS evil; --",
        "'; PRAGMA writable_schema = 1; --",
        "'; VACUUM; --",
        "'; REINDEX; --",
        "'; ALTER TABLE analytics_db__events ADD COLUMN pwned TEXT; --",
        "' AND randomblob(100000000) --",
        "' OR CASE WHEN 1=1 THEN 1 ELSE 0 END --",
        "' AND CASE WHEN (SELECT 1)=1 THEN 1 ELSE randomblob(1000000000) END --",
        "1 OR sleep(5)",
        "' WAITFOR DELAY '0:0:5' --",
        "'; SELECT load_extension('evil'); --",
        "0x27206f7220313d31",
        "char(39)||char(32)||char(111)||char(114)",
        "alice\\' OR \\'1\\'=\\'1",
        "alice%27%20OR%20%271%27%3D%271",
        "alice'||'",
        "'||(SELECT user_id FROM analytics_db__events LIMIT 1)||'",
        "$1' OR '1'='1",
        "$$; DROP TABLE analytics_db__events; $$",
        "`; DROP TABLE analytics_db__events; `",
        "[]; DROP TABLE analytics_db__events",
        "'; DETACH DATABASE main; --",
        "\u{0000}' OR '1'='1",
        "' OR json_extract('{\"a\":1}','$.a')=1 --",
    ];

    struct Harness {
        _dir: tempfile::TempDir,
        gateway: Gateway,
        sink: Arc<MemoryAuditSink>,
    }

    fn harness_with(config_tweak: impl FnOnce(&mut GatewayConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig {
            db_path: dir.path().join("store.db"),
            pool_size: 2,
            rate_capacity: 10_000,
            rate_refill_per_min: 600_000.0,
            ..Default::default()
        };
        config_tweak(&mut config);

        // Schema setup is the migration subsystem's job; tests stand in for it
        let conn = open_connection(&config.db_path, 8).unwrap();
        conn.execute_batch(
            "CREATE TABLE analytics_db__events (
                 id INTEGER PRIMARY KEY,
                 user_id TEXT NOT NULL,
                 event_type TEXT
             );
             INSERT INTO analytics_db__events (user_id, event_type) VALUES
                 ('alice', 'login'), ('alice', 'play'), ('bob', 'login');
             CREATE TABLE quote_db__quotes (id INTEGER PRIMARY KEY, text TEXT);
             INSERT INTO quote_db__quotes (text) VALUES ('secret quote');",
        )
        .unwrap();
        drop(conn);

        let sink = Arc::new(MemoryAuditSink::new());
        let gateway = Gateway::with_audit_sink(config, Box::new(Arc::clone(&sink))).unwrap();
        Harness {
            _dir: dir,
            gateway,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(|_| {})
    }

    fn read(query: &str, params: Vec<serde_json::Value>) -> SqlRequest {
        SqlRequest {
            query: query.to_string(),
            params,
            allow_write: false,
            timeout_ms: None,
            max_rows: None,
        }
    }

    fn write(query: &str, params: Vec<serde_json::Value>) -> SqlRequest {
        SqlRequest {
            allow_write: true,
            ..read(query, params)
        }
    }

    async fn event_count(h: &Harness) -> usize {
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read("SELECT count(*) AS n FROM analytics_db__events", vec![]),
            )
            .await;
        response.as_ok().unwrap().rows[0]["n"].as_u64().unwrap() as usize
    }

    #[tokio::test]
    async fn test_scenario_select_own_namespace() {
        let h = harness();
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE user_id = $1",
                    vec![json!("alice")],
                ),
            )
            .await;

        let output = response.as_ok().expect("success");
        assert_eq!(output.row_count, 2);
        assert!(output.rows.iter().all(|row| row["user_id"] == json!("alice")));
        assert!(!output.truncated);
        assert!(output.execution_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_scenario_write_without_flag() {
        let h = harness();
        let before = event_count(&h).await;
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "INSERT INTO analytics_db__events (user_id) VALUES ($1)",
                    vec![json!("bob")],
                ),
            )
            .await;

        assert_eq!(response.as_err().unwrap().error, "WritePermissionDenied");
        assert_eq!(event_count(&h).await, before);
    }

    #[tokio::test]
    async fn test_scenario_foreign_namespace() {
        let h = harness();
        let response = h
            .gateway
            .execute("analytics-db", read("SELECT * FROM quote_db__quotes", vec![]))
            .await;

        let body = response.as_err().unwrap();
        assert_eq!(body.error, "NamespaceViolation");
        assert_eq!(
            body.detail.offending_table.as_deref(),
            Some("quote_db__quotes")
        );
    }

    #[tokio::test]
    async fn test_scenario_parameter_count() {
        let h = harness();
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE user_id = $1 AND event_type = $2",
                    vec![json!("alice")],
                ),
            )
            .await;

        let body = response.as_err().unwrap();
        assert_eq!(body.error, "ParameterCountMismatch");
        assert_eq!(body.detail.expected, Some(2));
        assert_eq!(body.detail.supplied, Some(1));
    }

    #[tokio::test]
    async fn test_scenario_injection_as_parameter_is_inert() {
        let h = harness();
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE user_id = $1",
                    vec![json!("alice' OR '1'='1")],
                ),
            )
            .await;

        let output = response.as_ok().expect("not an error");
        assert_eq!(output.row_count, 0);
    }

    #[tokio::test]
    async fn test_scenario_drop_table() {
        let h = harness();
        for allow_write in [false, true] {
            let mut request = read("DROP TABLE analytics_db__events", vec![]);
            request.allow_write = allow_write;
            let response = h.gateway.execute("analytics-db", request).await;
            let body = response.as_err().unwrap();
            assert_eq!(body.error, "ForbiddenStatement");
            assert_eq!(body.detail.keyword.as_deref(), Some("DROP"));
        }
        assert_eq!(event_count(&h).await, 3);
    }

    #[tokio::test]
    async fn test_injection_corpus_is_inert() {
        assert!(INJECTION_CORPUS.len() >= 50);
        let h = harness();
        let before = event_count(&h).await;

        for payload in INJECTION_CORPUS {
            let response = h
                .gateway
                .execute(
                    "analytics-db",
                    read(
                        "SELECT * FROM analytics_db__events WHERE user_id = $1",
                        vec![json!(payload)],
                    ),
                )
                .await;
            let output = response
                .as_ok()
                .unwrap_or_else(|| panic!("payload errored: {payload}"));
            assert_eq!(output.row_count, 0, "payload matched rows: {payload}");
        }

        // Identical to a plain non-matching value, and nothing changed
        let control = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE user_id = $1",
                    vec![json!("no-such-user")],
                ),
            )
            .await;
        assert_eq!(control.as_ok().unwrap().row_count, 0);
        assert_eq!(event_count(&h).await, before);
    }

    #[tokio::test]
    async fn test_ddl_keyword_smuggled_in_subquery() {
        let h = harness();
        // The schema-reading pragma functions are blocked like the keyword
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE $1 < \
                     (SELECT count(*) FROM pragma_table_info('quote_db__quotes'))",
                    vec![json!(0)],
                ),
            )
            .await;
        assert_eq!(response.as_err().unwrap().error, "ForbiddenStatement");

        let response = h
            .gateway
            .execute(
                "analytics-db",
                read("SELECT 1 WHERE $1 IN (SELECT 2 PRAGMA cache_size)", vec![json!(1)]),
            )
            .await;
        assert_eq!(response.as_err().unwrap().error, "ForbiddenStatement");
    }

    #[tokio::test]
    async fn test_multi_statement_rejected() {
        let h = harness();
        let response = h
            .gateway
            .execute(
                "analytics-db",
                write(
                    "SELECT * FROM analytics_db__events; DELETE FROM analytics_db__events",
                    vec![],
                ),
            )
            .await;
        assert_eq!(response.as_err().unwrap().error, "MultiStatementRejected");
        assert_eq!(event_count(&h).await, 3);
    }

    #[tokio::test]
    async fn test_successful_write_and_idempotent_reads() {
        let h = harness();
        let response = h
            .gateway
            .execute(
                "analytics-db",
                write(
                    "INSERT INTO analytics_db__events (user_id, event_type) VALUES ($1, $2)",
                    vec![json!("carol"), json!("login")],
                ),
            )
            .await;
        assert_eq!(response.as_ok().unwrap().row_count, 1);
        assert_eq!(event_count(&h).await, 4);

        let query = read(
            "SELECT user_id, event_type FROM analytics_db__events ORDER BY id",
            vec![],
        );
        let first = h.gateway.execute("analytics-db", query.clone()).await;
        let second = h.gateway.execute("analytics-db", query).await;
        assert_eq!(
            first.as_ok().unwrap().rows,
            second.as_ok().unwrap().rows
        );
    }

    #[tokio::test]
    async fn test_repeated_placeholder_binds_one_value() {
        let h = harness();
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE user_id = $1 OR event_type = $1",
                    vec![json!("login")],
                ),
            )
            .await;
        assert_eq!(response.as_ok().unwrap().row_count, 2);
    }

    #[tokio::test]
    async fn test_row_cap_truncation() {
        let h = harness();
        let mut request = read("SELECT * FROM analytics_db__events ORDER BY id", vec![]);
        request.max_rows = Some(2);
        let response = h.gateway.execute("analytics-db", request).await;
        let output = response.as_ok().unwrap();
        assert_eq!(output.row_count, 2);
        assert!(output.truncated);

        let mut request = read("SELECT * FROM analytics_db__events", vec![]);
        request.max_rows = Some(3);
        let response = h.gateway.execute("analytics-db", request).await;
        let output = response.as_ok().unwrap();
        assert_eq!(output.row_count, 3);
        assert!(!output.truncated);
    }

    #[tokio::test]
    async fn test_timeout_reports_query_timeout() {
        let h = harness();
        let mut request = read(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
             SELECT count(*) FROM c",
            vec![],
        );
        request.timeout_ms = Some(150);
        let started = Instant::now();
        let response = h.gateway.execute("analytics-db", request).await;
        let body = response.as_err().unwrap();
        assert_eq!(body.error, "QueryTimeout");
        assert!(body.retryable);
        assert!(started.elapsed() < Duration::from_secs(5));

        // Connection pool is usable afterwards
        assert_eq!(event_count(&h).await, 3);
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_every_attempt() {
        let h = harness_with(|config| {
            config.rate_capacity = 3;
            config.rate_refill_per_min = 0.001;
        });

        for _ in 0..2 {
            let response = h
                .gateway
                .execute("analytics-db", read("SELECT 1", vec![]))
                .await;
            assert!(response.is_ok());
        }
        // A validation-rejected call still spends the third token
        let response = h
            .gateway
            .execute("analytics-db", read("DROP TABLE x", vec![]))
            .await;
        assert_eq!(response.as_err().unwrap().error, "ForbiddenStatement");

        let response = h
            .gateway
            .execute("analytics-db", read("SELECT 1", vec![]))
            .await;
        let body = response.as_err().unwrap();
        assert_eq!(body.error, "RateLimitExceeded");
        assert!(body.retryable);

        // Other namespaces are unaffected
        let response = h.gateway.execute("quote-db", read("SELECT 1", vec![])).await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_audit_completeness_one_record_per_attempt() {
        let h = harness_with(|config| {
            config.rate_capacity = 4;
            config.rate_refill_per_min = 0.001;
        });

        let calls: Vec<SqlRequest> = vec![
            read("SELECT * FROM analytics_db__events", vec![]),
            read("SELECT * FROM quote_db__quotes", vec![]),
            read("DELETE FROM analytics_db__events", vec![]),
            read("SELECT 1", vec![]), // spends the last token
            read("SELECT 1", vec![]), // rate limited
        ];
        for request in calls {
            let _ = h.gateway.execute("analytics-db", request).await;
        }

        let records = h.sink.records.lock().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].outcome, AuditOutcome::Success);
        assert_eq!(records[1].outcome, AuditOutcome::ValidationRejected);
        assert_eq!(
            records[1].error_kind.as_deref(),
            Some("NamespaceViolation")
        );
        assert_eq!(records[2].outcome, AuditOutcome::ValidationRejected);
        assert_eq!(records[3].outcome, AuditOutcome::Success);
        assert_eq!(records[4].outcome, AuditOutcome::RateLimited);
        assert!(records.iter().all(|r| r.namespace == "analytics-db"));
    }

    #[tokio::test]
    async fn test_audit_failure_policy_is_asymmetric() {
        let h = harness();

        // Reads survive a dead sink
        h.sink.fail.store(true, Ordering::SeqCst);
        let response = h
            .gateway
            .execute(
                "analytics-db",
                read("SELECT * FROM analytics_db__events", vec![]),
            )
            .await;
        assert!(response.is_ok());

        // Writes do not: the commit stands, but the caller is told it failed
        let response = h
            .gateway
            .execute(
                "analytics-db",
                write(
                    "INSERT INTO analytics_db__events (user_id) VALUES ($1)",
                    vec![json!("dave")],
                ),
            )
            .await;
        assert_eq!(response.as_err().unwrap().error, "InternalError");

        h.sink.fail.store(false, Ordering::SeqCst);
        assert_eq!(event_count(&h).await, 4);
    }

    #[tokio::test]
    async fn test_param_redaction_in_audit_records() {
        let h = harness_with(|config| config.redact_params = true);
        let _ = h
            .gateway
            .execute(
                "analytics-db",
                read(
                    "SELECT * FROM analytics_db__events WHERE user_id = $1",
                    vec![json!("top-secret-value")],
                ),
            )
            .await;

        let records = h.sink.records.lock().unwrap();
        assert!(!records[0].params.to_string().contains("top-secret-value"));
        assert_eq!(records[0].params, json!(["text[16]"]));
    }

    #[tokio::test]
    async fn test_oversized_query_rejected_before_parsing() {
        let h = harness();
        let huge = format!("SELECT '{}'", "x".repeat(MAX_QUERY_BYTES));
        let response = h.gateway.execute("analytics-db", read(&huge, vec![])).await;
        assert_eq!(response.as_err().unwrap().error, "SyntaxError");
    }

    #[tokio::test]
    async fn test_invalid_namespace_identifier_is_internal() {
        let h = harness();
        let response = h
            .gateway
            .execute("bad ns;--", read("SELECT 1", vec![]))
            .await;
        assert_eq!(response.as_err().unwrap().error, "InternalError");
    }

    #[tokio::test]
    async fn test_concurrent_namespaces_run_in_parallel() {
        let h = Arc::new(harness());
        let mut handles = Vec::new();
        for i in 0..8 {
            let h = Arc::clone(&h);
            let namespace = if i % 2 == 0 { "analytics-db" } else { "quote-db" };
            let query = if i % 2 == 0 {
                "SELECT * FROM analytics_db__events"
            } else {
                "SELECT * FROM quote_db__quotes"
            };
            handles.push(tokio::spawn(async move {
                h.gateway.execute(namespace, read(query, vec![])).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        let snapshot = h.gateway.snapshot();
        assert_eq!(snapshot.namespaces.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_activity() {
        let h = harness();
        let _ = h
            .gateway
            .execute(
                "analytics-db",
                read("SELECT * FROM analytics_db__events", vec![]),
            )
            .await;
        let _ = h
            .gateway
            .execute("analytics-db", read("DROP TABLE x", vec![]))
            .await;

        let snapshot = h.gateway.snapshot();
        let (name, stats) = &snapshot.namespaces[0];
        assert_eq!(name, "analytics-db");
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.validation_rejections, 1);
        assert_eq!(stats.rows_returned, 3);
    }
}
