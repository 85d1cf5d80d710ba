//! In-memory engine used by unit tests
//!
//! Answers the handful of statement shapes the gateway produces: catalog
//! queries against `system.tables`, `DESCRIBE TABLE`, `SHOW DATABASES`,
//! sample selects and a synthetic `numbers` table. Every statement and its
//! settings are recorded so tests can assert on what reached the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lazy_regex::regex_captures;
use serde_json::{Value, json};

use crate::config::QueryLimits;
use crate::connection::{EngineClient, EngineConnector, QuerySettings};
use crate::credentials::{Credential, UsernamePassword};
use crate::error::{GatewayError, Result};
use crate::gateway::QueryGateway;
use crate::tools::ToolContext;
use crate::types::{CommandOutput, QueryResult};

pub(crate) const FAKE_VERSION: &str = "24.3.1.1";

pub(crate) fn test_credential() -> Credential {
    Credential::from(UsernamePassword::new("default", "secret"))
}

pub(crate) fn test_ctx() -> ToolContext {
    ToolContext {
        credential: test_credential(),
    }
}

/// Gateway over `connector` with a 5 second timeout
pub(crate) fn test_gateway(connector: Arc<FakeConnector>) -> QueryGateway {
    QueryGateway::new(
        connector,
        &QueryLimits {
            timeout: Duration::from_secs(5),
            max_concurrent: 4,
        },
    )
}

#[derive(Default)]
struct FakeState {
    connects: AtomicUsize,
    executed: Mutex<Vec<String>>,
    last_settings: Mutex<Option<QuerySettings>>,
}

pub(crate) struct FakeConnector {
    state: Arc<FakeState>,
    tables: Arc<Vec<String>>,
    number_rows: u64,
    delay: Option<Duration>,
    unreachable: bool,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::with_tables(125)
    }
}

impl FakeConnector {
    /// Catalog of `count` tables named `table_000`, `table_001`, ...
    pub(crate) fn with_tables(count: usize) -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            tables: Arc::new((0..count).map(|i| format!("table_{:03}", i)).collect()),
            number_rows: 25,
            delay: None,
            unreachable: false,
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_query_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Size of the synthetic `numbers` table
    pub(crate) fn with_number_rows(mut self, rows: u64) -> Self {
        self.number_rows = rows;
        self
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub(crate) fn last_settings(&self) -> Option<QuerySettings> {
        self.state
            .last_settings
            .lock()
            .ok()
            .and_then(|s| s.clone())
    }
}

#[async_trait]
impl EngineConnector for FakeConnector {
    async fn connect(&self, _credential: &Credential) -> Result<Box<dyn EngineClient>> {
        if self.unreachable {
            return Err(GatewayError::Connection("connection refused".into()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClient {
            state: self.state.clone(),
            tables: self.tables.clone(),
            number_rows: self.number_rows,
            delay: self.delay,
        }))
    }
}

struct FakeClient {
    state: Arc<FakeState>,
    tables: Arc<Vec<String>>,
    number_rows: u64,
    delay: Option<Duration>,
}

fn result(columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult {
        columns: columns.iter().map(|(n, _)| n.to_string()).collect(),
        column_types: columns.iter().map(|(_, t)| t.to_string()).collect(),
        rows,
    }
}

/// Trailing `LIMIT n OFFSET m` window, if any
fn trailing_window(sql: &str) -> Option<(usize, usize)> {
    let (_, limit, offset) = regex_captures!(r"LIMIT (\d+) OFFSET (\d+)\s*$", sql)?;
    Some((limit.parse().ok()?, offset.parse().ok()?))
}

fn apply_window<T>(items: Vec<T>, window: Option<(usize, usize)>) -> Vec<T> {
    match window {
        Some((limit, offset)) => items.into_iter().skip(offset).take(limit).collect(),
        None => items,
    }
}

impl FakeClient {
    fn table_row(&self, name: &str) -> Vec<Value> {
        json!([
            "logs",
            name,
            "TurbineStorage",
            "TurbineStorage()",
            format!("CREATE TABLE logs.{} (...)", name),
            "timestamp",
            "timestamp",
            "1000",
            "4096",
            "8192",
            3,
            3,
            12,
            ""
        ])
        .as_array()
        .cloned()
        .unwrap_or_default()
    }

    fn system_tables(&self, sql: &str) -> QueryResult {
        let columns: Vec<(&str, &str)> = crate::schema_queries::TABLE_FIELDS
            .iter()
            .map(|f| (*f, "String"))
            .collect();

        if let Some((_, name)) = regex_captures!(r"AND name = '([A-Za-z0-9_]+)'", sql) {
            let known = name == "summary" || self.tables.iter().any(|t| t == name);
            let rows = if known { vec![self.table_row(name)] } else { Vec::new() };
            return result(&columns, rows);
        }

        let names: Vec<&String> = self.tables.iter().collect();
        let rows = apply_window(names, trailing_window(sql))
            .into_iter()
            .map(|n| self.table_row(n))
            .collect();
        result(&columns, rows)
    }

    fn describe(&self, sql: &str) -> QueryResult {
        let columns = [
            ("name", "String"),
            ("type", "String"),
            ("default_type", "String"),
            ("default_expression", "String"),
            ("comment", "String"),
            ("codec_expression", "String"),
            ("ttl_expression", "String"),
        ];
        let table = regex_captures!(r"`\.`([A-Za-z0-9_]+)`$", sql)
            .map(|(_, t)| t)
            .unwrap_or_default();
        let rows = if table == "summary" {
            vec![
                json!(["cdn", "String", "", "", "", "", ""]),
                json!(["count(vendor_id)", "AggregateFunction(count, String)", "", "", "", "", ""]),
                json!(["p50", "AggregateFunction(quantile(0.5), Float64)", "", "", "", "", ""]),
                json!(["cnt", "UInt64", "ALIAS", "countMerge(`count(vendor_id)`)", "", "", ""]),
            ]
        } else {
            vec![
                json!(["timestamp", "DateTime", "", "", "", "", ""]),
                json!(["message", "String", "", "", "", "", ""]),
            ]
        };
        let rows = rows
            .into_iter()
            .map(|r| r.as_array().cloned().unwrap_or_default())
            .collect();
        result(&columns, rows)
    }

    fn numbers(&self, sql: &str) -> QueryResult {
        let mut source = self.number_rows;
        // Caller-written LIMIT inside a wrapping subquery
        if let Some((_, inner)) = regex_captures!(r"(?i)LIMIT (\d+)\s*\)", sql) {
            source = source.min(inner.parse().unwrap_or(source));
        }
        let rows: Vec<Vec<Value>> = (0..source).map(|n| vec![json!(n.to_string())]).collect();
        result(&[("number", "UInt64")], apply_window(rows, trailing_window(sql)))
    }

    fn sample(&self, sql: &str) -> Result<QueryResult> {
        if sql.contains("`missing`") {
            return Err(GatewayError::QueryExecution(
                "Code: 60. Table logs.missing does not exist. (UNKNOWN_TABLE)".into(),
            ));
        }
        let limit = regex_captures!(r"LIMIT (\d+)$", sql)
            .and_then(|(_, n)| n.parse::<usize>().ok())
            .unwrap_or(0);
        let rows = (0..limit.min(3))
            .map(|i| vec![json!(format!("2024-01-01 00:00:0{}", i)), json!(format!("m{}", i))])
            .collect();
        Ok(result(&[("timestamp", "DateTime"), ("message", "String")], rows))
    }
}

#[async_trait]
impl EngineClient for FakeClient {
    async fn query(&self, sql: &str, settings: &QuerySettings) -> Result<QueryResult> {
        if let Ok(mut executed) = self.state.executed.lock() {
            executed.push(sql.to_string());
        }
        if let Ok(mut last) = self.state.last_settings.lock() {
            *last = Some(settings.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if sql.contains("boom") {
            return Err(GatewayError::QueryExecution(
                "Code: 46. Unknown function boom. (UNKNOWN_FUNCTION)".into(),
            ));
        }
        if sql.starts_with("DESCRIBE TABLE") {
            return Ok(self.describe(sql));
        }
        if sql.contains("FROM system.tables") {
            return Ok(self.system_tables(sql));
        }
        if sql.contains("FROM numbers") {
            return Ok(self.numbers(sql));
        }
        if sql.starts_with("SELECT * FROM `") {
            return self.sample(sql);
        }
        Ok(result(&[("1", "UInt8")], vec![vec![json!(1)]]))
    }

    async fn command(&self, sql: &str, settings: &QuerySettings) -> Result<CommandOutput> {
        if let Ok(mut executed) = self.state.executed.lock() {
            executed.push(sql.to_string());
        }
        if let Ok(mut last) = self.state.last_settings.lock() {
            *last = Some(settings.clone());
        }
        match sql {
            "SHOW DATABASES" => Ok(CommandOutput::from_text("default\nlogs\nsystem\n")),
            other => Err(GatewayError::QueryExecution(format!("unsupported command {}", other))),
        }
    }

    fn server_version(&self) -> &str {
        FAKE_VERSION
    }
}
