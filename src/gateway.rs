//! Read-only query gateway
//!
//! [`QueryGateway`] is the single path from a tool call to the engine. It
//! opens one [`GatewaySession`] per call, bound to the caller's credential,
//! and runs every statement of that session on the bounded [`QueryPool`].

use std::sync::Arc;

use crate::config::QueryLimits;
use crate::connection::{EngineClient, EngineConnector, QuerySettings};
use crate::credentials::Credential;
use crate::error::{GatewayError, Result};
use crate::timeout::QueryPool;
use crate::types::{CommandOutput, QueryResult};
use crate::validate::ensure_select;

/// Outcome of a health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Available { version: String },
    Unavailable { reason: String },
}

impl HealthStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Available { .. })
    }

    /// Plain-text body for the health endpoint
    pub fn message(&self) -> String {
        match self {
            HealthStatus::Available { version } => {
                format!("OK - Connected to Hydrolix compatible with ClickHouse {}", version)
            }
            HealthStatus::Unavailable { reason } => {
                format!("ERROR - Cannot connect to Hydrolix: {}", reason)
            }
        }
    }
}

/// Entry point for all engine work
#[derive(Clone)]
pub struct QueryGateway {
    connector: Arc<dyn EngineConnector>,
    pool: QueryPool,
    settings: QuerySettings,
}

impl QueryGateway {
    pub fn new(connector: Arc<dyn EngineConnector>, limits: &QueryLimits) -> Self {
        Self {
            connector,
            pool: QueryPool::new(limits.max_concurrent, limits.timeout),
            settings: QuerySettings::guarded(limits.timeout),
        }
    }

    pub fn pool(&self) -> &QueryPool {
        &self.pool
    }

    /// Open a session for one tool call
    ///
    /// Connecting is bounded by the query timeout as well.
    pub async fn connect(&self, credential: &Credential) -> Result<GatewaySession> {
        let timeout = self.pool.timeout();
        let client = tokio::time::timeout(timeout, self.connector.connect(credential))
            .await
            .map_err(|_| {
                GatewayError::Connection(format!(
                    "no answer from Hydrolix within {}s",
                    timeout.as_secs()
                ))
            })??;

        Ok(GatewaySession {
            client: Arc::from(client),
            pool: self.pool.clone(),
            settings: self.settings.clone(),
        })
    }

    /// Run a caller-supplied read query
    ///
    /// Non-SELECT statements are rejected before any connection is opened.
    pub async fn execute(&self, query: &str, credential: &Credential) -> Result<QueryResult> {
        ensure_select(query)?;
        self.connect(credential).await?.select(query).await
    }

    pub async fn execute_command(&self, command: &str, credential: &Credential) -> Result<CommandOutput> {
        self.connect(credential).await?.command(command).await
    }

    /// Probe the engine; never fails
    pub async fn health_check(&self, credential: &Credential) -> HealthStatus {
        match self.connect(credential).await {
            Ok(session) => HealthStatus::Available {
                version: session.server_version().to_string(),
            },
            Err(e) => HealthStatus::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    /// Stop accepting new work
    pub fn shutdown(&self) {
        self.pool.close();
    }
}

/// Engine session bound to one credential, dropped at the end of a tool call
pub struct GatewaySession {
    client: Arc<dyn EngineClient>,
    pool: QueryPool,
    settings: QuerySettings,
}

impl GatewaySession {
    pub fn server_version(&self) -> &str {
        self.client.server_version()
    }

    /// Run a caller-supplied query, refusing anything but SELECT/WITH
    pub async fn select(&self, query: &str) -> Result<QueryResult> {
        ensure_select(query)?;
        log::info!("Executing SELECT query: {}", query);
        let result = self.query(query).await;
        match &result {
            Ok(rows) => log::info!("Query returned {} rows", rows.row_count()),
            Err(GatewayError::QueryTimeout { .. }) => {}
            Err(e) => log::error!("Error executing query: {}", e),
        }
        result
    }

    /// Run a query built by the gateway itself
    pub(crate) async fn query(&self, sql: &str) -> Result<QueryResult> {
        let client = self.client.clone();
        let settings = self.settings.clone();
        let sql = sql.to_string();
        self.pool
            .run("Query", async move { client.query(&sql, &settings).await })
            .await
    }

    pub async fn command(&self, command: &str) -> Result<CommandOutput> {
        let client = self.client.clone();
        let settings = self.settings.clone();
        let command = command.to_string();
        self.pool
            .run("Command", async move { client.command(&command, &settings).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, test_credential};
    use std::time::Duration;

    fn gateway(connector: Arc<FakeConnector>, timeout: Duration) -> QueryGateway {
        QueryGateway::new(
            connector,
            &QueryLimits {
                timeout,
                max_concurrent: 10,
            },
        )
    }

    #[tokio::test]
    async fn test_execute_select() {
        let connector = Arc::new(FakeConnector::default());
        let gw = gateway(connector.clone(), Duration::from_secs(5));
        let result = gw
            .execute("SELECT number FROM numbers", &test_credential())
            .await;
        assert!(result.is_ok(), "execute failed: {:?}", result.err());
        if let Ok(result) = result {
            assert_eq!(result.columns, vec!["number".to_string()]);
            assert!(result.row_count() > 0);
        }
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_rejected_without_connecting() {
        let connector = Arc::new(FakeConnector::default());
        let gw = gateway(connector.clone(), Duration::from_secs(5));
        let result = gw.execute("DELETE FROM t", &test_credential()).await;
        assert!(matches!(result, Err(GatewayError::UnsafeQuery(_))));
        assert_eq!(connector.connect_count(), 0);
        assert!(connector.executed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_times_out_without_rows() {
        let connector = Arc::new(FakeConnector::default().with_query_delay(Duration::from_secs(60)));
        let gw = gateway(connector.clone(), Duration::from_secs(1));
        let result = gw
            .execute("SELECT number FROM numbers", &test_credential())
            .await;
        match result {
            Err(GatewayError::QueryTimeout { secs }) => assert_eq!(secs, 1),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_engine_failure_is_query_execution() {
        let connector = Arc::new(FakeConnector::default());
        let gw = gateway(connector, Duration::from_secs(5));
        let result = gw.execute("SELECT boom()", &test_credential()).await;
        assert!(matches!(result, Err(GatewayError::QueryExecution(_))));
    }

    #[tokio::test]
    async fn test_every_query_carries_guard_settings() {
        let connector = Arc::new(FakeConnector::default());
        let gw = gateway(connector.clone(), Duration::from_secs(30));
        let _ = gw.execute("SELECT 1", &test_credential()).await;
        let settings = connector.last_settings();
        assert!(settings.is_some());
        if let Some(settings) = settings {
            assert_eq!(settings.get("readonly"), Some("1"));
            assert_eq!(settings.get("hdx_query_max_execution_time"), Some("30"));
        }
    }

    #[tokio::test]
    async fn test_execute_command_lists_databases() {
        let connector = Arc::new(FakeConnector::default());
        let gw = gateway(connector, Duration::from_secs(5));
        let out = gw.execute_command("SHOW DATABASES", &test_credential()).await;
        assert!(out.is_ok(), "command failed: {:?}", out.err());
        if let Ok(out) = out {
            assert!(out.into_list().contains(&"default".to_string()));
        }
    }

    #[tokio::test]
    async fn test_command_carries_read_only_settings() {
        let connector = Arc::new(FakeConnector::default());
        let gw = gateway(connector.clone(), Duration::from_secs(30));
        let out = gw.execute_command("SHOW DATABASES", &test_credential()).await;
        assert!(out.is_ok(), "command failed: {:?}", out.err());

        let settings = connector.last_settings();
        assert!(settings.is_some());
        if let Some(settings) = settings {
            assert_eq!(settings.get("readonly"), Some("1"));
            assert_eq!(settings.get("hdx_query_max_execution_time"), Some("30"));
            assert_eq!(settings.get("hdx_query_max_result_rows"), Some("100000"));
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let gw = gateway(Arc::new(FakeConnector::default()), Duration::from_secs(5));
        let status = gw.health_check(&test_credential()).await;
        assert!(status.is_available());
        assert!(status.message().starts_with("OK - Connected to Hydrolix compatible with ClickHouse"));

        let down = gateway(Arc::new(FakeConnector::unreachable()), Duration::from_secs(5));
        let status = down.health_check(&test_credential()).await;
        assert!(!status.is_available());
        assert!(status.message().starts_with("ERROR - Cannot connect to Hydrolix:"));
    }
}
