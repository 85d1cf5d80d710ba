//! Engine connection over the ClickHouse HTTP interface
//!
//! One [`HttpConnector`] owns the process-wide `reqwest::Client` (and so the
//! HTTP connection pool). Each tool call asks it for an [`EngineClient`]
//! bound to a single credential; that client is dropped when the call ends
//! and is never handed to another caller.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::credentials::Credential;
use crate::encoding::normalize_rows;
use crate::error::{GatewayError, Result};
use crate::types::{CommandOutput, QueryResult};

/// Name reported to the engine in the admin comment and user agent
pub const CLIENT_NAME: &str = "mcp-hydrolix";

/// Engine-side ceilings sent with every query
pub const MAX_RESULT_ROWS: u64 = 100_000;
pub const MAX_MEMORY_USAGE: u64 = 2 * 1024 * 1024 * 1024;

/// Per-query engine settings, sent as URL parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySettings {
    entries: Vec<(&'static str, String)>,
}

impl QuerySettings {
    /// Read-only settings with the engine-side execution ceilings
    pub fn guarded(max_execution: Duration) -> Self {
        Self::default()
            .with("readonly", 1)
            .with("hdx_query_max_execution_time", max_execution.as_secs())
            .with("hdx_query_max_attempts", 1)
            .with("hdx_query_max_result_rows", MAX_RESULT_ROWS)
            .with("hdx_query_max_memory_usage", MAX_MEMORY_USAGE)
            .with("hdx_query_admin_comment", format!("User: {}", CLIENT_NAME))
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Session against the engine, bound to one credential
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Run a query and return its typed rows
    async fn query(&self, sql: &str, settings: &QuerySettings) -> Result<QueryResult>;

    /// Run a command and return its text output
    async fn command(&self, sql: &str, settings: &QuerySettings) -> Result<CommandOutput>;

    /// Engine version reported when the session was opened
    fn server_version(&self) -> &str;
}

/// Opens [`EngineClient`] sessions
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Open a session and verify it by fetching the server version
    async fn connect(&self, credential: &Credential) -> Result<Box<dyn EngineClient>>;
}

/// Connector for the engine's HTTP interface
#[derive(Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    base_url: String,
    database: Option<String>,
    endpoint: String,
}

impl HttpConnector {
    /// Build the shared HTTP client from engine settings
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialised
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{}/{}", CLIENT_NAME, env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .timeout(config.send_receive_timeout)
            .danger_accept_invalid_certs(!config.verify)
            .build()
            .context("Failed to build engine HTTP client")?;

        if !config.verify {
            log::warn!("TLS certificate verification is disabled for {}", config.host);
        }

        Ok(Self {
            http,
            base_url: config.base_url(),
            database: config.database.clone(),
            endpoint: format!("{}:{}", config.host, config.port),
        })
    }
}

#[async_trait]
impl EngineConnector for HttpConnector {
    async fn connect(&self, credential: &Credential) -> Result<Box<dyn EngineClient>> {
        log::info!(
            "Creating Hydrolix client connection to {} {}",
            self.endpoint,
            credential.describe()
        );

        let mut client = HttpEngineClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            database: self.database.clone(),
            credential: credential.clone(),
            version: String::new(),
        };

        let version = client
            .query("SELECT version()", &QuerySettings::default())
            .await
            .map_err(|e| {
                log::error!("Failed to connect to Hydrolix: {}", e);
                match e {
                    GatewayError::QueryExecution(msg) => GatewayError::Connection(msg),
                    other => other,
                }
            })?
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Connection("engine did not report a version".into()))?;

        log::info!(
            "✓ Connected to Hydrolix compatible with ClickHouse {}",
            version
        );
        client.version = version;
        Ok(Box::new(client))
    }
}

/// `FORMAT JSONCompact` response body
#[derive(Debug, Deserialize)]
struct JsonCompactResponse {
    meta: Vec<ColumnMeta>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ColumnMeta {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

struct HttpEngineClient {
    http: reqwest::Client,
    base_url: String,
    database: Option<String>,
    credential: Credential,
    version: String,
}

/// URL parameters for a `JSONCompact` query
///
/// Decimals are quoted by the engine: as bare JSON numbers they would be
/// parsed as `f64` and lose digits before normalization could see them.
fn query_params(settings: &QuerySettings) -> Vec<(&str, &str)> {
    let mut params: Vec<(&str, &str)> = settings.iter().collect();
    params.push(("output_format_json_quote_decimals", "1"));
    params.push(("default_format", "JSONCompact"));
    params
}

fn command_params(settings: &QuerySettings) -> Vec<(&str, &str)> {
    let mut params: Vec<(&str, &str)> = settings.iter().collect();
    params.push(("default_format", "TabSeparated"));
    params
}

fn parse_json_compact(body: &str) -> Result<QueryResult> {
    let response: JsonCompactResponse = serde_json::from_str(body).map_err(|e| {
        GatewayError::QueryExecution(format!("unexpected engine response: {}", e))
    })?;

    let (columns, column_types): (Vec<String>, Vec<String>) = response
        .meta
        .into_iter()
        .map(|m| (m.name, m.column_type))
        .unzip();
    let rows = normalize_rows(&column_types, response.data);

    Ok(QueryResult {
        columns,
        column_types,
        rows,
    })
}

impl HttpEngineClient {
    async fn post(&self, sql: &str, params: Vec<(&str, &str)>) -> Result<String> {
        let mut request = self.http.post(&self.base_url).query(&params);
        if let Some(database) = &self.database {
            request = request.query(&[("database", database.as_str())]);
        }

        let response = self
            .credential
            .apply(request)
            .body(sql.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::QueryExecution(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn query(&self, sql: &str, settings: &QuerySettings) -> Result<QueryResult> {
        let body = self.post(sql, query_params(settings)).await?;
        parse_json_compact(&body)
    }

    async fn command(&self, sql: &str, settings: &QuerySettings) -> Result<CommandOutput> {
        let body = self.post(sql, command_params(settings)).await?;
        Ok(CommandOutput::from_text(&body))
    }

    fn server_version(&self) -> &str {
        &self.version
    }
}
