//! Gateway configuration
//!
//! Built once at startup from `HYDROLIX_*` environment variables and shared
//! by `Arc` afterwards. [`GatewayConfig::from_lookup`] takes any key lookup so
//! tests can feed a plain map instead of mutating the process environment.

use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::credentials::{Credential, ServiceAccountToken, UsernamePassword};
use crate::error::GatewayError;

/// MCP transport the binary serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl std::str::FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => bail!(
                "Invalid transport '{}'. Valid options: \"stdio\", \"http\"",
                other
            ),
        }
    }
}

/// Engine connection settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub secure: bool,
    pub verify: bool,
    pub connect_timeout: Duration,
    pub send_receive_timeout: Duration,
    pub proxy_path: Option<String>,
}

impl EngineConfig {
    /// Base URL of the engine's HTTP interface, proxy path included
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let path = self
            .proxy_path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{}", p))
            .unwrap_or_default();
        format!("{}://{}:{}{}/", scheme, self.host, self.port, path)
    }
}

/// Query execution bounds
#[derive(Debug, Clone)]
pub struct QueryLimits {
    /// Wall-clock bound on slot acquisition plus execution
    pub timeout: Duration,
    pub max_concurrent: usize,
}

/// Cursor pagination settings
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub enabled: bool,
    pub list_page_size: usize,
    pub query_page_size: usize,
}

/// MCP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    pub bind_host: String,
    pub bind_port: u16,
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub engine: EngineConfig,
    pub limits: QueryLimits,
    pub pagination: PaginationConfig,
    pub server: ServerConfig,
    /// Identity used when a request carries none
    pub default_credential: Option<Credential>,
}

impl GatewayConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Fails when `HYDROLIX_HOST` is missing, when only one of
    /// `HYDROLIX_USER`/`HYDROLIX_PASSWORD` is set, or when a value cannot be
    /// parsed. The error names the offending variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HYDROLIX_HOST")
            .filter(|h| !h.trim().is_empty())
            .context("Missing required environment variable: HYDROLIX_HOST")?;

        let user = lookup("HYDROLIX_USER");
        let password = lookup("HYDROLIX_PASSWORD");
        if user.is_some() != password.is_some() {
            bail!(
                "User/password authentication is only partially configured: \
                 pass both HYDROLIX_USER and HYDROLIX_PASSWORD"
            );
        }

        let default_credential = match (lookup("HYDROLIX_TOKEN"), user, password) {
            (Some(token), _, _) => Some(Credential::from(ServiceAccountToken::new(token, None))),
            (None, Some(user), Some(password)) => {
                Some(Credential::from(UsernamePassword::new(user, password)))
            }
            _ => None,
        };

        let engine = EngineConfig {
            port: parse_or(&lookup, "HYDROLIX_PORT", 8088)?,
            database: lookup("HYDROLIX_DATABASE").filter(|d| !d.is_empty()),
            secure: parse_bool_or(&lookup, "HYDROLIX_SECURE", true)?,
            verify: parse_bool_or(&lookup, "HYDROLIX_VERIFY", true)?,
            connect_timeout: Duration::from_secs(parse_or(&lookup, "HYDROLIX_CONNECT_TIMEOUT", 30)?),
            send_receive_timeout: Duration::from_secs(parse_or(
                &lookup,
                "HYDROLIX_SEND_RECEIVE_TIMEOUT",
                300,
            )?),
            proxy_path: lookup("HYDROLIX_PROXY_PATH").filter(|p| !p.is_empty()),
            host,
        };

        let limits = QueryLimits {
            timeout: Duration::from_secs(parse_or(&lookup, "HYDROLIX_QUERY_TIMEOUT", 30)?),
            max_concurrent: parse_or(&lookup, "HYDROLIX_MAX_CONCURRENT_QUERIES", 10)?,
        };
        if limits.max_concurrent == 0 {
            bail!("HYDROLIX_MAX_CONCURRENT_QUERIES must be at least 1");
        }

        let pagination = PaginationConfig {
            enabled: parse_bool_or(&lookup, "HYDROLIX_PAGINATION_ENABLED", true)?,
            list_page_size: parse_or(&lookup, "HYDROLIX_LIST_PAGE_SIZE", 50)?,
            query_page_size: parse_or(&lookup, "HYDROLIX_QUERY_PAGE_SIZE", 10_000)?,
        };
        if pagination.list_page_size == 0 || pagination.query_page_size == 0 {
            bail!("HYDROLIX_LIST_PAGE_SIZE and HYDROLIX_QUERY_PAGE_SIZE must be at least 1");
        }

        let server = ServerConfig {
            transport: lookup("HYDROLIX_MCP_SERVER_TRANSPORT")
                .as_deref()
                .unwrap_or("stdio")
                .parse()
                .context("HYDROLIX_MCP_SERVER_TRANSPORT")?,
            bind_host: lookup("HYDROLIX_MCP_BIND_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            bind_port: parse_or(&lookup, "HYDROLIX_MCP_BIND_PORT", 8000)?,
        };

        Ok(Self {
            engine,
            limits,
            pagination,
            server,
            default_credential,
        })
    }

    /// Pick the identity for one tool call
    ///
    /// A request-scoped credential always wins over the startup default.
    pub fn resolve(&self, request: Option<Credential>) -> crate::error::Result<Credential> {
        request
            .or_else(|| self.default_credential.clone())
            .ok_or(GatewayError::NoCredential)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => bail!("{} must be true or false, got {:?}", key, raw),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> GatewayConfig {
    GatewayConfig::from_lookup(|key| match key {
        "HYDROLIX_HOST" => Some("hdx.example.com".to_string()),
        "HYDROLIX_USER" => Some("default".to_string()),
        "HYDROLIX_PASSWORD" => Some("secret".to_string()),
        _ => None,
    })
    .expect("test config")
}
