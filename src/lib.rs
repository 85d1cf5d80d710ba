//! Read-only MCP gateway for Hydrolix
//!
//! Exposes catalog exploration and SELECT execution against a Hydrolix
//! cluster (ClickHouse SQL dialect) as MCP tools, with bounded execution
//! time, engine-side resource ceilings, summary table awareness and
//! tamper-checked cursor pagination.

pub mod error;
pub mod types;

pub mod auth;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod encoding;
pub mod gateway;
pub mod metadata;
pub mod pagination;
pub mod schema_queries;
pub mod sql_limiter;
pub mod timeout;
pub mod validate;

pub mod server;
pub mod tools;

#[cfg(test)]
mod testing;

// Re-export secrecy types for consumers
pub use secrecy::{ExposeSecret, SecretString};

// Re-exports
pub use auth::{AuthBackend, AuthChain, AuthenticationResult, TokenVerifier};
pub use classifier::{classify, classify_table_columns, extract_function_from_type, merge_function};
pub use config::{EngineConfig, GatewayConfig, PaginationConfig, QueryLimits, ServerConfig, Transport};
pub use connection::{EngineClient, EngineConnector, HttpConnector, QuerySettings};
pub use credentials::{Credential, ServiceAccountToken, UsernamePassword};
pub use error::{ErrorBody, GatewayError, Result};
pub use gateway::{GatewaySession, HealthStatus, QueryGateway};
pub use metadata::MetadataService;
pub use pagination::{CursorData, PageInfo, decode_cursor, encode_cursor, hash_query};
pub use server::{HydrolixServer, http_router, redact_token_param};
pub use sql_limiter::apply_page_window;
pub use timeout::QueryPool;
pub use types::{Column, ColumnCategory, CommandOutput, QueryResult, Table, TableClassification};
pub use validate::{ensure_select, validate_identifier};
