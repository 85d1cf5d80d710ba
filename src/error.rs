//! Error types for gateway operations

use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway operation errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Neither a request credential nor a startup default is available
    #[error(
        "No credentials available for Hydrolix connection. Provide a service account token \
         (Authorization: Bearer or ?token=) or configure HYDROLIX_TOKEN or \
         HYDROLIX_USER/HYDROLIX_PASSWORD"
    )]
    NoCredential,

    /// Statement rejected before execution
    #[error("Unsafe query: {0}")]
    UnsafeQuery(String),

    /// Wall-clock bound exceeded
    #[error("Query timed out after {secs} seconds")]
    QueryTimeout { secs: u64 },

    /// Engine rejected or failed the query
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Engine could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// Table or database absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed continuation token
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Cursor minted for a different filter set
    #[error("Cursor parameter mismatch: {key}={cursor_value} (expected {expected})")]
    CursorParameterMismatch {
        key: String,
        cursor_value: String,
        expected: String,
    },

    /// Query text differs from the one the cursor was minted for
    #[error("Query has changed since the cursor was created; start again without a cursor")]
    QueryHashMismatch,

    /// Unsafe database or table name
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl GatewayError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NoCredential => "no_credential",
            GatewayError::UnsafeQuery(_) => "unsafe_query",
            GatewayError::QueryTimeout { .. } => "query_timeout",
            GatewayError::QueryExecution(_) => "query_execution",
            GatewayError::Connection(_) => "connection",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::InvalidCursor(_) => "invalid_cursor",
            GatewayError::CursorParameterMismatch { .. } => "cursor_parameter_mismatch",
            GatewayError::QueryHashMismatch => "query_hash_mismatch",
            GatewayError::InvalidIdentifier(_) => "invalid_identifier",
        }
    }

    /// Structured body returned across the tool boundary
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: "error",
            error_type: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Structured error object; tools never answer with a bare string
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error_type: &'static str,
    pub message: String,
}

/// Convert reqwest failures at the engine boundary
///
/// Anything that happened before a response arrived is a connection problem;
/// everything else is reported as an execution failure carrying the message.
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            GatewayError::Connection(err.to_string())
        } else if err.is_timeout() {
            GatewayError::Connection(format!("engine did not answer in time: {}", err))
        } else {
            GatewayError::QueryExecution(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_carries_kind_and_message() {
        let err = GatewayError::UnsafeQuery("only SELECT or WITH statements are allowed".into());
        let body = err.to_body();
        assert_eq!(body.status, "error");
        assert_eq!(body.error_type, "unsafe_query");
        assert!(body.message.contains("only SELECT"));
    }

    #[test]
    fn test_mismatch_names_key_and_values() {
        let err = GatewayError::CursorParameterMismatch {
            key: "database".into(),
            cursor_value: "\"a\"".into(),
            expected: "\"b\"".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("database"));
        assert!(msg.contains("\"a\""));
        assert!(msg.contains("\"b\""));
    }
}
