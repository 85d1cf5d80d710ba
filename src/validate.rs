//! Input validation applied before anything reaches the engine

use crate::error::{GatewayError, Result};

/// Validate a database or table name for direct interpolation
///
/// Only `[A-Za-z0-9_]` is accepted. Names are interpolated into
/// `DESCRIBE TABLE` and backtick-quoted, so anything else is refused up front.
///
/// ```rust
/// use hydrolix_mcp_gateway::validate::validate_identifier;
///
/// assert!(validate_identifier("akamai_logs").is_ok());
/// assert!(validate_identifier("a; DROP TABLE x").is_err());
/// assert!(validate_identifier("").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GatewayError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GatewayError::InvalidIdentifier(format!(
            "'{}': only letters, digits and underscore are allowed",
            name
        )));
    }

    Ok(())
}

/// Render a value as a single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Reject anything that is not a read query
///
/// The first word, after surrounding whitespace, must be `SELECT` or `WITH`
/// in any case.
pub fn ensure_select(query: &str) -> Result<()> {
    let first_word: String = query
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    if first_word.eq_ignore_ascii_case("SELECT") || first_word.eq_ignore_ascii_case("WITH") {
        Ok(())
    } else {
        Err(GatewayError::UnsafeQuery(
            "only SELECT or WITH statements are allowed".to_string(),
        ))
    }
}
