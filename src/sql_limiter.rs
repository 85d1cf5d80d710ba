//! Result windowing for paginated queries

/// Remove trailing whitespace and statement terminators
pub fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

/// Restrict a query to the row window `[offset, offset + limit)`
///
/// The query is always wrapped in a subquery: a caller's own `LIMIT`,
/// `UNION`, `SETTINGS` clause or trailing line comment stays inside it, and
/// the window applies to the whole result. The query sits on its own lines
/// so a trailing `--` comment cannot swallow the closing parenthesis.
///
/// # Examples
/// ```
/// # use hydrolix_mcp_gateway::sql_limiter::apply_page_window;
/// assert_eq!(
///     apply_page_window("SELECT a FROM t LIMIT 100;", 11, 10),
///     "SELECT * FROM (\nSELECT a FROM t LIMIT 100\n) LIMIT 11 OFFSET 10"
/// );
/// ```
pub fn apply_page_window(sql: &str, limit: usize, offset: u64) -> String {
    format!(
        "SELECT * FROM (\n{}\n) LIMIT {} OFFSET {}",
        strip_terminator(sql),
        limit,
        offset
    )
}
