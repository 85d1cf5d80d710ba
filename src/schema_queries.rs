//! Catalog introspection queries
//!
//! Pure SQL builders; nothing here talks to the engine. Database and table
//! names are validated before interpolation and every other value is passed
//! as an escaped string literal.

use crate::error::Result;
use crate::validate::{quote_literal, validate_identifier};

/// Lists databases visible to the caller
pub const SHOW_DATABASES: &str = "SHOW DATABASES";

/// Columns read from `system.tables`, in the order they are selected
pub const TABLE_FIELDS: &[&str] = &[
    "database",
    "name",
    "engine",
    "engine_full",
    "create_table_query",
    "sorting_key",
    "primary_key",
    "total_rows",
    "total_bytes",
    "total_bytes_uncompressed",
    "parts",
    "active_parts",
    "total_marks",
    "comment",
];

/// Optional name filters for table listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilters {
    pub like: Option<String>,
    pub not_like: Option<String>,
}

fn tables_select(database: &str) -> Result<String> {
    validate_identifier(database)?;
    Ok(format!(
        "SELECT {} FROM system.tables WHERE database = {}",
        TABLE_FIELDS.join(", "),
        quote_literal(database)
    ))
}

/// Returns SQL listing the tables of a database
///
/// When `window` is `(limit, offset)` the listing is ordered by name and
/// windowed so pages are stable.
///
/// ```rust
/// use hydrolix_mcp_gateway::schema_queries::{tables_query, TableFilters};
///
/// let filters = TableFilters { like: Some("cdn%".into()), not_like: None };
/// let sql = tables_query("logs", &filters, Some((51, 0))).unwrap();
/// assert!(sql.ends_with("AND name LIKE 'cdn%' ORDER BY name LIMIT 51 OFFSET 0"));
/// ```
pub fn tables_query(
    database: &str,
    filters: &TableFilters,
    window: Option<(usize, u64)>,
) -> Result<String> {
    let mut sql = tables_select(database)?;
    if let Some(like) = filters.like.as_deref().filter(|l| !l.is_empty()) {
        sql.push_str(&format!(" AND name LIKE {}", quote_literal(like)));
    }
    if let Some(not_like) = filters.not_like.as_deref().filter(|l| !l.is_empty()) {
        sql.push_str(&format!(" AND name NOT LIKE {}", quote_literal(not_like)));
    }
    sql.push_str(" ORDER BY name");
    if let Some((limit, offset)) = window {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    }
    Ok(sql)
}

/// Returns SQL fetching a single table's catalog row
pub fn table_query(database: &str, table: &str) -> Result<String> {
    validate_identifier(table)?;
    Ok(format!(
        "{} AND name = {}",
        tables_select(database)?,
        quote_literal(table)
    ))
}

/// Returns SQL describing a table's columns with full type strings
pub fn describe_query(database: &str, table: &str) -> Result<String> {
    validate_identifier(database)?;
    validate_identifier(table)?;
    Ok(format!("DESCRIBE TABLE `{}`.`{}`", database, table))
}

/// Returns SQL selecting the first `limit` rows of a table
pub fn sample_query(database: &str, table: &str, limit: usize) -> Result<String> {
    validate_identifier(database)?;
    validate_identifier(table)?;
    Ok(format!("SELECT * FROM `{}`.`{}` LIMIT {}", database, table, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn test_tables_query_without_filters() {
        let sql = tables_query("logs", &TableFilters::default(), None).unwrap();
        assert!(sql.starts_with("SELECT database, name, engine, engine_full"));
        assert!(sql.contains("FROM system.tables WHERE database = 'logs'"));
        assert!(sql.ends_with("ORDER BY name"));
        assert!(!sql.contains("LIKE"));
    }

    #[test]
    fn test_tables_query_with_filters_and_window() {
        let filters = TableFilters {
            like: Some("a%".into()),
            not_like: Some("%_tmp".into()),
        };
        let sql = tables_query("logs", &filters, Some((51, 100))).unwrap();
        assert!(sql.contains("AND name LIKE 'a%'"));
        assert!(sql.contains("AND name NOT LIKE '%_tmp'"));
        assert!(sql.ends_with("ORDER BY name LIMIT 51 OFFSET 100"));
    }

    #[test]
    fn test_like_values_are_escaped() {
        let filters = TableFilters {
            like: Some("x' OR '1'='1".into()),
            not_like: None,
        };
        let sql = tables_query("logs", &filters, None).unwrap();
        assert!(sql.contains(r"LIKE 'x\' OR \'1\'=\'1'"));
    }

    #[test]
    fn test_identifiers_validated() {
        assert!(matches!(
            tables_query("a; DROP TABLE x", &TableFilters::default(), None),
            Err(GatewayError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            describe_query("logs", "t`"),
            Err(GatewayError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            table_query("logs", ""),
            Err(GatewayError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_describe_and_sample() {
        assert_eq!(
            describe_query("logs", "events").unwrap(),
            "DESCRIBE TABLE `logs`.`events`"
        );
        assert_eq!(
            sample_query("logs", "events", 5).unwrap(),
            "SELECT * FROM `logs`.`events` LIMIT 5"
        );
    }
}
