//! Catalog metadata service
//!
//! Turns `system.tables` rows and `DESCRIBE TABLE` output into typed
//! [`Table`]s with classified [`Column`]s. Nothing is cached: summary table
//! classification is recomputed from live schema on every call.

use std::collections::HashMap;

use serde_json::Value;

use crate::classifier::{SUMMARY_TABLE_HINT, classify_table_columns, enrich_column};
use crate::error::{GatewayError, Result};
use crate::gateway::GatewaySession;
use crate::pagination::split_page;
use crate::schema_queries::{TableFilters, describe_query, table_query, tables_query};
use crate::types::{Column, ColumnCategory, QueryResult, Table};

/// Read access to table and column metadata for one session
pub struct MetadataService<'a> {
    session: &'a GatewaySession,
}

impl<'a> MetadataService<'a> {
    pub fn new(session: &'a GatewaySession) -> Self {
        Self { session }
    }

    /// Describe one table
    ///
    /// # Errors
    ///
    /// * [`GatewayError::InvalidIdentifier`] before any query when a name is unsafe
    /// * [`GatewayError::NotFound`] when the table does not exist
    pub async fn describe_table(&self, database: &str, table: &str) -> Result<Table> {
        let sql = table_query(database, table)?;
        let mut tables = self.fetch_tables(&sql).await?;
        if tables.is_empty() {
            return Err(GatewayError::NotFound(format!(
                "table '{}.{}' does not exist",
                database, table
            )));
        }
        let mut table = tables.swap_remove(0);
        self.attach_columns(&mut table).await?;
        Ok(table)
    }

    /// All tables of a database matching the filters, ordered by name
    pub async fn list_tables(&self, database: &str, filters: &TableFilters) -> Result<Vec<Table>> {
        log::info!("Listing tables in database '{}'", database);
        let sql = tables_query(database, filters, None)?;
        let mut tables = self.fetch_tables(&sql).await?;
        for table in tables.iter_mut() {
            self.attach_columns(table).await?;
        }
        log::info!("Found {} tables", tables.len());
        Ok(tables)
    }

    /// One page of [`list_tables`](Self::list_tables) starting at `offset`
    ///
    /// Fetches one row more than `page_size` to learn whether another page
    /// follows; columns are only described for tables on the page. Returns
    /// the page and whether more tables exist.
    pub async fn list_table_page(
        &self,
        database: &str,
        filters: &TableFilters,
        offset: u64,
        page_size: usize,
    ) -> Result<(Vec<Table>, bool)> {
        log::info!(
            "Listing tables in database '{}' (offset {}, page size {})",
            database,
            offset,
            page_size
        );
        let sql = tables_query(database, filters, Some((page_size + 1, offset)))?;
        let (mut tables, has_more) = split_page(self.fetch_tables(&sql).await?, page_size);
        for table in tables.iter_mut() {
            self.attach_columns(table).await?;
        }
        Ok((tables, has_more))
    }

    /// Columns of a table in catalog order, classified
    pub async fn columns(&self, database: &str, table: &str) -> Result<Vec<Column>> {
        let result = self.session.query(&describe_query(database, table)?).await?;
        Ok(columns_from_describe(database, table, &result))
    }

    async fn fetch_tables(&self, sql: &str) -> Result<Vec<Table>> {
        let result = self.session.query(sql).await?;
        Ok(tables_from_result(&result))
    }

    async fn attach_columns(&self, table: &mut Table) -> Result<()> {
        table.columns = self.columns(&table.database, &table.name).await?;
        let classification = classify_table_columns(&table.columns);
        table.is_summary_table = classification.is_summary_table;
        table.summary_table_info = classification
            .is_summary_table
            .then(|| SUMMARY_TABLE_HINT.to_string());
        Ok(())
    }
}

/// Name-indexed view of one result row
struct Row<'r> {
    cells: HashMap<&'r str, &'r Value>,
}

impl<'r> Row<'r> {
    fn new(columns: &'r [String], values: &'r [Value]) -> Self {
        Self {
            cells: columns.iter().map(String::as_str).zip(values.iter()).collect(),
        }
    }

    fn string(&self, name: &str) -> String {
        self.opt_string(name).unwrap_or_default()
    }

    fn opt_string(&self, name: &str) -> Option<String> {
        match self.cells.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn u64(&self, name: &str) -> Option<u64> {
        self.cells.get(name).and_then(|v| value_as_u64(v))
    }
}

/// Read a count that may arrive as a number or as a quoted 64-bit integer
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn tables_from_result(result: &QueryResult) -> Vec<Table> {
    result
        .rows
        .iter()
        .map(|values| {
            let row = Row::new(&result.columns, values);
            Table {
                database: row.string("database"),
                name: row.string("name"),
                engine: row.string("engine"),
                engine_full: row.string("engine_full"),
                create_table_query: row.string("create_table_query"),
                sorting_key: row.string("sorting_key"),
                primary_key: row.string("primary_key"),
                total_rows: row.u64("total_rows"),
                total_bytes: row.u64("total_bytes"),
                total_bytes_uncompressed: row.u64("total_bytes_uncompressed"),
                parts: row.u64("parts"),
                active_parts: row.u64("active_parts"),
                total_marks: row.u64("total_marks"),
                comment: row.opt_string("comment"),
                columns: Vec::new(),
                is_summary_table: false,
                summary_table_info: None,
            }
        })
        .collect()
}

fn columns_from_describe(database: &str, table: &str, result: &QueryResult) -> Vec<Column> {
    result
        .rows
        .iter()
        .map(|values| {
            let row = Row::new(&result.columns, values);
            let mut column = Column {
                database: database.to_string(),
                table: table.to_string(),
                name: row.string("name"),
                column_type: row.string("type"),
                default_kind: row.opt_string("default_type"),
                default_expression: row.opt_string("default_expression"),
                comment: row.opt_string("comment"),
                category: ColumnCategory::Dimension,
                base_function: None,
                merge_function: None,
            };
            enrich_column(&mut column);
            column
        })
        .collect()
}
