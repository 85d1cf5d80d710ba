//! Catalog and result types returned by the gateway

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a column participates in queries against a summary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCategory {
    /// Stored aggregate state; must be read through its `-Merge` function
    Aggregate,
    /// ALIAS column that already applies a `-Merge` function
    AliasAggregate,
    /// Plain value; usable in SELECT, WHERE and GROUP BY
    Dimension,
}

/// Table column metadata
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub database: String,
    pub table: String,
    pub name: String,

    /// Full engine type, e.g. `AggregateFunction(quantile(0.5), Float64)`
    pub column_type: String,

    /// `DEFAULT`, `MATERIALIZED`, `ALIAS` or empty
    pub default_kind: Option<String>,
    pub default_expression: Option<String>,
    pub comment: Option<String>,

    #[serde(rename = "column_category")]
    pub category: ColumnCategory,

    /// Aggregate function with its parameters, e.g. `quantile(0.5)`
    pub base_function: Option<String>,

    /// Function that finalizes the stored state, e.g. `quantileMerge(0.5)`
    pub merge_function: Option<String>,
}

/// Table metadata with its ordered columns
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub database: String,
    pub name: String,
    pub engine: String,
    pub engine_full: String,
    pub create_table_query: String,
    pub sorting_key: String,
    pub primary_key: String,
    pub total_rows: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_uncompressed: Option<u64>,
    pub parts: Option<u64>,
    pub active_parts: Option<u64>,
    pub total_marks: Option<u64>,
    pub comment: Option<String>,
    pub columns: Vec<Column>,
    pub is_summary_table: bool,

    /// Usage hint; present only for summary tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_table_info: Option<String>,
}

/// Partition of a table's columns
#[derive(Debug, Clone, Default)]
pub struct TableClassification {
    pub is_summary_table: bool,
    pub aggregate_columns: Vec<Column>,
    pub dimension_columns: Vec<Column>,
}

/// Rows returned by a query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub column_types: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Output of a non-query command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Scalar(String),
    List(Vec<String>),
}

impl CommandOutput {
    /// Interpret raw command text: multiple lines become a list
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.contains('\n') {
            CommandOutput::List(trimmed.lines().map(|l| l.trim().to_string()).collect())
        } else {
            CommandOutput::Scalar(trimmed.to_string())
        }
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            CommandOutput::Scalar(s) if s.is_empty() => Vec::new(),
            CommandOutput::Scalar(s) => vec![s],
            CommandOutput::List(l) => l,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_lines() {
        let out = CommandOutput::from_text("default\nsystem\nlogs\n");
        assert_eq!(
            out.clone().into_list(),
            vec!["default".to_string(), "system".into(), "logs".into()]
        );
        assert!(matches!(out, CommandOutput::List(_)));

        let single = CommandOutput::from_text("default\n");
        assert_eq!(single, CommandOutput::Scalar("default".into()));
        assert_eq!(single.into_list(), vec!["default".to_string()]);

        assert!(CommandOutput::from_text("").into_list().is_empty());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ColumnCategory::AliasAggregate).unwrap(),
            serde_json::json!("alias_aggregate")
        );
    }
}
