//! Summary table column classification
//!
//! Summary tables store pre-aggregated state in columns typed
//! `AggregateFunction(<func>, <types...>)` or
//! `SimpleAggregateFunction(<func>, <types...>)`. Such columns cannot be
//! selected directly; they must be finalized with the matching `-Merge`
//! function (`countMerge`, `quantileMerge(0.5)`, ...). ALIAS columns whose
//! expression already calls a `-Merge` function are aggregates too, but ready
//! to use.

use lazy_regex::{Lazy, Regex, lazy_regex};

use crate::types::{Column, ColumnCategory, TableClassification};

/// Leading function of an aggregate state type
///
/// Captures the function name plus an optional flat parameter list:
/// `AggregateFunction(quantile(0.5, 0.9), Float64)` captures `quantile(0.5, 0.9)`.
static AGGREGATE_TYPE_REGEX: Lazy<Regex> = lazy_regex!(
    r"^(?:Simple)?AggregateFunction\(\s*([A-Za-z_][A-Za-z0-9_]*(?:\([^()]*\))?)\s*[,)]"
);

/// Usage hint attached to summary tables
pub const SUMMARY_TABLE_HINT: &str = "This is a summary table. Columns with column_category \
    'aggregate' hold aggregate state and must be read with their merge_function \
    (e.g. countMerge(`count()`)); 'alias_aggregate' columns already apply a -Merge function \
    and can be selected directly. Group by 'dimension' columns when selecting aggregates. \
    Never use SELECT * on a summary table.";

/// Aggregate function named by an aggregate state type, with its parameters
pub fn extract_function_from_type(column_type: &str) -> Option<String> {
    AGGREGATE_TYPE_REGEX
        .captures(column_type.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Merge combinator for an aggregate function
///
/// Parameters stay after the suffix: `quantile(0.5)` becomes `quantileMerge(0.5)`.
pub fn merge_function(base: &str) -> String {
    match base.find('(') {
        Some(idx) => format!("{}Merge{}", &base[..idx], &base[idx..]),
        None => format!("{}Merge", base),
    }
}

/// Category and functions for a column, derived from its type and default
pub fn classify(
    column_type: &str,
    default_kind: Option<&str>,
    default_expression: Option<&str>,
) -> (ColumnCategory, Option<String>, Option<String>) {
    if let Some(base) = extract_function_from_type(column_type) {
        let merge = merge_function(&base);
        return (ColumnCategory::Aggregate, Some(base), Some(merge));
    }

    let is_alias = default_kind.is_some_and(|k| k.trim().eq_ignore_ascii_case("ALIAS"));
    if is_alias && default_expression.is_some_and(|e| e.contains("Merge(")) {
        return (ColumnCategory::AliasAggregate, None, None);
    }

    (ColumnCategory::Dimension, None, None)
}

/// Recompute a column's derived fields in place
pub fn enrich_column(column: &mut Column) {
    let (category, base, merge) = classify(
        &column.column_type,
        column.default_kind.as_deref(),
        column.default_expression.as_deref(),
    );
    column.category = category;
    column.base_function = base;
    column.merge_function = merge;
}

/// Split columns into aggregates and dimensions, preserving order
pub fn classify_table_columns(columns: &[Column]) -> TableClassification {
    let (aggregate_columns, dimension_columns): (Vec<Column>, Vec<Column>) = columns
        .iter()
        .cloned()
        .partition(|c| c.category != ColumnCategory::Dimension);

    TableClassification {
        is_summary_table: !aggregate_columns.is_empty(),
        aggregate_columns,
        dimension_columns,
    }
}
