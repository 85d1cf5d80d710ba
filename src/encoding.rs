//! Result cell normalization
//!
//! Engine cells arrive as JSON already; this pass only fixes the types that
//! would otherwise lose information or be ambiguous for the caller:
//!
//! - `Decimal*` values are strings; the engine is asked to quote them, and a
//!   bare number that still slips through is stringified
//! - IP addresses and binary strings are always strings
//! - 64-bit integers are kept exactly as the engine emitted them
//!
//! Wrappers (`Nullable`, `LowCardinality`) are looked through and `Array`
//! elements are normalized recursively.

use serde_json::Value;

/// Normalize every row of a result
pub fn normalize_rows(column_types: &[String], rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(idx, cell)| match column_types.get(idx) {
                    Some(column_type) => normalize_cell(column_type, cell),
                    None => cell,
                })
                .collect()
        })
        .collect()
}

/// Normalize one cell according to its engine type
pub fn normalize_cell(column_type: &str, value: Value) -> Value {
    if value.is_null() {
        return value;
    }

    let column_type = unwrap_type(column_type);

    if let Some(inner) = strip_wrapper(column_type, "Array") {
        return match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| normalize_cell(inner, item))
                    .collect(),
            ),
            other => other,
        };
    }

    if column_type.starts_with("Decimal") || is_stringly(column_type) {
        return match value {
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => other,
        };
    }

    value
}

fn is_stringly(column_type: &str) -> bool {
    matches!(column_type, "IPv4" | "IPv6" | "UUID" | "String")
        || column_type.starts_with("FixedString")
}

fn unwrap_type(mut column_type: &str) -> &str {
    loop {
        let trimmed = column_type.trim();
        match strip_wrapper(trimmed, "Nullable").or_else(|| strip_wrapper(trimmed, "LowCardinality")) {
            Some(inner) => column_type = inner,
            None => return trimmed,
        }
    }
}

fn strip_wrapper<'a>(column_type: &'a str, wrapper: &str) -> Option<&'a str> {
    column_type
        .strip_prefix(wrapper)?
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}
