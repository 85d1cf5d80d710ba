//! Stateless cursor pagination
//!
//! A cursor is an opaque, URL-safe token that carries everything needed to
//! fetch the next page: the offset, the parameters the first page was
//! requested with and, for query results, a hash of the query text. The
//! server keeps no pagination state.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{GatewayError, Result};

/// Current cursor envelope version
pub const CURSOR_VERSION: u32 = 1;

/// State carried between pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorData {
    TableList {
        offset: u64,
        #[serde(default)]
        params: BTreeMap<String, Value>,
    },
    QueryResult {
        offset: u64,
        query_hash: String,
        #[serde(default)]
        params: BTreeMap<String, Value>,
    },
}

impl CursorData {
    pub fn offset(&self) -> u64 {
        match self {
            CursorData::TableList { offset, .. } | CursorData::QueryResult { offset, .. } => *offset,
        }
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        match self {
            CursorData::TableList { params, .. } | CursorData::QueryResult { params, .. } => params,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CursorData::TableList { .. } => "table_list",
            CursorData::QueryResult { .. } => "query_result",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CursorEnvelope {
    v: u32,
    #[serde(flatten)]
    data: CursorData,
}

/// Encode cursor state into an opaque token
///
/// Keys are emitted in sorted order so equal state always yields the same token.
pub fn encode_cursor(data: &CursorData) -> String {
    let envelope = CursorEnvelope {
        v: CURSOR_VERSION,
        data: data.clone(),
    };
    // Value maps are ordered, so this sorts nested keys too
    let json = serde_json::to_value(&envelope)
        .and_then(|value| serde_json::to_vec(&value))
        .unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a token produced by [`encode_cursor`]
///
/// Trailing `=` padding is accepted.
///
/// # Errors
///
/// [`GatewayError::InvalidCursor`] for bad base64, bad JSON, an unknown cursor
/// type or an unsupported version.
pub fn decode_cursor(cursor: &str) -> Result<CursorData> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim().trim_end_matches('='))
        .map_err(|e| GatewayError::InvalidCursor(format!("not valid base64: {}", e)))?;
    let envelope: CursorEnvelope = serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::InvalidCursor(format!("malformed payload: {}", e)))?;
    if envelope.v != CURSOR_VERSION {
        return Err(GatewayError::InvalidCursor(format!(
            "unsupported cursor version {}",
            envelope.v
        )));
    }
    Ok(envelope.data)
}

/// SHA-256 of the query with surrounding whitespace removed, lowercase hex
pub fn hash_query(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check that a cursor was minted for the same request parameters
///
/// Every expected key must be present in the cursor with an equal value.
/// A missing key is a mismatch even when the expected value is `null`.
pub fn validate_params(cursor: &CursorData, expected: &BTreeMap<String, Value>) -> Result<()> {
    let params = cursor.params();
    for (key, expected_value) in expected {
        match params.get(key) {
            Some(value) if value == expected_value => {}
            found => {
                return Err(GatewayError::CursorParameterMismatch {
                    key: key.clone(),
                    cursor_value: found.map(Value::to_string).unwrap_or_else(|| "<missing>".into()),
                    expected: expected_value.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Trim an over-fetched batch down to one page
///
/// Callers fetch `page_size + 1` rows; the presence of the extra row is how
/// we know another page exists.
pub fn split_page<T>(mut rows: Vec<T>, page_size: usize) -> (Vec<T>, bool) {
    let has_more = rows.len() > page_size;
    rows.truncate(page_size);
    (rows, has_more)
}

/// Paging fields attached to a paginated response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub next_cursor: Option<String>,
    pub page_size: usize,
    pub total_retrieved: u64,
    pub has_more: bool,
}

impl PageInfo {
    /// Build paging fields for a page of `len` items starting at `offset`
    ///
    /// `pageSize` reports `len`, the items actually on this page. The next
    /// page starts `page_size` (the configured size) further on. `next` is
    /// only called when another page exists and receives that offset.
    pub fn new(
        offset: u64,
        len: usize,
        page_size: usize,
        has_more: bool,
        next: impl FnOnce(u64) -> CursorData,
    ) -> Self {
        let next_cursor = has_more.then(|| encode_cursor(&next(offset + page_size as u64)));
        Self {
            next_cursor,
            page_size: len,
            total_retrieved: offset + len as u64,
            has_more,
        }
    }
}
