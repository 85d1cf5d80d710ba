//! RunSelectQuery tool
//!
//! Runs a caller-written read query. With pagination enabled the query is
//! windowed server-side and the response carries a cursor bound to the
//! query text by hash, so a cursor cannot be replayed against another query.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PaginationConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::QueryGateway;
use crate::pagination::{CursorData, PageInfo, decode_cursor, hash_query, split_page};
use crate::sql_limiter::apply_page_window;
use crate::tools::{Tool, ToolContext};
use crate::validate::ensure_select;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunSelectQueryArgs {
    /// SELECT or WITH statement in ClickHouse SQL
    pub query: String,

    /// `nextCursor` from the previous page of the same query
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageInfo>,
}

#[derive(Clone)]
pub struct RunSelectQueryTool {
    gateway: QueryGateway,
    pagination: PaginationConfig,
}

impl RunSelectQueryTool {
    pub fn new(gateway: QueryGateway, pagination: PaginationConfig) -> Self {
        Self {
            gateway,
            pagination,
        }
    }

    fn resume_offset(args: &RunSelectQueryArgs, query_hash: &str) -> Result<u64> {
        let Some(token) = args.cursor.as_deref() else {
            return Ok(0);
        };
        match decode_cursor(token)? {
            CursorData::QueryResult {
                offset,
                query_hash: cursor_hash,
                ..
            } => {
                if cursor_hash != query_hash {
                    return Err(GatewayError::QueryHashMismatch);
                }
                Ok(offset)
            }
            other => Err(GatewayError::InvalidCursor(format!(
                "expected a query_result cursor, got {}",
                other.kind()
            ))),
        }
    }
}

impl Tool for RunSelectQueryTool {
    type Args = RunSelectQueryArgs;
    type Output = QueryOutput;

    const NAME: &'static str = "run_select_query";

    async fn execute(&self, args: Self::Args, ctx: ToolContext) -> Result<QueryOutput> {
        ensure_select(&args.query)?;

        if !self.pagination.enabled {
            let result = self.gateway.execute(&args.query, &ctx.credential).await?;
            return Ok(QueryOutput {
                columns: result.columns,
                rows: result.rows,
                page: None,
            });
        }

        let query_hash = hash_query(&args.query);
        let offset = Self::resume_offset(&args, &query_hash)?;
        let page_size = self.pagination.query_page_size;

        let session = self.gateway.connect(&ctx.credential).await?;
        let windowed = apply_page_window(&args.query, page_size + 1, offset);
        let result = session.select(&windowed).await?;
        let (rows, has_more) = split_page(result.rows, page_size);

        let page = PageInfo::new(offset, rows.len(), page_size, has_more, |next| {
            CursorData::QueryResult {
                offset: next,
                query_hash,
                params: BTreeMap::new(),
            }
        });

        Ok(QueryOutput {
            columns: result.columns,
            rows,
            page: Some(page),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, test_ctx, test_gateway};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn paging(enabled: bool, page_size: usize) -> PaginationConfig {
        PaginationConfig {
            enabled,
            list_page_size: 50,
            query_page_size: page_size,
        }
    }

    fn args(query: &str, cursor: Option<String>) -> RunSelectQueryArgs {
        RunSelectQueryArgs {
            query: query.to_string(),
            cursor,
        }
    }

    fn tool(connector: Arc<FakeConnector>, page_size: usize) -> RunSelectQueryTool {
        RunSelectQueryTool::new(test_gateway(connector), paging(true, page_size))
    }

    #[tokio::test]
    async fn test_pages_through_result() {
        let connector = Arc::new(FakeConnector::default().with_number_rows(25));
        let tool = tool(connector.clone(), 10);
        let query = "SELECT number FROM numbers";

        let mut rows = Vec::new();
        let mut cursor = None;
        let mut pages = 0;
        loop {
            let out = tool.execute(args(query, cursor.clone()), test_ctx()).await;
            assert!(out.is_ok(), "query failed: {:?}", out.as_ref().err());
            let Ok(out) = out else { return };
            pages += 1;
            let returned = out.rows.len();
            rows.extend(out.rows);
            let Some(page) = out.page else {
                panic!("paged output expected")
            };
            assert_eq!(page.page_size, returned);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    assert_eq!(page.page_size, 5);
                    assert_eq!(page.total_retrieved, 25);
                    break;
                }
            }
        }

        assert_eq!(pages, 3);
        let expected: Vec<Vec<Value>> = (0..25).map(|n| vec![json!(n.to_string())]).collect();
        assert_eq!(rows, expected);
        assert!(connector.executed()[0].ends_with("LIMIT 11 OFFSET 0"));
    }

    #[tokio::test]
    async fn test_existing_limit_is_preserved() {
        let connector = Arc::new(FakeConnector::default().with_number_rows(100));
        let tool = tool(connector.clone(), 10);
        let out = tool
            .execute(args("SELECT number FROM numbers LIMIT 4", None), test_ctx())
            .await;
        assert!(out.is_ok(), "query failed: {:?}", out.as_ref().err());
        if let Ok(out) = out {
            assert_eq!(out.rows.len(), 4);
            assert!(out.page.is_some_and(|p| !p.has_more));
        }
        assert_eq!(
            connector.executed(),
            vec!["SELECT * FROM (\nSELECT number FROM numbers LIMIT 4\n) LIMIT 11 OFFSET 0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_rejected_without_connecting() {
        let connector = Arc::new(FakeConnector::default());
        let tool = tool(connector.clone(), 10);
        let result = tool.execute(args("DELETE FROM t", None), test_ctx()).await;
        assert!(matches!(result, Err(GatewayError::UnsafeQuery(_))));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_cursor_for_other_query_is_rejected() {
        let connector = Arc::new(FakeConnector::default().with_number_rows(25));
        let tool = tool(connector.clone(), 10);
        let first = tool
            .execute(args("SELECT number FROM numbers", None), test_ctx())
            .await;
        let cursor = first.ok().and_then(|o| o.page).and_then(|p| p.next_cursor);
        assert!(cursor.is_some());

        let connects = connector.connect_count();
        let result = tool
            .execute(args("SELECT number + 1 FROM numbers", cursor.clone()), test_ctx())
            .await;
        assert!(matches!(result, Err(GatewayError::QueryHashMismatch)));
        assert_eq!(connector.connect_count(), connects);

        // Surrounding whitespace does not change the query identity
        let result = tool
            .execute(args("  SELECT number FROM numbers\n", cursor), test_ctx())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_table_cursor_is_rejected() {
        let tool = tool(Arc::new(FakeConnector::default()), 10);
        let foreign = crate::pagination::encode_cursor(&CursorData::TableList {
            offset: 50,
            params: BTreeMap::new(),
        });
        let result = tool.execute(args("SELECT 1", Some(foreign)), test_ctx()).await;
        assert!(matches!(result, Err(GatewayError::InvalidCursor(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_no_rows() {
        let connector = Arc::new(FakeConnector::default().with_query_delay(Duration::from_secs(60)));
        let tool = tool(connector, 10);
        let result = tool
            .execute(args("SELECT number FROM numbers", None), test_ctx())
            .await;
        assert!(matches!(result, Err(GatewayError::QueryTimeout { .. })));
    }

    #[tokio::test]
    async fn test_unpaged_query() {
        let connector = Arc::new(FakeConnector::default().with_number_rows(30));
        let tool = RunSelectQueryTool::new(test_gateway(connector.clone()), paging(false, 10));
        let out = tool
            .execute(args("SELECT number FROM numbers", None), test_ctx())
            .await;
        assert!(out.is_ok(), "query failed: {:?}", out.as_ref().err());
        if let Ok(out) = out {
            assert_eq!(out.rows.len(), 30);
            let json = serde_json::to_value(&out).unwrap_or_default();
            assert!(json.get("nextCursor").is_none());
            assert!(json.get("hasMore").is_none());
        }
        assert_eq!(connector.executed(), vec!["SELECT number FROM numbers".to_string()]);
    }
}
