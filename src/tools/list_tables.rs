//! ListTables tool for catalog exploration

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PaginationConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::QueryGateway;
use crate::metadata::MetadataService;
use crate::pagination::{CursorData, PageInfo, decode_cursor, validate_params};
use crate::schema_queries::TableFilters;
use crate::tools::{Tool, ToolContext};
use crate::types::Table;
use crate::validate::validate_identifier;

// =============================================================================
// Arguments & Output
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesArgs {
    /// Database to list tables from
    pub database: String,

    /// Only tables whose name matches this SQL LIKE pattern
    #[serde(default)]
    pub like: Option<String>,

    /// Skip tables whose name matches this SQL LIKE pattern
    #[serde(default)]
    pub not_like: Option<String>,

    /// `nextCursor` from the previous page; omit for the first page
    #[serde(default)]
    pub cursor: Option<String>,
}

impl ListTablesArgs {
    /// Parameters a cursor is bound to
    fn cursor_params(&self) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        params.insert("database".to_string(), Value::from(self.database.clone()));
        params.insert("like".to_string(), Value::from(self.like.clone()));
        params.insert("not_like".to_string(), Value::from(self.not_like.clone()));
        params
    }
}

/// One page of tables
#[derive(Debug, Clone, Serialize)]
pub struct TablesPage {
    pub tables: Vec<Table>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ListTablesOutput {
    Paged(TablesPage),
    /// Every table at once, when pagination is disabled
    Unpaged(Vec<Table>),
}

// =============================================================================
// Tool Struct
// =============================================================================

#[derive(Clone)]
pub struct ListTablesTool {
    gateway: QueryGateway,
    pagination: PaginationConfig,
}

impl ListTablesTool {
    pub fn new(gateway: QueryGateway, pagination: PaginationConfig) -> Self {
        Self {
            gateway,
            pagination,
        }
    }

    /// Offset to resume from, after checking the cursor belongs to this listing
    fn resume_offset(args: &ListTablesArgs) -> Result<u64> {
        let Some(token) = args.cursor.as_deref() else {
            return Ok(0);
        };
        let cursor = decode_cursor(token)?;
        if !matches!(cursor, CursorData::TableList { .. }) {
            return Err(GatewayError::InvalidCursor(format!(
                "expected a table_list cursor, got {}",
                cursor.kind()
            )));
        }
        validate_params(&cursor, &args.cursor_params())?;
        Ok(cursor.offset())
    }
}

// =============================================================================
// Tool Trait Implementation
// =============================================================================

impl Tool for ListTablesTool {
    type Args = ListTablesArgs;
    type Output = ListTablesOutput;

    const NAME: &'static str = "list_tables";

    async fn execute(&self, args: Self::Args, ctx: ToolContext) -> Result<ListTablesOutput> {
        validate_identifier(&args.database)?;
        let filters = TableFilters {
            like: args.like.clone(),
            not_like: args.not_like.clone(),
        };

        if !self.pagination.enabled {
            let session = self.gateway.connect(&ctx.credential).await?;
            let tables = MetadataService::new(&session)
                .list_tables(&args.database, &filters)
                .await?;
            return Ok(ListTablesOutput::Unpaged(tables));
        }

        let offset = Self::resume_offset(&args)?;
        let page_size = self.pagination.list_page_size;

        let session = self.gateway.connect(&ctx.credential).await?;
        let (tables, has_more) = MetadataService::new(&session)
            .list_table_page(&args.database, &filters, offset, page_size)
            .await?;

        let params = args.cursor_params();
        let page = PageInfo::new(offset, tables.len(), page_size, has_more, |next| {
            CursorData::TableList {
                offset: next,
                params,
            }
        });

        log::info!(
            "Returning {} tables (retrieved {} so far, more: {})",
            tables.len(),
            page.total_retrieved,
            page.has_more
        );
        Ok(ListTablesOutput::Paged(TablesPage { tables, page }))
    }
}
