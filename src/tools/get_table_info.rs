//! GetTableInfo tool
//!
//! Describes one table: catalog statistics, every column with its summary
//! classification, and usage guidance when the table is a summary table.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::Result;
use crate::gateway::QueryGateway;
use crate::metadata::MetadataService;
use crate::tools::{Tool, ToolContext};
use crate::types::Table;
use crate::validate::validate_identifier;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTableInfoArgs {
    /// Database containing the table
    pub database: String,

    /// Table to describe
    pub table: String,
}

#[derive(Clone)]
pub struct GetTableInfoTool {
    gateway: QueryGateway,
}

impl GetTableInfoTool {
    pub fn new(gateway: QueryGateway) -> Self {
        Self { gateway }
    }
}

impl Tool for GetTableInfoTool {
    type Args = GetTableInfoArgs;
    type Output = Table;

    const NAME: &'static str = "get_table_info";

    async fn execute(&self, args: Self::Args, ctx: ToolContext) -> Result<Table> {
        validate_identifier(&args.database)?;
        validate_identifier(&args.table)?;

        log::info!("Getting table info for {}.{}", args.database, args.table);
        let session = self.gateway.connect(&ctx.credential).await?;
        MetadataService::new(&session)
            .describe_table(&args.database, &args.table)
            .await
    }
}
