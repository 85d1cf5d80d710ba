//! GetSampleData tool

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::gateway::QueryGateway;
use crate::schema_queries::sample_query;
use crate::tools::{Tool, ToolContext};

const DEFAULT_SAMPLE_ROWS: usize = 5;
const MAX_SAMPLE_ROWS: usize = 20;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetSampleDataArgs {
    /// Database containing the table
    pub database: String,

    /// Table to sample
    pub table: String,

    /// Rows to return, 1 to 20 (default 5)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleData {
    pub database: String,
    pub table: String,
    pub columns: Vec<String>,
    pub sample_rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

#[derive(Clone)]
pub struct GetSampleDataTool {
    gateway: QueryGateway,
}

impl GetSampleDataTool {
    pub fn new(gateway: QueryGateway) -> Self {
        Self { gateway }
    }
}

impl Tool for GetSampleDataTool {
    type Args = GetSampleDataArgs;
    type Output = SampleData;

    const NAME: &'static str = "get_sample_data";

    async fn execute(&self, args: Self::Args, ctx: ToolContext) -> Result<SampleData> {
        let limit = args
            .limit
            .unwrap_or(DEFAULT_SAMPLE_ROWS)
            .clamp(1, MAX_SAMPLE_ROWS);
        let sql = sample_query(&args.database, &args.table, limit)?;

        log::info!(
            "Sampling {} rows from {}.{}",
            limit,
            args.database,
            args.table
        );
        let session = self.gateway.connect(&ctx.credential).await?;
        let result = session.query(&sql).await?;

        Ok(SampleData {
            database: args.database,
            table: args.table,
            row_count: result.row_count(),
            columns: result.columns,
            sample_rows: result.rows,
        })
    }
}
