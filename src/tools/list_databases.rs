//! ListDatabases tool

use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::Result;
use crate::gateway::QueryGateway;
use crate::schema_queries::SHOW_DATABASES;
use crate::tools::{Tool, ToolContext};

/// No arguments
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListDatabasesArgs {}

#[derive(Clone)]
pub struct ListDatabasesTool {
    gateway: QueryGateway,
}

impl ListDatabasesTool {
    pub fn new(gateway: QueryGateway) -> Self {
        Self { gateway }
    }
}

impl Tool for ListDatabasesTool {
    type Args = ListDatabasesArgs;
    type Output = Vec<String>;

    const NAME: &'static str = "list_databases";

    async fn execute(&self, _args: Self::Args, ctx: ToolContext) -> Result<Vec<String>> {
        log::info!("Listing all databases");
        let databases = self
            .gateway
            .execute_command(SHOW_DATABASES, &ctx.credential)
            .await?
            .into_list();
        log::info!("Found {} databases", databases.len());
        Ok(databases)
    }
}
