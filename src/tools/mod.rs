//! Hydrolix tools exposed over MCP
//!
//! Each tool is a struct implementing [`Tool`]. Tools hold the shared
//! gateway and settings; the per-call [`ToolContext`] carries the identity the
//! call runs as. Argument validation and cursor checks happen before any
//! engine session is opened.

use std::future::Future;

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::credentials::Credential;
use crate::error::Result;

pub mod list_databases;
pub use list_databases::{ListDatabasesArgs, ListDatabasesTool};

pub mod list_tables;
pub use list_tables::{ListTablesArgs, ListTablesOutput, ListTablesTool, TablesPage};

pub mod get_table_info;
pub use get_table_info::{GetTableInfoArgs, GetTableInfoTool};

pub mod run_select_query;
pub use run_select_query::{QueryOutput, RunSelectQueryArgs, RunSelectQueryTool};

pub mod get_sample_data;
pub use get_sample_data::{GetSampleDataArgs, GetSampleDataTool, SampleData};

/// Per-call execution context
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Identity resolved for this call
    pub credential: Credential,
}

/// A callable tool
pub trait Tool: Send + Sync {
    type Args: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize + Send;

    /// Name the tool is registered under
    const NAME: &'static str;

    fn execute(
        &self,
        args: Self::Args,
        ctx: ToolContext,
    ) -> impl Future<Output = Result<Self::Output>> + Send;
}
