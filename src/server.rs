//! MCP server wiring
//!
//! [`HydrolixServer`] registers the tools with rmcp and resolves the caller's
//! identity for every call: the HTTP request parts (when serving over HTTP)
//! go through the [`AuthChain`], falling back to the configured default
//! credential. Tool failures are returned as structured error results.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use http::request::Parts;
use lazy_regex::regex_replace_all;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt, tool, tool_handler, tool_router};

use crate::auth::AuthChain;
use crate::config::{GatewayConfig, Transport};
use crate::credentials::Credential;
use crate::error::Result as GatewayResult;
use crate::gateway::{HealthStatus, QueryGateway};
use crate::tools::*;

/// Name reported to MCP clients
pub const SERVER_NAME: &str = crate::connection::CLIENT_NAME;

const INSTRUCTIONS: &str = "Read-only access to Hydrolix time-series data using the ClickHouse \
    SQL dialect. Explore with list_databases, list_tables and get_table_info before querying; \
    summary tables require -Merge functions on their aggregate columns.";

#[derive(Clone)]
pub struct HydrolixServer {
    config: Arc<GatewayConfig>,
    gateway: QueryGateway,
    auth: Arc<AuthChain>,
    list_databases: ListDatabasesTool,
    list_tables: ListTablesTool,
    get_table_info: GetTableInfoTool,
    run_select_query: RunSelectQueryTool,
    get_sample_data: GetSampleDataTool,
    tool_router: ToolRouter<Self>,
}

impl HydrolixServer {
    pub fn new(config: Arc<GatewayConfig>, gateway: QueryGateway, auth: AuthChain) -> Self {
        let pagination = config.pagination.clone();
        Self {
            list_databases: ListDatabasesTool::new(gateway.clone()),
            list_tables: ListTablesTool::new(gateway.clone(), pagination.clone()),
            get_table_info: GetTableInfoTool::new(gateway.clone()),
            run_select_query: RunSelectQueryTool::new(gateway.clone(), pagination),
            get_sample_data: GetSampleDataTool::new(gateway.clone()),
            config,
            gateway,
            auth: Arc::new(auth),
            tool_router: Self::tool_router(),
        }
    }

    pub fn gateway(&self) -> &QueryGateway {
        &self.gateway
    }

    /// Identity for a request: verified token from the request, else the default
    pub fn credential_for(&self, parts: Option<&Parts>) -> GatewayResult<Credential> {
        let authenticated = parts.and_then(|p| self.auth.authenticate(p));
        if let Some(auth) = &authenticated {
            log::debug!("Request authenticated {} ({})", auth.credential.describe(), auth.client_id);
        }
        self.config.resolve(authenticated.map(|a| a.credential))
    }

    /// Run one tool and turn its outcome into an MCP result
    pub async fn call<T: Tool>(
        &self,
        tool: &T,
        args: T::Args,
        parts: Option<&Parts>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = match self.credential_for(parts) {
            Ok(credential) => {
                log::info!("Calling {} {}", T::NAME, credential.describe());
                tool.execute(args, ToolContext { credential }).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(output) => Ok(CallToolResult::success(vec![Content::json(output)?])),
            Err(e) => {
                log::warn!("{} failed: {}", T::NAME, e);
                Ok(CallToolResult::error(vec![Content::json(e.to_body())?]))
            }
        }
    }

    /// Probe the engine as the requesting identity
    pub async fn health(&self, parts: Option<&Parts>) -> HealthStatus {
        match self.credential_for(parts) {
            Ok(credential) => self.gateway.health_check(&credential).await,
            Err(e) => HealthStatus::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

fn request_parts(ctx: &RequestContext<RoleServer>) -> Option<&Parts> {
    ctx.extensions.get::<Parts>()
}

#[tool_router]
impl HydrolixServer {
    #[tool(description = "List available Hydrolix databases")]
    async fn list_databases(
        &self,
        Parameters(args): Parameters<ListDatabasesArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&self.list_databases, args, request_parts(&ctx)).await
    }

    #[tool(
        description = "List tables in a Hydrolix database with engine, keys, row and byte counts, \
        comment and classified columns. Optional `like`/`not_like` filter table names with SQL \
        LIKE patterns. Results are paginated: pass the returned `nextCursor` as `cursor` with \
        the same arguments to fetch the next page."
    )]
    async fn list_tables(
        &self,
        Parameters(args): Parameters<ListTablesArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&self.list_tables, args, request_parts(&ctx)).await
    }

    #[tool(
        description = "Describe one Hydrolix table: statistics, every column with its type and \
        column_category, and for summary tables the merge function to use on each aggregate \
        column. Call this before querying a summary table."
    )]
    async fn get_table_info(
        &self,
        Parameters(args): Parameters<GetTableInfoArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&self.get_table_info, args, request_parts(&ctx)).await
    }

    #[tool(
        description = "Run a SELECT (or WITH) query against Hydrolix using the ClickHouse SQL \
        dialect. Queries time out after 30 seconds.\n\nThe primary key of Hydrolix tables is \
        always a timestamp. Every query should carry a performance guard: a LIMIT clause or a \
        filter on the primary key. Select specific columns instead of SELECT *. With \
        aggregations, guard with a primary key filter or apply the LIMIT in a subquery before \
        aggregating. Tell the user which guard was used.\n\nFor substring matches prefer \
        `column LIKE 'prefix%'` or `column LIKE '%suffix'` over full-text search.\n\nExample: \
        `SELECT message, timestamp FROM application.logs WHERE timestamp > now() - INTERVAL 10 \
        MINUTES`\n\nLarge results are paginated: pass the returned `nextCursor` as `cursor` \
        together with the identical query."
    )]
    async fn run_select_query(
        &self,
        Parameters(args): Parameters<RunSelectQueryArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&self.run_select_query, args, request_parts(&ctx)).await
    }

    #[tool(
        description = "Fetch a few sample rows (default 5, at most 20) from a Hydrolix table to \
        see what its data looks like."
    )]
    async fn get_sample_data(
        &self,
        Parameters(args): Parameters<GetSampleDataArgs>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&self.get_sample_data, args, request_parts(&ctx)).await
    }
}

#[tool_handler]
impl ServerHandler for HydrolixServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Replace the value of any `token` query parameter
pub fn redact_token_param(uri: &str) -> String {
    regex_replace_all!(r"([?&]token=)[^&#\s]*", uri, |_, prefix: &str| {
        format!("{}[REDACTED]", prefix)
    })
    .into_owned()
}

async fn health(State(server): State<HydrolixServer>, request: Request) -> (StatusCode, String) {
    let (parts, _body) = request.into_parts();
    let status = server.health(Some(&parts)).await;
    let code = if status.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, status.message())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = redact_token_param(&request.uri().to_string());
    let response = next.run(request).await;
    log::info!("{} {} -> {}", method, uri, response.status().as_u16());
    response
}

/// `/health` plus the streamable MCP endpoint at `/mcp`
pub fn http_router(server: HydrolixServer) -> Router {
    let factory = server.clone();
    let mcp = StreamableHttpService::new(
        move || Ok(factory.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .route("/health", get(health))
        .with_state(server)
        .nest_service("/mcp", mcp)
        .layer(middleware::from_fn(log_request))
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Shutdown signal received");
}

/// Serve on the configured transport until the client leaves or a signal arrives
pub async fn run(server: HydrolixServer, config: &GatewayConfig) -> anyhow::Result<()> {
    let gateway = server.gateway().clone();

    match config.server.transport {
        Transport::Stdio => {
            log::info!("Serving MCP over stdio");
            let running = server
                .serve(rmcp::transport::stdio())
                .await
                .context("Failed to start stdio transport")?;
            tokio::select! {
                quit = running.waiting() => {
                    let reason = quit.context("stdio service task failed")?;
                    log::info!("stdio session ended: {:?}", reason);
                }
                _ = shutdown_signal() => {}
            }
        }
        Transport::Http => {
            let addr = format!("{}:{}", config.server.bind_host, config.server.bind_port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            log::info!("Serving MCP over HTTP on http://{}/mcp", addr);
            axum::serve(listener, http_router(server))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
    }

    gateway.shutdown();
    log::info!("Query pool closed");
    Ok(())
}
