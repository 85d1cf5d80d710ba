// Hydrolix MCP server
//
// Serves read-only Hydrolix query and catalog tools over stdio (default) or
// streamable HTTP, selected by HYDROLIX_MCP_SERVER_TRANSPORT.
//
// REQUIRED: HYDROLIX_HOST.
// OPTIONAL: HYDROLIX_TOKEN or HYDROLIX_USER/HYDROLIX_PASSWORD as the default
// identity; HTTP callers may bring their own token instead.

use std::sync::Arc;

use anyhow::{Context, Result};
use hydrolix_mcp_gateway::{
    AuthChain, GatewayConfig, HttpConnector, HydrolixServer, QueryGateway, TokenVerifier, server,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GatewayConfig::from_env().context("Invalid Hydrolix configuration")?;
    log::info!(
        "Starting {} {} for {}",
        server::SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
        config.engine.base_url()
    );
    if config.default_credential.is_none() {
        log::warn!("No default credential configured; every request must authenticate");
    }

    let connector = HttpConnector::new(&config.engine).context("Failed to build Hydrolix client")?;
    let gateway = QueryGateway::new(Arc::new(connector), &config.limits);
    let auth = AuthChain::standard(TokenVerifier::for_host(&config.engine.host));

    let config = Arc::new(config);
    let hydrolix = HydrolixServer::new(config.clone(), gateway, auth);
    server::run(hydrolix, &config).await
}
