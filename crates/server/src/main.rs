//! mbm-sw server entry point.
//!
//! Boots the asset cache manager (install, then activate) and serves it as
//! MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use mbm_sw_client::{AssetCacheManager, FetchConfig, Fetcher, HttpFetcher};
use mbm_sw_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, db = %config.db_path.display(), "starting mbm-sw on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let manager = Arc::new(AssetCacheManager::from_config(&config, db, fetcher)?);

    // Without a usable static generation the worker stays uncontrolling and requests pass through.
    match manager.start().await {
        Ok(phase) => tracing::info!(%phase, "worker ready"),
        Err(e) => tracing::error!(error = %e, "worker failed to start, serving without cache"),
    }

    let handler = handler::McpSwServer::new(manager);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
