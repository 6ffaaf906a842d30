use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use rmcp::{
    transport::{
        streamable_http_server::session::local::LocalSessionManager, StreamableHttpService,
    },
    ServiceExt,
};
use tracing::{info, warn};
use yapi_mcp::{
    Backend, CredentialTable, InitOutcome, PersistentCacheStore, ProjectMetadataCache, YapiClient,
    YapiToolServer,
};

mod config;
mod logging;

use config::{Args, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.log_level);

    let credentials = Arc::new(CredentialTable::parse(&args.token));
    if credentials.is_empty() {
        bail!("no usable project tokens in YAPI_TOKEN (expected `projectId:token,...`)");
    }

    let backend_config = args.backend_config();
    let cache_config = args.cache_config();
    cache_config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid cache configuration")?;

    let client = YapiClient::new(&backend_config, Arc::clone(&credentials))
        .context("failed to build YApi client")?;

    if args.clear_cache {
        PersistentCacheStore::new(cache_config.snapshot_path())
            .clear()
            .context("failed to clear cache snapshot")?;
        info!("Cleared cache snapshot at start-up");
    }

    info!(
        base_url = %backend_config.base_url,
        projects = credentials.len(),
        cache_dir = %cache_config.cache_dir.display(),
        ttl_minutes = cache_config.ttl_minutes,
        "Starting YApi MCP server"
    );

    let backend: Arc<dyn Backend> = Arc::new(client);
    let cache = Arc::new(ProjectMetadataCache::new(credentials, backend, cache_config));
    match cache.initialize() {
        InitOutcome::WarmStart => info!("Serving project metadata from snapshot"),
        InitOutcome::RefreshScheduled => info!("Project metadata refresh scheduled"),
    }

    let server = YapiToolServer::new(cache);
    match args.transport {
        Transport::Stdio => serve_stdio(server).await,
        Transport::Http => serve_http(server, args.listen).await,
    }
}

async fn serve_stdio(server: YapiToolServer) -> anyhow::Result<()> {
    info!("Serving MCP over stdio");
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .context("MCP initialization over stdio failed")?;
    let reason = running.waiting().await?;
    info!(?reason, "MCP session closed");
    Ok(())
}

async fn serve_http(server: YapiToolServer, listen: std::net::SocketAddr) -> anyhow::Result<()> {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!(%listen, "Serving MCP over streamable HTTP at /mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
