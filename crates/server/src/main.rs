//! netstash server entry point.
//!
//! Boots the cache engine, runs install and activate, then serves the engine
//! as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use netstash_client::{FetchClient, FetchConfig};
use netstash_core::engine::BroadcastBus;
use netstash_core::{AppConfig, CacheDb, CacheHooks, Engine, EngineSettings};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

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
    tracing::info!(origin = %config.origin, version = %config.version, db = %config.db_path.display(), "starting netstash");

    let db = CacheDb::open(&config.db_path).await?;
    let client = FetchClient::new(FetchConfig::from(&config))?;
    let settings = EngineSettings::from_config(&config)?;
    let engine = Engine::builder(settings, db, Arc::new(client)).build();

    let events = tokio::spawn(log_broadcasts(engine.bus().clone()));

    match engine.on_install().await {
        Ok(report) => tracing::info!(cached = report.cached.len(), "install succeeded"),
        Err(e) => tracing::error!(error = %e, "install failed, continuing with existing cache"),
    }
    let activation = engine.on_activate().await?;
    if !activation.deleted.is_empty() {
        tracing::info!(deleted = ?activation.deleted, "removed orphaned partitions");
    }

    tracing::info!("serving MCP on stdio transport");
    let handler = handler::NetstashServer::new(engine.clone());
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    engine.background().drain().await;
    events.abort();

    Ok(())
}

/// Forward revalidation outcomes to the log, one JSON line per event.
async fn log_broadcasts(bus: BroadcastBus) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => tracing::info!(event = %line, "cache broadcast"),
                Err(e) => tracing::warn!(error = %e, "unserializable cache broadcast"),
            },
            Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "broadcast log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
