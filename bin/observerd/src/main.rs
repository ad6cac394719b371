use anyhow::{Context, Result};
use observer_mesh::{Mesh, MeshConfig};
use observer_service::{HttpMetaClient, ResourceRouter, TopologyBuilder, TopologyHub};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::init as tracing_init;

mod config;
mod http;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let config_path = std::env::args()
        .nth(1)
        .context("usage: observerd <config-file>")?;

    info!("Loading configuration from {}", config_path);
    let config = config::load(&config_path)?;
    let server = config.validate()?;

    info!("Starting observer server...");
    info!("  Gossip mesh: {}", server.listen);
    info!("  Web UI + API: {}", server.ui);

    let (bind_addr, bind_port) = parse_listen(&server.listen)
        .with_context(|| format!("invalid mesh listen address {:?}", server.listen))?;

    let mesh = Arc::new(Mesh::new(MeshConfig {
        node_name: server.node_name.clone(),
        bind_addr,
        bind_port,
        tags: HashMap::new(),
        join_addrs: Vec::new(),
    })?);
    mesh.start().await;

    let builder = TopologyBuilder::new(mesh.clone());
    let hub = TopologyHub::new(builder.clone(), &mesh);
    let router = Arc::new(ResourceRouter::new(
        mesh.node_name().to_string(),
        builder.clone(),
        mesh.graph(),
        Arc::new(HttpMetaClient::new(Duration::from_secs(30))),
    ));

    let context = Arc::new(http::ApiContext {
        builder,
        hub,
        router,
    });

    let api_addr: SocketAddr = server
        .ui
        .parse()
        .with_context(|| format!("invalid API listen address {:?}", server.ui))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let api_server = tokio::spawn(http::serve(api_addr, context, shutdown_rx));

    wait_for_shutdown_signal().await?;
    info!("Shutdown signal received, stopping server...");

    // Detach from the mesh before tearing the API down; open sessions see
    // the leave as one last topology update.
    mesh.leave().await;

    let _ = shutdown_tx.send(true);
    api_server.await??;

    info!("Server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }

    Ok(())
}

/// Split a `host:port` mesh listen address into its parts.
fn parse_listen(listen: &str) -> Result<(String, u16)> {
    let (host, port) = listen
        .rsplit_once(':')
        .context("expected host:port")?;

    let port: u16 = port.parse().context("invalid port")?;
    let host = if host.is_empty() { "0.0.0.0" } else { host };

    Ok((host.to_string(), port))
}
