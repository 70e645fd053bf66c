//! Standalone discovery service binary: serves the HTTP surface and
//! runs the health-check and announce loops until interrupted.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use discovery_service::{Configuration, DiscoveryService};
use tokio::signal::ctrl_c;
use tracing::info;

/// Command-line arguments for the discovery server.
#[derive(Parser, Debug)]
struct Args {
    /// Host/port to bind the HTTP surface to.
    #[arg(long, default_value = "0.0.0.0:8765")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let service = DiscoveryService::new(Configuration::default());

    let own_card = discovery_core::AgentCard::new(
        "discovery-service",
        "standalone capability discovery node",
        &format!("http://{}", args.addr),
        env!("CARGO_PKG_VERSION"),
        vec![],
    )
    .context("failed to build local agent card")?;
    service
        .register_local_agent(own_card)
        .await
        .context("failed to register local agent")?;

    let health_loop = tokio::spawn({
        let service = service.clone();
        async move { service.run_health_check_loop().await }
    });
    let announce_loop = tokio::spawn({
        let service = service.clone();
        async move { service.run_announce_loop().await }
    });
    let heartbeat_loop = tokio::spawn({
        let service = service.clone();
        async move { service.run_heartbeat_loop().await }
    });

    let router = discovery_protocol::router(service.protocol().clone());
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;

    info!(addr = %args.addr, "discovery service listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("http server failed")?;

    service.stop();
    let _ = health_loop.await;
    let _ = announce_loop.await;
    let _ = heartbeat_loop.await;

    Ok(())
}
