//! edge-registrar - Registration sidecar
//!
//! Announces an already running service and the routes it serves, then
//! keeps the announcement alive until Ctrl+C or SIGTERM.

use edge_registrar::application::Registry;
use edge_registrar::config::load_config;
use edge_registrar::infrastructure::{shutdown_signal, CancelToken};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting edge-registrar app={} backend={}:{} etcd={:?}",
        cfg.app_name,
        cfg.listen_ip,
        cfg.listen_port,
        cfg.etcd_endpoints
    );

    let mut registry = Registry::connect(
        cfg.registry_config(),
        &cfg.app_name,
        &cfg.listen_ip,
        cfg.listen_port,
    )
    .await?;

    for route in &cfg.routes {
        registry.add_frontend(&cfg.api_host, &route.path, route.methods.as_slice(), Vec::new())?;
    }

    if let Err(e) = registry.start().await {
        registry.stop().await;
        return Err(e.into());
    }

    let token = CancelToken::new();
    shutdown_signal(token).await;

    registry.stop().await;
    tracing::info!("edge-registrar stopped");
    Ok(())
}
