//! Storefront edge gateway.
//!
//! Terminates storefront HTTP traffic in front of the backend RPC services.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ trace propagation ─▶ session ─▶ access log ─▶ router
//!                                                                    │
//!                                          ┌─────────────────────────┤
//!                                          ▼                         ▼
//!                                   route instruments        /static, /metrics,
//!                                          │                 /robots.txt, /_healthz
//!                                          ▼
//!                                   page handlers ──▶ backend channels (gRPC)
//!
//!     Background: exporter bootstrap (tracing, profiling), metrics upkeep
//! ```
//!
//! # Startup Order
//!
//! logging → config → backends → exporter bootstrap → metrics → pipeline →
//! bind → serve. Any required failure exits before the listener is bound.

use storefront_gateway::config;
use storefront_gateway::lifecycle::{signals, Gateway, Shutdown};
use storefront_gateway::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(config::log_format_from_env())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "storefront-gateway starting");

    let config = config::load_from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        tracing_enabled = config.telemetry.tracing_enabled,
        profiling_enabled = config.telemetry.profiling_enabled,
        "Configuration loaded"
    );

    let gateway = Gateway::prepare(config).await.map_err(|e| {
        tracing::error!(error = %e, "Startup failed");
        e
    })?;

    let listener = gateway.bind().await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    gateway.serve(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
