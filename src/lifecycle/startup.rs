//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect every required backend, failing fast
//! - Launch optional exporters in the background
//! - Build route instruments and the request pipeline
//! - Bind the listener last and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any required startup error is fatal and happens before bind
//! - Subsystems initialize in order, not concurrently
//! - Optional exporters never gate the listener

use std::future::Future;
use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::backends::{BackendError, Backends};
use crate::config::{ConfigError, GatewayConfig};
use crate::http::{HttpServer, Pipeline, PlaceholderStorefront, Storefront};
use crate::observability::{BootstrapHandle, MetricsRegistry, ObservabilityBootstrap, StatsViews};

/// Error type for gateway startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend connection failed: {0}")]
    Backend(#[from] BackendError),

    #[error("failed to build metrics registry: {0}")]
    Metrics(#[from] BuildError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// A gateway with every required dependency connected, not yet listening.
pub struct Gateway {
    config: GatewayConfig,
    backends: Arc<Backends>,
    metrics: Arc<MetricsRegistry>,
    bootstrap: BootstrapHandle,
    server: HttpServer,
}

impl Gateway {
    /// Prepare a gateway serving the placeholder storefront.
    pub async fn prepare(config: GatewayConfig) -> Result<Self, StartupError> {
        Self::prepare_with(config, |backends| Arc::new(PlaceholderStorefront::new(backends))).await
    }

    /// Prepare a gateway whose pages are rendered by `storefront`.
    pub async fn prepare_with<F>(config: GatewayConfig, storefront: F) -> Result<Self, StartupError>
    where
        F: FnOnce(Arc<Backends>) -> Arc<dyn Storefront>,
    {
        let views = StatsViews::new();

        let backends = Arc::new(Backends::connect_all(&config.backends, &views).await?);

        let bootstrap = ObservabilityBootstrap::new(&config.telemetry, views.clone()).launch();

        let metrics = Arc::new(MetricsRegistry::new()?);
        let server = HttpServer::new(
            &config,
            storefront(Arc::clone(&backends)),
            Arc::clone(&metrics),
            views,
            &Pipeline::standard(),
        );

        Ok(Self {
            config,
            backends,
            metrics,
            bootstrap,
            server,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn backends(&self) -> &Arc<Backends> {
        &self.backends
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn bootstrap(&self) -> &BootstrapHandle {
        &self.bootstrap
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = self.config.listener.bind_address();
        let listener = TcpListener::bind(&address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");
        Ok(listener)
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.server.run(listener, shutdown).await?;
        Ok(())
    }
}
