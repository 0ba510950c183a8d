//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use storefront_gateway::backends::Backends;
use storefront_gateway::config::{BackendAddrs, GatewayConfig};
use storefront_gateway::http::{HttpServer, Pipeline, PlaceholderStorefront};
use storefront_gateway::observability::{
    BootstrapHandle, MetricsRegistry, ObservabilityBootstrap, StatsViews,
};
use storefront_gateway::Shutdown;
use tokio::net::TcpListener;

/// A gateway serving on an ephemeral local port.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub metrics: Arc<MetricsRegistry>,
    pub bootstrap: BootstrapHandle,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.bootstrap.abort();
    }
}

/// Backend addresses that are never dialed by the lazy backend set.
pub fn backend_addrs() -> BackendAddrs {
    BackendAddrs {
        product_catalog: "127.0.0.1:3550".into(),
        currency: "127.0.0.1:7000".into(),
        cart: "127.0.0.1:7070".into(),
        recommendation: "127.0.0.1:8080".into(),
        checkout: "127.0.0.1:5050".into(),
        shipping: "127.0.0.1:50051".into(),
        ad: "127.0.0.1:9555".into(),
        ..Default::default()
    }
}

/// Start a gateway with lazily connected backends and the standard pipeline.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    spawn_gateway_with(config, |bootstrap| bootstrap).await
}

/// Like [`spawn_gateway`], letting the caller swap exporter collaborators
/// before the bootstrap launches.
pub async fn spawn_gateway_with<F>(mut config: GatewayConfig, customize: F) -> TestGateway
where
    F: FnOnce(ObservabilityBootstrap) -> ObservabilityBootstrap,
{
    config.backends = backend_addrs();
    let views = StatsViews::new();
    let backends = Arc::new(Backends::connect_lazy(&config.backends, &views).unwrap());
    let bootstrap = customize(ObservabilityBootstrap::new(&config.telemetry, views.clone())).launch();
    let metrics = Arc::new(MetricsRegistry::new().unwrap());

    let server = HttpServer::new(
        &config,
        Arc::new(PlaceholderStorefront::new(backends)),
        Arc::clone(&metrics),
        views,
        &Pipeline::standard(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.wait()));

    TestGateway {
        addr,
        metrics,
        bootstrap,
        shutdown,
    }
}

/// Config with both optional exporters disabled.
pub fn quiet_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.telemetry.tracing_enabled = false;
    config.telemetry.profiling_enabled = false;
    config
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Every `Set-Cookie` value on a response.
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
