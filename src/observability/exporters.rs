//! Trace and stats exporters.
//!
//! # Responsibilities
//! - Keep the set of registered span sinks and the tracer provider built from them
//! - Register the local collector once, without retry
//! - Register the managed exporter (retried by the bootstrap) and its stats views
//!
//! # Design Decisions
//! - Exporters speak OTLP over HTTP; building one never dials, so the managed
//!   path probes its endpoint first to make failures visible to the retry loop
//! - Every registration rebuilds the provider with all sinks and installs it
//!   as the OpenTelemetry global provider
//! - Provider construction and shutdown block, so they run on the blocking pool

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tokio::net::TcpStream;
use url::Url;

use crate::observability::tracing::TRACER_NAME;
use crate::observability::views::StatsViews;

/// Reporting period of the stats views.
pub const STATS_REPORTING_PERIOD: Duration = Duration::from_secs(60);

const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for optional telemetry registration.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{0} endpoint not configured")]
    NotConfigured(&'static str),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("failed to build exporter: {0}")]
    Exporter(String),

    #[error("registration rejected with status {0}")]
    Rejected(u16),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registration task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One optional registration attempt. Retried by the bootstrap.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Name used in log lines, e.g. "managed trace exporter".
    fn name(&self) -> &'static str;

    async fn register(&self) -> Result<(), TelemetryError>;
}

/// Resource attributes shared by every exporter.
pub fn service_resource(service_name: &str, service_version: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new("service.version", service_version.to_string()))
        .build()
}

/// Resolve an OTLP signal path (e.g. `v1/traces`) against a base URL.
pub fn signal_url(base: &str, signal: &str) -> Result<Url, TelemetryError> {
    let invalid = |reason: String| TelemetryError::InvalidEndpoint {
        endpoint: base.to_string(),
        reason,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.join(signal).map_err(|e| invalid(e.to_string()))
}

/// Registered span sinks and the provider currently installed from them.
pub struct TraceSinks {
    resource: Resource,
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    endpoints: Vec<String>,
    provider: Option<SdkTracerProvider>,
}

impl TraceSinks {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            state: Mutex::new(SinkState::default()),
        }
    }

    /// Endpoints registered so far, in registration order.
    pub fn endpoints(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("trace sinks mutex poisoned")
            .endpoints
            .clone()
    }

    /// Add an OTLP/HTTP span endpoint and reinstall the global provider.
    pub async fn add(self: &Arc<Self>, endpoint: String) -> Result<(), TelemetryError> {
        let sinks = Arc::clone(self);
        tokio::task::spawn_blocking(move || sinks.add_blocking(endpoint)).await?
    }

    fn add_blocking(&self, endpoint: String) -> Result<(), TelemetryError> {
        let mut state = self.state.lock().expect("trace sinks mutex poisoned");

        let mut builder = SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(self.resource.clone());
        for sink in state.endpoints.iter().chain(std::iter::once(&endpoint)) {
            builder = builder.with_batch_exporter(span_exporter(sink)?);
        }
        let provider = builder.build();

        global::set_tracer_provider(provider.clone());
        state.endpoints.push(endpoint);

        if let Some(previous) = state.provider.replace(provider) {
            if let Err(e) = previous.shutdown() {
                tracing::debug!(error = %e, "previous tracer provider did not shut down cleanly");
            }
        }
        Ok(())
    }
}

fn span_exporter(endpoint: &str) -> Result<SpanExporter, TelemetryError> {
    SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))
}

/// Register the local collector. Runs once; failures are logged, not retried.
pub async fn register_collector(sinks: &Arc<TraceSinks>, collector_addr: Option<&str>) {
    let Some(addr) = collector_addr else {
        tracing::info!("collector initialization disabled.");
        return;
    };

    let endpoint = match signal_url(&format!("http://{}", addr), "v1/traces") {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::error!(error = %e, "collector initialization failed");
            return;
        }
    };

    match sinks.add(endpoint.clone()).await {
        Ok(()) => tracing::info!(endpoint = %endpoint, "collector initialization completed."),
        Err(e) => tracing::error!(endpoint = %endpoint, error = %e, "collector initialization failed"),
    }
}

/// Managed trace exporter. On success also registers the stats views.
pub struct ManagedTraceExporter {
    endpoint: Option<String>,
    sinks: Arc<TraceSinks>,
    resource: Resource,
    views: StatsViews,
}

impl ManagedTraceExporter {
    pub fn new(
        endpoint: Option<String>,
        sinks: Arc<TraceSinks>,
        resource: Resource,
        views: StatsViews,
    ) -> Self {
        Self {
            endpoint,
            sinks,
            resource,
            views,
        }
    }

    async fn register_stats_views(&self, base: &str) -> Result<(), TelemetryError> {
        let endpoint = signal_url(base, "v1/metrics")?.to_string();
        let resource = self.resource.clone();
        tokio::task::spawn_blocking(move || install_meter_provider(&endpoint, resource)).await??;
        self.views.register(&global::meter(TRACER_NAME));
        Ok(())
    }
}

#[async_trait]
impl Registrar for ManagedTraceExporter {
    fn name(&self) -> &'static str {
        "managed trace exporter"
    }

    async fn register(&self) -> Result<(), TelemetryError> {
        let base = self
            .endpoint
            .as_deref()
            .ok_or(TelemetryError::NotConfigured("managed trace"))?;
        let traces = signal_url(base, "v1/traces")?;

        probe(&traces).await?;
        self.sinks.add(traces.to_string()).await?;
        tracing::info!(endpoint = %traces, "registered managed tracing");

        match self.register_stats_views(base).await {
            Ok(()) => tracing::info!(
                period = ?STATS_REPORTING_PERIOD,
                "Registered http server and rpc client views"
            ),
            Err(e) => tracing::warn!(error = %e, "Error registering stats views"),
        }
        Ok(())
    }
}

fn install_meter_provider(endpoint: &str, resource: Resource) -> Result<(), TelemetryError> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
    let reader = PeriodicReader::builder(exporter)
        .with_interval(STATS_REPORTING_PERIOD)
        .build();
    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();
    global::set_meter_provider(provider);
    Ok(())
}

/// Check that something accepts TCP connections at the URL's host and port.
async fn probe(url: &Url) -> Result<(), TelemetryError> {
    let unreachable = |reason: String| TelemetryError::Unreachable {
        endpoint: url.to_string(),
        reason,
    };
    let host = url
        .host_str()
        .ok_or_else(|| unreachable("no host".to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| unreachable("no port".to_string()))?;

    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable(format!("no answer within {:?}", PROBE_TIMEOUT))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter(endpoint: Option<&str>) -> ManagedTraceExporter {
        let resource = service_resource("frontend", "1.0.0");
        ManagedTraceExporter::new(
            endpoint.map(str::to_string),
            Arc::new(TraceSinks::new(resource.clone())),
            resource,
            StatsViews::new(),
        )
    }

    #[test]
    fn test_signal_url() {
        assert_eq!(
            signal_url("http://collector:4318", "v1/traces").unwrap().as_str(),
            "http://collector:4318/v1/traces"
        );
        assert_eq!(
            signal_url("https://otlp.example.com/tenant", "v1/metrics")
                .unwrap()
                .as_str(),
            "https://otlp.example.com/tenant/v1/metrics"
        );
        assert!(matches!(
            signal_url("not a url", "v1/traces"),
            Err(TelemetryError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_managed_exporter_requires_endpoint() {
        let err = exporter(None).register().await.unwrap_err();
        assert!(matches!(err, TelemetryError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_managed_exporter_unreachable() {
        let exporter = exporter(Some("http://127.0.0.1:1"));
        let err = exporter.register().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Unreachable { .. }));
        assert!(exporter.sinks.endpoints().is_empty());
        assert!(!exporter.views.is_registered());
    }

    #[tokio::test]
    async fn test_collector_disabled_registers_nothing() {
        let sinks = Arc::new(TraceSinks::new(service_resource("frontend", "1.0.0")));
        register_collector(&sinks, None).await;
        assert!(sinks.endpoints().is_empty());
    }
}
