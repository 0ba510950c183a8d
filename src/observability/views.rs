//! Stats views for inbound HTTP and outbound RPC traffic.
//!
//! Views stay empty until the managed exporter registers them; until then
//! every `record_*` call is a cheap no-op. The handle is shared by the HTTP
//! pipeline and every backend channel.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

struct ViewInstruments {
    http_server_latency: Histogram<f64>,
    http_server_requests: Counter<u64>,
    rpc_client_calls: Counter<u64>,
}

/// Hot-swappable handle to the registered stats instruments.
#[derive(Clone, Default)]
pub struct StatsViews {
    inner: Arc<ArcSwapOption<ViewInstruments>>,
}

impl StatsViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Create the view instruments on `meter` and start recording into them.
    pub fn register(&self, meter: &Meter) {
        let instruments = ViewInstruments {
            http_server_latency: meter
                .f64_histogram("http.server.request.duration")
                .with_unit("s")
                .with_description("Latency of inbound HTTP requests")
                .build(),
            http_server_requests: meter
                .u64_counter("http.server.request.count")
                .with_description("Inbound HTTP requests by method and status")
                .build(),
            rpc_client_calls: meter
                .u64_counter("rpc.client.call.count")
                .with_description("Outbound RPCs by backend service")
                .build(),
        };
        self.inner.store(Some(Arc::new(instruments)));
    }

    pub fn record_http_server(&self, method: &str, status: u16, elapsed: Duration) {
        let guard = self.inner.load();
        if let Some(views) = &*guard {
            let attributes = [
                KeyValue::new("http.request.method", method.to_string()),
                KeyValue::new("http.response.status_code", i64::from(status)),
            ];
            views
                .http_server_latency
                .record(elapsed.as_secs_f64(), &attributes);
            views.http_server_requests.add(1, &attributes);
        }
    }

    pub fn record_rpc_client(&self, service: &'static str) {
        let guard = self.inner.load();
        if let Some(views) = &*guard {
            views
                .rpc_client_calls
                .add(1, &[KeyValue::new("rpc.service", service)]);
        }
    }
}

impl fmt::Debug for StatsViews {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsViews")
            .field("registered", &self.is_registered())
            .finish()
    }
}
