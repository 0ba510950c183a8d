//! Outbound RPC instrumentation.
//!
//! Every request leaving through a backend channel carries the caller's
//! trace context as W3C `traceparent`/`tracestate` metadata, the same format
//! accepted on the HTTP boundary, and is counted in the RPC client stats view.

use std::fmt;
use std::sync::Arc;

use opentelemetry::propagation::{Injector, TextMapPropagator};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::backends::service::ServiceKind;
use crate::observability::views::StatsViews;

/// Tonic interceptor injecting trace context and recording RPC stats.
#[derive(Clone)]
pub struct RpcInstrumentation {
    service: ServiceKind,
    propagator: Arc<TraceContextPropagator>,
    views: StatsViews,
}

impl RpcInstrumentation {
    pub fn new(service: ServiceKind, views: StatsViews) -> Self {
        Self {
            service,
            propagator: Arc::new(TraceContextPropagator::new()),
            views,
        }
    }

    /// Inject an explicit context instead of the task's current one.
    pub fn inject(&self, cx: &Context, metadata: &mut MetadataMap) {
        self.propagator
            .inject_context(cx, &mut MetadataInjector(metadata));
    }
}

impl fmt::Debug for RpcInstrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcInstrumentation")
            .field("service", &self.service)
            .finish()
    }
}

impl Interceptor for RpcInstrumentation {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        self.inject(&Context::current(), request.metadata_mut());
        self.views.record_rpc_client(self.service.name());
        Ok(request)
    }
}

struct MetadataInjector<'a>(&'a mut MetadataMap);

impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let key = MetadataKey::from_bytes(key.as_bytes());
        let value = MetadataValue::try_from(value.as_str());
        if let (Ok(key), Ok(value)) = (key, value) {
            self.0.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tracing::extract_context;
    use axum::http::HeaderMap;

    const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn test_injects_current_context() {
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", TRACEPARENT.parse().unwrap());
        let cx = extract_context(&headers);
        let _guard = cx.attach();

        let mut interceptor = RpcInstrumentation::new(ServiceKind::Cart, StatsViews::new());
        let request = interceptor.call(Request::new(())).unwrap();

        let injected = request
            .metadata()
            .get("traceparent")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(injected, TRACEPARENT);
    }

    #[test]
    fn test_no_context_no_header() {
        let mut interceptor = RpcInstrumentation::new(ServiceKind::Ad, StatsViews::new());
        let request = interceptor.call(Request::new(())).unwrap();
        assert!(request.metadata().get("traceparent").is_none());
    }
}
