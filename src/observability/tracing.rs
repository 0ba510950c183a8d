//! Distributed trace context propagation.
//!
//! # Responsibilities
//! - Extract W3C trace context from incoming requests
//! - Start a server span and run the rest of the pipeline inside it
//! - Expose the context to handlers so backend RPCs join the same trace
//!
//! # Design Decisions
//! - Spans go through the OpenTelemetry global tracer; until an exporter
//!   registers, they are non-recording and cost next to nothing
//! - Outermost pipeline layer, so every inner layer is attributed to the span

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::context::FutureExt;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;

use crate::observability::views::StatsViews;

/// Instrumentation scope name for gateway spans.
pub const TRACER_NAME: &str = "storefront-gateway";

/// Trace context resolved for one request, available as a request extension.
#[derive(Debug, Clone)]
pub struct TraceContext {
    cx: Context,
    remote: Context,
}

impl TraceContext {
    /// Context to run work and outbound RPCs under.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Hex trace id, if the request belongs to a valid trace.
    ///
    /// Falls back to the caller's trace id when no tracer is recording.
    pub fn trace_id(&self) -> Option<String> {
        [&self.cx, &self.remote]
            .into_iter()
            .map(|cx| cx.span().span_context().clone())
            .find(|sc| sc.is_valid())
            .map(|sc| sc.trace_id().to_string())
    }
}

/// State for the propagation layer.
#[derive(Clone)]
pub struct TracePropagation {
    propagator: Arc<TraceContextPropagator>,
    views: StatsViews,
}

impl TracePropagation {
    pub fn new(views: StatsViews) -> Self {
        Self {
            propagator: Arc::new(TraceContextPropagator::new()),
            views,
        }
    }
}

/// Extract the caller's trace context from request headers.
pub fn extract_context(headers: &HeaderMap) -> Context {
    TraceContextPropagator::new().extract(&HeaderExtractor(headers))
}

/// Middleware: extract, start a server span, run the inner service in it.
pub async fn propagate_trace_context(
    State(state): State<TracePropagation>,
    mut request: Request,
    next: Next,
) -> Response {
    let remote = state.propagator.extract(&HeaderExtractor(request.headers()));
    let method = request.method().to_string();
    let name = format!("{} {}", method, request.uri().path());

    let tracer = global::tracer(TRACER_NAME);
    let span = tracer
        .span_builder(name)
        .with_kind(SpanKind::Server)
        .with_attributes([
            KeyValue::new("http.request.method", method.clone()),
            KeyValue::new("url.path", request.uri().path().to_string()),
        ])
        .start_with_context(&tracer, &remote);
    let cx = remote.with_span(span);

    request.extensions_mut().insert(TraceContext {
        cx: cx.clone(),
        remote,
    });

    let start = Instant::now();
    let response = next.run(request).with_context(cx.clone()).await;
    let status = response.status();

    let span = cx.span();
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status.as_u16()),
    ));
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    }
    span.end();

    state
        .views
        .record_http_server(&method, status.as_u16(), start.elapsed());

    response
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}
