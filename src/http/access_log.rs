//! Per-request access logging.
//!
//! Each request runs inside a `request` span carrying method, path, and the
//! session and trace ids when an outer layer has attached them. Start is
//! logged at debug, completion at info with status and latency.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, OnRequest, OnResponse, TraceLayer};
use tracing::{field, Span};

use crate::observability::TraceContext;
use crate::session::Session;

pub type AccessLogLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, AccessLogSpan, LogRequest, LogResponse>;

/// The access log layer.
pub fn layer() -> AccessLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(AccessLogSpan)
        .on_request(LogRequest)
        .on_response(LogResponse)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogSpan;

impl<B> MakeSpan<B> for AccessLogSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let span = tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            session = field::Empty,
            trace_id = field::Empty,
        );
        if let Some(session) = request.extensions().get::<Session>() {
            span.record("session", session.id());
        }
        if let Some(trace_id) = request
            .extensions()
            .get::<TraceContext>()
            .and_then(TraceContext::trace_id)
        {
            span.record("trace_id", trace_id.as_str());
        }
        span
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogRequest;

impl<B> OnRequest<B> for LogRequest {
    fn on_request(&mut self, _request: &Request<B>, _span: &Span) {
        tracing::debug!("request started");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogResponse;

impl<B> OnResponse<B> for LogResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = latency.as_secs_f64() * 1000.0,
            "request complete"
        );
    }
}
