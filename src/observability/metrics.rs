//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own the process-wide route instruments
//! - Curry instruments by route name so handlers stay uninstrumented
//! - Render the Prometheus scrape body for `/metrics`
//!
//! # Metrics
//! - `frontend_in_flight_requests` (gauge): requests currently being served
//! - `frontend_api_requests_total` (counter): by `code`, `method`, `handler`
//! - `frontend_request_duration_seconds` (histogram): by `handler`, `method`
//! - `frontend_response_size_bytes` (histogram): unlabeled
//!
//! # Design Decisions
//! - The recorder is owned, not installed globally, so tests get isolated registries
//! - All updates are atomic adds; nothing is reset short of a restart
//! - The in-flight decrement lives in a drop guard and survives handler panics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::HttpBody,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use metrics::{Gauge, Unit};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

pub const IN_FLIGHT: &str = "frontend_in_flight_requests";
pub const REQUESTS_TOTAL: &str = "frontend_api_requests_total";
pub const REQUEST_DURATION: &str = "frontend_request_duration_seconds";
pub const RESPONSE_SIZE: &str = "frontend_response_size_bytes";

/// Latency buckets in seconds, sized for expected page render times.
pub const LATENCY_BUCKETS: [f64; 6] = [0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
/// Response size buckets in bytes.
pub const SIZE_BUCKETS: [f64; 4] = [200.0, 500.0, 900.0, 1500.0];

/// Route instruments backed by a private Prometheus recorder.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    in_flight: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), &LATENCY_BUCKETS)?
            .set_buckets_for_metric(Matcher::Full(RESPONSE_SIZE.to_string()), &SIZE_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        let in_flight = metrics::with_local_recorder(&recorder, || {
            metrics::describe_gauge!(
                IN_FLIGHT,
                "A gauge of requests currently being served by the frontend."
            );
            metrics::describe_counter!(REQUESTS_TOTAL, "A counter for requests to the frontend.");
            metrics::describe_histogram!(
                REQUEST_DURATION,
                Unit::Seconds,
                "A histogram of latencies for requests in the frontend."
            );
            metrics::describe_histogram!(
                RESPONSE_SIZE,
                Unit::Bytes,
                "A histogram of response sizes for requests."
            );

            let gauge = metrics::gauge!(IN_FLIGHT);
            gauge.set(0.0);
            gauge
        });

        Ok(Self {
            recorder,
            handle,
            in_flight,
        })
    }

    /// Bind the instruments to a route name.
    pub fn curry(self: &Arc<Self>, route: &'static str) -> CurriedRoute {
        CurriedRoute {
            registry: Arc::clone(self),
            route,
        }
    }

    /// Increment the in-flight gauge until the returned guard drops.
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.in_flight.increment(1.0);
        InFlightGuard {
            gauge: self.in_flight.clone(),
        }
    }

    pub fn record_latency(&self, route: &'static str, method: &str, elapsed: Duration) {
        let method = method.to_owned();
        metrics::with_local_recorder(&self.recorder, || {
            metrics::histogram!(REQUEST_DURATION, "handler" => route, "method" => method)
                .record(elapsed.as_secs_f64());
        });
    }

    pub fn record_request(&self, route: &'static str, method: &str, status: u16) {
        let method = method.to_owned();
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(
                REQUESTS_TOTAL,
                "code" => status.to_string(),
                "method" => method,
                "handler" => route
            )
            .increment(1);
        });
    }

    pub fn record_response_size(&self, bytes: u64) {
        metrics::with_local_recorder(&self.recorder, || {
            metrics::histogram!(RESPONSE_SIZE).record(bytes as f64);
        });
    }

    /// Prometheus text exposition of every instrument.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buffers. Called periodically by the server.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

/// Decrements the in-flight gauge on drop, whatever the exit path.
#[must_use = "the gauge is decremented as soon as the guard drops"]
pub struct InFlightGuard {
    gauge: Gauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.decrement(1.0);
    }
}

/// Instruments pre-bound to one route name.
#[derive(Clone)]
pub struct CurriedRoute {
    registry: Arc<MetricsRegistry>,
    route: &'static str,
}

impl CurriedRoute {
    pub fn route(&self) -> &'static str {
        self.route
    }
}

/// Middleware recording in-flight, latency, status and size for one route.
pub async fn instrument_route(
    State(curried): State<CurriedRoute>,
    request: Request,
    next: Next,
) -> Response {
    let registry = &curried.registry;
    let method = request.method().clone();

    let _in_flight = registry.track_in_flight();
    let start = Instant::now();

    let response = next.run(request).await;

    registry.record_latency(curried.route, method.as_str(), start.elapsed());
    registry.record_request(curried.route, method.as_str(), response.status().as_u16());
    if let Some(size) = response_size(&response) {
        registry.record_response_size(size);
    }

    response
}

/// Wrap a route's handlers with the instruments curried by `route`.
///
/// Only matched methods are instrumented; the 405 fallback is not.
pub fn instrumented<S>(
    registry: &Arc<MetricsRegistry>,
    route: &'static str,
    method_router: MethodRouter<S>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    method_router.route_layer(middleware::from_fn_with_state(
        registry.curry(route),
        instrument_route,
    ))
}

fn response_size(response: &Response) -> Option<u64> {
    response.body().size_hint().exact().or_else(|| {
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    })
}
