//! End-to-end tests against a real listener.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{client, quiet_config, set_cookies, spawn_gateway, spawn_gateway_with};
use reqwest::StatusCode;
use storefront_gateway::observability::{ExporterState, Registrar, TelemetryError};
use storefront_gateway::resilience::Sleeper;
use tokio::sync::Semaphore;

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

/// Exporter whose every registration attempt fails.
#[derive(Default)]
struct UnreachableExporter {
    calls: AtomicU32,
}

#[async_trait]
impl Registrar for UnreachableExporter {
    fn name(&self) -> &'static str {
        "managed trace exporter"
    }

    async fn register(&self) -> Result<(), TelemetryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::Exporter("connection refused".into()))
    }
}

/// Records each backoff and holds it until the test releases a permit.
struct GatedSleeper {
    delays: Mutex<Vec<Duration>>,
    gate: Semaphore,
}

impl GatedSleeper {
    fn new() -> Self {
        Self {
            delays: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }

    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for GatedSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        self.gate.acquire().await.unwrap().forget();
    }
}

fn in_flight(rendered: &str) -> f64 {
    rendered
        .lines()
        .find(|l| l.starts_with("frontend_in_flight_requests"))
        .and_then(|l| l.rsplit(' ').next())
        .and_then(|v| v.parse().ok())
        .expect("in-flight gauge")
}

#[tokio::test]
async fn test_cookieless_request_gets_one_session() {
    let gateway = spawn_gateway(quiet_config()).await;

    let response = client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    let id = cookies[0]
        .strip_prefix("shop_session-id=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string();
    assert!(cookies[0].contains("Max-Age=172800"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["session"], id.as_str());
    assert_eq!(body["currency"], "USD");
}

#[tokio::test]
async fn test_returning_visitor_keeps_session() {
    let gateway = spawn_gateway(quiet_config()).await;

    let response = client()
        .get(gateway.url("/product/OLJCESPC7Z"))
        .header("cookie", "shop_session-id=returning; shop_currency=CAD")
        .send()
        .await
        .unwrap();
    assert!(set_cookies(&response).is_empty());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["page"], "product");
    assert_eq!(body["id"], "OLJCESPC7Z");
    assert_eq!(body["session"], "returning");
    assert_eq!(body["currency"], "CAD");
}

#[tokio::test]
async fn test_set_currency_allow_list() {
    let gateway = spawn_gateway(quiet_config()).await;
    let client = client();

    let rejected = client
        .post(gateway.url("/setCurrency"))
        .header("cookie", "shop_session-id=s1")
        .form(&[("currency_code", "BTC")])
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(set_cookies(&rejected).is_empty());

    let accepted = client
        .post(gateway.url("/setCurrency"))
        .header("cookie", "shop_session-id=s1")
        .header("referer", "/cart")
        .form(&[("currency_code", "TRY")])
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::FOUND);
    assert_eq!(accepted.headers()["location"], "/cart");
    assert_eq!(
        set_cookies(&accepted),
        ["shop_currency=TRY; Max-Age=172800; Path=/; HttpOnly"]
    );
}

#[tokio::test]
async fn test_logout_without_session_keeps_expiry_last() {
    let gateway = spawn_gateway(quiet_config()).await;

    let response = client().get(gateway.url("/logout")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 3);
    assert!(cookies[0].contains("Max-Age=172800"));
    assert_eq!(cookies[1], "shop_session-id=; Max-Age=0; Path=/; HttpOnly");
    assert_eq!(cookies[2], "shop_currency=; Max-Age=0; Path=/; HttpOnly");
}

#[tokio::test]
async fn test_trace_id_reaches_handler() {
    let gateway = spawn_gateway(quiet_config()).await;

    let body: serde_json::Value = client()
        .get(gateway.url("/cart"))
        .header("traceparent", TRACEPARENT)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["trace_id"], "4bf92f3577b34da6a3ce929d0e0e4736");
}

#[tokio::test]
async fn test_static_endpoints() {
    let gateway = spawn_gateway(quiet_config()).await;
    let client = client();

    let robots = client.get(gateway.url("/robots.txt")).send().await.unwrap();
    assert_eq!(robots.text().await.unwrap(), "User-agent: *\nDisallow: /");

    let health = client.get(gateway.url("/_healthz")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_return_gauge_to_zero() {
    let gateway = spawn_gateway(quiet_config()).await;
    let client = client();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let client = client.clone();
        // Mix successful pages and 4xx from bad forms.
        let request = if i % 2 == 0 {
            client.get(gateway.url("/"))
        } else {
            client
                .post(gateway.url("/cart"))
                .form(&[("product_id", "OLJCESPC7Z"), ("quantity", "not-a-number")])
        };
        tasks.push(tokio::spawn(async move { request.send().await.unwrap().status() }));
    }
    for task in tasks {
        let status = task.await.unwrap();
        assert!(status == StatusCode::OK || status.is_client_error(), "{}", status);
    }

    let rendered = client
        .get(gateway.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(in_flight(&rendered), 0.0);
    assert!(rendered.contains("handler=\"home\""));
    assert!(rendered.contains("handler=\"post-cart\""));
    assert!(!rendered.contains("handler=\"metrics\""));
}

#[tokio::test]
async fn test_serving_unaffected_by_failing_exporter() {
    let mut config = quiet_config();
    config.telemetry.tracing_enabled = true;
    config.telemetry.cloud_trace_endpoint = Some("http://127.0.0.1:1".to_string());
    let gateway = spawn_gateway(config).await;

    // First attempt fails and the task backs off for 20s; the listener serves.
    for _ in 0..5 {
        let response = client().get(gateway.url("/")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(gateway.bootstrap.trace_status.get(), ExporterState::Unregistered);
    assert!(gateway.bootstrap.tracing.as_ref().is_some_and(|t| !t.is_finished()));
}

#[tokio::test]
async fn test_serving_continues_until_exporter_gives_up() {
    let exporter = Arc::new(UnreachableExporter::default());
    let sleeper = Arc::new(GatedSleeper::new());
    let mut config = quiet_config();
    config.telemetry.tracing_enabled = true;

    let mut gateway = spawn_gateway_with(config, |bootstrap| {
        bootstrap
            .with_trace_registrar(exporter.clone())
            .with_sleeper(sleeper.clone())
    })
    .await;
    let home = gateway.url("/");

    let response = client().get(&home).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Wait for the first failure to reach its backoff.
    for _ in 0..200 {
        if !sleeper.delays().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sleeper.delays(), [Duration::from_secs(20)]);
    assert_eq!(gateway.bootstrap.trace_status.get(), ExporterState::Unregistered);

    let response = client().get(&home).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    sleeper.gate.add_permits(3);
    let task = gateway.bootstrap.tracing.take().unwrap();
    assert_eq!(task.await.unwrap(), ExporterState::GaveUp);

    assert_eq!(exporter.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        sleeper.delays(),
        [
            Duration::from_secs(20),
            Duration::from_secs(40),
            Duration::from_secs(60)
        ]
    );
    assert_eq!(gateway.bootstrap.trace_status.get(), ExporterState::GaveUp);

    let response = client().get(&home).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
