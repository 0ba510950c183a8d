//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every storefront route
//! - Curry route instruments onto the page routes only
//! - Wrap everything in the request pipeline
//! - Serve on a bound listener until shutdown
//! - Keep histogram buffers drained while serving
//!
//! # Design Decisions
//! - `/static`, `/robots.txt`, `/_healthz` and `/metrics` still pass through
//!   the pipeline but are not instrumented per route
//! - The router is built once; nothing about routing changes at runtime

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::GatewayConfig;
use crate::http::pages::{self, Storefront};
use crate::http::pipeline::{Pipeline, PipelineContext};
use crate::observability::metrics::instrumented;
use crate::observability::{MetricsRegistry, StatsViews, TracePropagation};
use crate::session::{self, SessionAssigner};

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub storefront: Arc<dyn Storefront>,
    pub metrics: Arc<MetricsRegistry>,
}

/// HTTP server for the storefront gateway.
pub struct HttpServer {
    router: Router,
    metrics: Arc<MetricsRegistry>,
}

impl HttpServer {
    /// Build the server. `pipeline` decides the order of cross-cutting layers.
    pub fn new(
        config: &GatewayConfig,
        storefront: Arc<dyn Storefront>,
        metrics: Arc<MetricsRegistry>,
        views: StatsViews,
        pipeline: &Pipeline,
    ) -> Self {
        let sessions = SessionAssigner::new(&config.session);
        let state = AppState {
            storefront,
            metrics: Arc::clone(&metrics),
        };

        let router = Self::build_router(&config.assets.static_dir, state, sessions.clone());
        let cx = PipelineContext {
            trace: TracePropagation::new(views),
            sessions,
        };

        Self {
            router: pipeline.compose(router, &cx),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    fn build_router(static_dir: &str, state: AppState, sessions: SessionAssigner) -> Router {
        let metrics = Arc::clone(&state.metrics);
        let m = &metrics;

        Router::new()
            .route("/", instrumented(m, "home", get(pages::home)))
            .route(
                "/product/{id}",
                instrumented(m, "product-by-id", get(pages::product)),
            )
            .route(
                "/cart",
                instrumented(m, "get-cart", get(pages::view_cart))
                    .merge(instrumented(m, "post-cart", post(pages::add_to_cart))),
            )
            .route("/cart/empty", instrumented(m, "empty-cart", post(pages::empty_cart)))
            .route(
                "/setCurrency",
                instrumented(
                    m,
                    "set-currency",
                    post(session::set_currency).with_state(sessions.clone()),
                ),
            )
            .route(
                "/logout",
                instrumented(m, "logout", get(session::logout).with_state(sessions)),
            )
            .route("/cart/checkout", instrumented(m, "checkout", post(pages::checkout)))
            .route("/robots.txt", get(pages::robots))
            .route("/_healthz", get(pages::healthz))
            .route("/metrics", get(pages::metrics))
            .nest_service("/static", ServeDir::new(static_dir))
            .with_state(state)
    }

    /// The composed router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let metrics = Arc::clone(&self.metrics);
        let upkeep = tokio::spawn(async move {
            let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
            loop {
                interval.tick().await;
                metrics.run_upkeep();
            }
        });

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;
        upkeep.abort();

        tracing::info!("HTTP server stopped");
        result
    }
}
