//! Storefront page routes.
//!
//! # Responsibilities
//! - Map each routed page to a [`Page`] and hand it to the [`Storefront`]
//! - Serve the uninstrumented endpoints: robots, health, metrics scrape
//!
//! # Design Decisions
//! - Rendering is owned by the [`Storefront`] implementation; this module
//!   only extracts path, form and per-request context
//! - [`PlaceholderStorefront`] answers with a JSON summary so the gateway can
//!   run end to end without a template layer

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::backends::Backends;
use crate::http::server::AppState;
use crate::observability::TraceContext;
use crate::session::Session;

/// A routed storefront page with its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "kebab-case")]
pub enum Page {
    Home,
    Product { id: String },
    Cart,
    AddToCart { product_id: String, quantity: u32 },
    EmptyCart,
    Checkout { fields: HashMap<String, String> },
}

/// Per-request context gathered by the pipeline.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub session: Option<Session>,
    pub trace: Option<TraceContext>,
}

impl<S: Send + Sync> FromRequestParts<S> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            session: parts.extensions.get::<Session>().cloned(),
            trace: parts.extensions.get::<TraceContext>().cloned(),
        })
    }
}

/// Renders storefront pages. Business logic lives behind this trait.
#[async_trait]
pub trait Storefront: Send + Sync + 'static {
    async fn render(&self, page: Page, cx: PageContext) -> Response;
}

/// Storefront that reports what it would render as JSON.
pub struct PlaceholderStorefront {
    backends: Arc<Backends>,
}

impl PlaceholderStorefront {
    pub fn new(backends: Arc<Backends>) -> Self {
        Self { backends }
    }
}

#[derive(Serialize)]
struct PageSummary<'a> {
    #[serde(flatten)]
    page: &'a Page,
    session: Option<&'a str>,
    currency: &'static str,
    trace_id: Option<String>,
    backends: Vec<&'static str>,
}

#[async_trait]
impl Storefront for PlaceholderStorefront {
    async fn render(&self, page: Page, cx: PageContext) -> Response {
        let summary = PageSummary {
            page: &page,
            session: cx.session.as_ref().map(Session::id),
            currency: cx
                .session
                .as_ref()
                .map(Session::display_currency)
                .unwrap_or_default()
                .code(),
            trace_id: cx.trace.as_ref().and_then(TraceContext::trace_id),
            backends: self.backends.iter().map(|b| b.kind().name()).collect(),
        };
        Json(summary).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: u32,
}

pub async fn home(State(state): State<AppState>, cx: PageContext) -> Response {
    state.storefront.render(Page::Home, cx).await
}

pub async fn product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    cx: PageContext,
) -> Response {
    state.storefront.render(Page::Product { id }, cx).await
}

pub async fn view_cart(State(state): State<AppState>, cx: PageContext) -> Response {
    state.storefront.render(Page::Cart, cx).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    cx: PageContext,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let page = Page::AddToCart {
        product_id: form.product_id,
        quantity: form.quantity,
    };
    state.storefront.render(page, cx).await
}

pub async fn empty_cart(State(state): State<AppState>, cx: PageContext) -> Response {
    state.storefront.render(Page::EmptyCart, cx).await
}

pub async fn checkout(
    State(state): State<AppState>,
    cx: PageContext,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    state.storefront.render(Page::Checkout { fields }, cx).await
}

pub async fn robots() -> &'static str {
    "User-agent: *\nDisallow: /"
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_serializes_with_tag() {
        let value = serde_json::to_value(Page::Product { id: "OLJCESPC7Z".into() }).unwrap();
        assert_eq!(value["page"], "product");
        assert_eq!(value["id"], "OLJCESPC7Z");

        let value = serde_json::to_value(Page::EmptyCart).unwrap();
        assert_eq!(value["page"], "empty-cart");
    }

    #[tokio::test]
    async fn test_placeholder_reports_session_and_backends() {
        let backends = Arc::new(Backends::connect_lazy(&crate::config::BackendAddrs {
            product_catalog: "catalog:3550".into(),
            currency: "currency:7000".into(),
            cart: "cart:7070".into(),
            recommendation: "recommendation:8080".into(),
            checkout: "checkout:5050".into(),
            shipping: "shipping:50051".into(),
            ad: "ad:9555".into(),
            ..Default::default()
        }, &crate::observability::StatsViews::new())
        .unwrap());
        let storefront = PlaceholderStorefront::new(backends);

        let response = storefront
            .render(
                Page::Home,
                PageContext {
                    session: None,
                    trace: None,
                },
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["page"], "home");
        assert_eq!(value["currency"], "USD");
        assert!(value["session"].is_null());
        assert_eq!(value["backends"].as_array().unwrap().len(), 7);
    }
}
