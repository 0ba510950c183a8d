//! Handlers that change session cookies.

use axum::{
    extract::State,
    http::{
        header::{LOCATION, REFERER, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::session::assigner::SessionAssigner;
use crate::session::currency::Currency;
use crate::session::SessionError;

#[derive(Debug, Deserialize)]
pub struct CurrencyForm {
    pub currency_code: Option<String>,
}

/// `POST /setCurrency`: store an allowed currency and go back.
pub async fn set_currency(
    State(assigner): State<SessionAssigner>,
    headers: HeaderMap,
    Form(form): Form<CurrencyForm>,
) -> Result<Response, SessionError> {
    let code = form
        .currency_code
        .filter(|c| !c.is_empty())
        .ok_or(SessionError::MissingCurrency)?;
    let currency: Currency = code.parse()?;
    let cookie = assigner.currency_set_cookie(currency)?;

    tracing::debug!(currency = %currency, "setting currency");

    let location = headers
        .get(REFERER)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("/"));

    Ok((StatusCode::FOUND, [(SET_COOKIE, cookie), (LOCATION, location)]).into_response())
}

/// `GET /logout`: expire every session cookie and go home.
pub async fn logout(State(assigner): State<SessionAssigner>) -> Result<Response, SessionError> {
    let [session_cookie, currency_cookie] = assigner.expire_all()?;
    tracing::debug!("logging out");

    let mut response = (StatusCode::FOUND, [(LOCATION, HeaderValue::from_static("/"))]).into_response();
    let headers = response.headers_mut();
    headers.append(SET_COOKIE, session_cookie);
    headers.append(SET_COOKIE, currency_cookie);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request},
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        let assigner = SessionAssigner::new(&SessionConfig::default());
        Router::new()
            .route("/setCurrency", post(set_currency))
            .route("/logout", get(logout))
            .with_state(assigner)
    }

    fn set_currency_request(body: &'static str, referer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/setCurrency")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(referer) = referer {
            builder = builder.header(REFERER, referer);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_currency_sets_cookie() {
        let response = app()
            .oneshot(set_currency_request("currency_code=EUR", Some("/product/OLJCESPC7Z")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/product/OLJCESPC7Z");
        assert_eq!(
            response.headers()[SET_COOKIE],
            "shop_currency=EUR; Max-Age=172800; Path=/; HttpOnly"
        );
    }

    #[tokio::test]
    async fn test_redirects_home_without_referer() {
        let response = app()
            .oneshot(set_currency_request("currency_code=GBP", None))
            .await
            .unwrap();
        assert_eq!(response.headers()[LOCATION], "/");
    }

    #[tokio::test]
    async fn test_disallowed_currency_rejected_without_cookie() {
        for body in ["currency_code=BTC", "currency_code=usd", "currency_code=", "other=1"] {
            let response = app().oneshot(set_currency_request(body, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
            assert!(response.headers().get(SET_COOKIE).is_none(), "{}", body);
        }
    }

    #[tokio::test]
    async fn test_logout_expires_cookies() {
        let request = Request::builder().uri("/logout").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/");

        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(
            cookies,
            [
                "shop_session-id=; Max-Age=0; Path=/; HttpOnly",
                "shop_currency=; Max-Age=0; Path=/; HttpOnly"
            ]
        );
    }
}
