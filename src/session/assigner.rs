//! Session assignment middleware.
//!
//! # Responsibilities
//! - Resolve the visitor's session from the request cookies
//! - Mint a new id (UUID v4) when the cookie is missing
//! - Attach the [`Session`] to the request before any inner layer runs
//! - Deliver a minted id back to the client via `Set-Cookie`
//!
//! # Design Decisions
//! - Exactly one id is minted per cookie-less request
//! - The minted cookie is emitted before any the handler sets, so the
//!   handler's directives for the same cookie win on the client

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::session::cookies;
use crate::session::currency::Currency;
use crate::session::SessionError;

/// A visitor's session, available as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    currency: Option<Currency>,
    minted: bool,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Currency chosen by the visitor, if any.
    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    /// Currency to render prices in.
    pub fn display_currency(&self) -> Currency {
        self.currency.unwrap_or_default()
    }

    /// True if the id was minted for this request.
    pub fn is_new(&self) -> bool {
        self.minted
    }
}

#[derive(Debug)]
struct CookieNames {
    session: String,
    currency: String,
}

/// Resolves sessions and writes session cookies.
#[derive(Debug, Clone)]
pub struct SessionAssigner {
    names: Arc<CookieNames>,
    max_age_secs: u64,
}

impl SessionAssigner {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            names: Arc::new(CookieNames {
                session: config.session_cookie(),
                currency: config.currency_cookie(),
            }),
            max_age_secs: config.max_age_secs,
        }
    }

    pub fn session_cookie(&self) -> &str {
        &self.names.session
    }

    pub fn currency_cookie(&self) -> &str {
        &self.names.currency
    }

    /// Session carried by the request, or a freshly minted one.
    pub fn resolve(&self, headers: &HeaderMap) -> Session {
        let currency = cookies::find(headers, &self.names.currency).and_then(|c| c.parse().ok());
        match cookies::find(headers, &self.names.session) {
            Some(id) => Session {
                id: id.to_string(),
                currency,
                minted: false,
            },
            None => Session {
                id: Uuid::new_v4().to_string(),
                currency,
                minted: true,
            },
        }
    }

    pub fn session_set_cookie(&self, id: &str) -> Result<HeaderValue, SessionError> {
        Ok(cookies::persistent(&self.names.session, id, self.max_age_secs)?)
    }

    pub fn currency_set_cookie(&self, currency: Currency) -> Result<HeaderValue, SessionError> {
        Ok(cookies::persistent(
            &self.names.currency,
            currency.code(),
            self.max_age_secs,
        )?)
    }

    /// `Set-Cookie` values expiring every session cookie.
    pub fn expire_all(&self) -> Result<[HeaderValue; 2], SessionError> {
        Ok([
            cookies::expired(&self.names.session)?,
            cookies::expired(&self.names.currency)?,
        ])
    }
}

/// Middleware: attach a [`Session`], minting one if needed.
pub async fn ensure_session(
    State(assigner): State<SessionAssigner>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = assigner.resolve(request.headers());
    let minted = session
        .is_new()
        .then(|| assigner.session_set_cookie(session.id()));
    if session.is_new() {
        tracing::debug!(session = %session.id(), "assigned new session");
    }
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    match minted {
        Some(Ok(cookie)) => prepend_set_cookie(response.headers_mut(), cookie),
        Some(Err(e)) => tracing::error!(error = %e, "could not encode session cookie"),
        None => {}
    }
    response
}

fn prepend_set_cookie(headers: &mut HeaderMap, cookie: HeaderValue) {
    let existing: Vec<HeaderValue> = headers.get_all(SET_COOKIE).iter().cloned().collect();
    headers.insert(SET_COOKIE, cookie);
    for value in existing {
        headers.append(SET_COOKIE, value);
    }
}
