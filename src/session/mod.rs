//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cookies.rs (read session and currency cookies)
//!     → assigner.rs (forward existing id or mint one, attach Session)
//!     → inner layers and handlers read Session from extensions
//!     → assigner.rs (emit minted Set-Cookie ahead of handler cookies)
//!
//! Session handlers (handlers.rs):
//!     POST /setCurrency → currency.rs allow-list → currency cookie
//!     GET /logout       → expire both cookies
//! ```
//!
//! # Design Decisions
//! - Sessions live only in cookies; the gateway keeps no server-side store
//! - An id, once minted, is never rewritten by the gateway
//! - Unknown currency codes are rejected before any cookie is written

pub mod assigner;
pub mod cookies;
pub mod currency;
pub mod handlers;

use axum::{
    http::{header::InvalidHeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub use assigner::{ensure_session, Session, SessionAssigner};
pub use currency::Currency;
pub use handlers::{logout, set_currency};

/// Errors raised while handling session state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("currency code {0:?} is not supported")]
    UnsupportedCurrency(String),

    #[error("currency code missing")]
    MissingCurrency,

    #[error("cookie value is not a valid header: {0}")]
    InvalidCookie(#[from] InvalidHeaderValue),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match self {
            SessionError::UnsupportedCurrency(_) | SessionError::MissingCurrency => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SessionError::InvalidCookie(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = status.as_u16(), error = %self, "session request rejected");
        (status, self.to_string()).into_response()
    }
}
