//! Display currency preference.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::session::SessionError;

/// Currencies a visitor may select. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "&'static str")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Cad,
    Jpy,
    Gbp,
    Try,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Cad,
        Currency::Jpy,
        Currency::Gbp,
        Currency::Try,
    ];

    /// ISO 4217 code.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
            Currency::Jpy => "JPY",
            Currency::Gbp => "GBP",
            Currency::Try => "TRY",
        }
    }
}

impl FromStr for Currency {
    type Err = SessionError;

    /// Codes are matched exactly; `usd` is not `USD`.
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| SessionError::UnsupportedCurrency(code.to_string()))
    }
}

impl From<Currency> for &'static str {
    fn from(currency: Currency) -> Self {
        currency.code()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
