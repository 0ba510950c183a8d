//! Cookie header parsing and `Set-Cookie` construction.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

/// First non-empty value of the named cookie across all `Cookie` headers.
pub fn find<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .find(|value| !value.is_empty())
}

/// `Set-Cookie` value storing `value` for `max_age_secs`.
pub fn persistent(name: &str, value: &str, max_age_secs: u64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly",
        name, value, max_age_secs
    ))
}

/// `Set-Cookie` value telling the client to drop the cookie now.
pub fn expired(name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{}=; Max-Age=0; Path=/; HttpOnly", name))
}
