//! Route handlers and small helpers shared between them.

pub mod account;
pub mod auth;
pub mod avatar;
pub mod health;
pub mod posts;
pub mod root;
pub mod users;

use axum::http::{HeaderMap, header::COOKIE};

/// Value of the named cookie from the request `Cookie` header(s).
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
}
