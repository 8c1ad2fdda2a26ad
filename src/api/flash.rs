//! One-shot messages carried across a redirect in a cookie.
//!
//! Handlers attach a [`Flash`] to their response; the [`carry_flashes`]
//! middleware stores pending messages in the `scribe_flash` cookie and clears it
//! once a rendered page has shown them.

use axum::{
    extract::Request,
    http::{
        HeaderValue,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponseParts, Response, ResponseParts},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::warn;

use super::handlers::cookie_value;

const FLASH_COOKIE_NAME: &str = "scribe_flash";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: Category,
    pub message: String,
}

impl Flash {
    pub fn primary(message: impl Into<String>) -> Self {
        Self {
            category: Category::Primary,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            category: Category::Danger,
            message: message.into(),
        }
    }
}

/// Messages that arrived with the request cookie.
#[derive(Clone, Debug, Default)]
pub struct IncomingFlashes(pub Vec<Flash>);

/// Messages queued by the handler for the next page.
#[derive(Clone, Debug, Default)]
struct OutgoingFlashes(Vec<Flash>);

/// Set on responses that rendered the pending messages.
#[derive(Clone, Copy, Debug)]
pub struct FlashesShown;

impl IntoResponseParts for Flash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(outgoing) = res.extensions_mut().get_mut::<OutgoingFlashes>() {
            outgoing.0.push(self);
        } else {
            res.extensions_mut().insert(OutgoingFlashes(vec![self]));
        }
        Ok(res)
    }
}

fn decode(value: &str) -> Option<Vec<Flash>> {
    let bytes = URL_SAFE_NO_PAD.decode(value.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn encode(flashes: &[Flash]) -> Option<String> {
    serde_json::to_vec(flashes)
        .ok()
        .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
}

fn flash_cookie(value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{FLASH_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax"
    ))
}

fn clear_flash_cookie() -> HeaderValue {
    HeaderValue::from_static("scribe_flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Decode incoming flashes, then persist or clear them based on the response.
pub async fn carry_flashes(mut request: Request, next: Next) -> Response {
    let incoming = cookie_value(request.headers(), FLASH_COOKIE_NAME)
        .and_then(|value| decode(&value))
        .unwrap_or_default();
    request
        .extensions_mut()
        .insert(IncomingFlashes(incoming.clone()));

    let mut response = next.run(request).await;

    let shown = response.extensions().get::<FlashesShown>().is_some();
    let outgoing = response
        .extensions_mut()
        .remove::<OutgoingFlashes>()
        .map(|outgoing| outgoing.0)
        .unwrap_or_default();

    // Nothing rendered and nothing new: the cookie carries over untouched.
    if !shown && outgoing.is_empty() {
        return response;
    }

    let pending: Vec<Flash> = if shown {
        outgoing
    } else {
        incoming.iter().cloned().chain(outgoing).collect()
    };

    if pending.is_empty() {
        if !incoming.is_empty() {
            response
                .headers_mut()
                .append(SET_COOKIE, clear_flash_cookie());
        }
        return response;
    }

    match encode(&pending).map(|value| flash_cookie(&value)) {
        Some(Ok(cookie)) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        _ => warn!("Failed to encode flash cookie; dropping {} message(s)", pending.len()),
    }

    response
}
