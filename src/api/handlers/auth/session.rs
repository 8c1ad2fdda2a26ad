//! Session cookie handling, session resolution and logout.

use axum::{
    extract::{Extension, Request},
    http::{
        HeaderMap, HeaderValue,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tracing::error;

use super::{
    principal::CurrentSession,
    state::AuthConfig,
    storage::{delete_session, lookup_session},
    utils::hash_session_token,
};
use crate::api::{error::AppError, handlers::cookie_value};

pub(crate) const SESSION_COOKIE_NAME: &str = "scribe_session";

/// Build an `HttpOnly` cookie for the session token.
///
/// Without "remember me" the cookie has no `Max-Age` and ends with the browser
/// session; with it the cookie lives for the configured remember TTL.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
    remember: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    if remember {
        cookie.push_str(&format!("; Max-Age={}", config.remember_ttl_seconds()));
    }
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE_NAME).filter(|token| !token.is_empty())
}

/// Resolve the session cookie into a [`CurrentSession`] request extension.
pub async fn resolve_session(
    Extension(pool): Extension<SqlitePool>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match extract_session_token(request.headers()) {
        Some(token) => {
            // Only the hash is stored; never compare raw tokens against the database.
            let token_hash = hash_session_token(&token);
            match lookup_session(&pool, &token_hash).await {
                Ok(principal) => principal,
                Err(err) => return AppError::Internal(err).into_response(),
            }
        }
        None => None,
    };

    request
        .extensions_mut()
        .insert(CurrentSession(principal.clone()));
    let mut response = next.run(request).await;
    // Outer layers (error pages) render the navbar from the response.
    response.extensions_mut().insert(CurrentSession(principal));
    response
}

pub async fn logout(
    headers: HeaderMap,
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<AuthConfig>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to("/login"))
}
