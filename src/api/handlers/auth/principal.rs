//! Authenticated principal and the login-required gate.
//!
//! `resolve_session` (see `session.rs`) places a [`CurrentSession`] in the
//! request extensions; protected routes sit behind [`login_required`], which
//! sends anonymous visitors to the login page with a `next` back-link.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::api::flash::Flash;

/// Signed-in user, as shown in page headers and used for ownership checks.
#[derive(Clone, Debug, Serialize)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub image_file: String,
}

/// Session identity for the current request; `None` for anonymous visitors.
#[derive(Clone, Debug, Default)]
pub struct CurrentSession(pub Option<Principal>);

/// Redirect anonymous requests to `/login?next=<path>`.
pub async fn login_required(request: Request, next: Next) -> Response {
    let signed_in = request
        .extensions()
        .get::<CurrentSession>()
        .is_some_and(|session| session.0.is_some());
    if signed_in {
        return next.run(request).await;
    }

    let target = request
        .uri()
        .path_and_query()
        .map_or("/", |path| path.as_str());
    (
        Flash::danger("Please log in to access this page."),
        Redirect::to(&login_url(target)),
    )
        .into_response()
}

fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/login?next={encoded}")
}
