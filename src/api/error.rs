//! Handler error type and HTML error pages.

use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use super::handlers::auth::CurrentSession;
use super::views::Views;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Marks a response whose body should be replaced by the matching error page.
#[derive(Clone, Copy, Debug)]
pub struct ErrorPage(pub StatusCode);

impl IntoResponse for AppError {
    /// Database and internal failures are logged server-side and surfaced as a
    /// bare `500` without details.
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Database(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorPage(status));
        response
    }
}

fn template_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::FORBIDDEN => "errors/403.html",
        StatusCode::NOT_FOUND => "errors/404.html",
        _ => "errors/500.html",
    }
}

/// Swap marked error responses for rendered error pages.
///
/// Runs outside session resolution so its failures get a page too; the
/// signed-in user, when known, comes back on the response extensions.
pub async fn render_error_pages(
    Extension(views): Extension<Arc<Views>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    let Some(ErrorPage(status)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };
    let current_user = response
        .extensions()
        .get::<CurrentSession>()
        .and_then(|session| session.0.clone());

    let context = json!({
        "title": status.canonical_reason().unwrap_or("Error"),
        "current_user": current_user,
        "messages": [],
    });

    match views.render(template_for(status), &context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            error!("Failed to render error page: {err:#}");
            status.into_response()
        }
    }
}
