//! Public pages and the catch-all.

use axum::response::Response;
use serde_json::json;

use crate::api::{error::AppError, views::Layout};

pub async fn landing(layout: Layout) -> Result<Response, AppError> {
    layout.render("landing.html", json!({}))
}

pub async fn about(layout: Layout) -> Result<Response, AppError> {
    layout.render("about.html", json!({ "title": "About" }))
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
