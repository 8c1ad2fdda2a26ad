//! Per-author post listing.

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
};
use serde_json::json;
use sqlx::SqlitePool;

use super::{auth::storage::lookup_user_by_username, posts::post_page};
use crate::api::{error::AppError, pagination::PageQuery, views::Layout};

pub async fn user_posts(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let user = lookup_user_by_username(&pool, &username)
        .await?
        .ok_or(AppError::NotFound)?;
    let posts = post_page(&pool, Some(user.user_id), &query).await?;
    layout.render(
        "user_posts.html",
        json!({ "title": user.username, "user": user, "posts": posts }),
    )
}
