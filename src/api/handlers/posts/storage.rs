//! Database helpers for posts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::Instrument;

/// A post joined with its author's display fields.
#[derive(Clone, Debug)]
pub(crate) struct PostRecord {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) date_posted: DateTime<Utc>,
    pub(crate) user_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_image_file: String,
}

const POST_COLUMNS: &str = r"
    posts.id, posts.title, posts.content, posts.date_posted, posts.user_id,
    users.username AS author_username, users.image_file AS author_image_file
";

fn post_from_row(row: &SqliteRow) -> PostRecord {
    PostRecord {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        date_posted: row.get("date_posted"),
        user_id: row.get("user_id"),
        author_username: row.get("author_username"),
        author_image_file: row.get("author_image_file"),
    }
}

pub(crate) async fn insert_post(
    pool: &SqlitePool,
    user_id: i64,
    title: &str,
    content: &str,
    date_posted: DateTime<Utc>,
) -> Result<i64> {
    let query = r"
        INSERT INTO posts (title, content, date_posted, user_id)
        VALUES (?, ?, ?, ?)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(title)
        .bind(content)
        .bind(date_posted)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert post")?;
    Ok(row.get("id"))
}

pub(crate) async fn fetch_post(pool: &SqlitePool, post_id: i64) -> Result<Option<PostRecord>> {
    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts JOIN users ON users.id = posts.user_id WHERE posts.id = ?"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(post_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch post")?;
    Ok(row.as_ref().map(post_from_row))
}

pub(crate) async fn update_post(
    pool: &SqlitePool,
    post_id: i64,
    title: &str,
    content: &str,
) -> Result<()> {
    let query = "UPDATE posts SET title = ?, content = ? WHERE id = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(title)
        .bind(content)
        .bind(post_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update post")?;
    Ok(())
}

pub(crate) async fn delete_post(pool: &SqlitePool, post_id: i64) -> Result<()> {
    let query = "DELETE FROM posts WHERE id = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(post_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete post")?;
    Ok(())
}

/// Number of posts, optionally restricted to one author.
pub(crate) async fn count_posts(pool: &SqlitePool, author: Option<i64>) -> Result<u64> {
    let query = "SELECT COUNT(*) AS total FROM posts WHERE (?1 IS NULL OR user_id = ?1)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(author)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count posts")?;
    let total: i64 = row.get("total");
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Newest posts first; ties on the timestamp fall back to the newest id.
pub(crate) async fn list_posts(
    pool: &SqlitePool,
    author: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostRecord>> {
    let query = format!(
        r"
        SELECT {POST_COLUMNS}
        FROM posts
        JOIN users ON users.id = posts.user_id
        WHERE (?1 IS NULL OR posts.user_id = ?1)
        ORDER BY posts.date_posted DESC, posts.id DESC
        LIMIT ?2 OFFSET ?3
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(author)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list posts")?;
    Ok(rows.iter().map(post_from_row).collect())
}
