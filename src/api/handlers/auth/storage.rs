//! Database helpers for accounts and sessions.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, debug, error};

use super::principal::Principal;
use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(crate) enum SignupOutcome {
    Created(i64),
    Conflict,
}

/// Outcome when attempting to change username/email/avatar.
#[derive(Debug)]
pub(crate) enum ProfileOutcome {
    Updated,
    Conflict,
}

/// Fields needed to check a login.
pub(crate) struct LoginRecord {
    pub(crate) user_id: i64,
    pub(crate) password_hash: String,
}

fn principal_from_row(row: &SqliteRow) -> Principal {
    Principal {
        user_id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        image_file: row.get("image_file"),
    }
}

pub(crate) async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users (username, email, password)
        VALUES (?, ?, ?)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Look up login data by normalized email.
pub(crate) async fn lookup_login_record(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<LoginRecord>> {
    let query = "SELECT id, password FROM users WHERE email = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    Ok(row.map(|row| LoginRecord {
        user_id: row.get("id"),
        password_hash: row.get("password"),
    }))
}

pub(crate) async fn lookup_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Principal>> {
    let query = "SELECT id, username, email, image_file FROM users WHERE username = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.as_ref().map(principal_from_row))
}

pub(crate) async fn username_taken(pool: &SqlitePool, username: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?) AS taken";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check username")?;
    Ok(row.get::<i64, _>("taken") != 0)
}

pub(crate) async fn email_taken(pool: &SqlitePool, email: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?) AS taken";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check email")?;
    Ok(row.get::<i64, _>("taken") != 0)
}

pub(crate) async fn update_profile(
    pool: &SqlitePool,
    user_id: i64,
    username: &str,
    email: &str,
    image_file: &str,
) -> Result<ProfileOutcome> {
    let query = r"
        UPDATE users
        SET username = ?, email = ?, image_file = ?
        WHERE id = ?
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(image_file)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(ProfileOutcome::Updated),
        Err(err) if is_unique_violation(&err) => Ok(ProfileOutcome::Conflict),
        Err(err) => Err(err).context("failed to update profile"),
    }
}

pub(crate) async fn insert_session(
    pool: &SqlitePool,
    user_id: i64,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO user_sessions (session_hash, user_id, created_at, expires_at)
        VALUES (?, ?, ?, ?)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let now = Utc::now().timestamp();
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(now)
            .bind(now.saturating_add(ttl_seconds))
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

/// Resolve a session hash to its user. Expired sessions resolve to `None`.
pub(crate) async fn lookup_session(
    pool: &SqlitePool,
    token_hash: &[u8],
) -> Result<Option<Principal>> {
    let query = r"
        SELECT users.id, users.username, users.email, users.image_file
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = ?
          AND user_sessions.expires_at > ?
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(Utc::now().timestamp())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.as_ref().map(principal_from_row))
}

pub(crate) async fn delete_session(pool: &SqlitePool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

pub(crate) async fn delete_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let query = "DELETE FROM user_sessions WHERE expires_at <= ?";
    let span = tracing::info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete expired sessions")?;
    Ok(result.rows_affected())
}

/// Periodically drop expired session rows.
pub fn spawn_session_reaper(pool: SqlitePool, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;

            match delete_expired_sessions(&pool).await {
                Ok(0) => {}
                Ok(count) => debug!("Removed {count} expired session(s)"),
                Err(err) => error!("session cleanup failed: {err:#}"),
            }
        }
    })
}
