//! Credential login.

use anyhow::Context;
use axum::{
    extract::{Extension, Form, Query},
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use super::{
    session::session_cookie,
    state::AuthConfig,
    storage::{insert_session, lookup_login_record},
    utils::{normalize_email, safe_next, verify_password},
};
use crate::api::{
    error::AppError,
    flash::Flash,
    forms::{FormErrors, LoginForm},
    views::Layout,
};

const LOGIN_FAILED: &str = "Login Unsuccessful. Please check email and password";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

impl NextQuery {
    fn form_action(&self) -> String {
        match self.next.as_deref().filter(|next| !next.is_empty()) {
            Some(next) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
                format!("/login?next={encoded}")
            }
            None => "/login".to_string(),
        }
    }
}

fn render_form(
    layout: Layout,
    query: &NextQuery,
    email: &str,
    remember: bool,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    layout.render(
        "login.html",
        json!({
            "title": "Login",
            "action": query.form_action(),
            "form": { "email": email, "remember": remember },
            "errors": errors,
        }),
    )
}

pub async fn login_page(
    layout: Layout,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    if layout.current_user().is_some() {
        return Ok(Redirect::to("/home").into_response());
    }
    render_form(layout, &query, "", false, &FormErrors::default())
}

#[instrument(skip_all)]
pub async fn login(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<AuthConfig>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if layout.current_user().is_some() {
        return Ok(Redirect::to("/home").into_response());
    }

    let remember = form.remember();
    let errors = form.validate();
    if !errors.is_empty() {
        return render_form(layout, &query, &form.email, remember, &errors);
    }

    let email = normalize_email(&form.email);
    let record = lookup_login_record(&pool, &email).await?;

    let user_id = match record {
        Some(record) => {
            let password = form.password;
            let verified = tokio::task::spawn_blocking(move || {
                verify_password(password.expose_secret(), &record.password_hash)
            })
            .await
            .context("password verification task failed")?;
            verified.then_some(record.user_id)
        }
        None => None,
    };

    let Some(user_id) = user_id else {
        debug!("Login rejected");
        return render_form(
            layout.with_flash(Flash::danger(LOGIN_FAILED)),
            &query,
            &form.email,
            remember,
            &FormErrors::default(),
        );
    };

    let ttl_seconds = if remember {
        config.remember_ttl_seconds()
    } else {
        config.session_ttl_seconds()
    };
    let token = insert_session(&pool, user_id, ttl_seconds).await?;
    let cookie = session_cookie(&config, &token, remember).context("invalid session cookie")?;

    info!(user_id, remember, "Login succeeded");

    let location = query
        .next
        .as_deref()
        .and_then(safe_next)
        .unwrap_or_else(|| "/home".to_string());

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Redirect::to(&location)).into_response())
}
