//! Account registration.

use anyhow::Context;
use axum::{
    extract::{Extension, Form},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::ExposeSecret;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use super::{
    storage::{SignupOutcome, email_taken, insert_user, username_taken},
    utils::{hash_password, normalize_email},
};
use crate::api::{
    error::AppError,
    flash::Flash,
    forms::{FormErrors, RegistrationForm},
    views::Layout,
};

pub(crate) const USERNAME_TAKEN: &str = "That username is taken. Please choose a different one.";
pub(crate) const EMAIL_TAKEN: &str = "That email is taken. Please choose a different one.";

fn render_form(
    layout: Layout,
    username: &str,
    email: &str,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    layout.render(
        "register.html",
        json!({
            "title": "Register",
            "form": { "username": username, "email": email },
            "errors": errors,
        }),
    )
}

pub async fn register_page(layout: Layout) -> Result<Response, AppError> {
    if layout.current_user().is_some() {
        return Ok(Redirect::to("/home").into_response());
    }
    render_form(layout, "", "", &FormErrors::default())
}

#[instrument(skip_all)]
pub async fn register(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, AppError> {
    if layout.current_user().is_some() {
        return Ok(Redirect::to("/home").into_response());
    }

    let mut errors = form.validate();
    let username = form.username.trim().to_string();
    let email = normalize_email(&form.email);

    if errors.get("username").is_none() && username_taken(&pool, &username).await? {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_none() && email_taken(&pool, &email).await? {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        return render_form(layout, &form.username, &form.email, &errors);
    }

    let password = form.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
        .await
        .context("password hashing task failed")??;

    match insert_user(&pool, &username, &email, &password_hash).await? {
        SignupOutcome::Created(user_id) => {
            info!(user_id, "Account created");
            Ok((
                Flash::primary(format!(
                    "Account created for {username}! You are now able to log in"
                )),
                Redirect::to("/login"),
            )
                .into_response())
        }
        SignupOutcome::Conflict => {
            // Lost a race with a concurrent registration; report whichever field collided.
            if email_taken(&pool, &email).await? {
                errors.add("email", EMAIL_TAKEN);
            } else {
                errors.add("username", USERNAME_TAKEN);
            }
            render_form(layout, &form.username, &form.email, &errors)
        }
    }
}
