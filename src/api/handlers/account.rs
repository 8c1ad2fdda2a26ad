//! Profile page: username, email and avatar.

use axum::{
    extract::{Extension, Multipart, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    auth::{
        EMAIL_TAKEN, Principal, USERNAME_TAKEN,
        storage::{ProfileOutcome, email_taken, update_profile, username_taken},
        utils::normalize_email,
    },
    avatar::{AvatarError, AvatarStore},
};
use crate::api::{
    error::AppError,
    flash::Flash,
    forms::{AccountForm, FormErrors, Upload},
    views::Layout,
};

fn render_form(
    layout: Layout,
    user: &Principal,
    username: &str,
    email: &str,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    layout.render(
        "account.html",
        json!({
            "title": "Account",
            "image_file": format!("/static/profile_pics/{}", user.image_file),
            "form": { "username": username, "email": email },
            "errors": errors,
        }),
    )
}

fn signed_in(layout: &Layout) -> Result<Principal, AppError> {
    layout.current_user().cloned().ok_or(AppError::Forbidden)
}

/// A body-limit failure ends the read with `picture_too_large` set so the form
/// can report it inline; any other multipart error is a bad request.
fn stop_reading(form: &mut AccountForm, err: &MultipartError) -> Result<(), AppError> {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        debug!("Upload exceeded the body limit");
        form.picture_too_large = true;
        Ok(())
    } else {
        debug!("Malformed multipart body: {err}");
        Err(AppError::BadRequest("Malformed upload"))
    }
}

/// Collect the multipart fields. An empty file input counts as no picture.
async fn read_form(mut multipart: Multipart) -> Result<AccountForm, AppError> {
    let mut form = AccountForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                stop_reading(&mut form, &err)?;
                break;
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" | "email" => match field.text().await {
                Ok(value) if name == "username" => form.username = value,
                Ok(value) => form.email = value,
                Err(err) => {
                    stop_reading(&mut form, &err)?;
                    break;
                }
            },
            "picture" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) if !file_name.is_empty() && !bytes.is_empty() => {
                        form.picture = Some(Upload {
                            file_name,
                            bytes: bytes.to_vec(),
                        });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        stop_reading(&mut form, &err)?;
                        break;
                    }
                }
            }
            other => debug!("Ignoring multipart field {other}"),
        }
    }
    Ok(form)
}

pub async fn account_page(layout: Layout) -> Result<Response, AppError> {
    let user = signed_in(&layout)?;
    render_form(layout, &user, &user.username, &user.email, &FormErrors::default())
}

#[instrument(skip_all)]
pub async fn account(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Extension(avatars): Extension<Arc<AvatarStore>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let user = signed_in(&layout)?;
    let form = read_form(multipart).await?;

    let mut errors = form.validate();
    let username = form.username.trim().to_string();
    let email = normalize_email(&form.email);

    // Uniqueness only matters when the value actually changes.
    if errors.get("username").is_none()
        && username != user.username
        && username_taken(&pool, &username).await?
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_none() && email != user.email && email_taken(&pool, &email).await? {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        return render_form(layout, &user, &form.username, &form.email, &errors);
    }

    let new_image = match form.picture {
        Some(upload) => match avatars.save(&upload.file_name, upload.bytes).await {
            Ok(file_name) => Some(file_name),
            Err(err @ (AvatarError::Extension | AvatarError::Decode(_))) => {
                debug!("Rejected avatar upload: {err}");
                errors.add("picture", "The uploaded file is not a valid image.");
                return render_form(layout, &user, &form.username, &form.email, &errors);
            }
            Err(AvatarError::Storage(err)) => return Err(AppError::Internal(err)),
        },
        None => None,
    };

    let image_file = new_image.as_deref().unwrap_or(&user.image_file);
    let outcome = match update_profile(&pool, user.user_id, &username, &email, image_file).await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Some(file_name) = &new_image {
                avatars.remove(file_name).await;
            }
            return Err(err.into());
        }
    };

    match outcome {
        ProfileOutcome::Updated => {
            if new_image.is_some() {
                avatars.remove(&user.image_file).await;
            }
            info!(user_id = user.user_id, "Account updated");
            Ok((
                Flash::primary("Your account has been updated!"),
                Redirect::to("/account"),
            )
                .into_response())
        }
        ProfileOutcome::Conflict => {
            if let Some(file_name) = &new_image {
                avatars.remove(file_name).await;
            }
            if email != user.email && email_taken(&pool, &email).await? {
                errors.add("email", EMAIL_TAKEN);
            } else {
                errors.add("username", USERNAME_TAKEN);
            }
            render_form(layout, &user, &form.username, &form.email, &errors)
        }
    }
}
