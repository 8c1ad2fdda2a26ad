//! Typed forms and their validation rules.
//!
//! Each form validates itself into [`FormErrors`]; handlers re-render the page
//! with those messages next to the offending fields.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::handlers::auth::utils::{normalize_email, valid_email};

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Invalid email address.";
pub(crate) const FILE_TOO_LARGE: &str = "File is too large.";

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const EMAIL_MAX: usize = 120;
pub const TITLE_MAX: usize = 100;
pub const AVATAR_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Field name to messages, in field order.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn required(errors: &mut FormErrors, field: &'static str, value: &str) -> bool {
    if is_blank(value) {
        errors.add(field, REQUIRED);
        return false;
    }
    true
}

fn length_between(errors: &mut FormErrors, field: &'static str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.add(
            field,
            format!("Field must be between {min} and {max} characters long."),
        );
    }
}

fn at_most(errors: &mut FormErrors, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("Field cannot be longer than {max} characters."));
    }
}

fn email(errors: &mut FormErrors, value: &str) {
    if !required(errors, "email", value) {
        return;
    }
    if !valid_email(&normalize_email(value)) {
        errors.add("email", INVALID_EMAIL);
    }
    at_most(errors, "email", value.trim(), EMAIL_MAX);
}

fn username(errors: &mut FormErrors, value: &str) {
    if required(errors, "username", value) {
        length_between(errors, "username", value.trim(), USERNAME_MIN, USERNAME_MAX);
    }
}

#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "empty_secret")]
    pub password: SecretString,
    #[serde(default = "empty_secret")]
    pub confirm_password: SecretString,
}

impl RegistrationForm {
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        username(&mut errors, &self.username);
        email(&mut errors, &self.email);
        required(&mut errors, "password", self.password.expose_secret());
        if required(
            &mut errors,
            "confirm_password",
            self.confirm_password.expose_secret(),
        ) && self.confirm_password.expose_secret() != self.password.expose_secret()
        {
            errors.add("confirm_password", "Field must be equal to password.");
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default = "empty_secret")]
    pub password: SecretString,
    /// HTML checkbox: present (any value) when checked.
    #[serde(default)]
    pub remember: Option<String>,
}

impl LoginForm {
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if required(&mut errors, "email", &self.email) && !valid_email(&normalize_email(&self.email))
        {
            errors.add("email", INVALID_EMAIL);
        }
        required(&mut errors, "password", self.password.expose_secret());
        errors
    }

    #[must_use]
    pub fn remember(&self) -> bool {
        self.remember
            .as_deref()
            .is_some_and(|value| !matches!(value, "" | "0" | "false" | "off"))
    }
}

/// Profile update; the picture arrives as a multipart file part.
#[derive(Debug, Default)]
pub struct AccountForm {
    pub username: String,
    pub email: String,
    pub picture: Option<Upload>,
    /// The picture part ran past the request body limit and was dropped.
    pub picture_too_large: bool,
}

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AccountForm {
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        username(&mut errors, &self.username);
        email(&mut errors, &self.email);
        if self.picture_too_large {
            errors.add("picture", FILE_TOO_LARGE);
        }
        if let Some(upload) = &self.picture {
            if avatar_extension(&upload.file_name).is_none() {
                errors.add(
                    "picture",
                    format!(
                        "File does not have an approved extension: {}",
                        AVATAR_EXTENSIONS.join(", ")
                    ),
                );
            }
        }
        errors
    }
}

/// Lower-cased extension of an accepted avatar file name.
#[must_use]
pub fn avatar_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| AVATAR_EXTENSIONS.contains(&ext.as_str()))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl PostForm {
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if required(&mut errors, "title", &self.title) {
            at_most(&mut errors, "title", self.title.trim(), TITLE_MAX);
        }
        required(&mut errors, "content", &self.content);
        errors
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}
