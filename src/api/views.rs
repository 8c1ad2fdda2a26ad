//! Embedded HTML templates and the page layout extractor.

use anyhow::{Context, Result};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{Html, IntoResponse, Response},
};
use minijinja::Environment;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{
    error::AppError,
    flash::{Flash, FlashesShown, IncomingFlashes},
    handlers::auth::{CurrentSession, Principal},
};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("macros.html", include_str!("../../templates/macros.html")),
    ("landing.html", include_str!("../../templates/landing.html")),
    ("home.html", include_str!("../../templates/home.html")),
    ("about.html", include_str!("../../templates/about.html")),
    ("register.html", include_str!("../../templates/register.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("account.html", include_str!("../../templates/account.html")),
    (
        "create_post.html",
        include_str!("../../templates/create_post.html"),
    ),
    ("post.html", include_str!("../../templates/post.html")),
    (
        "user_posts.html",
        include_str!("../../templates/user_posts.html"),
    ),
    ("errors/403.html", include_str!("../../templates/errors/403.html")),
    ("errors/404.html", include_str!("../../templates/errors/404.html")),
    ("errors/500.html", include_str!("../../templates/errors/500.html")),
];

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// # Errors
    /// Returns an error if a template fails to parse.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("Failed to load template {name}"))?;
        }
        Ok(Self { env })
    }

    /// # Errors
    /// Returns an error if the template is unknown or rendering fails.
    pub fn render<S: Serialize>(&self, name: &str, context: &S) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .with_context(|| format!("Unknown template {name}"))?;
        template
            .render(context)
            .with_context(|| format!("Failed to render {name}"))
    }
}

/// Everything a full page needs besides its own context: the template set, the
/// signed-in user and the flashes waiting to be shown.
pub struct Layout {
    views: Arc<Views>,
    current_user: Option<Principal>,
    messages: Vec<Flash>,
}

impl<S> FromRequestParts<S> for Layout
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let views = parts
            .extensions
            .get::<Arc<Views>>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("views are not configured")))?;
        let current_user = parts
            .extensions
            .get::<CurrentSession>()
            .and_then(|session| session.0.clone());
        let messages = parts
            .extensions
            .get::<IncomingFlashes>()
            .map(|flashes| flashes.0.clone())
            .unwrap_or_default();

        Ok(Self {
            views,
            current_user,
            messages,
        })
    }
}

impl Layout {
    /// Show a message on this page instead of after the next redirect.
    #[must_use]
    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.messages.push(flash);
        self
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&Principal> {
        self.current_user.as_ref()
    }

    /// # Errors
    /// Returns `AppError::Internal` if the context cannot be serialized or the
    /// template fails to render.
    pub fn render<S: Serialize>(self, name: &str, context: S) -> Result<Response, AppError> {
        let mut merged = match serde_json::to_value(context).context("Failed to serialize page")? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        merged.insert(
            "current_user".to_string(),
            serde_json::to_value(&self.current_user).context("Failed to serialize user")?,
        );
        merged.insert(
            "messages".to_string(),
            serde_json::to_value(&self.messages).context("Failed to serialize flashes")?,
        );

        let html = self.views.render(name, &merged)?;
        let mut response = Html(html).into_response();
        if !self.messages.is_empty() {
            response.extensions_mut().insert(FlashesShown);
        }
        Ok(response)
    }
}
