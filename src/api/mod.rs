use crate::{
    APP_USER_AGENT,
    api::handlers::{account, auth, health, posts, root, users},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Request, header::SERVER},
    middleware::from_fn,
    routing::{get, post},
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    services::ServeDir,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub mod db;
pub mod error;
pub mod flash;
pub mod forms;
pub(crate) mod handlers;
pub mod pagination;
pub mod views;

pub use handlers::auth::AuthConfig;
pub use handlers::avatar::AvatarStore;

// Avatars are small, but phones produce multi-megabyte originals.
const MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: &str,
    auth_config: AuthConfig,
    avatars: AvatarStore,
) -> Result<()> {
    let pool = db::connect(dsn).await?;
    db::apply_schema(&pool).await?;

    avatars.ensure_dir().await?;

    // Expired sessions never authenticate; the reaper only keeps the table small.
    auth::spawn_session_reaper(
        pool.clone(),
        Duration::from_secs(auth_config.session_reap_seconds()),
    );

    let app = app(pool, auth_config, avatars)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Build the application router with every route and middleware layer.
///
/// # Errors
/// Returns an error if the templates fail to load.
pub fn app(pool: SqlitePool, auth_config: AuthConfig, avatars: AvatarStore) -> Result<Router> {
    let views = Arc::new(views::Views::new().context("Failed to load templates")?);
    let static_files = ServeDir::new(avatars.static_root());

    let protected = Router::new()
        .route("/home", get(posts::home))
        .route("/account", get(account::account_page).post(account::account))
        .route("/post/new", get(posts::new_post_page).post(posts::new_post))
        .route("/post/{id}", get(posts::show_post))
        .route(
            "/post/{id}/update",
            get(posts::update_post_page).post(posts::update_post),
        )
        .route("/post/{id}/delete", post(posts::delete_post))
        .route("/user/{username}", get(users::user_posts))
        .route_layer(from_fn(auth::login_required));

    let app = Router::new()
        .route("/", get(root::landing))
        .route("/about", get(root::about))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/health", get(health::health).head(health::health))
        .merge(protected)
        .nest_service("/static", static_files)
        .fallback(root::not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    SERVER,
                    HeaderValue::from_static(APP_USER_AGENT),
                ))
                .layer(Extension(pool))
                .layer(Extension(views))
                .layer(Extension(auth_config))
                .layer(Extension(Arc::new(avatars)))
                .layer(from_fn(flash::carry_flashes))
                .layer(from_fn(error::render_error_pages))
                .layer(from_fn(auth::resolve_session)),
        );

    Ok(app)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
