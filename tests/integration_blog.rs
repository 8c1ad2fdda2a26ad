//! End-to-end tests for the blog router.
//!
//! Each test builds the full application (middleware, templates, static files)
//! over a temporary `SQLite` database and drives it with `oneshot` requests,
//! carrying cookies between requests the way a browser would.

use anyhow::{Context, Result, anyhow};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, Response, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use scribe::api::{self, AuthConfig, AvatarStore};
use std::{collections::BTreeMap, io::Cursor};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    dir: TempDir,
    router: Router,
    pool: sqlx::SqlitePool,
}

/// Minimal cookie jar: name -> value, honouring `Max-Age=0` deletions.
#[derive(Default)]
struct Jar(BTreeMap<String, String>);

impl Jar {
    fn store(&mut self, response: &Response<Body>) {
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(value) = header.to_str() else { continue };
            let Some((name, rest)) = value.split_once('=') else {
                continue;
            };
            let cookie_value = rest.split(';').next().unwrap_or_default().to_string();
            if value.contains("Max-Age=0") {
                self.0.remove(name);
            } else {
                self.0.insert(name.to_string(), cookie_value);
            }
        }
    }

    fn header(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl TestApp {
    async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let dsn = format!("sqlite://{}", dir.path().join("blog.db").display());
        let pool = api::db::connect(&dsn).await?;
        api::db::apply_schema(&pool).await?;

        let avatars = AvatarStore::new(dir.path().join("static"), 125);
        avatars.ensure_dir().await?;

        let router = api::app(pool.clone(), AuthConfig::new(), avatars)?;
        Ok(Self { dir, router, pool })
    }

    async fn send(&self, jar: &mut Jar, request: Request<Body>) -> Result<Response<Body>> {
        let response = self.router.clone().oneshot(request).await?;
        jar.store(&response);
        Ok(response)
    }

    async fn get(&self, jar: &mut Jar, uri: &str) -> Result<Response<Body>> {
        let request = Request::builder()
            .uri(uri)
            .header(COOKIE, jar.header())
            .body(Body::empty())?;
        self.send(jar, request).await
    }

    async fn post_form(
        &self,
        jar: &mut Jar,
        uri: &str,
        fields: &[(&str, &str)],
    ) -> Result<Response<Body>> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(COOKIE, jar.header())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))?;
        self.send(jar, request).await
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let mut jar = Jar::default();
        let response = self
            .post_form(
                &mut jar,
                "/register",
                &[
                    ("username", username),
                    ("email", email),
                    ("password", password),
                    ("confirm_password", password),
                ],
            )
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/login"));
        Ok(())
    }

    /// Register and log in, returning a jar holding the session cookie.
    async fn signed_in(&self, username: &str) -> Result<Jar> {
        let email = format!("{username}@example.com");
        self.register(username, &email, "hunter2hunter2").await?;
        let mut jar = Jar::default();
        let response = self
            .post_form(
                &mut jar,
                "/login",
                &[("email", email.as_str()), ("password", "hunter2hunter2")],
            )
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(jar.0.contains_key("scribe_session"));
        Ok(jar)
    }

    async fn post_account(
        &self,
        jar: &mut Jar,
        username: &str,
        email: &str,
        picture: &[u8],
    ) -> Result<Response<Body>> {
        let boundary = "scribe-test-boundary";
        let request = Request::builder()
            .method("POST")
            .uri("/account")
            .header(COOKIE, jar.header())
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart_body(boundary, username, email, picture)))?;
        self.send(jar, request).await
    }

    /// File names currently stored in the avatar directory, sorted.
    fn avatar_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.dir.path().join("static").join("profile_pics"))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn session_lifetime(&self, username: &str) -> Result<i64> {
        let lifetime: i64 = sqlx::query_scalar(
            "SELECT s.expires_at - s.created_at FROM user_sessions s JOIN users u ON u.id = s.user_id WHERE u.username = ?",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(lifetime)
    }

    async fn create_post(&self, jar: &mut Jar, title: &str) -> Result<i64> {
        let response = self
            .post_form(jar, "/post/new", &[("title", title), ("content", "Some words")])
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let id: i64 = sqlx::query_scalar("SELECT MAX(id) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }
}

fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

async fn body_text(response: Response<Body>) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    String::from_utf8(bytes.to_vec()).context("body is not UTF-8")
}

#[tokio::test]
async fn register_then_login_reaches_home() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = Jar::default();

    let response = app
        .post_form(
            &mut jar,
            "/register",
            &[
                ("username", "alice"),
                ("email", "Alice@Example.com"),
                ("password", "hunter2hunter2"),
                ("confirm_password", "hunter2hunter2"),
            ],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    // The flash survives the redirect and is shown exactly once.
    let response = app.get(&mut jar, "/login").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("Account created for alice! You are now able to log in"));
    assert!(!jar.0.contains_key("scribe_flash"));

    let response = app
        .post_form(
            &mut jar,
            "/login",
            &[("email", "alice@example.com"), ("password", "hunter2hunter2")],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/home"));
    let session_cookie = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("scribe_session="))
        .ok_or_else(|| anyhow!("no session cookie"))?
        .to_string();
    assert!(session_cookie.contains("HttpOnly"));
    assert!(session_cookie.contains("SameSite=Lax"));
    assert!(!session_cookie.contains("Max-Age"));

    let response = app.get(&mut jar, "/home").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("/logout"));
    Ok(())
}

#[tokio::test]
async fn remember_me_sets_persistent_cookie() -> Result<()> {
    let app = TestApp::new().await?;
    app.register("alice", "alice@example.com", "hunter2hunter2")
        .await?;

    let mut jar = Jar::default();
    let response = app
        .post_form(
            &mut jar,
            "/login",
            &[
                ("email", "alice@example.com"),
                ("password", "hunter2hunter2"),
                ("remember", "y"),
            ],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("Max-Age=31536000"));
    Ok(())
}

#[tokio::test]
async fn remember_me_controls_server_side_expiry() -> Result<()> {
    let app = TestApp::new().await?;
    for username in ["alice", "bob"] {
        app.register(username, &format!("{username}@example.com"), "hunter2hunter2")
            .await?;
    }

    let mut jar = Jar::default();
    app.post_form(
        &mut jar,
        "/login",
        &[("email", "alice@example.com"), ("password", "hunter2hunter2")],
    )
    .await?;
    let mut jar = Jar::default();
    app.post_form(
        &mut jar,
        "/login",
        &[
            ("email", "bob@example.com"),
            ("password", "hunter2hunter2"),
            ("remember", "y"),
        ],
    )
    .await?;

    assert_eq!(app.session_lifetime("alice").await?, 43_200);
    assert_eq!(app.session_lifetime("bob").await?, 31_536_000);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_reported_inline() -> Result<()> {
    let app = TestApp::new().await?;
    app.register("alice", "alice@example.com", "hunter2hunter2")
        .await?;

    let mut jar = Jar::default();
    let response = app
        .post_form(
            &mut jar,
            "/register",
            &[
                ("username", "alice"),
                ("email", "ALICE@example.com"),
                ("password", "pw"),
                ("confirm_password", "pw"),
            ],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("That username is taken. Please choose a different one."));
    assert!(body.contains("That email is taken. Please choose a different one."));
    Ok(())
}

#[tokio::test]
async fn bad_credentials_show_warning() -> Result<()> {
    let app = TestApp::new().await?;
    app.register("alice", "alice@example.com", "hunter2hunter2")
        .await?;

    let mut jar = Jar::default();
    let response = app
        .post_form(
            &mut jar,
            "/login",
            &[("email", "alice@example.com"), ("password", "wrong")],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!jar.0.contains_key("scribe_session"));
    let body = body_text(response).await?;
    assert!(body.contains("Login Unsuccessful. Please check email and password"));
    assert!(body.contains("alert-danger"));
    Ok(())
}

#[tokio::test]
async fn protected_routes_redirect_to_login_with_next() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = Jar::default();

    let response = app.get(&mut jar, "/post/new").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=%2Fpost%2Fnew"));

    let response = app.get(&mut jar, "/login?next=%2Fpost%2Fnew").await?;
    let body = body_text(response).await?;
    assert!(body.contains("Please log in to access this page."));
    // Interpolated slashes are HTML-escaped; the encoded query survives as is.
    assert!(body.contains("login?next=%2Fpost%2Fnew\""));
    Ok(())
}

#[tokio::test]
async fn login_follows_only_local_next() -> Result<()> {
    let app = TestApp::new().await?;
    app.register("alice", "alice@example.com", "hunter2hunter2")
        .await?;
    let credentials = [("email", "alice@example.com"), ("password", "hunter2hunter2")];

    let mut jar = Jar::default();
    let response = app
        .post_form(&mut jar, "/login?next=%2Faccount", &credentials)
        .await?;
    assert_eq!(location(&response), Some("/account"));

    let mut jar = Jar::default();
    let response = app
        .post_form(&mut jar, "/login?next=https%3A%2F%2Fevil.example%2F", &credentials)
        .await?;
    assert_eq!(location(&response), Some("/home"));
    Ok(())
}

#[tokio::test]
async fn signed_in_users_skip_login_and_register() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;

    let response = app.get(&mut jar, "/login").await?;
    assert_eq!(location(&response), Some("/home"));
    let response = app.get(&mut jar, "/register").await?;
    assert_eq!(location(&response), Some("/home"));
    Ok(())
}

#[tokio::test]
async fn only_the_author_can_update_or_delete() -> Result<()> {
    let app = TestApp::new().await?;
    let mut alice = app.signed_in("alice").await?;
    let mut bob = app.signed_in("bob").await?;

    let id = app.create_post(&mut alice, "Alice's post").await?;

    let response = app.get(&mut bob, &format!("/post/{id}")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("Alice&#x27;s post"));
    assert!(!body.contains(&format!("/post/{id}/delete")));

    let response = app.get(&mut bob, &format!("/post/{id}/update")).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_text(response).await?;
    assert!(body.contains("(403)"));

    let response = app
        .post_form(
            &mut bob,
            &format!("/post/{id}/update"),
            &[("title", "Hijacked"), ("content", "nope")],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_form(&mut bob, &format!("/post/{id}/delete"), &[])
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_form(
            &mut alice,
            &format!("/post/{id}/update"),
            &[("title", "Edited"), ("content", "Better words")],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let expected = format!("/post/{id}");
    assert_eq!(location(&response), Some(expected.as_str()));

    let response = app.get(&mut alice, &expected).await?;
    let body = body_text(response).await?;
    assert!(body.contains("Your post has been updated!"));
    assert!(body.contains("Edited"));

    let response = app
        .post_form(&mut alice, &format!("/post/{id}/delete"), &[])
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/home"));

    let response = app.get(&mut alice, &expected).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn invalid_post_is_redisplayed_with_errors() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;

    let response = app
        .post_form(&mut jar, "/post/new", &[("title", ""), ("content", "")])
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("This field is required."));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn listings_paginate_and_reject_bad_pages() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;
    for n in 1..=5 {
        app.create_post(&mut jar, &format!("Post number {n}")).await?;
    }

    let response = app.get(&mut jar, "/home").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert_eq!(body.matches("<article").count(), 4);
    assert!(body.contains("Post number 5"));
    assert!(!body.contains("Post number 1<"));
    assert!(body.contains("?page=2\""));

    let response = app.get(&mut jar, "/home?page=2").await?;
    let body = body_text(response).await?;
    assert_eq!(body.matches("<article").count(), 1);
    assert!(body.contains("Post number 1"));

    let response = app.get(&mut jar, "/home?page=3").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get(&mut jar, "/user/alice?page=2").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&mut jar, "/user/nobody").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get(&mut jar, "/post/not-a-number").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_render_not_found_page() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = Jar::default();
    let response = app.get(&mut jar, "/no/such/page").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await?;
    assert!(body.contains("Page Not Found (404)"));
    Ok(())
}

#[tokio::test]
async fn logout_ends_the_session() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;
    let stale = jar.0.get("scribe_session").cloned();

    let response = app.get(&mut jar, "/logout").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert!(!jar.0.contains_key("scribe_session"));

    // Replaying the old cookie no longer authenticates.
    let mut replay = Jar::default();
    if let Some(token) = stale {
        replay.0.insert("scribe_session".to_string(), token);
    }
    let response = app.get(&mut replay, "/home").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    Ok(())
}

fn png(width: u32, height: u32) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height)).write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

fn multipart_body(boundary: &str, username: &str, email: &str, picture: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("username", username), ("email", email)] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"picture\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(picture);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn account_update_resizes_avatar() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;

    let response = app
        .post_account(&mut jar, "alicia", "alicia@example.com", &png(400, 300)?)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/account"));

    let image_file: String =
        sqlx::query_scalar("SELECT image_file FROM users WHERE username = 'alicia'")
            .fetch_one(&app.pool)
            .await?;
    assert_ne!(image_file, "default.jpg");
    assert!(image_file.ends_with(".png"));

    let stored = app
        .dir
        .path()
        .join("static")
        .join("profile_pics")
        .join(&image_file);
    let (width, height) = image::open(stored)?.dimensions();
    assert!(width <= 125 && height <= 125);
    assert_eq!(width, 125);

    let response = app.get(&mut jar, "/account").await?;
    let body = body_text(response).await?;
    assert!(body.contains("Your account has been updated!"));
    assert!(body.contains(&image_file));
    Ok(())
}

#[tokio::test]
async fn oversized_avatar_is_reported_inline() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;

    let picture = vec![0u8; 5 * 1024 * 1024];
    let response = app
        .post_account(&mut jar, "alice", "alice@example.com", &picture)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await?;
    assert!(body.contains("File is too large."));
    assert!(body.contains("Account Info"));

    let image_file: String =
        sqlx::query_scalar("SELECT image_file FROM users WHERE username = 'alice'")
            .fetch_one(&app.pool)
            .await?;
    assert_eq!(image_file, "default.jpg");
    assert_eq!(app.avatar_files()?, ["default.jpg"]);
    Ok(())
}

#[tokio::test]
async fn failed_profile_update_discards_new_avatar() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;

    sqlx::query(
        "CREATE TRIGGER reject_profile_update BEFORE UPDATE ON users BEGIN SELECT RAISE(ABORT, 'profile updates disabled'); END",
    )
    .execute(&app.pool)
    .await?;

    let response = app
        .post_account(&mut jar, "alicia", "alicia@example.com", &png(200, 200)?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await?;
    assert!(body.contains("Something went wrong (500)"));
    assert_eq!(app.avatar_files()?, ["default.jpg"]);
    Ok(())
}

#[tokio::test]
async fn default_avatar_is_served() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = Jar::default();
    let response = app.get(&mut jar, "/static/profile_pics/default.jpg").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let placeholder = image::load_from_memory(&bytes)?;
    assert_eq!(placeholder.dimensions(), (125, 125));
    Ok(())
}

#[tokio::test]
async fn session_lookup_failure_renders_error_page() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = app.signed_in("alice").await?;

    sqlx::query("DROP TABLE user_sessions")
        .execute(&app.pool)
        .await?;

    let response = app.get(&mut jar, "/about").await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await?;
    assert!(body.contains("Something went wrong (500)"));
    Ok(())
}

#[tokio::test]
async fn health_reports_database() -> Result<()> {
    let app = TestApp::new().await?;
    let mut jar = Jar::default();
    let response = app.get(&mut jar, "/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(body["database"], "ok");
    assert_eq!(body["name"], "scribe");
    Ok(())
}
