//! Post pages: the home feed, single posts and the author-only edit/delete flow.

pub(crate) mod storage;

use axum::{
    extract::{Extension, Form, Path, Query},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use self::storage::{PostRecord, count_posts, fetch_post, insert_post, list_posts};
use super::auth::Principal;
use crate::api::{
    error::AppError,
    flash::Flash,
    forms::{FormErrors, PostForm},
    pagination::{POSTS_PER_PAGE, Page, PageQuery, offset, resolve_page},
    views::Layout,
};

#[derive(Debug, Serialize)]
pub(crate) struct Author {
    username: String,
    image_file: String,
}

/// Post as the templates see it.
#[derive(Debug, Serialize)]
pub(crate) struct PostView {
    id: i64,
    title: String,
    content: String,
    date_posted: String,
    user_id: i64,
    author: Author,
}

impl From<PostRecord> for PostView {
    fn from(record: PostRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content: record.content,
            date_posted: record.date_posted.format("%Y-%m-%d").to_string(),
            user_id: record.user_id,
            author: Author {
                username: record.author_username,
                image_file: record.author_image_file,
            },
        }
    }
}

/// One page of posts, newest first, optionally for a single author.
pub(crate) async fn post_page(
    pool: &SqlitePool,
    author: Option<i64>,
    query: &PageQuery,
) -> Result<Page<PostView>, AppError> {
    let total = count_posts(pool, author).await?;
    let page = resolve_page(query.requested(), total, POSTS_PER_PAGE)?;
    let records = list_posts(
        pool,
        author,
        i64::from(POSTS_PER_PAGE),
        offset(page, POSTS_PER_PAGE),
    )
    .await?;
    let items = records.into_iter().map(PostView::from).collect();
    Ok(Page::new(items, page, POSTS_PER_PAGE, total))
}

/// Post ids come from the path as text; anything that is not an integer is 404.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound)
}

fn signed_in(layout: &Layout) -> Result<Principal, AppError> {
    layout.current_user().cloned().ok_or(AppError::Forbidden)
}

async fn load_post(pool: &SqlitePool, raw_id: &str) -> Result<PostRecord, AppError> {
    let post_id = parse_post_id(raw_id)?;
    fetch_post(pool, post_id).await?.ok_or(AppError::NotFound)
}

fn ensure_author(post: &PostRecord, user: &Principal) -> Result<(), AppError> {
    if post.user_id == user.user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn render_editor(
    layout: Layout,
    legend: &str,
    action: &str,
    form: &PostForm,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    layout.render(
        "create_post.html",
        json!({
            "title": legend,
            "legend": legend,
            "action": action,
            "form": form,
            "errors": errors,
        }),
    )
}

pub async fn home(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let posts = post_page(&pool, None, &query).await?;
    layout.render("home.html", json!({ "posts": posts }))
}

pub async fn new_post_page(layout: Layout) -> Result<Response, AppError> {
    render_editor(
        layout,
        "New Post",
        "/post/new",
        &PostForm::default(),
        &FormErrors::default(),
    )
}

#[instrument(skip_all)]
pub async fn new_post(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    let user = signed_in(&layout)?;
    let errors = form.validate();
    if !errors.is_empty() {
        return render_editor(layout, "New Post", "/post/new", &form, &errors);
    }

    let post_id = insert_post(
        &pool,
        user.user_id,
        form.title.trim(),
        &form.content,
        Utc::now(),
    )
    .await?;
    info!(post_id, user_id = user.user_id, "Post created");

    Ok((
        Flash::primary("Your post has been created!"),
        Redirect::to("/home"),
    )
        .into_response())
}

pub async fn show_post(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let post = PostView::from(load_post(&pool, &raw_id).await?);
    layout.render("post.html", json!({ "title": post.title, "post": post }))
}

pub async fn update_post_page(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let user = signed_in(&layout)?;
    let post = load_post(&pool, &raw_id).await?;
    ensure_author(&post, &user)?;

    let action = format!("/post/{}/update", post.id);
    let form = PostForm {
        title: post.title,
        content: post.content,
    };
    render_editor(
        layout,
        "Update Post",
        &action,
        &form,
        &FormErrors::default(),
    )
}

#[instrument(skip_all)]
pub async fn update_post(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Path(raw_id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    let user = signed_in(&layout)?;
    let post = load_post(&pool, &raw_id).await?;
    ensure_author(&post, &user)?;

    let action = format!("/post/{}/update", post.id);
    let errors = form.validate();
    if !errors.is_empty() {
        return render_editor(layout, "Update Post", &action, &form, &errors);
    }

    storage::update_post(&pool, post.id, form.title.trim(), &form.content).await?;
    info!(post_id = post.id, "Post updated");

    Ok((
        Flash::primary("Your post has been updated!"),
        Redirect::to(&format!("/post/{}", post.id)),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn delete_post(
    layout: Layout,
    Extension(pool): Extension<SqlitePool>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let user = signed_in(&layout)?;
    let post = load_post(&pool, &raw_id).await?;
    ensure_author(&post, &user)?;

    storage::delete_post(&pool, post.id).await?;
    info!(post_id = post.id, "Post deleted");

    Ok((
        Flash::primary("Your post has been deleted!"),
        Redirect::to("/home"),
    )
        .into_response())
}
