//! # Scribe
//!
//! `scribe` is a server-rendered blog. Users register, log in, manage a profile
//! with an avatar, and publish posts that other signed-in users can browse.
//!
//! ## Accounts and sessions
//!
//! Passwords are hashed with Argon2id. A successful login creates a row in
//! `user_sessions` keyed by the SHA-256 of a random token; the raw token only
//! lives in the `scribe_session` cookie. "Remember me" turns the browser-session
//! cookie into a persistent one.
//!
//! ## Posts
//!
//! Posts belong to exactly one user. Only the author may update or delete a
//! post; anyone else gets `403 Forbidden`. Listings are paginated four posts at a
//! time, newest first.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
