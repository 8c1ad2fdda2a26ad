//! Registration, login and session handling.
//!
//! Passwords are stored as Argon2id PHC strings. A login creates a row in
//! `user_sessions` keyed by the SHA-256 of a random token; the raw token only
//! lives in the `scribe_session` cookie.
//!
//! Without "remember me" the cookie ends with the browser session and the row
//! expires after `session_ttl_seconds`. With it, both last
//! `remember_ttl_seconds`. Expired rows never authenticate and are removed by
//! a background reaper.

mod login;
pub(crate) mod principal;
mod register;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod utils;

pub use login::{login, login_page};
pub use principal::{CurrentSession, Principal, login_required};
pub(crate) use register::{EMAIL_TAKEN, USERNAME_TAKEN};
pub use register::{register, register_page};
pub use session::{logout, resolve_session};
pub use state::AuthConfig;
pub use storage::spawn_session_reaper;
