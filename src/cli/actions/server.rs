use crate::api::{self, AuthConfig, AvatarStore};
use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub static_dir: PathBuf,
    pub avatar_size: u32,
    pub session_ttl_seconds: i64,
    pub remember_ttl_seconds: i64,
    pub session_reap_seconds: u64,
    pub cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("server args: {:?}", args);

    let auth_config = AuthConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_remember_ttl_seconds(args.remember_ttl_seconds)
        .with_session_reap_seconds(args.session_reap_seconds)
        .with_cookie_secure(args.cookie_secure);

    let avatars = AvatarStore::new(args.static_dir, args.avatar_size);

    api::new(args.port, &args.dsn, auth_config, avatars).await
}
