//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to an action, such as starting the blog server
//! with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, auth, uploads};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let upload_opts = uploads::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        static_dir: upload_opts.static_dir,
        avatar_size: upload_opts.avatar_size,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        remember_ttl_seconds: auth_opts.remember_ttl_seconds,
        session_reap_seconds: auth_opts.session_reap_seconds,
        cookie_secure: auth_opts.cookie_secure,
    }))
}
