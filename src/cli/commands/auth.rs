use clap::{Arg, ArgAction, Command};

pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";
pub const ARG_REMEMBER_TTL: &str = "remember-ttl-seconds";
pub const ARG_SESSION_REAP: &str = "session-reap-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[derive(Debug)]
pub struct Options {
    pub session_ttl_seconds: i64,
    pub remember_ttl_seconds: i64,
    pub session_reap_seconds: u64,
    pub cookie_secure: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if a TTL is not positive.
    pub fn parse(matches: &clap::ArgMatches) -> anyhow::Result<Self> {
        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL)
            .copied()
            .unwrap_or(43_200);
        let remember_ttl_seconds = matches
            .get_one::<i64>(ARG_REMEMBER_TTL)
            .copied()
            .unwrap_or(31_536_000);
        let session_reap_seconds = matches
            .get_one::<u64>(ARG_SESSION_REAP)
            .copied()
            .unwrap_or(300);

        if session_ttl_seconds <= 0 || remember_ttl_seconds <= 0 {
            anyhow::bail!("session TTLs must be positive");
        }

        Ok(Self {
            session_ttl_seconds,
            remember_ttl_seconds,
            session_reap_seconds,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long("session-ttl-seconds")
                .help("Server-side lifetime of a browser-session login")
                .env("SCRIBE_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REMEMBER_TTL)
                .long("remember-ttl-seconds")
                .help("Cookie and session lifetime when \"remember me\" is checked")
                .env("SCRIBE_REMEMBER_TTL_SECONDS")
                .default_value("31536000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_REAP)
                .long("session-reap-seconds")
                .help("Interval between expired session cleanups")
                .env("SCRIBE_SESSION_REAP_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long("cookie-secure")
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("SCRIBE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
