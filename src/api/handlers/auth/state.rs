//! Session and cookie configuration.

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_REMEMBER_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
const DEFAULT_SESSION_REAP_SECONDS: u64 = 5 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    remember_ttl_seconds: i64,
    session_reap_seconds: u64,
    cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            remember_ttl_seconds: DEFAULT_REMEMBER_TTL_SECONDS,
            session_reap_seconds: DEFAULT_SESSION_REAP_SECONDS,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remember_ttl_seconds(mut self, seconds: i64) -> Self {
        self.remember_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_reap_seconds(mut self, seconds: u64) -> Self {
        self.session_reap_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Server-side lifetime of a login without "remember me".
    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Cookie `Max-Age` and server-side lifetime with "remember me".
    #[must_use]
    pub fn remember_ttl_seconds(&self) -> i64 {
        self.remember_ttl_seconds
    }

    #[must_use]
    pub fn session_reap_seconds(&self) -> u64 {
        self.session_reap_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}
