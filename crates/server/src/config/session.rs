use serde::Deserialize;

/// Environment variable that overrides [`SessionConfig::secret`].
pub const SESSION_SECRET_ENV: &str = "IMAGEHOSTER_SESSION_SECRET";

/// Session cookie and token settings.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for signing session tokens.
    ///
    /// If not set, a random secret is generated on startup and sessions do
    /// not survive a restart.
    pub secret: Option<String>,
    /// Session lifetime in seconds.
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Mark the cookie `Secure` (HTTPS only).
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            expiry_seconds: default_expiry_seconds(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

fn default_expiry_seconds() -> u64 {
    3600
}

fn default_cookie_name() -> String {
    "imagehoster_session".to_owned()
}
