pub mod identity;
pub mod jwt;
pub mod middleware;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use imagehoster_core::{User, UserId};
use imagehoster_store::Store;

pub use self::identity::{LOGIN_PATH, MaybeUser, SessionUser};
use self::jwt::{Claims, JwtCodec};
pub use self::middleware::SessionLayer;

use crate::config::SessionConfig;
use crate::error::ServerError;

/// Issues, resolves and revokes cookie sessions.
///
/// The cookie carries a signed JWT; its `jti` is recorded in the store for
/// the session lifetime so that logout can revoke it before expiry.
pub struct SessionManager {
    codec: JwtCodec,
    store: Arc<dyn Store>,
    cookie_name: String,
    expiry_seconds: u64,
    secure_cookie: bool,
}

fn random_secret() -> Vec<u8> {
    let mut secret = uuid::Uuid::new_v4().as_bytes().to_vec();
    secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    secret
}

impl SessionManager {
    pub fn new(config: &SessionConfig, store: Arc<dyn Store>) -> Self {
        let secret = match config.secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                warn!("no session secret configured, using a random one; sessions will not survive a restart");
                random_secret()
            }
        };

        Self {
            codec: JwtCodec::new(&secret),
            store,
            cookie_name: config.cookie_name.clone(),
            expiry_seconds: config.expiry_seconds,
            secure_cookie: config.secure_cookie,
        }
    }

    /// Start a session for `user` and return the `Set-Cookie` value.
    pub async fn login(&self, user: &User) -> Result<String, ServerError> {
        let lifetime = i64::try_from(self.expiry_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ServerError::Session("session expiry out of range".into()))?;
        let expires_at = Utc::now() + lifetime;
        let jti = uuid::Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user.id.get(),
            name: user.username.clone(),
            jti: jti.clone(),
            exp: jsonwebtoken::get_current_timestamp() + self.expiry_seconds,
        };
        let token = self.codec.encode(&claims).map_err(ServerError::Session)?;

        self.store
            .create_session(&jti, user.id, expires_at)
            .await
            .map_err(|e| ServerError::Session(format!("failed to store session: {e}")))?;

        info!(user_id = %user.id, "session started");
        Ok(self.session_cookie(&token))
    }

    /// Resolve a token to its user. Invalid, expired and revoked tokens
    /// resolve to `None`.
    pub async fn authenticate(&self, token: &str) -> Option<SessionUser> {
        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "ignoring session cookie");
                return None;
            }
        };

        match self.store.session_user(&claims.jti).await {
            Ok(Some(id)) if id.get() == claims.sub => Some(SessionUser {
                id,
                username: claims.name,
            }),
            Ok(_) => {
                debug!(user_id = claims.sub, "session revoked or expired");
                None
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                None
            }
        }
    }

    /// Revoke the session behind `token`. Returns `true` if it was live.
    pub async fn logout(&self, token: &str) -> Result<bool, ServerError> {
        let Ok(claims) = self.codec.decode(token) else {
            return Ok(false);
        };

        let revoked = self
            .store
            .delete_session(&claims.jti)
            .await
            .map_err(|e| ServerError::Session(format!("failed to revoke session: {e}")))?;
        if revoked {
            info!(user_id = %UserId::new(claims.sub), "session ended");
        }
        Ok(revoked)
    }

    /// Pull this manager's session token out of the `Cookie` headers.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.to_owned())
            .filter(|value| !value.is_empty())
    }

    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.cookie_name,
            self.expiry_seconds,
            if self.secure_cookie { "; Secure" } else { "" }
        )
    }

    /// A `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.cookie_name,
            if self.secure_cookie { "; Secure" } else { "" }
        )
    }
}
