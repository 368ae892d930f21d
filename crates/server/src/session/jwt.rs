use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT claims embedded in session tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: i64,
    /// Username at the time of login.
    pub name: String,
    /// Unique token ID for revocation tracking.
    pub jti: String,
    /// Expiry (seconds since epoch).
    pub exp: u64,
}

/// Signs and verifies HS256 session tokens.
///
/// Revocation lives in the session store, not here: a token that verifies
/// is only honoured while its `jti` is still recorded.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| format!("JWT encoding failed: {e}"))
    }

    /// Check signature and expiry and return the claims.
    pub fn decode(&self, token: &str) -> Result<Claims, String> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| format!("invalid token: {e}"))
    }
}
