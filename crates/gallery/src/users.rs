use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::{debug, info};

use imagehoster_core::{NewUser, User, UserProfile, validate_password};
use imagehoster_store::{Store, StoreError};

use crate::error::GalleryError;

/// A registration form submission.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email_address: String,
    pub mobile_number: String,
}

/// Hash a password with argon2 and a fresh random salt.
fn hash_password(password: &str) -> Result<String, GalleryError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GalleryError::PasswordHash(e.to_string()))
}

/// Verify a candidate password against an argon2 hash string.
fn verify_password(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// Account registration and credential checks.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create an account after checking the password policy.
    pub async fn register(&self, registration: Registration) -> Result<User, GalleryError> {
        let username = registration.username.trim();
        if username.is_empty() {
            return Err(GalleryError::Validation("Username is required".to_owned()));
        }
        validate_password(&registration.password)
            .map_err(|e| GalleryError::Validation(e.to_string()))?;

        let new_user = NewUser {
            username: username.to_owned(),
            password_hash: hash_password(&registration.password)?,
            profile: UserProfile {
                full_name: registration.full_name,
                email_address: registration.email_address,
                mobile_number: registration.mobile_number,
            },
        };

        match self.store.create_user(&new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::Conflict(_)) => Err(GalleryError::Validation(format!(
                "Username {username} is already taken"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Check credentials. Unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, GalleryError> {
        let username = username.trim();
        let Some(user) = self.store.find_user_by_username(username).await? else {
            debug!(%username, "login for unknown user");
            return Err(GalleryError::InvalidCredentials);
        };

        if !verify_password(&user.password_hash, password) {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(GalleryError::InvalidCredentials);
        }

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }
}
