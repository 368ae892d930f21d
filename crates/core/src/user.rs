use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Contact details owned 1:1 by a [`User`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    pub email_address: String,
    pub mobile_number: String,
}

/// A registered account.
///
/// `password_hash` holds an encoded argon2 hash, never the plaintext. It is
/// skipped on serialization so a `User` can be handed to templates as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub profile: UserProfile,
}

/// A user record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub profile: UserProfile,
}
