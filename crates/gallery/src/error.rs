use imagehoster_store::StoreError;
use thiserror::Error;

/// Errors raised by the gallery services.
#[derive(Debug, Error)]
pub enum GalleryError {
    /// The requested image or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// User input was rejected. The message is shown to the user as-is.
    #[error("{0}")]
    Validation(String),

    /// The acting user does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown username or wrong password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// An error occurred in the storage backend.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Hashing a password failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// The gallery was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),
}
