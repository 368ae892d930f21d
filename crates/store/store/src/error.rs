use thiserror::Error;

/// Errors from storage operations.
///
/// Every store method reports failure through this type; backends never
/// swallow a failed write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    /// A uniqueness constraint rejected the write (duplicate username or tag name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist (e.g. commenting on a deleted image).
    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("backend error: {0}")]
    Backend(String),
}
