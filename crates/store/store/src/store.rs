use async_trait::async_trait;
use chrono::{DateTime, Utc};

use imagehoster_core::{
    Comment, Image, ImageId, ImageRecord, NewComment, NewUser, Tag, User, UserId,
};

use crate::error::StoreError;

/// Persistence for user accounts and their profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user together with its profile.
    ///
    /// Returns [`StoreError::Conflict`] if the username is already taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

    /// Get a user by id. Returns `None` if not found.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Get a user by exact username. Returns `None` if not found.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Delete a user. The profile, owned images and authored comments go
    /// with it. Returns `true` if the user existed.
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;
}

/// Persistence for tags. Tag names are unique and compared case-sensitively.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Look up a tag by exact name.
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError>;

    /// Create a tag in its own operation.
    ///
    /// Returns [`StoreError::Conflict`] if a tag with this name exists.
    async fn create_tag(&self, name: &str) -> Result<Tag, StoreError>;
}

/// Persistence for images and their tag associations.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Insert a new image, assigning it an id.
    ///
    /// Returns [`StoreError::MissingReference`] if the owner or a tag does
    /// not exist.
    async fn insert_image(&self, record: &ImageRecord) -> Result<Image, StoreError>;

    /// Get an image by id. Returns `None` if not found.
    async fn get_image(&self, id: ImageId) -> Result<Option<Image>, StoreError>;

    /// Get the first image (lowest id) with exactly this title.
    async fn find_image_by_title(&self, title: &str) -> Result<Option<Image>, StoreError>;

    /// List every image, ordered by id.
    async fn list_images(&self) -> Result<Vec<Image>, StoreError>;

    /// Replace all mutable fields of an existing image, including its tag
    /// list. Returns `None` if the image does not exist.
    async fn replace_image(
        &self,
        id: ImageId,
        record: &ImageRecord,
    ) -> Result<Option<Image>, StoreError>;

    /// Delete an image. Its comments and tag links go with it; the tags
    /// themselves are kept. Returns `true` if the image existed.
    async fn delete_image(&self, id: ImageId) -> Result<bool, StoreError>;
}

/// Persistence for comments. Comments are append-only.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Insert a comment.
    ///
    /// Returns [`StoreError::MissingReference`] if the image or author does
    /// not exist.
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError>;

    /// All comments on an image, oldest first.
    async fn comments_for_image(&self, image_id: ImageId) -> Result<Vec<Comment>, StoreError>;
}

/// Server-side record of issued session tokens, used for logout revocation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record a session token id for `user` until `expires_at`. Sessions
    /// that have already expired are purged first.
    async fn create_session(
        &self,
        token_id: &str,
        user: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Resolve a live session token id to its user. Expired or revoked
    /// sessions return `None`.
    async fn session_user(&self, token_id: &str) -> Result<Option<UserId>, StoreError>;

    /// Revoke a session token id. Returns `true` if it was live.
    async fn delete_session(&self, token_id: &str) -> Result<bool, StoreError>;

    /// Drop every expired session. Returns the number removed.
    async fn purge_expired_sessions(&self) -> Result<u64, StoreError>;
}

/// Everything the gallery needs from a storage backend.
pub trait Store: UserStore + TagStore + ImageStore + CommentStore + SessionStore {}

impl<T> Store for T where T: UserStore + TagStore + ImageStore + CommentStore + SessionStore {}
