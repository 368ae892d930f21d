use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::Tag;
use crate::types::{ImageId, UserId};

/// An uploaded image as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub title: String,
    pub description: String,
    /// Base64-encoded upload payload.
    pub image_file: String,
    pub uploaded_at: DateTime<Utc>,
    pub owner: UserId,
    /// Username of the owner, joined in for display.
    pub owner_username: String,
    /// Tags in the order they were resolved. May contain duplicates.
    pub tags: Vec<Tag>,
}

/// The mutable fields of an image, used both for inserts and for full
/// replacement on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub title: String,
    pub description: String,
    pub image_file: String,
    pub uploaded_at: DateTime<Utc>,
    pub owner: UserId,
    pub tags: Vec<Tag>,
}

impl Image {
    /// Names of the attached tags, in order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}
