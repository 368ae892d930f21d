use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{CommentId, ImageId, UserId};

/// A comment left on an image. Comments are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub created_on: NaiveDate,
    pub author: UserId,
    pub author_username: String,
    pub image_id: ImageId,
}

/// A comment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
    pub created_on: NaiveDate,
    pub author: UserId,
    pub image_id: ImageId,
}
