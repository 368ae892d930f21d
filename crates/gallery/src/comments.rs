use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use imagehoster_core::{Comment, ImageId, NewComment, UserId};
use imagehoster_store::Store;

use crate::error::GalleryError;

/// Appends comments to images.
#[derive(Clone)]
pub struct CommentRecorder {
    store: Arc<dyn Store>,
}

impl CommentRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add a comment dated today and return the image's full comment list,
    /// oldest first.
    pub async fn add_comment(
        &self,
        image_id: ImageId,
        author: UserId,
        text: &str,
    ) -> Result<Vec<Comment>, GalleryError> {
        if self.store.get_image(image_id).await?.is_none() {
            return Err(GalleryError::NotFound(format!("image {image_id}")));
        }

        let comment = self
            .store
            .insert_comment(&NewComment {
                text: text.to_owned(),
                created_on: Utc::now().date_naive(),
                author,
                image_id,
            })
            .await?;
        info!(comment_id = %comment.id, %image_id, %author, "comment added");

        Ok(self.store.comments_for_image(image_id).await?)
    }
}
