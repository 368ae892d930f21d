use serde::{Deserialize, Serialize};

use crate::comments::CommentRecorder;
use crate::images::ImageService;
use crate::tags::TagResolver;
use crate::users::UserService;

/// Behaviour switches for the gallery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Reject edit submissions from anyone but the image owner. When off,
    /// any signed-in user may edit an image and becomes its owner.
    pub enforce_edit_ownership: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            enforce_edit_ownership: true,
        }
    }
}

/// The gallery services over one shared store.
///
/// Construct with [`GalleryBuilder`](crate::GalleryBuilder).
pub struct Gallery {
    pub(crate) config: GalleryConfig,
    pub(crate) tags: TagResolver,
    pub(crate) images: ImageService,
    pub(crate) comments: CommentRecorder,
    pub(crate) users: UserService,
}

impl Gallery {
    pub fn images(&self) -> &ImageService {
        &self.images
    }

    pub fn comments(&self) -> &CommentRecorder {
        &self.comments
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn tags(&self) -> &TagResolver {
        &self.tags
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }
}
