use std::sync::Arc;

use imagehoster_store::Store;
use tracing::info;

use crate::comments::CommentRecorder;
use crate::error::GalleryError;
use crate::gallery::{Gallery, GalleryConfig};
use crate::images::ImageService;
use crate::tags::TagResolver;
use crate::users::UserService;

/// Fluent builder for constructing a [`Gallery`].
///
/// A [`Store`] must be supplied; the config defaults to
/// [`GalleryConfig::default`].
#[derive(Default)]
pub struct GalleryBuilder {
    store: Option<Arc<dyn Store>>,
    config: GalleryConfig,
}

impl GalleryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage backend.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn config(mut self, config: GalleryConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for toggling [`GalleryConfig::enforce_edit_ownership`].
    #[must_use]
    pub fn enforce_edit_ownership(mut self, enforce: bool) -> Self {
        self.config.enforce_edit_ownership = enforce;
        self
    }

    /// Consume the builder and produce a configured [`Gallery`].
    ///
    /// Returns [`GalleryError::Configuration`] if no store was set.
    pub fn build(self) -> Result<Gallery, GalleryError> {
        let store = self
            .store
            .ok_or_else(|| GalleryError::Configuration("store is required".into()))?;

        let tags = TagResolver::new(Arc::clone(&store));
        let images = ImageService::new(
            Arc::clone(&store),
            tags.clone(),
            self.config.enforce_edit_ownership,
        );
        let comments = CommentRecorder::new(Arc::clone(&store));
        let users = UserService::new(store);

        info!(
            enforce_edit_ownership = self.config.enforce_edit_ownership,
            "gallery ready"
        );

        Ok(Gallery {
            config: self.config,
            tags,
            images,
            comments,
            users,
        })
    }
}
