use std::sync::Arc;

use tracing::debug;

use imagehoster_core::{Tag, parse_tag_names};
use imagehoster_store::{Store, StoreError};

use crate::error::GalleryError;

/// Turns a comma-separated tag string into persisted [`Tag`]s.
///
/// Every token is looked up by exact name and created when missing. Each
/// creation is its own store operation, independent of whatever image the
/// tags end up attached to.
#[derive(Clone)]
pub struct TagResolver {
    store: Arc<dyn Store>,
}

impl TagResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve `raw` into tags, in token order.
    ///
    /// Whitespace around tokens is trimmed and empty tokens are skipped.
    /// Repeated tokens produce repeated entries pointing at the same tag.
    pub async fn resolve(&self, raw: &str) -> Result<Vec<Tag>, GalleryError> {
        let names = parse_tag_names(raw);
        let mut tags = Vec::with_capacity(names.len());
        for name in &names {
            tags.push(self.find_or_create(name).await?);
        }
        Ok(tags)
    }

    async fn find_or_create(&self, name: &str) -> Result<Tag, GalleryError> {
        if let Some(tag) = self.store.find_tag(name).await? {
            return Ok(tag);
        }

        match self.store.create_tag(name).await {
            Ok(tag) => {
                debug!(tag_id = %tag.id, tag = %tag.name, "tag created");
                Ok(tag)
            }
            // Someone else created it between our lookup and insert.
            Err(StoreError::Conflict(_)) => self.store.find_tag(name).await?.ok_or_else(|| {
                GalleryError::Store(StoreError::Backend(format!(
                    "tag {name} reported a conflict but cannot be found"
                )))
            }),
            Err(e) => Err(e.into()),
        }
    }
}
