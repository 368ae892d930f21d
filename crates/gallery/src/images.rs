use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use imagehoster_core::{Comment, Image, ImageId, ImageRecord, UserId, is_owner, tags_to_string};
use imagehoster_store::Store;

use crate::error::GalleryError;
use crate::tags::TagResolver;

/// Shown when someone other than the owner opens or submits the edit form.
pub const EDIT_FORBIDDEN: &str = "Only the owner of the image can edit the image";

/// Shown when someone other than the owner tries to delete an image.
pub const DELETE_FORBIDDEN: &str = "Only the owner of the image can delete the image";

/// Input for a new upload.
#[derive(Debug, Clone, Default)]
pub struct NewImageForm {
    pub title: String,
    pub description: String,
    /// Base64 image payload.
    pub image_file: String,
    /// Raw comma-separated tag string.
    pub tags: String,
}

/// Input for an edit submission.
#[derive(Debug, Clone, Default)]
pub struct ImageEdit {
    pub title: String,
    pub description: String,
    /// Replacement payload. `None` or empty keeps the current file.
    pub image_file: Option<String>,
    pub tags: String,
}

/// An image together with its comments, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetail {
    pub image: Image,
    pub comments: Vec<Comment>,
}

/// What the edit page needs: the image and its tags as a single string.
#[derive(Debug, Clone, Serialize)]
pub struct EditForm {
    pub image: Image,
    pub tags: String,
}

/// Image lifecycle: upload, view, edit, delete.
#[derive(Clone)]
pub struct ImageService {
    store: Arc<dyn Store>,
    tags: TagResolver,
    enforce_edit_ownership: bool,
}

impl ImageService {
    pub fn new(store: Arc<dyn Store>, tags: TagResolver, enforce_edit_ownership: bool) -> Self {
        Self {
            store,
            tags,
            enforce_edit_ownership,
        }
    }

    /// Upload a new image owned by `owner`.
    ///
    /// Tags are resolved first, each in its own store operation, so a failed
    /// insert can leave freshly created tags behind. They are picked up again
    /// by the next resolution of the same name.
    #[instrument(name = "images.create", skip(self, form), fields(%owner, title = %form.title))]
    pub async fn create(&self, owner: UserId, form: NewImageForm) -> Result<Image, GalleryError> {
        let tags = self.tags.resolve(&form.tags).await?;
        let record = ImageRecord {
            title: form.title,
            description: form.description,
            image_file: form.image_file,
            uploaded_at: Utc::now(),
            owner,
            tags,
        };

        let image = self.store.insert_image(&record).await?;
        info!(image_id = %image.id, "image created");
        Ok(image)
    }

    pub async fn get(&self, id: ImageId) -> Result<Image, GalleryError> {
        self.store
            .get_image(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("image {id}")))
    }

    /// First image with exactly this title, by id order.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<Image>, GalleryError> {
        Ok(self.store.find_image_by_title(title).await?)
    }

    pub async fn list(&self) -> Result<Vec<Image>, GalleryError> {
        Ok(self.store.list_images().await?)
    }

    pub async fn detail(&self, id: ImageId) -> Result<ImageDetail, GalleryError> {
        let image = self.get(id).await?;
        let comments = self.store.comments_for_image(id).await?;
        Ok(ImageDetail { image, comments })
    }

    /// The edit page for `id`, only for its owner.
    pub async fn edit_form(&self, acting: UserId, id: ImageId) -> Result<EditForm, GalleryError> {
        let image = self.get(id).await?;
        if !is_owner(acting, &image) {
            return Err(GalleryError::Forbidden(EDIT_FORBIDDEN.to_owned()));
        }
        let tags = tags_to_string(&image.tags);
        Ok(EditForm { image, tags })
    }

    /// Replace every mutable field of an image.
    ///
    /// The upload timestamp is reset and ownership moves to `acting`. When
    /// edit ownership is not enforced any signed-in user can take over an
    /// image this way.
    #[instrument(name = "images.update", skip(self, edit), fields(%acting, image_id = %id))]
    pub async fn update(
        &self,
        acting: UserId,
        id: ImageId,
        edit: ImageEdit,
    ) -> Result<Image, GalleryError> {
        let existing = self.get(id).await?;
        if !is_owner(acting, &existing) {
            if self.enforce_edit_ownership {
                return Err(GalleryError::Forbidden(EDIT_FORBIDDEN.to_owned()));
            }
            warn!(owner = %existing.owner, "edit by non-owner allowed, ownership transferred");
        }

        let tags = self.tags.resolve(&edit.tags).await?;
        let image_file = edit
            .image_file
            .filter(|file| !file.is_empty())
            .unwrap_or(existing.image_file);

        let record = ImageRecord {
            title: edit.title,
            description: edit.description,
            image_file,
            uploaded_at: Utc::now(),
            owner: acting,
            tags,
        };

        let image = self
            .store
            .replace_image(id, &record)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("image {id}")))?;
        info!("image updated");
        Ok(image)
    }

    /// Delete an image owned by `acting`, with its comments.
    #[instrument(name = "images.delete", skip(self), fields(%acting, image_id = %id))]
    pub async fn delete(&self, acting: UserId, id: ImageId) -> Result<(), GalleryError> {
        let image = self.get(id).await?;
        if !is_owner(acting, &image) {
            info!(owner = %image.owner, "delete rejected for non-owner");
            return Err(GalleryError::Forbidden(DELETE_FORBIDDEN.to_owned()));
        }

        if !self.store.delete_image(id).await? {
            return Err(GalleryError::NotFound(format!("image {id}")));
        }
        info!("image deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use imagehoster_core::{NewComment, NewUser, User, UserProfile};
    use imagehoster_store::{CommentStore, UserStore};
    use imagehoster_store_memory::MemoryStore;

    use super::*;

    async fn setup(enforce: bool) -> (Arc<MemoryStore>, ImageService, User, User) {
        let store = Arc::new(MemoryStore::new());
        let tags = TagResolver::new(store.clone());
        let service = ImageService::new(store.clone(), tags, enforce);
        let alice = store.create_user(&user("alice")).await.unwrap();
        let bob = store.create_user(&user("bob")).await.unwrap();
        (store, service, alice, bob)
    }

    fn user(name: &str) -> NewUser {
        NewUser {
            username: name.to_owned(),
            password_hash: "x".to_owned(),
            profile: UserProfile::default(),
        }
    }

    fn sunset() -> NewImageForm {
        NewImageForm {
            title: "Sunset".to_owned(),
            description: "evening sky".to_owned(),
            image_file: "c3Vuc2V0".to_owned(),
            tags: "nature,photo".to_owned(),
        }
    }

    fn edit(file: Option<&str>) -> ImageEdit {
        ImageEdit {
            title: "Dusk".to_owned(),
            description: "later".to_owned(),
            image_file: file.map(str::to_owned),
            tags: "sky".to_owned(),
        }
    }

    #[tokio::test]
    async fn upload_with_two_tags() {
        let (_, service, alice, _) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        assert_eq!(image.title, "Sunset");
        assert_eq!(image.owner, alice.id);
        assert_eq!(image.tag_names(), vec!["nature", "photo"]);

        let fetched = service.get(image.id).await.unwrap();
        assert_eq!(fetched, image);
    }

    #[tokio::test]
    async fn duplicate_titles_are_allowed() {
        let (_, service, alice, _) = setup(true).await;
        let first = service.create(alice.id, sunset()).await.unwrap();
        let second = service.create(alice.id, sunset()).await.unwrap();
        assert_ne!(first.id, second.id);

        let found = service.find_by_title("Sunset").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_, service, _, _) = setup(true).await;
        let err = service.get(ImageId::new(42)).await.unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
    }

    #[tokio::test]
    async fn non_owner_cannot_delete() {
        let (_, service, alice, bob) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        let err = service.delete(bob.id, image.id).await.unwrap_err();
        match err {
            GalleryError::Forbidden(msg) => assert_eq!(msg, DELETE_FORBIDDEN),
            other => panic!("expected Forbidden, got {other:?}"),
        }
        assert!(service.get(image.id).await.is_ok());
    }

    #[tokio::test]
    async fn owner_delete_removes_comments() {
        let (store, service, alice, bob) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();
        store
            .insert_comment(&NewComment {
                text: "nice!".to_owned(),
                created_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                author: bob.id,
                image_id: image.id,
            })
            .await
            .unwrap();

        service.delete(alice.id, image.id).await.unwrap();
        assert!(matches!(
            service.get(image.id).await,
            Err(GalleryError::NotFound(_))
        ));
        assert!(store.comments_for_image(image.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_form_only_for_owner() {
        let (_, service, alice, bob) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        let form = service.edit_form(alice.id, image.id).await.unwrap();
        assert_eq!(form.tags, "nature,photo");

        let err = service.edit_form(bob.id, image.id).await.unwrap_err();
        assert!(matches!(err, GalleryError::Forbidden(ref m) if m == EDIT_FORBIDDEN));
    }

    #[tokio::test]
    async fn update_without_file_keeps_previous_content() {
        let (_, service, alice, _) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        let updated = service.update(alice.id, image.id, edit(None)).await.unwrap();
        assert_eq!(updated.image_file, "c3Vuc2V0");
        assert_eq!(updated.title, "Dusk");
        assert_eq!(updated.tag_names(), vec!["sky"]);
        assert!(updated.uploaded_at >= image.uploaded_at);

        let updated = service
            .update(alice.id, image.id, edit(Some("")))
            .await
            .unwrap();
        assert_eq!(updated.image_file, "c3Vuc2V0");

        let updated = service
            .update(alice.id, image.id, edit(Some("bmV3")))
            .await
            .unwrap();
        assert_eq!(updated.image_file, "bmV3");
    }

    #[tokio::test]
    async fn repeated_update_only_moves_timestamp() {
        let (_, service, alice, _) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        let first = service.update(alice.id, image.id, edit(None)).await.unwrap();
        let second = service.update(alice.id, image.id, edit(None)).await.unwrap();

        assert!(second.uploaded_at >= first.uploaded_at);
        let strip = |mut image: Image| {
            image.uploaded_at = chrono::DateTime::<Utc>::MIN_UTC;
            image
        };
        assert_eq!(strip(first), strip(second));
    }

    #[tokio::test]
    async fn update_by_non_owner_rejected_when_enforced() {
        let (_, service, alice, bob) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        let err = service
            .update(bob.id, image.id, edit(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::Forbidden(_)));
        assert_eq!(service.get(image.id).await.unwrap().owner, alice.id);
    }

    #[tokio::test]
    async fn update_by_non_owner_transfers_ownership_when_not_enforced() {
        let (_, service, alice, bob) = setup(false).await;
        let image = service.create(alice.id, sunset()).await.unwrap();

        let updated = service.update(bob.id, image.id, edit(None)).await.unwrap();
        assert_eq!(updated.owner, bob.id);
        assert_eq!(updated.owner_username, "bob");
    }

    #[tokio::test]
    async fn detail_includes_comments() {
        let (store, service, alice, bob) = setup(true).await;
        let image = service.create(alice.id, sunset()).await.unwrap();
        store
            .insert_comment(&NewComment {
                text: "wow".to_owned(),
                created_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                author: bob.id,
                image_id: image.id,
            })
            .await
            .unwrap();

        let detail = service.detail(image.id).await.unwrap();
        assert_eq!(detail.image.id, image.id);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].author_username, "bob");
    }
}
