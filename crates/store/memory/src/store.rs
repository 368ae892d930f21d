use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use imagehoster_core::{
    Comment, CommentId, Image, ImageId, ImageRecord, NewComment, NewUser, Tag, TagId, User, UserId,
};
use imagehoster_store::error::StoreError;
use imagehoster_store::store::{CommentStore, ImageStore, SessionStore, TagStore, UserStore};

/// An image row: tag links are kept as ids and resolved on read.
#[derive(Debug, Clone)]
struct ImageRow {
    title: String,
    description: String,
    image_file: String,
    uploaded_at: DateTime<Utc>,
    owner: UserId,
    tag_ids: Vec<TagId>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    text: String,
    created_on: NaiveDate,
    author: UserId,
    image_id: ImageId,
}

#[derive(Debug, Clone, Copy)]
struct SessionRow {
    user: UserId,
    expires_at: DateTime<Utc>,
}

/// In-memory store backed by [`DashMap`]s, one per table.
///
/// Identifiers come from per-table counters starting at 1. Cascading deletes
/// are performed explicitly since there are no foreign keys to lean on.
/// Suitable for development and testing.
#[derive(Debug)]
pub struct MemoryStore {
    users: DashMap<UserId, User>,
    usernames: DashMap<String, UserId>,
    tags: DashMap<TagId, Tag>,
    tag_names: DashMap<String, TagId>,
    images: DashMap<ImageId, ImageRow>,
    comments: DashMap<CommentId, CommentRow>,
    sessions: DashMap<String, SessionRow>,
    next_user: AtomicI64,
    next_tag: AtomicI64,
    next_image: AtomicI64,
    next_comment: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            usernames: DashMap::new(),
            tags: DashMap::new(),
            tag_names: DashMap::new(),
            images: DashMap::new(),
            comments: DashMap::new(),
            sessions: DashMap::new(),
            next_user: AtomicI64::new(1),
            next_tag: AtomicI64::new(1),
            next_image: AtomicI64::new(1),
            next_comment: AtomicI64::new(1),
        }
    }
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn next(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::Relaxed)
    }

    fn username_of(&self, id: UserId) -> Result<String, StoreError> {
        self.users
            .get(&id)
            .map(|u| u.username.clone())
            .ok_or_else(|| StoreError::MissingReference(format!("user {id}")))
    }

    fn check_references(&self, record: &ImageRecord) -> Result<(), StoreError> {
        if !self.users.contains_key(&record.owner) {
            return Err(StoreError::MissingReference(format!(
                "user {}",
                record.owner
            )));
        }
        if let Some(tag) = record.tags.iter().find(|t| !self.tags.contains_key(&t.id)) {
            return Err(StoreError::MissingReference(format!("tag {}", tag.id)));
        }
        Ok(())
    }

    fn row_from_record(record: &ImageRecord) -> ImageRow {
        ImageRow {
            title: record.title.clone(),
            description: record.description.clone(),
            image_file: record.image_file.clone(),
            uploaded_at: record.uploaded_at,
            owner: record.owner,
            tag_ids: record.tags.iter().map(|t| t.id).collect(),
        }
    }

    /// Join an image row with its owner and tags.
    fn hydrate(&self, id: ImageId, row: &ImageRow) -> Result<Image, StoreError> {
        let tags = row
            .tag_ids
            .iter()
            .map(|tag_id| {
                self.tags
                    .get(tag_id)
                    .map(|t| t.value().clone())
                    .ok_or_else(|| StoreError::MissingReference(format!("tag {tag_id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Image {
            id,
            title: row.title.clone(),
            description: row.description.clone(),
            image_file: row.image_file.clone(),
            uploaded_at: row.uploaded_at,
            owner: row.owner,
            owner_username: self.username_of(row.owner)?,
            tags,
        })
    }

    fn load_image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        // Clone the row out so no shard guard is held while joining.
        let row = self.images.get(&id).map(|r| r.value().clone());
        row.map(|row| self.hydrate(id, &row)).transpose()
    }

    fn sorted_image_ids(&self) -> Vec<ImageId> {
        let mut ids: Vec<ImageId> = self.images.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn remove_image(&self, id: ImageId) -> bool {
        let existed = self.images.remove(&id).is_some();
        if existed {
            self.comments.retain(|_, c| c.image_id != id);
        }
        existed
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            ))),
            Entry::Vacant(vacant) => {
                let id = UserId::new(Self::next(&self.next_user));
                let created = User {
                    id,
                    username: user.username.clone(),
                    password_hash: user.password_hash.clone(),
                    profile: user.profile.clone(),
                };
                self.users.insert(id, created.clone());
                vacant.insert(id);
                Ok(created)
            }
        }
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let id = self.usernames.get(username).map(|e| *e.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.value().clone())))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        self.usernames.remove(&user.username);

        let owned: Vec<ImageId> = self
            .images
            .iter()
            .filter(|e| e.value().owner == id)
            .map(|e| *e.key())
            .collect();
        for image_id in owned {
            self.remove_image(image_id);
        }
        self.comments.retain(|_, c| c.author != id);
        self.sessions.retain(|_, s| s.user != id);
        Ok(true)
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let id = self.tag_names.get(name).map(|e| *e.value());
        Ok(id.and_then(|id| self.tags.get(&id).map(|t| t.value().clone())))
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, StoreError> {
        match self.tag_names.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "tag '{name}' already exists"
            ))),
            Entry::Vacant(vacant) => {
                let tag = Tag {
                    id: TagId::new(Self::next(&self.next_tag)),
                    name: name.to_owned(),
                };
                self.tags.insert(tag.id, tag.clone());
                vacant.insert(tag.id);
                Ok(tag)
            }
        }
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn insert_image(&self, record: &ImageRecord) -> Result<Image, StoreError> {
        self.check_references(record)?;
        let id = ImageId::new(Self::next(&self.next_image));
        let row = Self::row_from_record(record);
        let image = self.hydrate(id, &row)?;
        self.images.insert(id, row);
        Ok(image)
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        self.load_image(id)
    }

    async fn find_image_by_title(&self, title: &str) -> Result<Option<Image>, StoreError> {
        let first = self
            .images
            .iter()
            .filter(|e| e.value().title == title)
            .map(|e| *e.key())
            .min();
        match first {
            Some(id) => self.load_image(id),
            None => Ok(None),
        }
    }

    async fn list_images(&self) -> Result<Vec<Image>, StoreError> {
        let mut images = Vec::new();
        for id in self.sorted_image_ids() {
            if let Some(image) = self.load_image(id)? {
                images.push(image);
            }
        }
        Ok(images)
    }

    async fn replace_image(
        &self,
        id: ImageId,
        record: &ImageRecord,
    ) -> Result<Option<Image>, StoreError> {
        if !self.images.contains_key(&id) {
            return Ok(None);
        }
        self.check_references(record)?;
        let row = Self::row_from_record(record);
        let image = self.hydrate(id, &row)?;
        // Last write wins.
        match self.images.get_mut(&id) {
            Some(mut existing) => {
                *existing = row;
                Ok(Some(image))
            }
            None => Ok(None),
        }
    }

    async fn delete_image(&self, id: ImageId) -> Result<bool, StoreError> {
        Ok(self.remove_image(id))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        if !self.images.contains_key(&comment.image_id) {
            return Err(StoreError::MissingReference(format!(
                "image {}",
                comment.image_id
            )));
        }
        let author_username = self.username_of(comment.author)?;
        let id = CommentId::new(Self::next(&self.next_comment));
        self.comments.insert(
            id,
            CommentRow {
                text: comment.text.clone(),
                created_on: comment.created_on,
                author: comment.author,
                image_id: comment.image_id,
            },
        );
        Ok(Comment {
            id,
            text: comment.text.clone(),
            created_on: comment.created_on,
            author: comment.author,
            author_username,
            image_id: comment.image_id,
        })
    }

    async fn comments_for_image(&self, image_id: ImageId) -> Result<Vec<Comment>, StoreError> {
        let mut rows: Vec<(CommentId, CommentRow)> = self
            .comments
            .iter()
            .filter(|e| e.value().image_id == image_id)
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        rows.sort_unstable_by_key(|(id, _)| *id);

        rows.into_iter()
            .map(|(id, row)| {
                Ok(Comment {
                    id,
                    author_username: self.username_of(row.author)?,
                    text: row.text,
                    created_on: row.created_on,
                    author: row.author,
                    image_id: row.image_id,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        token_id: &str,
        user: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.purge_expired_sessions().await?;
        self.sessions
            .insert(token_id.to_owned(), SessionRow { user, expires_at });
        Ok(())
    }

    async fn session_user(&self, token_id: &str) -> Result<Option<UserId>, StoreError> {
        let now = Utc::now();
        // Lazily evict expired sessions on read.
        self.sessions
            .remove_if(token_id, |_, s| s.expires_at <= now);
        Ok(self.sessions.get(token_id).map(|s| s.user))
    }

    async fn delete_session(&self, token_id: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        Ok(self
            .sessions
            .remove(token_id)
            .is_some_and(|(_, s)| s.expires_at > now))
    }

    async fn purge_expired_sessions(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let removed = expired
            .iter()
            .filter(|token_id| {
                self.sessions
                    .remove_if(token_id.as_str(), |_, s| s.expires_at <= now)
                    .is_some()
            })
            .count();
        Ok(removed as u64)
    }
}
