use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use imagehoster_core::{
    Comment, CommentId, Image, ImageId, ImageRecord, NewComment, NewUser, Tag, TagId, User,
    UserId, UserProfile,
};
use imagehoster_store::error::StoreError;
use imagehoster_store::store::{CommentStore, ImageStore, SessionStore, TagStore, UserStore};

use crate::config::PostgresConfig;
use crate::migrations;

type ImageRow = (i64, String, String, String, DateTime<Utc>, i64, String);
type UserRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);
type CommentRow = (i64, String, NaiveDate, i64, String, i64);

/// Translate a `sqlx` error, surfacing constraint violations as their own
/// [`StoreError`] variants.
fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_owned());
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingReference(db.message().to_owned());
        }
    }
    StoreError::Backend(e.to_string())
}

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying the SSL mode
/// when configured.
fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StoreError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    Ok(options)
}

fn image_from_row(row: ImageRow, tags: Vec<Tag>) -> Image {
    let (id, title, description, image_file, uploaded_at, owner, owner_username) = row;
    Image {
        id: ImageId::new(id),
        title,
        description,
        image_file,
        uploaded_at,
        owner: UserId::new(owner),
        owner_username,
        tags,
    }
}

fn user_from_row(row: UserRow) -> User {
    let (id, username, password_hash, full_name, email_address, mobile_number) = row;
    User {
        id: UserId::new(id),
        username,
        password_hash,
        profile: UserProfile {
            full_name: full_name.unwrap_or_default(),
            email_address: email_address.unwrap_or_default(),
            mobile_number: mobile_number.unwrap_or_default(),
        },
    }
}

fn comment_from_row(row: CommentRow) -> Comment {
    let (id, text, created_on, author, author_username, image_id) = row;
    Comment {
        id: CommentId::new(id),
        text,
        created_on,
        author: UserId::new(author),
        author_username,
        image_id: ImageId::new(image_id),
    }
}

/// PostgreSQL-backed implementation of the storage traits.
///
/// Each trait method is a single operation: multi-statement writes (user +
/// profile, image + tag links) run inside their own transaction and nothing
/// spans two methods.
pub struct PostgresStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresStore {
    /// Connect, create the connection pool, and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Wrap an existing pool. Runs migrations on creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    fn image_select(&self) -> String {
        let images = self.config.images_table();
        let users = self.config.users_table();
        format!(
            "SELECT i.id, i.title, i.description, i.image_file, i.uploaded_at, i.user_id, u.username \
             FROM {images} i JOIN {users} u ON u.id = i.user_id"
        )
    }

    async fn tags_for_image(&self, id: ImageId) -> Result<Vec<Tag>, StoreError> {
        let image_tags = self.config.image_tags_table();
        let tags = self.config.tags_table();
        let query = format!(
            "SELECT t.id, t.name FROM {image_tags} it JOIN {tags} t ON t.id = it.tag_id \
             WHERE it.image_id = $1 ORDER BY it.position"
        );

        let rows: Vec<(i64, String)> = sqlx::query_as(&query)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Tag {
                id: TagId::new(id),
                name,
            })
            .collect())
    }

    async fn load_image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        let query = format!("{} WHERE i.id = $1", self.image_select());
        let row: Option<ImageRow> = sqlx::query_as(&query)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => {
                let tags = self.tags_for_image(id).await?;
                Ok(Some(image_from_row(row, tags)))
            }
            None => Ok(None),
        }
    }

    /// Write the tag links for an image, in order, inside `tx`.
    async fn write_tag_links(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: ImageId,
        tags: &[Tag],
    ) -> Result<(), StoreError> {
        let image_tags = self.config.image_tags_table();
        let insert =
            format!("INSERT INTO {image_tags} (image_id, position, tag_id) VALUES ($1, $2, $3)");

        for (position, tag) in tags.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Backend("too many tags on one image".to_owned()))?;
            sqlx::query(&insert)
                .bind(id.get())
                .bind(position)
                .bind(tag.id.get())
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx)?;
        }
        Ok(())
    }

    async fn reload(&self, id: ImageId) -> Result<Image, StoreError> {
        self.load_image(id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("image {id} vanished after write")))
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let users = self.config.users_table();
        let profiles = self.config.profiles_table();

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let insert_user =
            format!("INSERT INTO {users} (username, password_hash) VALUES ($1, $2) RETURNING id");
        let (id,): (i64,) = sqlx::query_as(&insert_user)
            .bind(&user.username)
            .bind(&user.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        let insert_profile = format!(
            "INSERT INTO {profiles} (user_id, full_name, email_address, mobile_number) \
             VALUES ($1, $2, $3, $4)"
        );
        sqlx::query(&insert_profile)
            .bind(id)
            .bind(&user.profile.full_name)
            .bind(&user.profile.email_address)
            .bind(&user.profile.mobile_number)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        debug!(user_id = id, "user row created");

        Ok(User {
            id: UserId::new(id),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            profile: user.profile.clone(),
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.config.users_table();
        let profiles = self.config.profiles_table();
        let query = format!(
            "SELECT u.id, u.username, u.password_hash, p.full_name, p.email_address, p.mobile_number \
             FROM {users} u LEFT JOIN {profiles} p ON p.user_id = u.id WHERE u.id = $1"
        );

        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(row.map(user_from_row))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.config.users_table();
        let profiles = self.config.profiles_table();
        let query = format!(
            "SELECT u.id, u.username, u.password_hash, p.full_name, p.email_address, p.mobile_number \
             FROM {users} u LEFT JOIN {profiles} p ON p.user_id = u.id WHERE u.username = $1"
        );

        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(row.map(user_from_row))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let users = self.config.users_table();
        let query = format!("DELETE FROM {users} WHERE id = $1");

        let result = sqlx::query(&query)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TagStore for PostgresStore {
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let tags = self.config.tags_table();
        let query = format!("SELECT id, name FROM {tags} WHERE name = $1");

        let row: Option<(i64, String)> = sqlx::query_as(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(row.map(|(id, name)| Tag {
            id: TagId::new(id),
            name,
        }))
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let tags = self.config.tags_table();
        let query = format!("INSERT INTO {tags} (name) VALUES ($1) RETURNING id");

        let (id,): (i64,) = sqlx::query_as(&query)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(Tag {
            id: TagId::new(id),
            name: name.to_owned(),
        })
    }
}

#[async_trait]
impl ImageStore for PostgresStore {
    async fn insert_image(&self, record: &ImageRecord) -> Result<Image, StoreError> {
        let images = self.config.images_table();
        let insert = format!(
            "INSERT INTO {images} (title, description, image_file, uploaded_at, user_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id"
        );

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let (id,): (i64,) = sqlx::query_as(&insert)
            .bind(&record.title)
            .bind(&record.description)
            .bind(&record.image_file)
            .bind(record.uploaded_at)
            .bind(record.owner.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        let id = ImageId::new(id);

        self.write_tag_links(&mut tx, id, &record.tags).await?;
        tx.commit().await.map_err(map_sqlx)?;

        self.reload(id).await
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        self.load_image(id).await
    }

    async fn find_image_by_title(&self, title: &str) -> Result<Option<Image>, StoreError> {
        let query = format!("{} WHERE i.title = $1 ORDER BY i.id LIMIT 1", self.image_select());
        let row: Option<ImageRow> = sqlx::query_as(&query)
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => {
                let tags = self.tags_for_image(ImageId::new(row.0)).await?;
                Ok(Some(image_from_row(row, tags)))
            }
            None => Ok(None),
        }
    }

    async fn list_images(&self) -> Result<Vec<Image>, StoreError> {
        let query = format!("{} ORDER BY i.id", self.image_select());
        let rows: Vec<ImageRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let image_tags = self.config.image_tags_table();
        let tags = self.config.tags_table();
        let links_query = format!(
            "SELECT it.image_id, t.id, t.name FROM {image_tags} it JOIN {tags} t ON t.id = it.tag_id \
             ORDER BY it.image_id, it.position"
        );
        let links: Vec<(i64, i64, String)> = sqlx::query_as(&links_query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let mut tags_by_image: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (image_id, tag_id, name) in links {
            tags_by_image.entry(image_id).or_default().push(Tag {
                id: TagId::new(tag_id),
                name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = tags_by_image.remove(&row.0).unwrap_or_default();
                image_from_row(row, tags)
            })
            .collect())
    }

    async fn replace_image(
        &self,
        id: ImageId,
        record: &ImageRecord,
    ) -> Result<Option<Image>, StoreError> {
        let images = self.config.images_table();
        let image_tags = self.config.image_tags_table();
        let update = format!(
            "UPDATE {images} SET title = $2, description = $3, image_file = $4, \
             uploaded_at = $5, user_id = $6 WHERE id = $1"
        );
        let clear_links = format!("DELETE FROM {image_tags} WHERE image_id = $1");

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let result = sqlx::query(&update)
            .bind(id.get())
            .bind(&record.title)
            .bind(&record.description)
            .bind(&record.image_file)
            .bind(record.uploaded_at)
            .bind(record.owner.get())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(None);
        }

        sqlx::query(&clear_links)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        self.write_tag_links(&mut tx, id, &record.tags).await?;
        tx.commit().await.map_err(map_sqlx)?;

        self.reload(id).await.map(Some)
    }

    async fn delete_image(&self, id: ImageId) -> Result<bool, StoreError> {
        let images = self.config.images_table();
        let query = format!("DELETE FROM {images} WHERE id = $1");

        let result = sqlx::query(&query)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentStore for PostgresStore {
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        let comments = self.config.comments_table();
        let users = self.config.users_table();
        let query = format!(
            "WITH c AS ( \
                INSERT INTO {comments} (text, created_on, user_id, image_id) \
                VALUES ($1, $2, $3, $4) RETURNING id, user_id \
             ) \
             SELECT c.id, u.username FROM c JOIN {users} u ON u.id = c.user_id"
        );

        let (id, author_username): (i64, String) = sqlx::query_as(&query)
            .bind(&comment.text)
            .bind(comment.created_on)
            .bind(comment.author.get())
            .bind(comment.image_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(Comment {
            id: CommentId::new(id),
            text: comment.text.clone(),
            created_on: comment.created_on,
            author: comment.author,
            author_username,
            image_id: comment.image_id,
        })
    }

    async fn comments_for_image(&self, image_id: ImageId) -> Result<Vec<Comment>, StoreError> {
        let comments = self.config.comments_table();
        let users = self.config.users_table();
        let query = format!(
            "SELECT c.id, c.text, c.created_on, c.user_id, u.username, c.image_id \
             FROM {comments} c JOIN {users} u ON u.id = c.user_id \
             WHERE c.image_id = $1 ORDER BY c.id"
        );

        let rows: Vec<CommentRow> = sqlx::query_as(&query)
            .bind(image_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(comment_from_row).collect())
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn create_session(
        &self,
        token_id: &str,
        user: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.purge_expired_sessions().await?;

        let sessions = self.config.sessions_table();
        let query = format!(
            "INSERT INTO {sessions} (token_id, user_id, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (token_id) DO UPDATE \
             SET user_id = EXCLUDED.user_id, expires_at = EXCLUDED.expires_at"
        );

        sqlx::query(&query)
            .bind(token_id)
            .bind(user.get())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }

    async fn session_user(&self, token_id: &str) -> Result<Option<UserId>, StoreError> {
        let sessions = self.config.sessions_table();
        let query =
            format!("SELECT user_id FROM {sessions} WHERE token_id = $1 AND expires_at > NOW()");

        let row: Option<(i64,)> = sqlx::query_as(&query)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(row.map(|(id,)| UserId::new(id)))
    }

    async fn delete_session(&self, token_id: &str) -> Result<bool, StoreError> {
        let sessions = self.config.sessions_table();
        let query = format!(
            "DELETE FROM {sessions} WHERE token_id = $1 RETURNING expires_at > NOW()"
        );

        let row: Option<(bool,)> = sqlx::query_as(&query)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(row.is_some_and(|(live,)| live))
    }

    async fn purge_expired_sessions(&self) -> Result<u64, StoreError> {
        let sessions = self.config.sessions_table();
        let query = format!("DELETE FROM {sessions} WHERE expires_at <= NOW()");

        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() > 0 {
            debug!(removed = result.rows_affected(), "purged expired sessions");
        }
        Ok(result.rows_affected())
    }
}
