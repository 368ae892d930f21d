use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// Foreign keys carry `ON DELETE CASCADE` so deleting a user removes its
/// profile, images, comments and sessions, and deleting an image removes
/// its comments and tag links. Tags are never cascaded.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let users = config.users_table();
    let profiles = config.profiles_table();
    let tags = config.tags_table();
    let images = config.images_table();
    let image_tags = config.image_tags_table();
    let comments = config.comments_table();
    let sessions = config.sessions_table();
    let prefix = &config.table_prefix;

    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {users} (
                id BIGSERIAL PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {profiles} (
                user_id BIGINT PRIMARY KEY REFERENCES {users} (id) ON DELETE CASCADE,
                full_name TEXT NOT NULL DEFAULT '',
                email_address TEXT NOT NULL DEFAULT '',
                mobile_number TEXT NOT NULL DEFAULT ''
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {tags} (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {images} (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                image_file TEXT NOT NULL DEFAULT '',
                uploaded_at TIMESTAMPTZ NOT NULL,
                user_id BIGINT NOT NULL REFERENCES {users} (id) ON DELETE CASCADE
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS {prefix}images_title_idx ON {images} (title)"),
        // Position keeps resolution order and allows the same tag twice.
        format!(
            "CREATE TABLE IF NOT EXISTS {image_tags} (
                image_id BIGINT NOT NULL REFERENCES {images} (id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                tag_id BIGINT NOT NULL REFERENCES {tags} (id),
                PRIMARY KEY (image_id, position)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {comments} (
                id BIGSERIAL PRIMARY KEY,
                text TEXT NOT NULL,
                created_on DATE NOT NULL,
                user_id BIGINT NOT NULL REFERENCES {users} (id) ON DELETE CASCADE,
                image_id BIGINT NOT NULL REFERENCES {images} (id) ON DELETE CASCADE
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS {prefix}comments_image_idx ON {comments} (image_id)"),
        format!(
            "CREATE TABLE IF NOT EXISTS {sessions} (
                token_id TEXT PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES {users} (id) ON DELETE CASCADE,
                expires_at TIMESTAMPTZ NOT NULL
            )"
        ),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
