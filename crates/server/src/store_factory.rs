use std::sync::Arc;

use imagehoster_store::Store;
use imagehoster_store_memory::MemoryStore;
#[cfg(feature = "postgres")]
use imagehoster_store_postgres::{PostgresConfig, PostgresStore};

use crate::config::StoreConfig;
use crate::error::ServerError;

/// Construct the storage backend from configuration.
///
/// Backends with a schema run their migrations as part of construction.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn Store>, ServerError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "postgres")]
        "postgres" => create_postgres(config).await,
        other => Err(ServerError::Config(format!(
            "unsupported store backend: {other} (is the feature enabled?)"
        ))),
    }
}

#[cfg(feature = "postgres")]
async fn create_postgres(config: &StoreConfig) -> Result<Arc<dyn Store>, ServerError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| ServerError::Config("postgres backend requires 'url' in [store]".into()))?;
    let defaults = PostgresConfig::default();
    let pg_config = PostgresConfig {
        url: url.to_owned(),
        table_prefix: config
            .table_prefix
            .clone()
            .unwrap_or(defaults.table_prefix.clone()),
        pool_size: config.pool_size.unwrap_or(defaults.pool_size),
        ..defaults
    };
    let store = PostgresStore::new(pg_config)
        .await
        .map_err(|e| ServerError::Config(format!("postgres store: {e}")))?;
    Ok(Arc::new(store))
}
