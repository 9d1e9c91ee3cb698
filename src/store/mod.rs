//! Keyed single-row persistence shared by the token and cache stores.
//!
//! Every backend implements `get` and `upsert`; an upsert replaces the row
//! for its key atomically, so concurrent writers to one key leave exactly one
//! of their values behind.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::storage::{StorageBackend, StorageConfig};

pub mod cache_store;
pub mod file;
pub mod mem;
pub mod sqlite;
pub mod token_store;

/// One persisted row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    /// serialized JSON document
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>>;

    async fn upsert(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<()>;
}

/// Store keys end up in file names and SQL parameters; keep them boring.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 64
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub(crate) fn ensure_valid_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(crate::errors::ServiceError::Storage(format!("invalid store key '{}'", key)).into())
    }
}

/// Namespaces a backend is opened with
pub const TOKEN_NAMESPACE: &str = "tokens";
pub const CACHE_NAMESPACE: &str = "cache";

/// Opens the configured backend once per namespace: (token rows, cache rows).
pub async fn open_stores(cfg: &StorageConfig) -> Result<(Arc<dyn RecordStore>, Arc<dyn RecordStore>)> {
    match cfg.backend {
        StorageBackend::Memory => Ok((
            Arc::new(mem::MemoryStore::new()),
            Arc::new(mem::MemoryStore::new()),
        )),
        StorageBackend::File => {
            let root = Path::new(&cfg.path);
            Ok((
                Arc::new(file::FileStore::open(root.join(TOKEN_NAMESPACE)).await?),
                Arc::new(file::FileStore::open(root.join(CACHE_NAMESPACE)).await?),
            ))
        }
        StorageBackend::Sqlite => {
            let connection = sqlite::open_connection(Path::new(&cfg.path)).await?;
            Ok((
                Arc::new(sqlite::SqliteStore::new(connection.clone(), TOKEN_NAMESPACE).await?),
                Arc::new(sqlite::SqliteStore::new(connection, CACHE_NAMESPACE).await?),
            ))
        }
    }
}
