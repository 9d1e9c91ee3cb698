use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{ensure_valid_key, RecordStore, StoredRecord};

/// Process-local store; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())) }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        ensure_valid_key(key)?;
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn upsert(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<()> {
        ensure_valid_key(key)?;
        let mut map = self.inner.write().await;
        map.insert(
            key.to_owned(),
            StoredRecord { key: key.to_owned(), value: value.to_owned(), updated_at },
        );
        Ok(())
    }
}
