use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::store::RecordStore;
use crate::upstream::datasets::Dataset;

/// One named, timestamped snapshot of upstream data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: Dataset,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn RecordStore>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn RecordStore>) -> Self {
        Self { backend }
    }

    /// Point read. `None` when the dataset was never written.
    pub async fn load(&self, key: Dataset) -> Result<Option<CacheEntry>> {
        let Some(row) = self.backend.get(key.key()).await? else {
            return Ok(None);
        };
        let payload = serde_json::from_str(&row.value)
            .with_context(|| format!("cached '{}' is not valid JSON", key))?;
        Ok(Some(CacheEntry { key, payload, updated_at: row.updated_at }))
    }

    pub async fn save(&self, key: Dataset, payload: &Value, updated_at: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_string(payload)?;
        self.backend.upsert(key.key(), &value, updated_at).await
    }
}
