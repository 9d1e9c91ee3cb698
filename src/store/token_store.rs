use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::auth::token::TokenRecord;
use crate::store::RecordStore;

/// Durable mirror of the current token, one row under a fixed key.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn RecordStore>,
    key: String,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn RecordStore>, key: impl Into<String>) -> Self {
        Self { backend, key: key.into() }
    }

    pub async fn load(&self) -> Result<Option<TokenRecord>> {
        let Some(row) = self.backend.get(&self.key).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&row.value)
            .with_context(|| format!("stored token '{}' is not a valid token record", self.key))?;
        Ok(Some(record))
    }

    /// Overwrites the stored record.
    pub async fn save(&self, record: &TokenRecord) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.backend.upsert(&self.key, &value, Utc::now()).await
    }
}
