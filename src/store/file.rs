use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::store::{ensure_valid_key, RecordStore, StoredRecord};

#[derive(Debug, Serialize, Deserialize)]
struct FileRow {
    value: String,
    updated_at: DateTime<Utc>,
}

/// One JSON document per key under `root`, replaced with write-then-rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create store directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        ensure_valid_key(key)?;
        let path = self.path_for(key);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };

        let row: FileRow = serde_json::from_slice(&content)
            .with_context(|| format!("corrupt store file {}", path.display()))?;
        Ok(Some(StoredRecord { key: key.to_owned(), value: row.value, updated_at: row.updated_at }))
    }

    async fn upsert(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<()> {
        ensure_valid_key(key)?;
        let path = self.path_for(key);
        // unique per writer, the rename decides who wins
        let tmp = self.root.join(format!(".{}.{}.tmp", key, rand::random::<u64>()));

        let row = FileRow { value: value.to_owned(), updated_at };
        let bytes = serde_json::to_vec(&row)?;
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("failed to replace {}", path.display()));
        }
        debug!("store file updated: {}", path.display());
        Ok(())
    }
}
