use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// single SQLite file, one table per store
    Sqlite,
    /// directory tree, one JSON document per key
    File,
    /// process memory only, nothing survives a restart
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// database file for `sqlite`, root directory for `file`
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: default_backend(), path: default_path() }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_path() -> String {
    "data.db".to_string()
}
