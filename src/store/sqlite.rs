//! SQLite backend. One table per namespace, one row per key.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{ensure_valid_key, RecordStore, StoredRecord};

pub type SharedConnection = Arc<Mutex<Connection>>;

/// Opens (or creates) the database file. `:memory:` works for tests.
pub async fn open_connection(path: &Path) -> Result<SharedConnection> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<SharedConnection> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        // concurrent readers while the refresh loops write
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Ok(Arc::new(Mutex::new(conn)))
    })
    .await?
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: SharedConnection,
    table: String,
}

impl SqliteStore {
    /// `table` doubles as the namespace; it must be a valid store key.
    pub async fn new(conn: SharedConnection, table: &str) -> Result<Self> {
        ensure_valid_key(table)?;
        let store = Self { conn, table: table.to_owned() };

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
            store.table
        );
        store
            .with_conn(move |conn| {
                conn.execute_batch(&ddl).context("failed to create store table")?;
                Ok(())
            })
            .await?;
        Ok(store)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        ensure_valid_key(key)?;
        let sql = format!("SELECT value, updated_at FROM \"{}\" WHERE key = ?1", self.table);
        let key = key.to_owned();

        self.with_conn(move |conn| {
            let row = conn
                .query_row(&sql, params![key], |row| {
                    let value: String = row.get(0)?;
                    let updated_at: String = row.get(1)?;
                    Ok((value, updated_at))
                })
                .optional()
                .context("failed to read store row")?;

            row.map(|(value, updated_at)| {
                let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                    .with_context(|| format!("bad updated_at for '{}'", key))?
                    .with_timezone(&Utc);
                Ok::<_, anyhow::Error>(StoredRecord { key: key.clone(), value, updated_at })
            })
            .transpose()
        })
        .await
    }

    async fn upsert(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<()> {
        ensure_valid_key(key)?;
        let sql = format!(
            "INSERT INTO \"{}\" (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            self.table
        );
        let (key, value) = (key.to_owned(), value.to_owned());
        let updated_at = updated_at.to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(&sql, params![key, value, updated_at])
                .context("failed to upsert store row")?;
            Ok(())
        })
        .await
    }
}
