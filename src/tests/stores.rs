#[cfg(test)]
mod test {

    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    use crate::auth::token::TokenRecord;
    use crate::config::storage::{StorageBackend, StorageConfig};
    use crate::errors::ServiceError;
    use crate::store::cache_store::CacheStore;
    use crate::store::file::FileStore;
    use crate::store::mem::MemoryStore;
    use crate::store::sqlite::{open_connection, SqliteStore};
    use crate::store::token_store::TokenStore;
    use crate::store::{is_valid_key, open_stores, RecordStore};
    use crate::upstream::datasets::Dataset;

    async fn overwrite_keeps_one_row(store: &dyn RecordStore) {
        assert!(store.get("wait-times").await.unwrap().is_none());

        let first = Utc::now() - ChronoDuration::seconds(60);
        store.upsert("wait-times", r#"{"v":1}"#, first).await.unwrap();
        let second = Utc::now();
        store.upsert("wait-times", r#"{"v":2}"#, second).await.unwrap();

        let row = store.get("wait-times").await.unwrap().unwrap();
        assert_eq!(row.key, "wait-times");
        assert_eq!(row.value, r#"{"v":2}"#);
        assert_eq!(row.updated_at.timestamp(), second.timestamp());

        let err = store.upsert("../escape", "{}", second).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ServiceError>(), Some(ServiceError::Storage(_))));

        // reads reject the same keys writes do
        let err = store.get("../escape").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ServiceError>(), Some(ServiceError::Storage(_))));
    }

    #[test]
    fn store_keys() {
        assert!(is_valid_key("oauth"));
        assert!(is_valid_key("points-of-interest"));
        assert!(is_valid_key("token_2"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key("drop table"));
        assert!(!is_valid_key(&"k".repeat(65)));
    }

    #[tokio::test]
    async fn memory_backend_upserts() {
        overwrite_keeps_one_row(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn file_backend_upserts_atomically() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("cache")).await.unwrap();
        overwrite_keeps_one_row(&store).await;

        let path = dir.path().join("cache").join("wait-times.json");
        assert!(path.exists());
        // no temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("cache"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sqlite_backend_upserts_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("data.db");

        {
            let conn = open_connection(&db).await.unwrap();
            let store = SqliteStore::new(conn, "cache").await.unwrap();
            overwrite_keeps_one_row(&store).await;
        }

        let conn = open_connection(&db).await.unwrap();
        let reopened = SqliteStore::new(conn.clone(), "cache").await.unwrap();
        let row = reopened.get("wait-times").await.unwrap().unwrap();
        assert_eq!(row.value, r#"{"v":2}"#);

        // tables are namespaces
        let tokens = SqliteStore::new(conn, "tokens").await.unwrap();
        assert!(tokens.get("wait-times").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn configured_backends_open() {
        let dir = tempdir().unwrap();
        for (backend, path) in [
            (StorageBackend::Memory, String::new()),
            (StorageBackend::File, dir.path().join("files").display().to_string()),
            (StorageBackend::Sqlite, dir.path().join("nested/data.db").display().to_string()),
        ] {
            let (tokens, cache) = open_stores(&StorageConfig { backend, path }).await.unwrap();
            tokens.upsert("oauth", "{}", Utc::now()).await.unwrap();
            assert!(cache.get("oauth").await.unwrap().is_none(), "{:?} namespaces overlap", backend);
        }
    }

    #[tokio::test]
    async fn token_store_round_trips_record() {
        let store = TokenStore::new(Arc::new(MemoryStore::new()), "oauth");
        assert!(store.load().await.unwrap().is_none());

        let now = Utc::now();
        let record = TokenRecord::new("access".into(), Some("refresh".into()), Some("Bearer".into()), Some(3600), now);
        store.save(&record).await.unwrap();

        let renewed = TokenRecord::new("access-2".into(), None, None, None, now);
        store.save(&renewed).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(renewed));
    }

    #[tokio::test]
    async fn cache_store_load_is_none_until_saved() {
        let store = CacheStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load(Dataset::Seasons).await.unwrap().is_none());

        let now = Utc::now();
        store.save(Dataset::Seasons, &json!({"seasons": ["summer"]}), now).await.unwrap();
        let entry = store.load(Dataset::Seasons).await.unwrap().unwrap();
        assert_eq!(entry.key, Dataset::Seasons);
        assert_eq!(entry.payload["seasons"][0], "summer");
        assert_eq!(entry.updated_at, now);
    }
}
