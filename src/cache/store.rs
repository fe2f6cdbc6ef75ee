//! Persistence for generated modules.
//!
//! The store is opened once at startup and handed to [`ModuleCache`](super::ModuleCache).
//! Every statement runs on the blocking pool so request tasks never hold a
//! SQLite call on the async executor.

use crate::error::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub query_params: String,
    pub module_source: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, fingerprint: &str) -> Result<Option<String>, CacheError>;

    /// Insert, or overwrite source and params of an existing fingerprint.
    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Release the underlying connection. Later calls fail with [`CacheError::Closed`].
    async fn close(&self) -> Result<(), CacheError>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS module_cache (
    prompt_hash TEXT PRIMARY KEY,
    query_params TEXT NOT NULL,
    module_content TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open a database from a connection string: a file path, `sqlite://path`
    /// or `:memory:`.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let target = url.strip_prefix("sqlite://").unwrap_or(url);
        if target.is_empty() || target == ":memory:" {
            return Self::open_in_memory();
        }

        let conn = Connection::open(Path::new(target))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CacheError::Task("connection lock poisoned".to_string()))?;
            let conn = guard.as_ref().ok_or(CacheError::Closed)?;
            f(conn)
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn load(&self, fingerprint: &str) -> Result<Option<String>, CacheError> {
        let fingerprint = fingerprint.to_string();
        self.with_conn(move |conn| {
            let source = conn
                .prepare_cached("SELECT module_content FROM module_cache WHERE prompt_hash = ?1")?
                .query_row(params![fingerprint], |row| row.get::<_, String>(0))
                .optional()?;
            Ok(source)
        })
        .await
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "INSERT INTO module_cache (prompt_hash, query_params, module_content, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(prompt_hash) DO UPDATE SET
                     module_content = excluded.module_content,
                     query_params = excluded.query_params",
            )?
            .execute(params![
                entry.fingerprint,
                entry.query_params,
                entry.module_source,
                entry.created_at.to_rfc3339(),
            ])?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), CacheError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let taken = conn
                .lock()
                .map_err(|_| CacheError::Task("connection lock poisoned".to_string()))?
                .take();
            match taken {
                Some(conn) => conn.close().map_err(|(_, e)| CacheError::Sqlite(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fingerprint: &str, source: &str, params: &str) -> CacheEntry {
        CacheEntry {
            fingerprint: fingerprint.to_string(),
            query_params: params.to_string(),
            module_source: source.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert_eq!(store.load("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_overwrites_source_and_params_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(entry("fp", "export const a = 1;", "{}")).await.unwrap();
        store
            .upsert(entry("fp", "export const a = 2;", r#"{"model":"x"}"#))
            .await
            .unwrap();

        assert_eq!(
            store.load("fp").await.unwrap().as_deref(),
            Some("export const a = 2;")
        );

        let (rows, params) = store
            .with_conn(|conn| {
                let rows: i64 =
                    conn.query_row("SELECT COUNT(*) FROM module_cache", [], |r| r.get(0))?;
                let params: String = conn.query_row(
                    "SELECT query_params FROM module_cache WHERE prompt_hash = 'fp'",
                    [],
                    |r| r.get(0),
                )?;
                Ok((rows, params))
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(params, r#"{"model":"x"}"#);
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.db");
        let url = format!("sqlite://{}", path.display());

        let store = SqliteStore::open(&url).unwrap();
        store.upsert(entry("fp", "export default 1;", "{}")).await.unwrap();
        store.close().await.unwrap();

        let reopened = SqliteStore::open(&url).unwrap();
        assert_eq!(
            reopened.load("fp").await.unwrap().as_deref(),
            Some("export default 1;")
        );
    }

    #[tokio::test]
    async fn operations_after_close_fail_with_closed() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.close().await.unwrap();
        // Closing twice is harmless.
        store.close().await.unwrap();

        assert!(matches!(store.load("fp").await, Err(CacheError::Closed)));
        assert!(matches!(
            store.upsert(entry("fp", "export {}", "{}")).await,
            Err(CacheError::Closed)
        ));
    }
}
