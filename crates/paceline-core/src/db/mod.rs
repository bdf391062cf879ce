//! Durable store with connection pooling and migrations
//!
//! Two tables back the whole system:
//! - `response_cache_v1` - most recent successful Budget API response per
//!   distinct GET request (the offline cache gateway's storage)
//! - `app_state` - small key-value store holding `Config` and `SyncState`
//!   under fixed keys, shared last-write-wins between the foreground and
//!   background contexts

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::debug;

use crate::error::Result;

mod cache;
mod state;

pub use cache::CachedResponse;
pub use state::{CONFIG_KEY, SYNC_STATE_KEY};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Store wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Open (and migrate) the store at the given path
    pub fn open(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(4).build(manager)?;
        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Path to the store file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway store for testing
    ///
    /// Uses a temp file rather than `:memory:` so pooled connections share
    /// one database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("paceline_test_{}_{}.db", std::process::id(), id));
        let _ = std::fs::remove_file(&path);
        Self::open(&path.to_string_lossy())
    }

    pub(crate) fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS response_cache_v1 (
                request_key TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                body TEXT NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;
        debug!(path = %self.db_path, "Store migrations complete");
        Ok(())
    }
}
