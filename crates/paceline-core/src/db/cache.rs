//! Response cache operations
//!
//! One row per distinct GET request, overwritten on every successful fetch,
//! never evicted; stale entries are only ever replaced. The table name
//! carries the cache version.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;

/// The most recent successful response for one request identity
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl Database {
    /// Look up a cached response by request key
    pub fn get_cached_response(&self, request_key: &str) -> Result<Option<CachedResponse>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT url, status, body, fetched_at FROM response_cache_v1 WHERE request_key = ?",
                params![request_key],
                |row| {
                    let fetched_at_str: String = row.get(3)?;
                    Ok(CachedResponse {
                        url: row.get(0)?,
                        status: row.get::<_, i64>(1)? as u16,
                        body: row.get(2)?,
                        fetched_at: parse_datetime(&fetched_at_str),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Store (or overwrite) the response for a request key
    pub fn put_cached_response(&self, request_key: &str, url: &str, status: u16, body: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO response_cache_v1 (request_key, url, status, body, fetched_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(request_key) DO UPDATE SET
                url = excluded.url,
                status = excluded.status,
                body = excluded.body,
                fetched_at = CURRENT_TIMESTAMP
            "#,
            params![request_key, url, status as i64, body],
        )?;
        Ok(())
    }

    /// Number of cached responses (diagnostics)
    pub fn cached_response_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM response_cache_v1", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Parse a SQLite datetime string
fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}
