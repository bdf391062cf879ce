//! Key-value state operations
//!
//! `Config` and `SyncState` live as JSON blobs under fixed keys. Reads and
//! writes are last-write-wins by design: the foreground and background
//! contexts share this table without a cross-process lock, and a preference
//! change landing mid-wake is an accepted, documented inconsistency.

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::{Config, SyncState};

pub const CONFIG_KEY: &str = "config";
pub const SYNC_STATE_KEY: &str = "sync_state";

impl Database {
    /// Read a raw state value
    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a raw state value (insert or overwrite)
    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO app_state (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Load the stored config, falling back to defaults when absent or
    /// unparseable
    pub fn load_config(&self) -> Result<Config> {
        match self.get_state(CONFIG_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_default()),
            None => Ok(Config::default()),
        }
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.set_state(CONFIG_KEY, &json)
    }

    /// Load background-context bookkeeping, defaulting to empty
    pub fn load_sync_state(&self) -> Result<SyncState> {
        match self.get_state(SYNC_STATE_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_default()),
            None => Ok(SyncState::default()),
        }
    }

    pub fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.set_state(SYNC_STATE_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_state_round_trip() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_state("missing").unwrap(), None);

        db.set_state("k", "v1").unwrap();
        assert_eq!(db.get_state("k").unwrap().as_deref(), Some("v1"));

        // Overwrite wins
        db.set_state("k", "v2").unwrap();
        assert_eq!(db.get_state("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_config_round_trip() {
        let db = Database::in_memory().unwrap();
        let defaults = db.load_config().unwrap();
        assert!(defaults.api_key.is_none());

        let mut config = Config::default();
        config.api_key = Some("token-1".to_string());
        config.preferences.warn_at_ratio = 0.9;
        config.preferences.hidden_category_ids = vec![4, 7];
        db.save_config(&config).unwrap();

        let loaded = db.load_config().unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("token-1"));
        assert_eq!(loaded.preferences.hidden_category_ids, vec![4, 7]);
    }

    #[test]
    fn test_sync_state_round_trip() {
        let db = Database::in_memory().unwrap();
        assert!(db.load_sync_state().unwrap().last_run_ms.is_none());

        let state = SyncState {
            last_run_ms: Some(1_700_000_000_000),
            last_alert_signature: Some("4:over|7:at-risk".to_string()),
        };
        db.save_sync_state(&state).unwrap();

        let loaded = db.load_sync_state().unwrap();
        assert_eq!(loaded.last_run_ms, Some(1_700_000_000_000));
        assert_eq!(loaded.last_alert_signature.as_deref(), Some("4:over|7:at-risk"));
    }

    #[test]
    fn test_corrupt_state_falls_back_to_defaults() {
        let db = Database::in_memory().unwrap();
        db.set_state(CONFIG_KEY, "{not json").unwrap();
        let config = db.load_config().unwrap();
        assert!(config.api_key.is_none());
    }
}
