//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `progress` - Per-category budget pacing table
//! - `recurring` - Projected recurring charges for a month
//! - `config` - Credential and preference management
//! - `daemon` - One-shot check and the long-running watchdog

pub mod config;
pub mod daemon;
pub mod progress;
pub mod recurring;

// Re-export command functions for main.rs
pub use config::*;
pub use daemon::*;
pub use progress::*;
pub use recurring::*;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};

use paceline_core::{Aggregator, BudgetApi, CacheGateway, Config, Database, ReportingWindow};

/// Open (creating if needed) the local database
pub fn open_db(db_path: &Path) -> Result<Database> {
    Database::open(&db_path.to_string_lossy())
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

/// Stored config with environment overrides applied
pub fn load_config(db: &Database) -> Result<Config> {
    Ok(db.load_config()?.with_env_overrides())
}

pub fn aggregator_for(db: &Database, config: &Config) -> Aggregator {
    let gateway = CacheGateway::new(db.clone());
    Aggregator::new(BudgetApi::from_config(gateway, config))
}

/// Resolve an optional `YYYY-MM` period into a reporting window
pub fn resolve_window(period: Option<&str>, today: NaiveDate) -> Result<ReportingWindow> {
    match period {
        Some(period) => ReportingWindow::from_period(period)
            .ok_or_else(|| anyhow!("Invalid period '{}', expected YYYY-MM", period)),
        None => Ok(ReportingWindow::current_month(today)),
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
