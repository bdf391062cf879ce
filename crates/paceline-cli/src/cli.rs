//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Paceline - Know where your budgets are heading before month end
#[derive(Parser)]
#[command(name = "paceline")]
#[command(about = "Budget pacing watchdog", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (config, sync state, response cache)
    #[arg(long, default_value = "paceline.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show per-category budget progress for a month
    Progress {
        /// Reporting month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        period: Option<String>,

        /// Emit JSON instead of the table
        #[arg(long)]
        json: bool,

        /// Include categories hidden via 'config hide'
        #[arg(long)]
        all: bool,
    },

    /// List recurring charges projected into a month
    Recurring {
        /// Reporting month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        period: Option<String>,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run one watchdog wake immediately, bypassing the daily throttle
    Check,

    /// Run the background watchdog until interrupted
    Daemon {
        /// Minutes between throttle checks
        #[arg(long, default_value = "30")]
        tick_minutes: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,

    /// Store the Budget API credential
    SetKey {
        /// API token (also settable via PACELINE_API_KEY)
        key: String,
    },

    /// Override the Budget API base URL
    SetUrl { url: String },

    /// Set the fallback display currency
    SetCurrency { currency: String },

    /// Set the at-risk warning ratio (0..1)
    SetWarnAt { ratio: f64 },

    /// Turn alert notifications on or off
    Notifications {
        /// "on" or "off"
        state: String,
    },

    /// Mute alerts for a category
    Hide { category_id: i64 },

    /// Unmute alerts for a category
    Unhide { category_id: i64 },
}
