//! Paceline CLI - Budget pacing watchdog
//!
//! Usage:
//!   paceline config set-key TOKEN   Store the Budget API credential
//!   paceline progress               Show this month's budget pacing
//!   paceline recurring              Show recurring charges due this month
//!   paceline daemon                 Run the background watchdog

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Progress { period, json, all } => {
            commands::cmd_progress(&cli.db, period.as_deref(), json, all).await
        }
        Commands::Recurring { period } => {
            commands::cmd_recurring(&cli.db, period.as_deref()).await
        }
        Commands::Config { action } => commands::cmd_config(&cli.db, action),
        Commands::Check => commands::cmd_check(&cli.db).await,
        Commands::Daemon { tick_minutes } => {
            commands::cmd_daemon(&cli.db, tick_minutes).await
        }
    }
}
