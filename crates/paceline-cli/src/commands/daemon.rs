//! Watchdog commands

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tracing::info;

use paceline_daemon::{control_channel, run_scheduler, worker, BackgroundContext, ControlMessage};

use super::open_db;

/// Run a single wake now, ignoring the daily throttle
pub async fn cmd_check(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    let ctx = BackgroundContext::new(db);
    worker::run_wake(&ctx, Local::now()).await;
    Ok(())
}

/// Run the scheduler loop until Ctrl-C
pub async fn cmd_daemon(db_path: &Path, tick_minutes: u64) -> Result<()> {
    let db = open_db(db_path)?;
    let ctx = Arc::new(BackgroundContext::new(db));
    let (tx, rx) = control_channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping watchdog");
            let _ = tx.send(ControlMessage::Shutdown).await;
        }
    });

    let tick = Duration::from_secs(tick_minutes.max(1) * 60);
    run_scheduler(ctx, rx, tick).await;
    Ok(())
}
