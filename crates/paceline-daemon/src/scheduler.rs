//! Wake scheduling and throttling
//!
//! The loop ticks every 30 minutes and asks [`should_run_now`] whether a
//! wake is due: at most once per calendar day, not before 8am local, with a
//! 36 hour hard ceiling since the previous run. A short bootstrap timer
//! covers hosts that start the daemon after the day's tick would have fired.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Timelike};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::channel::ControlMessage;
use crate::worker::{run_wake, BackgroundContext};

/// Hard ceiling between wakes, in milliseconds
const MAX_WAKE_GAP_MS: i64 = 36 * 60 * 60 * 1000;

/// No daily wake before this local hour
const EARLIEST_DAILY_HOUR: u32 = 8;

/// Default loop tick; hosts can override it per run
pub const DEFAULT_TICK: Duration = Duration::from_secs(30 * 60);

const BOOTSTRAP_DELAY: Duration = Duration::from_secs(20);

/// Decide whether a wake is due at `now`
///
/// A missing last-run always runs. Otherwise the daily rule applies: a
/// different calendar day and at least 8am local. Crossing the 36 hour
/// ceiling runs regardless of the hour, so a machine that only wakes at
/// night still alerts.
pub fn should_run_now(last_run_ms: Option<i64>, now: DateTime<Local>) -> bool {
    let Some(last_ms) = last_run_ms else {
        return true;
    };
    if now.timestamp_millis() - last_ms >= MAX_WAKE_GAP_MS {
        return true;
    }
    let Some(last) = Local.timestamp_millis_opt(last_ms).single() else {
        return true;
    };
    last.date_naive() != now.date_naive() && now.hour() >= EARLIEST_DAILY_HOUR
}

/// Drive the daemon until shutdown
///
/// Reacts to periodic `tick`s, a one-shot bootstrap timer, and control
/// messages. A dropped control channel stops the loop like a shutdown.
/// `CheckNow` deliberately skips the throttle: an explicit request means
/// the user wants a fresh answer, not "already checked today".
pub async fn run_scheduler(
    ctx: Arc<BackgroundContext>,
    mut control: mpsc::Receiver<ControlMessage>,
    tick: Duration,
) {
    info!(
        tick_minutes = tick.as_secs() / 60,
        "Starting budget watchdog scheduler"
    );

    let mut ticker = interval(tick);
    // The immediate first tick; the bootstrap timer handles startup
    ticker.tick().await;

    let bootstrap = tokio::time::sleep(BOOTSTRAP_DELAY);
    tokio::pin!(bootstrap);
    let mut bootstrapped = false;

    loop {
        tokio::select! {
            _ = &mut bootstrap, if !bootstrapped => {
                bootstrapped = true;
                maybe_wake(&ctx).await;
            }
            _ = ticker.tick() => {
                maybe_wake(&ctx).await;
            }
            msg = control.recv() => match msg {
                Some(ControlMessage::CheckNow) => {
                    info!("Manual check requested");
                    run_wake(&ctx, Local::now()).await;
                }
                Some(ControlMessage::ConfigUpdate(config)) => {
                    if let Err(err) = ctx.db().save_config(&config) {
                        warn!(error = %err, "Failed to persist config update");
                    }
                }
                Some(ControlMessage::ForegroundVisible(visible)) => {
                    ctx.set_foreground_visible(visible);
                }
                Some(ControlMessage::Shutdown) | None => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }
}

async fn maybe_wake(ctx: &BackgroundContext) {
    let last_run_ms = match ctx.db().load_sync_state() {
        Ok(state) => state.last_run_ms,
        Err(err) => {
            warn!(error = %err, "Failed to load sync state, running anyway");
            None
        }
    };

    let now = Local::now();
    if should_run_now(last_run_ms, now) {
        run_wake(ctx, now).await;
    } else {
        debug!("Wake throttled");
    }
}
