//! Background wake execution
//!
//! One wake: load config, classify the current month off summary totals,
//! collapse violations into a deduplicated alert, persist bookkeeping. A
//! wake never propagates errors to the scheduler loop; failures log and the
//! next wake retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use paceline_core::{Aggregator, BudgetApi, CacheGateway, Database, ReportingWindow};

use crate::notify::{alert_signature, compose, LogNotifier, Notifier};

/// Shared state for the daemon's wake runs
pub struct BackgroundContext {
    db: Database,
    notifier: Arc<dyn Notifier>,
    foreground_visible: AtomicBool,
}

impl BackgroundContext {
    pub fn new(db: Database) -> Self {
        Self::with_notifier(db, Arc::new(LogNotifier))
    }

    pub fn with_notifier(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            notifier,
            foreground_visible: AtomicBool::new(false),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Alerts are suppressed while the foreground UI is visible
    pub fn set_foreground_visible(&self, visible: bool) {
        self.foreground_visible.store(visible, Ordering::Relaxed);
    }

    pub fn foreground_visible(&self) -> bool {
        self.foreground_visible.load(Ordering::Relaxed)
    }
}

/// Run one wake at the given local time
///
/// The throttle decision belongs to the caller; this always runs. The wake
/// timestamp is persisted even when the pass fails so a broken upstream is
/// retried on the daily cadence rather than every tick.
pub async fn run_wake(ctx: &BackgroundContext, now: DateTime<Local>) {
    let config = match ctx.db.load_config() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config, skipping wake");
            return;
        }
    };

    if config.api_key.is_none() {
        debug!("No API credential configured, skipping wake");
        return;
    }

    // A disabled wake does nothing at all, the throttle included, so
    // re-enabling notifications mid-day still checks the same day
    if !config.preferences.notifications_enabled {
        debug!("Notifications disabled, skipping wake");
        return;
    }

    let mut sync = ctx.db.load_sync_state().unwrap_or_default();
    sync.last_run_ms = Some(now.timestamp_millis());

    let today = now.date_naive();
    let window = ReportingWindow::current_month(today);
    let gateway = CacheGateway::new(ctx.db.clone());
    let aggregator = Aggregator::new(BudgetApi::from_config(gateway, &config));

    let records = match aggregator
        .summary_progress(window, today, &config.preferences)
        .await
    {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "Budget summary pass failed, will retry next wake");
            persist_sync(ctx, &sync);
            return;
        }
    };

    let violations: Vec<_> = records
        .iter()
        .filter(|r| r.status.is_violation())
        .filter(|r| !config.preferences.is_hidden(r.category_id))
        .collect();

    if violations.is_empty() {
        if sync.last_alert_signature.take().is_some() {
            debug!("All budgets back within limits, clearing alert signature");
        }
        persist_sync(ctx, &sync);
        return;
    }

    let signature = alert_signature(&violations);
    if sync.last_alert_signature.as_deref() == Some(signature.as_str()) {
        debug!(%signature, "Violating set unchanged, suppressing repeat alert");
        persist_sync(ctx, &sync);
        return;
    }

    // The signature is only stored alongside an actual delivery; a
    // foreground-suppressed alert must still fire once the UI goes away
    if ctx.foreground_visible() {
        debug!(%signature, "Foreground visible, suppressing delivery");
    } else if let Some(alert) = compose(&violations) {
        info!(title = %alert.title, count = violations.len(), "Delivering budget alert");
        ctx.notifier.notify(&alert);
        sync.last_alert_signature = Some(signature);
    }
    persist_sync(ctx, &sync);
}

fn persist_sync(ctx: &BackgroundContext, sync: &paceline_core::SyncState) {
    if let Err(err) = ctx.db.save_sync_state(sync) {
        warn!(error = %err, "Failed to persist sync state");
    }
}
