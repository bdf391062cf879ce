//! Paceline background daemon
//!
//! Periodically wakes, classifies the current month's budgets off summary
//! totals, and raises a deduplicated alert notification when categories are
//! over budget or at risk. Wakes are throttled to at most once per day
//! (after 8am local) with a 36 hour hard ceiling between runs.

pub mod channel;
pub mod notify;
pub mod scheduler;
pub mod worker;

pub use channel::{control_channel, ControlMessage};
pub use notify::{AlertNotification, LogNotifier, Notifier};
pub use scheduler::{run_scheduler, should_run_now, DEFAULT_TICK};
pub use worker::BackgroundContext;
