//! Control channel into the scheduler loop
//!
//! The host process steers the daemon with typed messages instead of
//! sharing mutable state: config changes, manual check requests, and
//! foreground visibility all arrive over one mpsc channel.

use paceline_core::Config;
use tokio::sync::mpsc;

/// Messages the scheduler loop reacts to
#[derive(Debug)]
pub enum ControlMessage {
    /// Persist a new config; takes effect on the next wake
    ConfigUpdate(Config),
    /// Run a wake immediately, bypassing the once-daily throttle
    CheckNow,
    /// The foreground UI became visible (true) or hidden (false)
    ForegroundVisible(bool),
    /// Stop the scheduler loop
    Shutdown,
}

/// Build the control channel pair
pub fn control_channel() -> (mpsc::Sender<ControlMessage>, mpsc::Receiver<ControlMessage>) {
    mpsc::channel(16)
}
