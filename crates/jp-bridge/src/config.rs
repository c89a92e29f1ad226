// config.rs — Bridge tuning knobs.

use std::time::Duration;

/// Settings for the bridge's capability-availability polling.
///
/// Workspace commands (file-browser navigation, close-all) may not be
/// registered yet when the bridge activates, so callers poll for them at a
/// fixed interval up to a bounded number of attempts before giving up.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Delay between availability checks for a workspace command.
    pub poll_interval: Duration,

    /// Maximum number of availability checks before abandoning the command.
    pub max_poll_attempts: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_poll_attempts: 100,
        }
    }
}
