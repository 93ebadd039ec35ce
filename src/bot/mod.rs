// The bot itself: poll loop, notification processing, broadcast scheduling,
// connection-failure backoff, and the persisted cursor.

pub mod backoff;
pub mod poll;
pub mod processor;
pub mod scheduler;
pub mod store;
pub mod timefmt;

use std::time::Duration;

use crate::config::Config;

/// Minimum spacing enforced between two broadcast announcements, seconds.
pub const HORN_WINDOW_SECS: u64 = 1800;

/// Tunables the bot logic reads on every cycle.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// The meeting link included in every announcement.
    pub announce_link: String,
    /// Idle time between notification polls.
    pub poll_period: Duration,
    /// Minimum spacing between two broadcasts.
    pub horn_window: Duration,
    /// Cap on the connection-failure backoff delay.
    pub backoff_cap: Duration,
}

impl BotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            announce_link: config.jitsi_link.clone(),
            poll_period: Duration::from_secs(config.poll_secs),
            horn_window: Duration::from_secs(HORN_WINDOW_SECS),
            backoff_cap: Duration::from_secs(config.backoff_cap_mins * 60),
        }
    }
}
