use std::env;
use std::path::PathBuf;

use anyhow::Result;

/// Default notification polling period, in seconds.
pub const DEFAULT_POLL_SECS: u64 = 15;

/// Default cap on the connection-failure backoff delay, in minutes.
pub const DEFAULT_BACKOFF_CAP_MINS: u64 = 15;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    /// Base URI of the Mastodon instance the bot account lives on.
    pub mastodon_instance: String,
    /// User token for the bot account.
    pub mastodon_token: String,
    /// The meeting link appended to every announcement.
    pub jitsi_link: String,
    /// Directory for the persisted cursor file.
    pub storage_dir: PathBuf,
    /// Notification polling period in seconds.
    pub poll_secs: u64,
    /// Cap on the connection-failure backoff delay, in minutes.
    pub backoff_cap_mins: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only the Mastodon instance, token, and meeting link are required,
    /// and only for `run`. Everything else has a default.
    pub fn load() -> Result<Self> {
        let poll_secs = env::var("HORNBOT_POLL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_SECS);

        let backoff_cap_mins = env::var("HORNBOT_BACKOFF_CAP_MINS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BACKOFF_CAP_MINS);

        Ok(Self {
            mastodon_instance: env::var("MASTODON_INSTANCE").unwrap_or_default(),
            mastodon_token: env::var("MASTODON_TOKEN").unwrap_or_default(),
            jitsi_link: env::var("JITSI_LINK").unwrap_or_default(),
            storage_dir: env::var("HORNBOT_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            poll_secs,
            backoff_cap_mins,
        })
    }

    /// Check that the Mastodon credentials are configured.
    /// Call this before any operation that talks to the instance.
    pub fn require_mastodon(&self) -> Result<()> {
        if self.mastodon_instance.is_empty() {
            anyhow::bail!(
                "MASTODON_INSTANCE not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        if self.mastodon_token.is_empty() {
            anyhow::bail!(
                "MASTODON_TOKEN not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the announcement link is configured.
    /// Without it the bot would broadcast an empty invitation.
    pub fn require_link(&self) -> Result<()> {
        if self.jitsi_link.is_empty() {
            anyhow::bail!(
                "JITSI_LINK not set. The bot needs a meeting link to announce.\n\
                 Add it to your .env file."
            );
        }
        Ok(())
    }
}
