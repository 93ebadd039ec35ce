// Persisted cursor: one small JSON blob, rewritten wholesale.
//
// Correctness does not depend on perfect durability: a lost write means a
// replayed notification batch, which the horn-window rule and cursor
// comparison absorb. So reads fall back to defaults and writes are
// best-effort, logged but never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// File name inside the configured storage directory.
const STORE_FILE: &str = "hornbot.storage";

fn default_reset_period() -> u64 {
    300
}

/// The bot's durable state: last processed notification, last broadcast
/// time, and the learned API reset period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Opaque id of the last notification processed ("" = none yet).
    #[serde(default)]
    pub last_note_id: String,
    /// Epoch seconds of the last completed broadcast (0 = never).
    #[serde(default)]
    pub last_horn_time: i64,
    /// Mean observed rate-limit reset period, seconds.
    #[serde(default = "default_reset_period")]
    pub api_reset_period: u64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            last_note_id: String::new(),
            last_horn_time: 0,
            api_reset_period: default_reset_period(),
        }
    }
}

/// Reads and rewrites the cursor file.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            path: storage_dir.join(STORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cursor, falling back to defaults on a missing or corrupt
    /// file. Never fails.
    pub fn load(&self) -> Cursor {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => {
                info!(path = %self.path.display(), "no stored state; starting fresh");
                return Cursor::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "stored state unreadable; starting fresh"
                );
                Cursor::default()
            }
        }
    }

    /// Rewrite the whole file. A failure is logged and swallowed;
    /// in-memory state continues to govern behavior.
    pub fn save(&self, cursor: &Cursor) {
        let json = match serde_json::to_string(cursor) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize state");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            error!(
                path = %self.path.display(),
                error = %e,
                "failed to persist state"
            );
        }
    }
}
