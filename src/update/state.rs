//! Update state persistence.
//!
//! Tracks when the last check ran and what it saw, so silent startup checks
//! can be throttled. Persisted to `data_dir()/update-state.json`.

use crate::error::{Result, UpdateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persistent update state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateState {
    /// When the last completed update check ran.
    pub last_check: Option<DateTime<Utc>>,
    /// Latest published version seen by that check.
    pub last_seen_version: Option<String>,
}

impl UpdateState {
    /// Load state from `path`. Returns the default state if the file is
    /// missing or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => return Self::default(),
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable update state {}: {e}", path.display());
            Self::default()
        })
    }

    /// Persist the state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UpdateError::Config(format!("cannot serialize update state: {e}")))?;

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Record a completed check at the current time.
    pub fn mark_checked(&mut self, latest_version: Option<&str>) {
        self.last_check = Some(Utc::now());
        if let Some(v) = latest_version {
            self.last_seen_version = Some(v.to_owned());
        }
    }

    /// Returns `true` if the last check was at least `hours` hours ago, or
    /// no check has been recorded. A zero interval is always stale.
    pub fn check_is_stale(&self, hours: u64) -> bool {
        if hours == 0 {
            return true;
        }
        let Some(last) = self.last_check else {
            return true;
        };
        let elapsed = Utc::now().signed_duration_since(last);
        elapsed.num_hours() >= i64::try_from(hours).unwrap_or(i64::MAX)
    }
}
