//! Centralized application directory paths for bloom.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/bloom/` | `~/.local/share/bloom/` |
//! | Config | `~/Library/Application Support/bloom/` | `~/.config/bloom/` |
//!
//! # Environment Overrides
//!
//! - `BLOOM_DATA_DIR` overrides [`data_dir`]
//! - `BLOOM_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the update state file and logs. Resolves to
/// `dirs::data_dir()/bloom/` unless `BLOOM_DATA_DIR` is set.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("BLOOM_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("bloom"))
        .unwrap_or_else(|| PathBuf::from("/tmp/bloom-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("BLOOM_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("bloom"))
        .unwrap_or_else(|| PathBuf::from("/tmp/bloom-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Update state file path (`data_dir()/update-state.json`).
#[must_use]
pub fn update_state_file() -> PathBuf {
    data_dir().join("update-state.json")
}
