//! Bloom: the Beautiful Flower Display desktop app and its self-updater.
//!
//! The app ships as a macOS `.app` bundle inside a `.dmg` attached to each
//! GitHub release. This crate keeps the installed bundle current:
//!
//! - **Check**: fetch `releases/latest` and compare versions numerically
//! - **Prompt**: ask through whatever UI drives the session
//! - **Apply**: download and mount the image, replace the bundle, or just
//!   open the release page
//! - **Relaunch**: start the new bundle so the caller can exit
//!
//! # Architecture
//!
//! [`UpdateOrchestrator`] runs each session as a tokio task. Blocking work
//! (HTTP, `hdiutil`, file copies) runs on the blocking pool. The session
//! publishes events on a channel and the UI drains them with
//! [`shell::drive_session`], answering confirmations through oneshot
//! responders.

pub mod bloom_dirs;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod shell;
pub mod update;

pub use config::{BloomConfig, StrategyKind, UpdateConfig};
pub use error::{Result, UpdateError};
pub use progress::ProgressEvent;
pub use shell::UpdateUi;
pub use update::{CheckMode, SessionOutcome, UpdateOrchestrator};
