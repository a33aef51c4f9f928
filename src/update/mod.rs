//! Self-update system for Beautiful Flower Display.
//!
//! Checks the latest GitHub release, compares it with the running version,
//! asks the user, then either replaces the installed bundle from the release's
//! disk image or opens the release page. Sessions run on the tokio runtime and
//! talk to the UI only through their event channel.

pub mod checker;
pub mod download;
pub mod installer;
pub mod launch;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod strategy;
pub mod version;

pub use checker::{CheckOutcome, Release, ReleaseAsset, UpdateChecker};
pub use installer::{BundleInstaller, DiskImageTool, Hdiutil, InstallReport};
pub use launch::{Launcher, SystemLauncher, was_just_updated};
pub use orchestrator::{SessionHandle, UpdateOrchestrator};
pub use session::{
    CheckMode, ConfirmRequest, EventSink, Notice, SessionEvent, SessionOutcome, SessionState,
    UpdateSession,
};
pub use state::UpdateState;
pub use strategy::{ApplyResult, DirectInstall, InstallStrategy, OpenInBrowser, strategy_for};
pub use version::{Version, is_newer};
