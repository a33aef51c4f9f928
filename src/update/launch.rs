//! Spawning the relaunched bundle and the system browser.

use crate::error::{Result, UpdateError};
use std::path::Path;
use std::process::{Command, Stdio};

/// Starts external processes on behalf of an update session.
pub trait Launcher: Send + Sync {
    /// Open `url` in the default browser.
    fn open_url(&self, url: &str) -> Result<()>;

    /// Start the installed bundle as an independent process.
    fn relaunch(&self, bundle: &Path) -> Result<()>;
}

/// [`Launcher`] backed by the platform's `open`-style commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn spawn_detached(cmd: &mut Command, what: &str) -> Result<()> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| UpdateError::Launch(format!("cannot start {what}: {e}")))
    }
}

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) -> Result<()> {
        tracing::info!("opening {url}");
        #[cfg(target_os = "macos")]
        let mut cmd = {
            let mut c = Command::new("open");
            c.arg(url);
            c
        };
        #[cfg(target_os = "windows")]
        let mut cmd = {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        };
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let mut cmd = {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };
        Self::spawn_detached(&mut cmd, "browser")
    }

    fn relaunch(&self, bundle: &Path) -> Result<()> {
        tracing::info!("relaunching {}", bundle.display());
        #[cfg(target_os = "macos")]
        let mut cmd = {
            let mut c = Command::new("open");
            c.arg("-n").arg(bundle).arg("--args");
            c
        };
        #[cfg(not(target_os = "macos"))]
        let mut cmd = Command::new(bundle);
        cmd.arg("--updated");
        Self::spawn_detached(&mut cmd, &bundle.display().to_string())
    }
}

/// Check if the app was just relaunched after an update.
pub fn was_just_updated() -> bool {
    std::env::args().any(|a| a == "--updated")
}
