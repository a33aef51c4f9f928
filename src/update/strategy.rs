//! How an accepted update is carried out.
//!
//! The orchestrator owns check, compare and prompt; a strategy owns
//! everything after the user says yes.

use crate::config::{StrategyKind, UpdateConfig};
use crate::error::Result;
use crate::update::checker::Release;
use crate::update::download::download_asset;
use crate::update::installer::{BundleInstaller, DiskImageTool};
use crate::update::launch::Launcher;
use crate::update::session::{EventSink, SessionState, UpdateSession};
use std::path::PathBuf;
use std::sync::Arc;

/// What an accepted update led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// The new bundle replaced the installed one; a relaunch is possible.
    Installed {
        /// Installed bundle path.
        bundle: PathBuf,
    },
    /// The release page was opened for the user to install by hand.
    OpenedReleasePage {
        /// URL handed to the browser.
        url: String,
    },
}

/// Carries out an update the user accepted.
pub trait InstallStrategy: Send + Sync {
    /// Closing question of the "update available" dialog.
    fn confirm_prompt(&self) -> &'static str;

    /// Apply `release`. Blocking; runs on a worker thread.
    ///
    /// Implementations record what they learn in `session` and report
    /// transitions through `events`.
    fn apply(
        &self,
        release: &Release,
        session: &mut UpdateSession,
        events: &EventSink,
    ) -> Result<ApplyResult>;
}

/// Download the disk image and replace the installed bundle.
pub struct DirectInstall {
    config: UpdateConfig,
    installer: BundleInstaller,
}

impl DirectInstall {
    /// Strategy for the bundle described by `config`, mounting with `tool`.
    pub fn new(config: &UpdateConfig, tool: Arc<dyn DiskImageTool>) -> Self {
        Self {
            config: config.clone(),
            installer: BundleInstaller::from_config(config, tool),
        }
    }
}

impl InstallStrategy for DirectInstall {
    fn confirm_prompt(&self) -> &'static str {
        "Would you like to download and install the update?"
    }

    fn apply(
        &self,
        release: &Release,
        session: &mut UpdateSession,
        events: &EventSink,
    ) -> Result<ApplyResult> {
        // Fail before any request if the release has nothing to install.
        let asset = release.installer_asset(&self.config.installer_extension)?;
        session.asset_url = Some(asset.browser_download_url.clone());

        let dest = self.config.download_path(&release.version);
        session.download_path = Some(dest.clone());

        events.state(SessionState::Downloading {
            version: release.version.clone(),
        });
        download_asset(
            &asset.browser_download_url,
            &dest,
            &self.config.user_agent,
            &|event| events.progress(event),
        )?;

        events.state(SessionState::Installing {
            version: release.version.clone(),
        });
        let report = self.installer.install(&dest, &release.version)?;
        session.mount_path = Some(report.mount_point);

        Ok(ApplyResult::Installed {
            bundle: report.bundle_path,
        })
    }
}

/// Open the release page in the browser.
pub struct OpenInBrowser {
    config: UpdateConfig,
    launcher: Arc<dyn Launcher>,
}

impl OpenInBrowser {
    /// Strategy that opens release pages through `launcher`.
    pub fn new(config: &UpdateConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config: config.clone(),
            launcher,
        }
    }

    /// Page to open for `release`.
    pub fn page_url(&self, release: &Release) -> String {
        release
            .html_url
            .clone()
            .unwrap_or_else(|| self.config.release_page_url(&release.tag_name))
    }
}

impl InstallStrategy for OpenInBrowser {
    fn confirm_prompt(&self) -> &'static str {
        "Would you like to download the update?"
    }

    fn apply(
        &self,
        release: &Release,
        _session: &mut UpdateSession,
        _events: &EventSink,
    ) -> Result<ApplyResult> {
        let url = self.page_url(release);
        self.launcher.open_url(&url)?;
        Ok(ApplyResult::OpenedReleasePage { url })
    }
}

/// Build the strategy selected by `config.strategy`.
pub fn strategy_for(
    config: &UpdateConfig,
    tool: Arc<dyn DiskImageTool>,
    launcher: Arc<dyn Launcher>,
) -> Arc<dyn InstallStrategy> {
    match config.strategy {
        StrategyKind::DirectInstall => Arc::new(DirectInstall::new(config, tool)),
        StrategyKind::OpenInBrowser => Arc::new(OpenInBrowser::new(config, launcher)),
    }
}
