//! Configuration types for bloom and its update engine.

use crate::error::{Result, UpdateError};
use crate::update::version::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    /// Self-update settings.
    pub update: UpdateConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// How an accepted update is carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Download the disk image and replace the installed bundle.
    #[default]
    DirectInstall,
    /// Open the release page and let the user install by hand.
    OpenInBrowser,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectInstall => write!(f, "direct_install"),
            Self::OpenInBrowser => write!(f, "open_in_browser"),
        }
    }
}

/// Self-update configuration.
///
/// Passed by value into the checker and orchestrator; nothing here is
/// process-global.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// GitHub account that owns the release feed.
    pub repo_owner: String,
    /// GitHub repository name.
    pub repo_name: String,
    /// API root; override to point at a mirror or a test server.
    pub api_base: String,
    /// Version of the running app.
    pub current_version: String,
    /// Human-readable app name, also used for the download file name.
    pub app_name: String,
    /// Bundle directory name inside the disk image and the install dir.
    pub bundle_name: String,
    /// Substring identifying the mounted volume in `hdiutil attach` output.
    pub volume_label: String,
    /// Directory the bundle is installed into.
    pub install_dir: PathBuf,
    /// Extension of the installer asset.
    pub installer_extension: String,
    /// Timeout for the release metadata request.
    pub check_timeout_secs: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// How accepted updates are applied.
    pub strategy: StrategyKind,
    /// Minimum hours between silent startup checks (0 = every startup).
    pub startup_check_interval_hours: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo_owner: "stafne".to_owned(),
            repo_name: "test2_update_app".to_owned(),
            api_base: "https://api.github.com".to_owned(),
            current_version: env!("CARGO_PKG_VERSION").to_owned(),
            app_name: "Beautiful Flower Display".to_owned(),
            bundle_name: "Beautiful Flower Display.app".to_owned(),
            volume_label: "Beautiful Flower Display".to_owned(),
            install_dir: PathBuf::from("/Applications"),
            installer_extension: ".dmg".to_owned(),
            check_timeout_secs: 10,
            user_agent: format!("bloom/{} (self-update)", env!("CARGO_PKG_VERSION")),
            strategy: StrategyKind::default(),
            startup_check_interval_hours: 0,
        }
    }
}

impl UpdateConfig {
    /// URL of the "latest release" metadata endpoint.
    pub fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repo_owner,
            self.repo_name
        )
    }

    /// Public release page for a tag, used by the browser strategy when the
    /// release metadata carries no `html_url`.
    pub fn release_page_url(&self, tag: &str) -> String {
        format!(
            "https://github.com/{}/{}/releases/tag/{tag}",
            self.repo_owner, self.repo_name
        )
    }

    /// Temporary download path for a given version, e.g.
    /// `/tmp/Beautiful-Flower-Display-1.2.0.dmg`.
    pub fn download_path(&self, version: &str) -> PathBuf {
        let stem = self.app_name.replace(' ', "-");
        std::env::temp_dir().join(format!("{stem}-{version}{}", self.installer_extension))
    }

    /// Check that the config can drive an update session.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] for empty repository coordinates, a
    /// zero check timeout, an empty installer extension, or an unparseable
    /// current version.
    pub fn validate(&self) -> Result<()> {
        if self.repo_owner.trim().is_empty() || self.repo_name.trim().is_empty() {
            return Err(UpdateError::Config(
                "repo_owner and repo_name must be set".to_owned(),
            ));
        }
        if self.check_timeout_secs == 0 {
            return Err(UpdateError::Config(
                "check_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        if self.installer_extension.trim().is_empty() {
            return Err(UpdateError::Config(
                "installer_extension must not be empty".to_owned(),
            ));
        }
        Version::parse(&self.current_version).map_err(|e| {
            UpdateError::Config(format!(
                "current_version {:?} is invalid: {e}",
                self.current_version
            ))
        })?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub filter: String,
    /// Also write daily log files under the logs directory.
    pub file: bool,
    /// Override for the log directory.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "bloom=info".to_owned(),
            file: false,
            dir: None,
        }
    }
}

impl BloomConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Load the file at `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::bloom_dirs::config_file()
    }
}
