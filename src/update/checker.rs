//! GitHub release checker.
//!
//! Queries the releases API once per call (no retries), extracts the latest
//! tag, notes and assets, and compares the tag against the running version.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::update::version::Version;
use serde::Deserialize;
use std::time::Duration;

/// Fallback text when a release has no notes.
const NO_NOTES: &str = "No release notes available";

/// A single downloadable release asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// Asset filename (e.g. `"Beautiful-Flower-Display-1.2.0.dmg"`).
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

/// Latest release metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Raw tag name (e.g. `"v1.2.0"`).
    pub tag_name: String,
    /// Tag with leading `v`s stripped.
    pub version: String,
    /// Free-text release notes (empty if none).
    pub notes: String,
    /// Release page URL, when the API provides one.
    pub html_url: Option<String>,
    /// Assets in API order.
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Deserialize)]
struct ReleasePayload {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Parse a release from the GitHub `releases/latest` JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Parse`] if the body is not valid JSON or has no
    /// `tag_name`.
    pub fn from_json(body: &str) -> Result<Self> {
        let payload: ReleasePayload = serde_json::from_str(body)
            .map_err(|e| UpdateError::Parse(format!("malformed release metadata: {e}")))?;

        let version = payload.tag_name.trim_start_matches('v').to_owned();

        Ok(Self {
            tag_name: payload.tag_name,
            version,
            notes: payload.body.unwrap_or_default(),
            html_url: payload.html_url,
            assets: payload.assets,
        })
    }

    /// First asset whose name ends with `extension` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::AssetNotFound`] if no asset matches.
    pub fn installer_asset(&self, extension: &str) -> Result<&ReleaseAsset> {
        let wanted = extension.to_ascii_lowercase();
        self.assets
            .iter()
            .find(|a| a.name.to_ascii_lowercase().ends_with(&wanted))
            .ok_or_else(|| UpdateError::AssetNotFound {
                tag: self.tag_name.clone(),
                extension: extension.to_owned(),
            })
    }

    /// Release notes cut to at most `max_chars` characters for display.
    pub fn notes_excerpt(&self, max_chars: usize) -> String {
        let notes = self.notes.trim();
        if notes.is_empty() {
            return NO_NOTES.to_owned();
        }
        let mut chars = notes.chars();
        let excerpt: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{excerpt}...")
        } else {
            excerpt
        }
    }
}

/// Result of comparing the latest release against the running version.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// Latest release is not newer than the running version.
    UpToDate {
        /// Running version.
        current: String,
        /// Latest published version.
        latest: String,
    },
    /// A newer release is published.
    UpdateAvailable {
        /// Running version.
        current: String,
        /// The newer release.
        release: Release,
    },
}

/// Fetches release metadata from the configured endpoint.
pub struct UpdateChecker {
    agent: ureq::Agent,
    url: String,
    current_version: String,
}

impl UpdateChecker {
    /// Build a checker from config. The agent enforces the metadata timeout.
    pub fn new(config: &UpdateConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.check_timeout_secs))
            .user_agent(&config.user_agent)
            .build();

        Self {
            agent,
            url: config.releases_url(),
            current_version: config.current_version.clone(),
        }
    }

    /// Fetch the latest release. Blocking; call from a worker thread.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::HttpStatus`] for any status other than 200 (with a
    ///   hint for 404)
    /// - [`UpdateError::Transport`] for network failures
    /// - [`UpdateError::Parse`] for malformed bodies
    pub fn fetch_latest(&self) -> Result<Release> {
        tracing::debug!("fetching release metadata from {}", self.url);

        let resp = match self
            .agent
            .get(&self.url)
            .set("Accept", "application/vnd.github+json")
            .call()
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, _)) => {
                return Err(UpdateError::http_status(status));
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(UpdateError::Transport(t.to_string()));
            }
        };

        if resp.status() != 200 {
            return Err(UpdateError::http_status(resp.status()));
        }

        let body = resp
            .into_string()
            .map_err(|e| UpdateError::Transport(format!("cannot read response body: {e}")))?;

        let release = Release::from_json(&body)?;
        tracing::info!(
            "latest release {} ({} assets)",
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    /// Fetch the latest release and compare it against the running version.
    ///
    /// # Errors
    ///
    /// Propagates fetch errors, and returns [`UpdateError::Parse`] when
    /// either version cannot be parsed.
    pub fn check(&self) -> Result<CheckOutcome> {
        let release = self.fetch_latest()?;
        let latest = Version::parse(&release.version)?;
        let current = Version::parse(&self.current_version)?;

        if latest > current {
            Ok(CheckOutcome::UpdateAvailable {
                current: self.current_version.clone(),
                release,
            })
        } else {
            Ok(CheckOutcome::UpToDate {
                current: self.current_version.clone(),
                latest: release.version,
            })
        }
    }
}
