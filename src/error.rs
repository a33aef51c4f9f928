//! Error types for the bloom update engine.

/// Hint appended to a 404 from the releases endpoint.
pub const NOT_FOUND_HINT: &str = "This usually means:\n\
     • No releases exist yet\n\
     • Repository is private\n\
     • Repository doesn't exist";

/// Top-level error type for update sessions.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Network unreachable, DNS failure, timeout, or connection reset.
    #[error("network error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("{}", http_status_message(.status, .hint))]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Human-readable disambiguation (set for 404).
        hint: Option<String>,
    },

    /// Unparseable version string or malformed release metadata.
    #[error("parse error: {0}")]
    Parse(String),

    /// The release carries no asset with the installer extension.
    #[error("no {extension} installer found in release {tag}")]
    AssetNotFound {
        /// Release tag that was searched.
        tag: String,
        /// Expected installer extension (e.g. `.dmg`).
        extension: String,
    },

    /// Disk image failed to mount, or the volume/bundle was not located.
    #[error("mount error: {0}")]
    Mount(String),

    /// Deleting the old bundle or copying the new one failed.
    #[error("install error: {0}")]
    InstallCopy(String),

    /// Spawning the relaunched bundle or browser failed.
    #[error("launch error: {0}")]
    Launch(String),

    /// Another update session is still running.
    #[error("an update session is already in progress")]
    SessionInProgress,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session channel closed or task aborted.
    #[error("channel error: {0}")]
    Channel(String),
}

impl UpdateError {
    /// Builds an [`UpdateError::HttpStatus`], attaching the 404 hint when relevant.
    pub fn http_status(status: u16) -> Self {
        let hint = (status == 404).then(|| NOT_FOUND_HINT.to_owned());
        Self::HttpStatus { status, hint }
    }
}

fn http_status_message(status: &u16, hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!("request failed (HTTP {status})\n\n{hint}"),
        None => format!("request failed (HTTP {status})"),
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
