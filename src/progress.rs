//! Progress event types for the installer download.
//!
//! Provides callback-based progress reporting that decouples the download
//! loop from presentation (CLI indicatif bar vs. a GUI progress window).

/// Progress events emitted while an installer image is downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The download has started.
    DownloadStarted {
        /// Asset filename.
        filename: String,
        /// Total size in bytes, if the server sent `Content-Length`.
        total_bytes: Option<u64>,
    },

    /// Download progress update.
    DownloadProgress {
        /// Bytes written so far.
        bytes_downloaded: u64,
        /// Total size in bytes, if known.
        total_bytes: Option<u64>,
    },

    /// The download finished and the file is complete on disk.
    DownloadComplete {
        /// Bytes written.
        bytes_downloaded: u64,
    },
}

impl ProgressEvent {
    /// Fraction complete in `0.0..=1.0`, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::DownloadProgress {
                bytes_downloaded,
                total_bytes: Some(total),
            } if *total > 0 => Some((*bytes_downloaded as f64 / *total as f64).min(1.0)),
            Self::DownloadComplete { .. } => Some(1.0),
            _ => None,
        }
    }
}
