//! Session state, events, and the channel that carries them to the UI.
//!
//! A session never touches UI code directly. It publishes [`SessionEvent`]s
//! on an unbounded channel; the presentation layer drains that channel on its
//! own thread and answers confirmations through a oneshot responder.

use crate::progress::ProgressEvent;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Whether the user asked for this check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Startup check: check-phase results and errors stay invisible.
    Silent,
    /// Manual check: every result is reported.
    Verbose,
}

impl CheckMode {
    /// Returns `true` for [`CheckMode::Verbose`].
    pub fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

/// Lifecycle of one update session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Fetching release metadata.
    Checking,
    /// Latest release is not newer than the running version.
    NoUpdate {
        /// Running version.
        current: String,
    },
    /// A newer version is published; waiting for the user.
    UpdateAvailable {
        /// Running version.
        current: String,
        /// Published version.
        latest: String,
    },
    /// The user declined the update.
    Declined,
    /// The installer image is being fetched.
    Downloading {
        /// Version being downloaded.
        version: String,
    },
    /// The bundle is being replaced.
    Installing {
        /// Version being installed.
        version: String,
    },
    /// The new bundle is in place.
    Installed {
        /// Installed version.
        version: String,
        /// Installed bundle path.
        bundle: PathBuf,
    },
    /// The session stopped on an error.
    Failed {
        /// Human-readable cause.
        message: String,
    },
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "checking"),
            Self::NoUpdate { current } => write!(f, "up to date ({current})"),
            Self::UpdateAvailable { current, latest } => {
                write!(f, "update available ({current} -> {latest})")
            }
            Self::Declined => write!(f, "declined"),
            Self::Downloading { version } => write!(f, "downloading {version}"),
            Self::Installing { version } => write!(f, "installing {version}"),
            Self::Installed { version, .. } => write!(f, "installed {version}"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Everything a single session learns on its way through the state machine.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    /// How the session was triggered.
    pub mode: CheckMode,
    /// Running version.
    pub current_version: String,
    /// Latest published version, once fetched.
    pub latest_version: Option<String>,
    /// Installer asset URL, once selected.
    pub asset_url: Option<String>,
    /// Local path of the downloaded image.
    pub download_path: Option<PathBuf>,
    /// Where the image was mounted during install.
    pub mount_path: Option<PathBuf>,
}

impl UpdateSession {
    /// Fresh session for `current_version`.
    pub fn new(mode: CheckMode, current_version: impl Into<String>) -> Self {
        Self {
            mode,
            current_version: current_version.into(),
            latest_version: None,
            asset_url: None,
            download_path: None,
            mount_path: None,
        }
    }
}

/// A modal, non-question message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Informational message.
    Info {
        /// Dialog title.
        title: String,
        /// Dialog body.
        message: String,
    },
    /// Error message.
    Error {
        /// Dialog title.
        title: String,
        /// Dialog body.
        message: String,
    },
}

/// A yes/no question for the user.
///
/// Dropping the request without answering counts as "no".
#[derive(Debug)]
pub struct ConfirmRequest {
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub message: String,
    respond_to: oneshot::Sender<bool>,
}

impl ConfirmRequest {
    /// Answer the question.
    ///
    /// Returns `true` if the answer reached the waiting session.
    pub fn respond(self, yes: bool) -> bool {
        self.respond_to.send(yes).is_ok()
    }
}

/// Messages from a running session to the presentation layer.
#[derive(Debug)]
pub enum SessionEvent {
    /// State machine transition.
    State(SessionState),
    /// The session needs a yes/no answer before continuing.
    Confirm(ConfirmRequest),
    /// Something the user should read.
    Notice(Notice),
    /// Installer download progress.
    Progress(ProgressEvent),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Silent check skipped because the last check is recent.
    Skipped,
    /// No newer version.
    UpToDate,
    /// The user said no.
    Declined,
    /// The release page was opened for a manual install.
    OpenedReleasePage {
        /// URL handed to the browser.
        url: String,
    },
    /// The new bundle is installed; the running app keeps going.
    Installed {
        /// Installed version.
        version: String,
        /// Installed bundle path.
        bundle: PathBuf,
    },
    /// The new bundle was started; the caller should exit now.
    Relaunched {
        /// Started bundle path.
        bundle: PathBuf,
    },
    /// The session stopped on an error.
    Failed {
        /// Human-readable cause.
        message: String,
    },
}

/// Sending half of a session's event channel.
///
/// Sends never block and are dropped silently once the UI stops listening.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Create a sink and the matching receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish a state transition.
    pub fn state(&self, state: SessionState) {
        tracing::debug!("update session: {state}");
        let _ = self.tx.send(SessionEvent::State(state));
    }

    /// Publish download progress.
    pub fn progress(&self, event: ProgressEvent) {
        let _ = self.tx.send(SessionEvent::Progress(event));
    }

    /// Show an informational notice.
    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        let _ = self.tx.send(SessionEvent::Notice(Notice::Info {
            title: title.into(),
            message: message.into(),
        }));
    }

    /// Show an error notice.
    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        let _ = self.tx.send(SessionEvent::Notice(Notice::Error {
            title: title.into(),
            message: message.into(),
        }));
    }

    /// Ask a yes/no question and wait for the answer.
    ///
    /// Returns `false` if the UI is gone or drops the request.
    pub async fn confirm(&self, title: impl Into<String>, message: impl Into<String>) -> bool {
        let (respond_to, answer) = oneshot::channel();
        let request = ConfirmRequest {
            title: title.into(),
            message: message.into(),
            respond_to,
        };
        if self.tx.send(SessionEvent::Confirm(request)).is_err() {
            tracing::warn!("update UI is gone; treating confirmation as declined");
            return false;
        }
        answer.await.unwrap_or(false)
    }
}
