//! Update session orchestration.
//!
//! Sequences check → prompt → apply → relaunch for one session at a time.
//! Each session runs as a tokio task; network and disk work go through
//! `spawn_blocking`, and everything the user must see is published on the
//! session's event channel instead of being shown from the worker.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::update::checker::{CheckOutcome, UpdateChecker};
use crate::update::installer::Hdiutil;
use crate::update::launch::{Launcher, SystemLauncher};
use crate::update::session::{
    CheckMode, EventSink, SessionEvent, SessionOutcome, SessionState, UpdateSession,
};
use crate::update::state::UpdateState;
use crate::update::strategy::{ApplyResult, InstallStrategy, strategy_for};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Characters of release notes shown in the confirmation dialog.
pub const NOTES_EXCERPT_CHARS: usize = 200;

/// Clears the busy flag when a session task ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A running session: its event stream and its completion.
pub struct SessionHandle {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Next event, or `None` once the session has finished.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Blocking variant of [`Self::next_event`] for a non-async UI thread.
    ///
    /// Must not be called from inside the tokio runtime.
    pub fn blocking_next_event(&mut self) -> Option<SessionEvent> {
        self.events.blocking_recv()
    }

    /// Wait for the session to end.
    ///
    /// Undelivered events are discarded; pending confirmations count as "no".
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Channel`] if the session task panicked.
    pub async fn finish(self) -> Result<SessionOutcome> {
        let Self { events, task } = self;
        drop(events);
        task.await
            .map_err(|e| UpdateError::Channel(format!("update session task failed: {e}")))
    }
}

#[derive(Clone)]
struct SessionContext {
    config: UpdateConfig,
    strategy: Arc<dyn InstallStrategy>,
    launcher: Arc<dyn Launcher>,
    state_file: Option<PathBuf>,
}

/// Runs update sessions, rejecting a new one while another is in flight.
pub struct UpdateOrchestrator {
    ctx: SessionContext,
    runtime: Handle,
    busy: Arc<AtomicBool>,
}

impl UpdateOrchestrator {
    /// Create an orchestrator with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if `config` fails validation.
    pub fn new(
        config: UpdateConfig,
        strategy: Arc<dyn InstallStrategy>,
        launcher: Arc<dyn Launcher>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ctx: SessionContext {
                config,
                strategy,
                launcher,
                state_file: None,
            },
            runtime,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Orchestrator using `hdiutil` and the system launcher, with the
    /// strategy selected in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if `config` fails validation.
    pub fn from_config(config: UpdateConfig, runtime: Handle) -> Result<Self> {
        let launcher: Arc<dyn Launcher> = Arc::new(SystemLauncher);
        let strategy = strategy_for(&config, Arc::new(Hdiutil), Arc::clone(&launcher));
        Self::new(config, strategy, launcher, runtime)
    }

    /// Persist check timestamps to `path` and throttle silent checks with them.
    #[must_use]
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ctx.state_file = Some(path.into());
        self
    }

    /// Configuration sessions run with.
    pub fn config(&self) -> &UpdateConfig {
        &self.ctx.config
    }

    /// Returns `true` while a session is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a session.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::SessionInProgress`] if a session is running.
    pub fn start(&self, mode: CheckMode) -> Result<SessionHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("update check requested while a session is running");
            return Err(UpdateError::SessionInProgress);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let (sink, events) = EventSink::channel();
        let ctx = self.ctx.clone();
        let task = self.runtime.spawn(async move {
            let _guard = guard;
            run_session(ctx, mode, sink).await
        });

        Ok(SessionHandle { events, task })
    }
}

async fn run_session(ctx: SessionContext, mode: CheckMode, events: EventSink) -> SessionOutcome {
    let mut session = UpdateSession::new(mode, ctx.config.current_version.clone());

    if mode == CheckMode::Silent && ctx.checked_recently().await {
        tracing::debug!("skipping startup update check; last check is recent");
        return SessionOutcome::Skipped;
    }

    events.state(SessionState::Checking);
    let checker = UpdateChecker::new(&ctx.config);
    let checked = match tokio::task::spawn_blocking(move || checker.check()).await {
        Ok(result) => result,
        Err(e) => Err(UpdateError::Channel(format!("update check task failed: {e}"))),
    };

    let outcome = match checked {
        Ok(outcome) => outcome,
        Err(e) => return check_failed(&events, mode, &e),
    };

    let release = match outcome {
        CheckOutcome::UpToDate { current, latest } => {
            ctx.record_check(&latest).await;
            events.state(SessionState::NoUpdate {
                current: current.clone(),
            });
            if mode.is_verbose() {
                events.info(
                    "No Updates",
                    format!("You're running the latest version ({current})"),
                );
            }
            return SessionOutcome::UpToDate;
        }
        CheckOutcome::UpdateAvailable { release, .. } => release,
    };

    ctx.record_check(&release.version).await;
    session.latest_version = Some(release.version.clone());
    events.state(SessionState::UpdateAvailable {
        current: session.current_version.clone(),
        latest: release.version.clone(),
    });

    let message = format!(
        "A new version of {app} is available!\n\n\
         Current version: {current}\n\
         Latest version: {latest}\n\n\
         Release Notes:\n{notes}\n\n\
         {prompt}",
        app = ctx.config.app_name,
        current = session.current_version,
        latest = release.version,
        notes = release.notes_excerpt(NOTES_EXCERPT_CHARS),
        prompt = ctx.strategy.confirm_prompt(),
    );
    if !events.confirm("Update Available", message).await {
        tracing::info!("update to {} declined", release.version);
        events.state(SessionState::Declined);
        return SessionOutcome::Declined;
    }

    let version = release.version.clone();
    let strategy = Arc::clone(&ctx.strategy);
    let sink = events.clone();
    let applied = tokio::task::spawn_blocking(move || {
        let result = strategy.apply(&release, &mut session, &sink);
        (session, result)
    })
    .await;

    let (session, result) = match applied {
        Ok(pair) => pair,
        Err(e) => {
            let err = UpdateError::Channel(format!("update task failed: {e}"));
            return apply_failed(&events, &err);
        }
    };
    tracing::debug!(?session, "update session applied");

    match result {
        Err(e) => apply_failed(&events, &e),
        Ok(ApplyResult::OpenedReleasePage { url }) => SessionOutcome::OpenedReleasePage { url },
        Ok(ApplyResult::Installed { bundle }) => {
            events.state(SessionState::Installed {
                version: version.clone(),
                bundle: bundle.clone(),
            });
            let message = format!(
                "Update to version {version} has been installed successfully!\n\n\
                 The new version has been installed to {}\n\n\
                 Would you like to quit and launch the new version?",
                bundle.display()
            );
            if !events.confirm("Update Installed", message).await {
                return SessionOutcome::Installed { version, bundle };
            }
            match ctx.launcher.relaunch(&bundle) {
                Ok(()) => SessionOutcome::Relaunched { bundle },
                Err(e) => {
                    events.error("Relaunch Failed", e.to_string());
                    SessionOutcome::Installed { version, bundle }
                }
            }
        }
    }
}

impl SessionContext {
    /// Whether the persisted last check is newer than the startup interval.
    async fn checked_recently(&self) -> bool {
        let Some(path) = self.state_file.clone() else {
            return false;
        };
        let hours = self.config.startup_check_interval_hours;
        tokio::task::spawn_blocking(move || !UpdateState::load(&path).check_is_stale(hours))
            .await
            .unwrap_or(false)
    }

    async fn record_check(&self, latest: &str) {
        let Some(path) = self.state_file.clone() else {
            return;
        };
        let latest = latest.to_owned();
        let saved = tokio::task::spawn_blocking(move || {
            let mut state = UpdateState::load(&path);
            state.mark_checked(Some(&latest));
            state.save(&path)
        })
        .await;
        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("cannot save update state: {e}"),
            Err(e) => tracing::warn!("update state task failed: {e}"),
        }
    }
}

fn check_failed(events: &EventSink, mode: CheckMode, err: &UpdateError) -> SessionOutcome {
    let message = err.to_string();
    events.state(SessionState::Failed {
        message: message.clone(),
    });
    if mode.is_verbose() {
        tracing::error!("update check failed: {err}");
        events.error(
            "Update Check Failed",
            format!("Failed to check for updates: {message}"),
        );
    } else {
        tracing::warn!("startup update check failed: {err}");
    }
    SessionOutcome::Failed { message }
}

/// Failures after the user accepted are always shown, whatever the mode.
fn apply_failed(events: &EventSink, err: &UpdateError) -> SessionOutcome {
    let message = err.to_string();
    tracing::error!("update failed: {err}");
    events.state(SessionState::Failed {
        message: message.clone(),
    });
    let (title, lead) = match err {
        UpdateError::Mount(_) | UpdateError::InstallCopy(_) => {
            ("Installation Failed", "Installation failed")
        }
        UpdateError::Launch(_) => ("Update Failed", "Could not open the release page"),
        _ => ("Download Failed", "Download failed"),
    };
    events.error(title, format!("{lead}: {message}"));
    SessionOutcome::Failed { message }
}
