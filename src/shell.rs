//! Presentation side of an update session.
//!
//! A front end implements [`UpdateUi`]; [`drive_session`] drains a session's
//! events into it on the caller's thread, so dialogs and progress updates
//! never run on a session worker.

use crate::error::Result;
use crate::progress::ProgressEvent;
use crate::update::orchestrator::SessionHandle;
use crate::update::session::{Notice, SessionEvent, SessionOutcome, SessionState};
use tokio::runtime::Handle;

/// Dialogs and indicators an update session needs.
pub trait UpdateUi {
    /// Ask a yes/no question. Blocks until the user answers.
    fn confirm(&mut self, title: &str, message: &str) -> bool;

    /// Show an informational message.
    fn info(&mut self, title: &str, message: &str);

    /// Show an error message.
    fn error(&mut self, title: &str, message: &str);

    /// Download progress. Ignored by default.
    fn progress(&mut self, _event: &ProgressEvent) {}

    /// State transition. Ignored by default.
    fn state_changed(&mut self, _state: &SessionState) {}
}

fn dispatch(ui: &mut dyn UpdateUi, event: SessionEvent) {
    match event {
        SessionEvent::State(state) => ui.state_changed(&state),
        SessionEvent::Progress(progress) => ui.progress(&progress),
        SessionEvent::Notice(Notice::Info { title, message }) => ui.info(&title, &message),
        SessionEvent::Notice(Notice::Error { title, message }) => ui.error(&title, &message),
        SessionEvent::Confirm(request) => {
            let yes = ui.confirm(&request.title, &request.message);
            if !request.respond(yes) {
                tracing::debug!("update session ended before the answer arrived");
            }
        }
    }
}

/// Feed every event of `handle` to `ui`, then return how the session ended.
///
/// # Errors
///
/// Returns an error if the session task panicked.
pub async fn drive_session(
    mut handle: SessionHandle,
    ui: &mut dyn UpdateUi,
) -> Result<SessionOutcome> {
    while let Some(event) = handle.next_event().await {
        dispatch(ui, event);
    }
    handle.finish().await
}

/// Blocking [`drive_session`] for a plain UI thread outside the runtime.
///
/// # Errors
///
/// Returns an error if the session task panicked.
pub fn drive_session_blocking(
    mut handle: SessionHandle,
    ui: &mut dyn UpdateUi,
    runtime: &Handle,
) -> Result<SessionOutcome> {
    while let Some(event) = handle.blocking_next_event() {
        dispatch(ui, event);
    }
    runtime.block_on(handle.finish())
}
