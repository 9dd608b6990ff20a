//! Single-completion resume token for pausing commands
//!
//! Every pausing invocation gets its own [`ResumeHandle`]. The dispatcher
//! arms the handle after the handler returns; a resume that arrives before
//! that point is recorded instead of forwarded, and the dispatcher reports
//! "continue" so the engine is never told to wait for a resume that already
//! happened.

use crate::runtime::barrier::Continuation;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The handler is still running
    Invoking,
    /// The resume arrived while the handler was still running
    ResumedEarly,
    /// The engine was told to wait; the next resume is forwarded
    Armed,
    /// The continuation ran, or was discarded
    Done,
}

struct ResumeState {
    command: String,
    phase: Phase,
    continuation: Option<Continuation>,
}

/// Handle a pausing command uses to let the engine continue.
///
/// Cloning is allowed; whichever clone resumes first wins and the rest are
/// no-ops.
#[derive(Clone)]
pub struct ResumeHandle {
    state: Arc<Mutex<ResumeState>>,
}

impl ResumeHandle {
    pub(crate) fn new(command: impl Into<String>, continuation: Continuation) -> Self {
        Self {
            state: Arc::new(Mutex::new(ResumeState {
                command: command.into(),
                phase: Phase::Invoking,
                continuation: Some(continuation),
            })),
        }
    }

    /// Let the engine continue. Only the first call has any effect.
    pub fn resume(&self) {
        let continuation = {
            let mut state = self.lock();
            match state.phase {
                Phase::Invoking => {
                    log::debug!("command '{}' resumed before it paused", state.command);
                    state.phase = Phase::ResumedEarly;
                    None
                }
                Phase::Armed => {
                    log::debug!("command '{}' resumed", state.command);
                    state.phase = Phase::Done;
                    state.continuation.take()
                }
                Phase::ResumedEarly | Phase::Done => {
                    log::debug!("command '{}' resumed more than once; ignoring", state.command);
                    None
                }
            }
        };

        if let Some(continuation) = continuation {
            continuation();
        }
    }

    /// Resume once `future` finishes, running it on the ambient tokio runtime.
    ///
    /// Without a runtime the future cannot be driven, so the command is
    /// abandoned and the engine resumed straight away.
    pub fn resume_after<F>(self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    future.await;
                    self.resume();
                });
            }
            Err(_) => {
                log::error!(
                    "command '{}' needs a tokio runtime to run; resuming without it",
                    self.lock().command
                );
                self.resume();
            }
        }
    }

    pub fn is_resumed(&self) -> bool {
        matches!(self.lock().phase, Phase::ResumedEarly | Phase::Done)
    }

    /// Called by the dispatcher once the handler has returned.
    /// Returns true if the engine must wait for a later `resume`.
    pub(crate) fn arm(&self) -> bool {
        let mut state = self.lock();
        match state.phase {
            Phase::Invoking => {
                state.phase = Phase::Armed;
                true
            }
            Phase::ResumedEarly => {
                state.phase = Phase::Done;
                state.continuation = None;
                false
            }
            Phase::Armed | Phase::Done => false,
        }
    }

    /// Discard the handle without ever resuming through it
    pub(crate) fn abandon(&self) {
        let mut state = self.lock();
        state.phase = Phase::Done;
        state.continuation = None;
    }

    fn lock(&self) -> MutexGuard<'_, ResumeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ResumeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResumeHandle")
            .field("command", &state.command)
            .field("phase", &state.phase)
            .finish()
    }
}
