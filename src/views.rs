//! Presentation consumers
//!
//! A view receives every line and option set. Lines come with a
//! [`CompletionToken`]; the dialogue does not move on until every view has
//! completed its token. Option sets come with an [`OptionSelector`] that any
//! view may use to answer.

use crate::errors::DialogueError;
use crate::runtime::barrier::CompletionToken;
use crate::types::{LocalizedLine, LocalizedOption, OptionId};
use std::sync::Arc;

pub trait DialogueView: Send + Sync {
    fn dialogue_started(&self) {}

    /// Present `line`; complete `on_done` once it is fully shown.
    /// Completing before returning is fine.
    fn run_line(&self, line: &LocalizedLine, on_done: CompletionToken);

    /// The current line's status changed (interrupted, delivered, ended)
    fn line_status_changed(&self, _line: &LocalizedLine) {}

    /// Remove `line` from screen; complete `on_done` when gone
    fn dismiss_line(&self, _line: &LocalizedLine, on_done: CompletionToken) {
        on_done.complete();
    }

    /// Offer options to the player. Views that do not handle options ignore this.
    fn run_options(&self, _options: &[LocalizedOption], _selector: OptionSelector) {}

    fn node_started(&self, _node: &str) {}

    fn node_complete(&self, _node: &str) {}

    fn dialogue_complete(&self) {}
}

type SelectFn = dyn Fn(OptionId) -> Result<(), DialogueError> + Send + Sync;

/// Answers the option set it was issued for. Only the first valid
/// selection is accepted; later calls return [`DialogueError::Misuse`].
#[derive(Clone)]
pub struct OptionSelector {
    select: Arc<SelectFn>,
}

impl OptionSelector {
    pub(crate) fn new<F>(select: F) -> Self
    where
        F: Fn(OptionId) -> Result<(), DialogueError> + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
        }
    }

    pub fn select(&self, id: OptionId) -> Result<(), DialogueError> {
        (self.select)(id)
    }
}

impl std::fmt::Debug for OptionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OptionSelector")
    }
}
