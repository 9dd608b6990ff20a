//! The seam between the script engine and the orchestrator

use crate::errors::DialogueError;
use crate::host::functions::FunctionLibrary;
use crate::host::variables::VariableStorage;
use crate::types::{Command, Line, NextAction, OptionId, OptionSet};
use std::sync::Arc;

/// Entry points the orchestrator calls on the script engine
pub trait ScriptEngine: Send + Sync {
    /// Run until the next event that returns [`NextAction::Wait`].
    /// May be called from inside an event handler.
    fn continue_dialogue(&self);

    /// Record the player's choice for the pending option set
    fn set_selected_option(&self, id: OptionId);

    /// Position the engine at the start of `node`
    fn set_node(&self, node: &str) -> Result<(), DialogueError>;

    /// Halt execution. Must not emit a dialogue-complete event.
    fn stop(&self);

    fn node_exists(&self, node: &str) -> bool;

    fn current_node(&self) -> Option<String>;

    /// Hand the engine the host's variable storage and function library.
    /// Called before every start; engines without expressions ignore it.
    fn bind_library(
        &self,
        _variables: Arc<dyn VariableStorage>,
        _functions: Arc<FunctionLibrary>,
    ) {
    }
}

/// Events the script engine delivers, one at a time
pub trait DialogueEventHandler: Send + Sync {
    fn on_line(&self, line: Line) -> NextAction;

    fn on_options(&self, options: OptionSet) -> NextAction;

    fn on_command(&self, command: Command) -> NextAction;

    fn on_node_start(&self, node: &str) -> NextAction;

    fn on_node_complete(&self, node: &str) -> NextAction;

    fn on_dialogue_complete(&self) -> NextAction;
}
