//! Error types for command resolution and dialogue orchestration
//!
//! Nothing here aborts the orchestrator. Command errors are logged and the
//! dispatch resolves to a continue; dialogue errors are returned to the host.

use crate::types::line::LineStatus;
use crate::types::option::OptionId;
use thiserror::Error;

/// Errors raised while registering or dispatching a command
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("'{name}' is already registered")]
    DuplicateRegistration { name: String },

    #[error("command '{name}' is declared by both {kept} and {dropped}; keeping {kept}")]
    InitializationCollision {
        name: String,
        kept: String,
        dropped: String,
    },

    #[error("command '{command}': no entity named '{entity}'")]
    EntityNotFound { command: String, entity: String },

    #[error("command '{command}': entity '{entity}' has no {component} component")]
    ComponentNotFound {
        command: String,
        entity: String,
        component: String,
    },

    #[error(
        "command '{command}' expects {arity} parameter(s), got {actual}",
        arity = format_arity(.min, .max)
    )]
    ArityMismatch {
        command: String,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("command '{command}': parameter {index} ('{token}') is not a valid {expected}")]
    TypeConversion {
        command: String,
        index: usize,
        token: String,
        expected: String,
    },
}

fn format_arity(min: &usize, max: &usize) -> String {
    if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    }
}

impl CommandError {
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateRegistration { name: name.into() }
    }

    pub fn entity_not_found(command: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::EntityNotFound {
            command: command.into(),
            entity: entity.into(),
        }
    }

    /// Attach the command name to an error produced before it was known
    pub(crate) fn for_command(mut self, name: &str) -> Self {
        match &mut self {
            Self::ArityMismatch { command, .. } | Self::TypeConversion { command, .. } => {
                *command = name.to_string();
            }
            _ => {}
        }
        self
    }
}

/// Errors surfaced by the orchestrator and its collaborators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DialogueError {
    #[error("misuse: {reason}")]
    Misuse { reason: String },

    #[error("cannot start dialogue: no dialogue views are configured")]
    MissingViews,

    #[error("cannot start dialogue: no variable storage is configured")]
    MissingVariableStorage,

    #[error("line status cannot move from {from:?} to {to:?}")]
    InvalidStatusTransition { from: LineStatus, to: LineStatus },

    #[error("option {id} is not part of the current option set")]
    UnknownOption { id: OptionId },

    #[error("option {id} is disabled")]
    OptionUnavailable { id: OptionId },

    #[error("no node named '{node}'")]
    UnknownNode { node: String },

    #[error("variable name '{name}' must start with '$'")]
    InvalidVariableName { name: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl DialogueError {
    pub fn misuse(reason: impl Into<String>) -> Self {
        Self::Misuse {
            reason: reason.into(),
        }
    }

    pub fn unknown_node(node: impl Into<String>) -> Self {
        Self::UnknownNode { node: node.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
