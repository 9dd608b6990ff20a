//! Explicitly registered command handlers
//!
//! Two kinds share one namespace: non-pausing handlers return and the engine
//! continues; pausing handlers hold a [`ResumeHandle`] and the engine waits
//! until it is resumed.

use crate::commands::coercion::{Argument, ParamSpec};
use crate::errors::CommandError;
use crate::runtime::resume::ResumeHandle;
use std::collections::HashMap;
use std::sync::Arc;

pub type NonPausingHandler = Arc<dyn Fn(&[Argument]) + Send + Sync>;
pub type PausingHandler = Arc<dyn Fn(&[Argument], ResumeHandle) + Send + Sync>;

/// Result of a registry lookup
#[derive(Clone)]
pub enum CommandHandler {
    NonPausing {
        params: Vec<ParamSpec>,
        handler: NonPausingHandler,
    },
    Pausing {
        params: Vec<ParamSpec>,
        handler: PausingHandler,
    },
}

impl CommandHandler {
    pub fn params(&self) -> &[ParamSpec] {
        match self {
            CommandHandler::NonPausing { params, .. } | CommandHandler::Pausing { params, .. } => {
                params
            }
        }
    }

    pub fn is_pausing(&self) -> bool {
        matches!(self, CommandHandler::Pausing { .. })
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_pausing() { "Pausing" } else { "NonPausing" };
        f.debug_struct(kind).field("params", &self.params()).finish()
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_non_pausing<F>(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&[Argument]) + Send + Sync + 'static,
    {
        self.insert(
            name,
            CommandHandler::NonPausing {
                params,
                handler: Arc::new(handler),
            },
        )
    }

    pub fn register_pausing<F>(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&[Argument], ResumeHandle) + Send + Sync + 'static,
    {
        self.insert(
            name,
            CommandHandler::Pausing {
                params,
                handler: Arc::new(handler),
            },
        )
    }

    fn insert(&mut self, name: &str, handler: CommandHandler) -> Result<(), CommandError> {
        if self.handlers.contains_key(name) {
            let err = CommandError::duplicate(name);
            log::error!("cannot register command: {err}");
            return Err(err);
        }
        log::debug!("registered command '{name}' ({handler:?})");
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// Remove `name` from whichever kind holds it
    pub fn unregister(&mut self, name: &str) {
        if self.handlers.remove(name).is_some() {
            log::debug!("unregistered command '{name}'");
        }
    }

    pub fn lookup(&self, name: &str) -> Option<CommandHandler> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}
