//! Command resolution
//!
//! A command is tried against, in order:
//! 1. handlers registered by name,
//! 2. component methods from the [`MethodTable`], addressed as
//!    `name target args...`,
//! 3. the unhandled-command listener.
//!
//! Only a pausing handler or a suspending method can make the engine wait,
//! and each such invocation owns a fresh [`ResumeHandle`].

use crate::commands::coercion::{Argument, ParamSpec, ParameterCoercer};
use crate::commands::methods::{MethodDescriptor, MethodTable};
use crate::commands::registry::{CommandHandler, CommandRegistry};
use crate::errors::CommandError;
use crate::host::entities::EntityResolver;
use crate::runtime::barrier::Continuation;
use crate::runtime::resume::ResumeHandle;
use crate::types::Command;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Receives the raw text of commands nobody handled
pub type UnhandledCommandListener = Arc<dyn Fn(&str) + Send + Sync>;

/// How a dispatch ended
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The command ran to completion
    Continue,
    /// The command is still running and will resume the engine itself
    Pause,
    /// Nothing handled the command; the listener was notified
    Unhandled,
    /// A registered handler could not run; already logged
    Failed(CommandError),
}

impl DispatchOutcome {
    pub fn should_pause(&self) -> bool {
        matches!(self, DispatchOutcome::Pause)
    }
}

pub struct CommandDispatcher {
    registry: RwLock<CommandRegistry>,
    methods: Arc<MethodTable>,
    resolver: Option<Arc<dyn EntityResolver>>,
    unhandled: RwLock<Option<UnhandledCommandListener>>,
}

impl CommandDispatcher {
    pub fn new(methods: Arc<MethodTable>) -> Self {
        Self {
            registry: RwLock::new(CommandRegistry::new()),
            methods,
            resolver: None,
            unhandled: RwLock::new(None),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn EntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn set_unhandled_listener<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self
            .unhandled
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(listener));
    }

    pub fn register_non_pausing<F>(
        &self,
        name: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&[Argument]) + Send + Sync + 'static,
    {
        self.registry_mut().register_non_pausing(name, params, handler)
    }

    pub fn register_pausing<F>(
        &self,
        name: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&[Argument], ResumeHandle) + Send + Sync + 'static,
    {
        self.registry_mut().register_pausing(name, params, handler)
    }

    pub fn unregister(&self, name: &str) {
        self.registry_mut().unregister(name);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry().contains(name)
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Resolve and run `command`. `on_resume` runs exactly once, later,
    /// if and only if the outcome is [`DispatchOutcome::Pause`].
    pub fn dispatch(&self, command: &Command, on_resume: Continuation) -> DispatchOutcome {
        let words = command.words();
        let Some((&name, tokens)) = words.split_first() else {
            return self.unhandled(command);
        };
        log::debug!("dispatching command '{}'", command.text());

        // The registry lock is released before the handler runs, so handlers
        // may register or unregister commands themselves.
        let handler = self.registry().lookup(name);
        if let Some(handler) = handler {
            return self.run_handler(name, handler, tokens, on_resume);
        }

        match self.methods.get(name) {
            Some(method) if tokens.is_empty() => {
                log::debug!(
                    "command '{name}' matches a {} method but names no target",
                    method.declaring_type()
                );
                self.unhandled(command)
            }
            Some(method) => self.run_method(command, method, tokens, on_resume),
            None => self.unhandled(command),
        }
    }

    fn run_handler(
        &self,
        name: &str,
        handler: CommandHandler,
        tokens: &[&str],
        on_resume: Continuation,
    ) -> DispatchOutcome {
        let args = match self.coercer().coerce(handler.params(), tokens) {
            Ok(args) => args,
            Err(err) => return fail(err.for_command(name)),
        };

        match handler {
            CommandHandler::NonPausing { handler, .. } => {
                handler(&args);
                DispatchOutcome::Continue
            }
            CommandHandler::Pausing { handler, .. } => {
                let resume = ResumeHandle::new(name, on_resume);
                handler(&args, resume.clone());
                settle(name, &resume)
            }
        }
    }

    /// Stage 2. Any failure here is logged and the command falls through
    /// to the unhandled listener.
    fn run_method(
        &self,
        command: &Command,
        method: &MethodDescriptor,
        tokens: &[&str],
        on_resume: Continuation,
    ) -> DispatchOutcome {
        let name = method.name();
        let (target, tokens) = (tokens[0], &tokens[1..]);

        let Some(entity) = self
            .resolver
            .as_ref()
            .and_then(|r| r.find_entity_by_name(target))
        else {
            return self.fall_through(command, CommandError::entity_not_found(name, target));
        };
        let component_not_found = || CommandError::ComponentNotFound {
            command: name.to_string(),
            entity: target.to_string(),
            component: method.declaring_type().to_string(),
        };
        let Some(component) = self
            .resolver
            .as_ref()
            .and_then(|r| r.find_component(entity.as_ref(), method.declaring_type()))
        else {
            return self.fall_through(command, component_not_found());
        };

        let args = match self.coercer().coerce(method.params(), tokens) {
            Ok(args) => args,
            Err(err) => return self.fall_through(command, err.for_command(name)),
        };

        if !method.is_suspending() {
            return if method.invoke(component.as_ref(), &args, None) {
                DispatchOutcome::Continue
            } else {
                self.fall_through(command, component_not_found())
            };
        }

        let resume = ResumeHandle::new(name, on_resume);
        if !method.invoke(component.as_ref(), &args, Some(resume.clone())) {
            resume.abandon();
            return self.fall_through(command, component_not_found());
        }
        settle(name, &resume)
    }

    fn fall_through(&self, command: &Command, err: CommandError) -> DispatchOutcome {
        log::error!("{err}");
        self.unhandled(command)
    }

    fn unhandled(&self, command: &Command) -> DispatchOutcome {
        let listener = self
            .unhandled
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match listener {
            Some(listener) => listener(command.text()),
            None => log::warn!("no handler for command '{}'", command.text()),
        }
        DispatchOutcome::Unhandled
    }

    fn coercer(&self) -> ParameterCoercer<'_> {
        ParameterCoercer::new(self.resolver.as_deref())
    }

    fn registry(&self) -> RwLockReadGuard<'_, CommandRegistry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, CommandRegistry> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Decide between pause and continue once a pausing invocation returned
fn settle(name: &str, resume: &ResumeHandle) -> DispatchOutcome {
    if resume.arm() {
        log::debug!("command '{name}' is running; dialogue paused");
        DispatchOutcome::Pause
    } else {
        log::debug!("command '{name}' finished during dispatch; continuing");
        DispatchOutcome::Continue
    }
}

fn fail(err: CommandError) -> DispatchOutcome {
    log::error!("{err}");
    DispatchOutcome::Failed(err)
}
