//! Dialogue orchestrator
//!
//! Receives events from the script engine, drives the views through the
//! completion barrier, dispatches commands, and resumes the engine exactly
//! once per line, option set or pausing command.
//!
//! No lock is held while views, command handlers or the engine are called,
//! so any of them may call back into the orchestrator synchronously.

use crate::commands::coercion::{Argument, ParamSpec};
use crate::commands::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::commands::methods::MethodTable;
use crate::config::DialogueConfig;
use crate::errors::{CommandError, DialogueError};
use crate::host::engine::{DialogueEventHandler, ScriptEngine};
use crate::host::entities::EntityResolver;
use crate::host::functions::FunctionLibrary;
use crate::host::localization::{LineProvider, StringTableLineProvider};
use crate::host::variables::VariableStorage;
use crate::runtime::barrier::CompletionBarrier;
use crate::runtime::line_status::{LineStatus, ProceedEffect};
use crate::runtime::resume::ResumeHandle;
use crate::types::{
    Command, Line, LocalizedLine, LocalizedOption, NextAction, OptionId, OptionSet, Value,
};
use crate::views::{DialogueView, OptionSelector};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Default)]
struct OrchestratorState {
    running: bool,
    /// Bumped for every line presented; stale continuations compare against it
    line_serial: u64,
    current_line: Option<LocalizedLine>,
    option_serial: u64,
    current_options: Option<PendingOptions>,
}

struct PendingOptions {
    serial: u64,
    options: Vec<LocalizedOption>,
}

struct Core {
    this: Weak<Core>,
    config: DialogueConfig,
    views: Vec<Option<Arc<dyn DialogueView>>>,
    engine: Arc<dyn ScriptEngine>,
    line_provider: Arc<dyn LineProvider>,
    variable_storage: Option<Arc<dyn VariableStorage>>,
    functions: Arc<FunctionLibrary>,
    dispatcher: CommandDispatcher,
    barrier: CompletionBarrier,
    state: Mutex<OrchestratorState>,
}

/// Handle to a dialogue orchestrator. Clones share the same dialogue.
#[derive(Clone)]
pub struct DialogueOrchestrator {
    core: Arc<Core>,
}

pub struct DialogueOrchestratorBuilder {
    engine: Arc<dyn ScriptEngine>,
    config: DialogueConfig,
    views: Vec<Option<Arc<dyn DialogueView>>>,
    line_provider: Option<Arc<dyn LineProvider>>,
    variable_storage: Option<Arc<dyn VariableStorage>>,
    functions: Option<Arc<FunctionLibrary>>,
    methods: Option<Arc<MethodTable>>,
    resolver: Option<Arc<dyn EntityResolver>>,
}

impl DialogueOrchestratorBuilder {
    pub fn config(mut self, config: DialogueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn view(mut self, view: Arc<dyn DialogueView>) -> Self {
        self.views.push(Some(view));
        self
    }

    /// Add a view slot that may be empty; empty slots are skipped
    pub fn view_slot(mut self, view: Option<Arc<dyn DialogueView>>) -> Self {
        self.views.push(view);
        self
    }

    pub fn line_provider(mut self, provider: Arc<dyn LineProvider>) -> Self {
        self.line_provider = Some(provider);
        self
    }

    pub fn variable_storage(mut self, storage: Arc<dyn VariableStorage>) -> Self {
        self.variable_storage = Some(storage);
        self
    }

    pub fn functions(mut self, functions: Arc<FunctionLibrary>) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Command methods, built once at startup
    pub fn methods(mut self, methods: Arc<MethodTable>) -> Self {
        self.methods = Some(methods);
        self
    }

    pub fn entity_resolver(mut self, resolver: Arc<dyn EntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> DialogueOrchestrator {
        let mut dispatcher = CommandDispatcher::new(
            self.methods
                .unwrap_or_else(|| Arc::new(MethodTable::empty())),
        );
        if let Some(resolver) = self.resolver {
            dispatcher = dispatcher.with_resolver(resolver);
        }

        let core = Arc::new_cyclic(|this| Core {
            this: this.clone(),
            config: self.config,
            views: self.views,
            engine: self.engine,
            line_provider: self
                .line_provider
                .unwrap_or_else(|| Arc::new(StringTableLineProvider::new())),
            variable_storage: self.variable_storage,
            functions: self.functions.unwrap_or_default(),
            dispatcher,
            barrier: CompletionBarrier::new(),
            state: Mutex::new(OrchestratorState::default()),
        });
        DialogueOrchestrator { core }
    }
}

impl DialogueOrchestrator {
    pub fn builder(engine: Arc<dyn ScriptEngine>) -> DialogueOrchestratorBuilder {
        DialogueOrchestratorBuilder {
            engine,
            config: DialogueConfig::default(),
            views: Vec::new(),
            line_provider: None,
            variable_storage: None,
            functions: None,
            methods: None,
            resolver: None,
        }
    }

    /// Weak handle for the script engine to deliver events through
    pub fn event_handler(&self) -> Weak<dyn DialogueEventHandler> {
        let weak: Weak<Core> = Arc::downgrade(&self.core);
        weak
    }

    /// Start running from `node`.
    ///
    /// Fails without touching the engine if no view or no variable storage
    /// is configured, if dialogue is already running, or if `node` is unknown.
    /// Otherwise the engine is bound to the variable storage and function
    /// library before it runs.
    pub fn start_dialogue(&self, node: &str) -> Result<(), DialogueError> {
        let core = &self.core;
        if !core.views.iter().any(Option::is_some) {
            log::error!("{}", DialogueError::MissingViews);
            return Err(DialogueError::MissingViews);
        }
        let Some(variables) = core.variable_storage.clone() else {
            log::error!("{}", DialogueError::MissingVariableStorage);
            return Err(DialogueError::MissingVariableStorage);
        };
        if core.lock().running {
            return Err(core.misuse("dialogue is already running"));
        }
        if !core.engine.node_exists(node) {
            let err = DialogueError::unknown_node(node);
            log::error!("cannot start dialogue: {err}");
            return Err(err);
        }

        core.engine.bind_library(variables, core.functions.clone());
        core.engine.set_node(node)?;
        core.lock().running = true;
        core.lifecycle(format_args!("dialogue started at node '{node}'"));
        for view in core.live_views() {
            view.dialogue_started();
        }
        core.engine.continue_dialogue();
        Ok(())
    }

    /// Start from the configured start node
    pub fn start(&self) -> Result<(), DialogueError> {
        let node = self
            .core
            .config
            .start_node
            .clone()
            .ok_or_else(|| DialogueError::config("no start node configured"))?;
        self.start_dialogue(&node)
    }

    /// Halt the engine and tell views the dialogue is over
    pub fn stop(&self) {
        if !self.core.lock().running {
            return;
        }
        self.core.engine.stop();
        self.core.finish();
    }

    /// The proceed signal: the player wants to move past the current line
    pub fn request_next_line(&self) -> Result<(), DialogueError> {
        self.core.proceed()
    }

    pub fn is_running(&self) -> bool {
        self.core.lock().running
    }

    pub fn current_line(&self) -> Option<LocalizedLine> {
        self.core.lock().current_line.clone()
    }

    pub fn current_options(&self) -> Option<Vec<LocalizedOption>> {
        self.core
            .lock()
            .current_options
            .as_ref()
            .map(|pending| pending.options.clone())
    }

    pub fn current_node(&self) -> Option<String> {
        self.core.engine.current_node()
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.core.config
    }

    pub fn variable_storage(&self) -> Option<&Arc<dyn VariableStorage>> {
        self.core.variable_storage.as_ref()
    }

    pub fn functions(&self) -> &Arc<FunctionLibrary> {
        &self.core.functions
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.core.dispatcher
    }

    pub fn add_command_handler<F>(
        &self,
        name: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&[Argument]) + Send + Sync + 'static,
    {
        self.core.dispatcher.register_non_pausing(name, params, handler)
    }

    pub fn add_pausing_command_handler<F>(
        &self,
        name: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&[Argument], ResumeHandle) + Send + Sync + 'static,
    {
        self.core.dispatcher.register_pausing(name, params, handler)
    }

    pub fn remove_command_handler(&self, name: &str) {
        self.core.dispatcher.unregister(name);
    }

    pub fn add_function<F>(&self, name: &str, arity: usize, body: F) -> Result<(), CommandError>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.core.functions.register(name, arity, body)
    }

    /// Commands no handler or method recognised are passed here verbatim
    pub fn on_unhandled_command<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.core.dispatcher.set_unhandled_listener(listener);
    }
}

impl DialogueEventHandler for DialogueOrchestrator {
    fn on_line(&self, line: Line) -> NextAction {
        self.core.on_line(line)
    }

    fn on_options(&self, options: OptionSet) -> NextAction {
        self.core.on_options(options)
    }

    fn on_command(&self, command: Command) -> NextAction {
        self.core.on_command(command)
    }

    fn on_node_start(&self, node: &str) -> NextAction {
        self.core.on_node_start(node)
    }

    fn on_node_complete(&self, node: &str) -> NextAction {
        self.core.on_node_complete(node)
    }

    fn on_dialogue_complete(&self) -> NextAction {
        self.core.on_dialogue_complete()
    }
}

impl fmt::Debug for DialogueOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.lock();
        f.debug_struct("DialogueOrchestrator")
            .field("running", &state.running)
            .field("current_line", &state.current_line.as_ref().map(|l| l.id().clone()))
            .field("options_pending", &state.current_options.is_some())
            .field("views", &self.core.views.len())
            .finish()
    }
}

impl DialogueEventHandler for Core {
    fn on_line(&self, line: Line) -> NextAction {
        let localized = self.line_provider.localize(&line);
        self.run_line(localized);
        NextAction::Wait
    }

    fn on_options(&self, options: OptionSet) -> NextAction {
        // Anything still outstanding from the previous line is obsolete
        self.barrier.cancel();

        let localized: Vec<LocalizedOption> = options
            .options()
            .iter()
            .map(|option| LocalizedOption {
                id: option.id,
                line: self.line_provider.localize(&option.line),
                available: option.available,
            })
            .collect();

        let serial = {
            let mut state = self.lock();
            state.current_line = None;
            state.option_serial += 1;
            state.current_options = Some(PendingOptions {
                serial: state.option_serial,
                options: localized.clone(),
            });
            state.option_serial
        };
        self.lifecycle(format_args!("offering {} option(s)", localized.len()));

        let this = self.this.clone();
        let selector = OptionSelector::new(move |id| match this.upgrade() {
            Some(core) => core.select_option(serial, id),
            None => Err(DialogueError::misuse("dialogue no longer exists")),
        });
        for view in self.live_views() {
            view.run_options(&localized, selector.clone());
        }
        NextAction::Wait
    }

    fn on_command(&self, command: Command) -> NextAction {
        let this = self.this.clone();
        let outcome = self.dispatcher.dispatch(
            &command,
            Box::new(move || {
                if let Some(core) = this.upgrade() {
                    core.engine.continue_dialogue();
                }
            }),
        );
        match outcome {
            DispatchOutcome::Pause => NextAction::Wait,
            DispatchOutcome::Continue | DispatchOutcome::Unhandled | DispatchOutcome::Failed(_) => {
                NextAction::Next
            }
        }
    }

    fn on_node_start(&self, node: &str) -> NextAction {
        self.lifecycle(format_args!("node '{node}' started"));
        for view in self.live_views() {
            view.node_started(node);
        }
        NextAction::Next
    }

    fn on_node_complete(&self, node: &str) -> NextAction {
        self.lifecycle(format_args!("node '{node}' complete"));
        for view in self.live_views() {
            view.node_complete(node);
        }
        NextAction::Next
    }

    fn on_dialogue_complete(&self) -> NextAction {
        self.finish();
        NextAction::Next
    }
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live_views(&self) -> impl Iterator<Item = &Arc<dyn DialogueView>> {
        self.views.iter().flatten()
    }

    fn lifecycle(&self, message: fmt::Arguments<'_>) {
        let level = if self.config.verbose_logging {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        log::log!(level, "{message}");
    }

    fn misuse(&self, reason: &str) -> DialogueError {
        let err = DialogueError::misuse(reason);
        log::warn!("{err}");
        err
    }

    fn notify_status(&self, line: &LocalizedLine) {
        log::debug!("line {} is now {:?}", line.id(), line.status);
        for view in self.live_views() {
            view.line_status_changed(line);
        }
    }

    /// Present `line` on every view; the engine stays paused until the line
    /// has been delivered and dismissed.
    fn run_line(&self, mut line: LocalizedLine) {
        line.status = LineStatus::Running;
        let serial = {
            let mut state = self.lock();
            state.line_serial += 1;
            state.current_line = Some(line.clone());
            state.line_serial
        };
        self.lifecycle(format_args!("running line {}: {}", line.id(), line.text));

        let this = self.this.clone();
        self.barrier.broadcast(
            &self.views,
            |view, token| view.run_line(&line, token),
            Box::new(move || {
                if let Some(core) = this.upgrade() {
                    core.line_delivered(serial);
                }
            }),
        );
    }

    fn line_delivered(&self, serial: u64) {
        let line = {
            let mut state = self.lock();
            if state.line_serial != serial {
                return;
            }
            let Some(line) = state.current_line.as_mut() else {
                return;
            };
            if !line.status.deliver() {
                return;
            }
            line.clone()
        };
        self.notify_status(&line);

        if self.config.auto_advance_lines {
            self.end_line(serial);
        }
    }

    fn proceed(&self) -> Result<(), DialogueError> {
        let current = {
            let mut state = self.lock();
            let serial = state.line_serial;
            state
                .current_line
                .as_mut()
                .map(|line| (line.status.proceed(), line.clone(), serial))
        };
        let Some((effect, line, serial)) = current else {
            return Err(self.misuse("proceed requested with no line being presented"));
        };

        match effect {
            ProceedEffect::Interrupt => self.notify_status(&line),
            ProceedEffect::Dismiss => self.dismiss_line(line, serial),
            ProceedEffect::Ignored => {
                log::debug!("line {} already ended; ignoring proceed", line.id())
            }
        }
        Ok(())
    }

    /// Delivered -> Ended without a proceed signal
    fn end_line(&self, serial: u64) {
        let line = {
            let mut state = self.lock();
            if state.line_serial != serial {
                return;
            }
            let Some(line) = state.current_line.as_mut() else {
                return;
            };
            if line.status.advance_to(LineStatus::Ended).is_err() {
                return;
            }
            line.clone()
        };
        self.dismiss_line(line, serial);
    }

    fn dismiss_line(&self, line: LocalizedLine, serial: u64) {
        self.notify_status(&line);

        let this = self.this.clone();
        self.barrier.broadcast(
            &self.views,
            |view, token| view.dismiss_line(&line, token),
            Box::new(move || {
                if let Some(core) = this.upgrade() {
                    core.line_dismissed(serial);
                }
            }),
        );
    }

    fn line_dismissed(&self, serial: u64) {
        {
            let mut state = self.lock();
            if state.line_serial != serial {
                return;
            }
            state.current_line = None;
        }
        self.engine.continue_dialogue();
    }

    fn select_option(&self, serial: u64, id: OptionId) -> Result<(), DialogueError> {
        let chosen = {
            let mut state = self.lock();
            let chosen = match state.current_options.as_ref() {
                None => Err(DialogueError::misuse("option selected while no options are offered")),
                Some(pending) if pending.serial != serial => Err(DialogueError::misuse(
                    "option selected for an option set that was already answered",
                )),
                Some(pending) => match pending.options.iter().find(|option| option.id == id) {
                    None => Err(DialogueError::UnknownOption { id }),
                    Some(option) if !option.available => {
                        Err(DialogueError::OptionUnavailable { id })
                    }
                    Some(option) => Ok(option.clone()),
                },
            };
            if chosen.is_ok() {
                state.current_options = None;
            }
            chosen
        };
        let chosen = chosen.inspect_err(|err| log::warn!("rejected selection: {err}"))?;
        self.lifecycle(format_args!("option {id} selected"));

        self.engine.set_selected_option(id);
        if self.config.run_selected_option_as_line {
            self.run_line(chosen.line);
        } else {
            self.engine.continue_dialogue();
        }
        Ok(())
    }

    /// Views hear about completion once per run, however it ends
    fn finish(&self) {
        {
            let mut state = self.lock();
            if !state.running {
                log::debug!("dialogue already complete");
                return;
            }
            state.running = false;
            state.current_line = None;
            state.current_options = None;
        }
        self.barrier.cancel();
        self.lifecycle(format_args!("dialogue complete"));
        for view in self.live_views() {
            view.dialogue_complete();
        }
    }
}
