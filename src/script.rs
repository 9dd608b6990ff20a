//! Sequential JSON script engine
//!
//! A script is a set of named nodes, each a list of instructions:
//!
//! ```json
//! {
//!   "nodes": {
//!     "Start": [
//!       { "type": "line", "id": "line:1", "text": "Ayumi: Good morning." },
//!       { "type": "command", "text": "wait 0.5" },
//!       { "type": "options", "options": [
//!         { "text": "Stay", "destination": "Stay" },
//!         { "text": "Leave", "available": false }
//!       ] }
//!     ],
//!     "Stay": [
//!       { "type": "set", "variable": "$stayed",
//!         "value": { "call": "inc", "args": [{ "var": "$stayed" }] } },
//!       { "type": "line", "id": "line:2", "text": "You stay ({0}).",
//!         "substitutions": [{ "var": "$stayed" }] }
//!     ]
//!   }
//! }
//! ```
//!
//! The engine delivers each instruction as an event and keeps going while
//! the handler answers [`NextAction::Next`]. `set` instructions, option
//! conditions and line substitutions are evaluated against the variable
//! storage and function library bound with [`ScriptEngine::bind_library`].

use crate::errors::DialogueError;
use crate::host::engine::{DialogueEventHandler, ScriptEngine};
use crate::host::functions::FunctionLibrary;
use crate::host::variables::VariableStorage;
use crate::types::{Command, DialogueOption, Line, NextAction, OptionId, OptionSet, Value};
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub nodes: BTreeMap<String, Vec<Instruction>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    Line {
        id: String,
        text: String,
        #[serde(default)]
        substitutions: Vec<Expression>,
    },
    Options {
        options: Vec<ScriptOption>,
    },
    Command {
        text: String,
    },
    Jump {
        node: String,
    },
    /// Store the value of an expression in a `$` variable
    Set {
        variable: String,
        value: Expression,
    },
    Stop,
}

/// A literal, a variable read, or a call into the function library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expression {
    Variable {
        var: String,
    },
    Call {
        call: String,
        #[serde(default)]
        args: Vec<Expression>,
    },
    Literal(Value),
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOption {
    /// Line id for localization; defaults to the option text
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default = "available_by_default")]
    pub available: bool,
    /// Must evaluate to `true` for the option to be available
    #[serde(default)]
    pub condition: Option<Expression>,
    /// Node to jump to when chosen; without one execution continues after
    /// the option set
    #[serde(default)]
    pub destination: Option<String>,
}

fn available_by_default() -> bool {
    true
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        let script: Script = serde_json::from_str(json).context("failed to parse dialogue script")?;
        script.validate()?;
        Ok(script)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Every jump and option destination must name a node
    pub fn validate(&self) -> Result<()> {
        for (node, instructions) in &self.nodes {
            for instruction in instructions {
                let targets: Vec<&str> = match instruction {
                    Instruction::Jump { node } => vec![node.as_str()],
                    Instruction::Options { options } => {
                        options.iter().filter_map(|o| o.destination.as_deref()).collect()
                    }
                    _ => Vec::new(),
                };
                if let Some(missing) = targets.into_iter().find(|t| !self.nodes.contains_key(*t)) {
                    bail!("node '{node}' refers to unknown node '{missing}'");
                }
            }
        }
        Ok(())
    }
}

/// The host's storage and functions, as bound by the orchestrator
struct Library {
    variables: Arc<dyn VariableStorage>,
    functions: Arc<FunctionLibrary>,
}

impl Library {
    fn evaluate(&self, expression: &Expression) -> Result<Value> {
        match expression {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable { var } => self
                .variables
                .get(var)
                .ok_or_else(|| anyhow!("variable '{var}' is not set")),
            Expression::Call { call, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.functions
                    .call(call, &args)
                    .ok_or_else(|| anyhow!("function '{call}' could not be called"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Wait,
    Halt,
}

impl From<NextAction> for Step {
    fn from(action: NextAction) -> Self {
        match action {
            NextAction::Next => Step::Next,
            NextAction::Wait => Step::Wait,
        }
    }
}

/// What the next step will do, decided under the lock
enum Pending {
    NodeStart(String),
    Instruction(Instruction),
    NodeComplete(String),
    Choice(Option<String>),
    Halt,
}

#[derive(Debug, Default)]
struct EngineState {
    node: Option<String>,
    pc: usize,
    node_started: bool,
    /// Destinations of the option set waiting for an answer
    awaiting_choice: Option<Vec<Option<String>>>,
    selected: Option<OptionId>,
    stepping: bool,
    resume_requested: bool,
}

/// Runs a [`Script`] and reports each step to an attached event handler.
///
/// `continue_dialogue` may be called from inside an event handler; the call
/// is recorded and honoured once the current event returns.
pub struct ScriptedEngine {
    script: Script,
    state: Mutex<EngineState>,
    handler: RwLock<Option<Weak<dyn DialogueEventHandler>>>,
    library: RwLock<Option<Arc<Library>>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            state: Mutex::new(EngineState::default()),
            handler: RwLock::new(None),
            library: RwLock::new(None),
        }
    }

    pub fn from_json(json: &str) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(Script::from_json(json)?)))
    }

    pub fn attach(&self, handler: Weak<dyn DialogueEventHandler>) {
        *self.handler.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handler);
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn event_handler(&self) -> Option<Arc<dyn DialogueEventHandler>> {
        self.handler
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn library(&self) -> Option<Arc<Library>> {
        self.library
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn evaluate(&self, expression: &Expression) -> Result<Value> {
        match (expression, self.library()) {
            (Expression::Literal(value), _) => Ok(value.clone()),
            (_, Some(library)) => library.evaluate(expression),
            (_, None) => bail!("no variable storage or function library is bound"),
        }
    }

    fn assign(&self, variable: &str, value: &Expression) {
        let Some(library) = self.library() else {
            log::error!("script: cannot set {variable}: no variable storage is bound");
            return;
        };
        let result = library
            .evaluate(value)
            .and_then(|value| {
                library
                    .variables
                    .set(variable, value)
                    .map_err(anyhow::Error::from)
            });
        if let Err(err) = result {
            log::error!("script: cannot set {variable}: {err:#}");
        }
    }

    fn substitute(&self, substitutions: &[Expression]) -> Vec<String> {
        substitutions
            .iter()
            .map(|expression| match self.evaluate(expression) {
                Ok(value) => value.to_string(),
                Err(err) => {
                    log::error!("script: substitution failed: {err:#}");
                    String::new()
                }
            })
            .collect()
    }

    fn is_available(&self, option: &ScriptOption) -> bool {
        let Some(condition) = option.condition.as_ref() else {
            return option.available;
        };
        match self.evaluate(condition) {
            Ok(Value::Bool(passed)) => option.available && passed,
            Ok(other) => {
                log::error!("script: condition on '{}' gave {other}, not a bool", option.text);
                false
            }
            Err(err) => {
                log::error!("script: condition on '{}' failed: {err:#}", option.text);
                false
            }
        }
    }

    fn next_pending(&self) -> Pending {
        let mut state = self.lock();
        let Some(node) = state.node.clone() else {
            return Pending::Halt;
        };

        if let Some(destinations) = state.awaiting_choice.take() {
            let Some(selected) = state.selected.take() else {
                log::warn!("script: continued without an option being selected");
                state.awaiting_choice = Some(destinations);
                return Pending::Halt;
            };
            return Pending::Choice(destinations.get(selected).cloned().flatten());
        }

        if !state.node_started {
            state.node_started = true;
            return Pending::NodeStart(node);
        }

        match self.script.nodes.get(&node).and_then(|body| body.get(state.pc)) {
            Some(instruction) => {
                state.pc += 1;
                Pending::Instruction(instruction.clone())
            }
            None => Pending::NodeComplete(node),
        }
    }

    fn enter(&self, node: &str) {
        let mut state = self.lock();
        state.node = Some(node.to_string());
        state.pc = 0;
        state.node_started = false;
    }

    fn end(&self) -> Option<String> {
        let mut state = self.lock();
        state.pc = 0;
        state.node_started = false;
        state.awaiting_choice = None;
        state.node.take()
    }

    /// Leave the current node for `destination`
    fn jump(&self, handler: &dyn DialogueEventHandler, destination: &str) -> Step {
        let current = self.lock().node.clone();
        if let Some(current) = current {
            if handler.on_node_complete(&current) == NextAction::Wait {
                log::debug!("script: handler asked to wait at the end of '{current}'; ignoring");
            }
        }
        log::trace!("script: jump to '{destination}'");
        self.enter(destination);
        Step::Next
    }

    fn finish(&self, handler: &dyn DialogueEventHandler) -> Step {
        self.end();
        handler.on_dialogue_complete();
        Step::Halt
    }

    fn step(&self) -> Step {
        let Some(handler) = self.event_handler() else {
            log::warn!("script: no event handler attached");
            return Step::Halt;
        };
        let handler = handler.as_ref();

        match self.next_pending() {
            Pending::Halt => Step::Halt,
            Pending::NodeStart(node) => handler.on_node_start(&node).into(),
            Pending::NodeComplete(node) => {
                handler.on_node_complete(&node);
                self.finish(handler)
            }
            Pending::Choice(Some(destination)) => self.jump(handler, &destination),
            Pending::Choice(None) => Step::Next,
            Pending::Instruction(instruction) => match instruction {
                Instruction::Line {
                    id,
                    text,
                    substitutions,
                } => {
                    let substitutions = self.substitute(&substitutions);
                    handler
                        .on_line(Line::new(id, text).with_substitutions(substitutions))
                        .into()
                }
                Instruction::Options { options } => {
                    let destinations: Vec<Option<String>> =
                        options.iter().map(|o| o.destination.clone()).collect();
                    let set = OptionSet::new(
                        options
                            .iter()
                            .enumerate()
                            .map(|(index, o)| {
                                let id = o.id.clone().unwrap_or_else(|| o.text.clone());
                                let line = Line::new(id, o.text.clone());
                                let option = DialogueOption::new(index, line);
                                if self.is_available(o) {
                                    option
                                } else {
                                    option.disabled()
                                }
                            })
                            .collect(),
                    );
                    {
                        let mut state = self.lock();
                        state.awaiting_choice = Some(destinations);
                        state.selected = None;
                    }
                    match handler.on_options(set) {
                        NextAction::Wait => Step::Wait,
                        NextAction::Next => {
                            log::warn!("script: options must wait for a selection");
                            Step::Wait
                        }
                    }
                }
                Instruction::Command { text } => handler.on_command(Command::new(text)).into(),
                Instruction::Jump { node } => self.jump(handler, &node),
                Instruction::Set { variable, value } => {
                    self.assign(&variable, &value);
                    Step::Next
                }
                Instruction::Stop => {
                    let current = self.lock().node.clone();
                    if let Some(current) = current {
                        handler.on_node_complete(&current);
                    }
                    self.finish(handler)
                }
            },
        }
    }
}

impl ScriptEngine for ScriptedEngine {
    fn continue_dialogue(&self) {
        {
            let mut state = self.lock();
            if state.stepping {
                state.resume_requested = true;
                return;
            }
            state.stepping = true;
            state.resume_requested = false;
        }

        loop {
            let step = self.step();
            let mut state = self.lock();
            match step {
                Step::Next => {
                    if state.resume_requested {
                        log::debug!(
                            "script: dropping a continue issued during a non-waiting event"
                        );
                        state.resume_requested = false;
                    }
                }
                Step::Wait if state.resume_requested => {
                    state.resume_requested = false;
                }
                Step::Wait | Step::Halt => {
                    state.stepping = false;
                    return;
                }
            }
        }
    }

    fn set_selected_option(&self, id: OptionId) {
        let mut state = self.lock();
        if state.awaiting_choice.is_none() {
            log::warn!("script: option {id} selected while no options are pending");
            return;
        }
        state.selected = Some(id);
    }

    fn set_node(&self, node: &str) -> Result<(), DialogueError> {
        if !self.node_exists(node) {
            return Err(DialogueError::unknown_node(node));
        }
        let mut state = self.lock();
        state.awaiting_choice = None;
        state.selected = None;
        drop(state);
        self.enter(node);
        Ok(())
    }

    fn stop(&self) {
        if let Some(node) = self.end() {
            log::debug!("script: stopped in node '{node}'");
        }
    }

    fn node_exists(&self, node: &str) -> bool {
        self.script.nodes.contains_key(node)
    }

    fn current_node(&self) -> Option<String> {
        self.lock().node.clone()
    }

    fn bind_library(&self, variables: Arc<dyn VariableStorage>, functions: Arc<FunctionLibrary>) {
        *self
            .library
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(Library {
            variables,
            functions,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::variables::InMemoryVariableStorage;

    /// Records events; waits on lines and resumes lines reentrantly when asked
    struct Recorder {
        engine: Weak<ScriptedEngine>,
        events: Mutex<Vec<String>>,
        /// Availability of each offered option set
        offered: Mutex<Vec<Vec<bool>>>,
        resume_lines_inline: bool,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl DialogueEventHandler for Recorder {
        fn on_line(&self, line: Line) -> NextAction {
            if line.substitutions.is_empty() {
                self.push(format!("line {}", line.text));
            } else {
                self.push(format!("line {} {:?}", line.text, line.substitutions));
            }
            if self.resume_lines_inline {
                if let Some(engine) = self.engine.upgrade() {
                    engine.continue_dialogue();
                }
            }
            NextAction::Wait
        }

        fn on_options(&self, options: OptionSet) -> NextAction {
            self.push(format!("options {}", options.len()));
            self.offered
                .lock()
                .unwrap()
                .push(options.options().iter().map(|o| o.available).collect());
            NextAction::Wait
        }

        fn on_command(&self, command: Command) -> NextAction {
            self.push(format!("command {}", command.text()));
            NextAction::Next
        }

        fn on_node_start(&self, node: &str) -> NextAction {
            self.push(format!("start {node}"));
            NextAction::Next
        }

        fn on_node_complete(&self, node: &str) -> NextAction {
            self.push(format!("complete {node}"));
            NextAction::Next
        }

        fn on_dialogue_complete(&self) -> NextAction {
            self.push("done".to_string());
            NextAction::Next
        }
    }

    const SCRIPT: &str = r#"{
        "nodes": {
            "Start": [
                { "type": "line", "id": "l1", "text": "one" },
                { "type": "command", "text": "<<shake camera>>" },
                { "type": "options", "options": [
                    { "text": "left", "destination": "Left" },
                    { "text": "right" }
                ] },
                { "type": "line", "id": "l2", "text": "stayed" }
            ],
            "Left": [{ "type": "line", "id": "l3", "text": "went left" }]
        }
    }"#;

    fn setup(resume_lines_inline: bool) -> (Arc<ScriptedEngine>, Arc<Recorder>) {
        setup_script(SCRIPT, resume_lines_inline)
    }

    fn setup_script(
        script: &str,
        resume_lines_inline: bool,
    ) -> (Arc<ScriptedEngine>, Arc<Recorder>) {
        let engine = ScriptedEngine::from_json(script).unwrap();
        let recorder = Arc::new(Recorder {
            engine: Arc::downgrade(&engine),
            events: Mutex::new(Vec::new()),
            offered: Mutex::new(Vec::new()),
            resume_lines_inline,
        });
        let handler: Weak<dyn DialogueEventHandler> =
            Arc::downgrade(&recorder) as Weak<dyn DialogueEventHandler>;
        engine.attach(handler);
        engine.set_node("Start").unwrap();
        (engine, recorder)
    }

    fn events(recorder: &Recorder) -> Vec<String> {
        recorder.events.lock().unwrap().clone()
    }

    #[test]
    fn waits_on_lines_until_continued() {
        let (engine, recorder) = setup(false);
        engine.continue_dialogue();
        assert_eq!(events(&recorder), ["start Start", "line one"]);

        engine.continue_dialogue();
        assert_eq!(
            events(&recorder),
            ["start Start", "line one", "command shake camera", "options 2"]
        );
    }

    #[test]
    fn option_destination_jumps() {
        let (engine, recorder) = setup(false);
        engine.continue_dialogue();
        engine.continue_dialogue();
        engine.set_selected_option(0);
        engine.continue_dialogue();
        engine.continue_dialogue();

        assert_eq!(
            &events(&recorder)[4..],
            ["complete Start", "start Left", "line went left", "complete Left", "done"]
        );
        assert_eq!(engine.current_node(), None);
    }

    #[test]
    fn option_without_destination_falls_through() {
        let (engine, recorder) = setup(false);
        engine.continue_dialogue();
        engine.continue_dialogue();
        engine.set_selected_option(1);
        engine.continue_dialogue();
        assert_eq!(events(&recorder).last().unwrap(), "line stayed");
    }

    #[test]
    fn reentrant_continue_is_honoured_once() {
        let (engine, recorder) = setup(true);
        engine.continue_dialogue();
        assert_eq!(
            events(&recorder),
            ["start Start", "line one", "command shake camera", "options 2"]
        );
    }

    #[test]
    fn stop_is_silent() {
        let (engine, recorder) = setup(false);
        engine.continue_dialogue();
        engine.stop();
        engine.continue_dialogue();
        assert_eq!(events(&recorder), ["start Start", "line one"]);
    }

    #[test]
    fn dangling_destination_is_rejected() {
        let err = Script::from_json(r#"{ "nodes": { "A": [{ "type": "jump", "node": "B" }] } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown node 'B'"));
        assert!(matches!(
            ScriptedEngine::from_json(SCRIPT).unwrap().set_node("Nowhere"),
            Err(DialogueError::UnknownNode { .. })
        ));
    }

    const LEDGER: &str = r#"{
        "nodes": {
            "Start": [
                { "type": "set", "variable": "$gold", "value": 10 },
                { "type": "set", "variable": "$gold",
                  "value": { "call": "add", "args": [{ "var": "$gold" }, 5] } },
                { "type": "set", "variable": "gold", "value": 1 },
                { "type": "line", "id": "l1", "text": "{0} has {1} gold",
                  "substitutions": ["Ayumi", { "var": "$gold" }] },
                { "type": "options", "options": [
                    { "text": "buy",
                      "condition": { "call": "at_least", "args": [{ "var": "$gold" }, 20] } },
                    { "text": "haggle", "condition": { "var": "$missing" } },
                    { "text": "leave", "condition": true }
                ] }
            ]
        }
    }"#;

    fn bound_library(engine: &ScriptedEngine) -> Arc<InMemoryVariableStorage> {
        let variables = Arc::new(InMemoryVariableStorage::new());
        let functions = Arc::new(FunctionLibrary::new());
        functions
            .register("add", 2, |args| {
                Value::Number(args.iter().filter_map(Value::as_number).sum())
            })
            .unwrap();
        functions
            .register("at_least", 2, |args| {
                Value::Bool(args[0].as_number() >= args[1].as_number())
            })
            .unwrap();
        engine.bind_library(variables.clone(), functions);
        variables
    }

    #[test]
    fn set_and_substitutions_use_the_bound_library() {
        let (engine, recorder) = setup_script(LEDGER, false);
        let variables = bound_library(&engine);

        engine.continue_dialogue();

        assert_eq!(variables.get("$gold"), Some(Value::Number(15.0)));
        assert_eq!(variables.get("gold"), None);
        assert_eq!(
            events(&recorder),
            ["start Start", r#"line {0} has {1} gold ["Ayumi", "15"]"#]
        );
    }

    #[test]
    fn option_conditions_decide_availability() {
        let (engine, recorder) = setup_script(LEDGER, false);
        bound_library(&engine);

        engine.continue_dialogue();
        engine.continue_dialogue();

        assert_eq!(*recorder.offered.lock().unwrap(), [vec![false, false, true]]);
    }

    #[test]
    fn expressions_without_a_library_fall_back_quietly() {
        let (engine, recorder) = setup_script(LEDGER, false);

        engine.continue_dialogue();
        engine.continue_dialogue();

        assert_eq!(
            events(&recorder),
            ["start Start", r#"line {0} has {1} gold ["Ayumi", ""]"#, "options 3"]
        );
        assert_eq!(*recorder.offered.lock().unwrap(), [vec![false, false, true]]);
    }
}
