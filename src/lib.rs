//! # kataribe
//!
//! Runtime glue between a dialogue script engine and the game that presents
//! it. The orchestrator receives lines, option sets and commands from the
//! engine, hands them to any number of views, dispatches commands to
//! registered handlers or component methods, and resumes the engine exactly
//! once per step.
//!
//! ## Quick Start
//!
//! ```rust
//! use kataribe::{
//!     CompletionToken, DialogueConfig, DialogueOrchestrator, DialogueView,
//!     InMemoryVariableStorage, LocalizedLine, ScriptedEngine,
//! };
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl DialogueView for Printer {
//!     fn run_line(&self, line: &LocalizedLine, on_done: CompletionToken) {
//!         println!("{}", line.text);
//!         on_done.complete();
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let engine = ScriptedEngine::from_json(
//!     r#"{ "nodes": { "Start": [{ "type": "line", "id": "l1", "text": "Hello, world!" }] } }"#,
//! )?;
//! let dialogue = DialogueOrchestrator::builder(engine.clone())
//!     .config(DialogueConfig { auto_advance_lines: true, ..DialogueConfig::default() })
//!     .view(Arc::new(Printer))
//!     .variable_storage(Arc::new(InMemoryVariableStorage::new()))
//!     .build();
//! engine.attach(dialogue.event_handler());
//!
//! dialogue.start()?;
//! assert!(!dialogue.is_running());
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod debug;
pub mod errors;
pub mod host;
pub mod orchestrator;
pub mod runtime;
pub mod script;
pub mod types;
pub mod views;

pub use commands::{
    Argument, CommandDispatcher, CommandMethods, DispatchOutcome, MethodDescriptor, MethodTable,
    ParamKind, ParamSpec,
};
pub use config::DialogueConfig;
pub use errors::{CommandError, DialogueError};
pub use host::{
    Component, ComponentType, DialogueEventHandler, Entity, EntityRegistry, EntityResolver,
    FunctionLibrary, InMemoryVariableStorage, LineProvider, ScriptEngine, StringTableLineProvider,
    VariableStorage,
};
pub use orchestrator::{DialogueOrchestrator, DialogueOrchestratorBuilder};
pub use runtime::{CompletionToken, LineStatus, ResumeHandle};
pub use script::{Expression, Script, ScriptedEngine};
pub use types::{
    Command, DialogueOption, Line, LineId, LocalizedLine, LocalizedOption, NextAction, OptionId,
    OptionSet, Value,
};
pub use views::{DialogueView, OptionSelector};
