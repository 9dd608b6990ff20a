//! Collaborators supplied by the host application
//!
//! The orchestrator only calls through these traits. Simple in-memory
//! implementations are provided for hosts that need nothing more.

pub mod engine;
pub mod entities;
pub mod functions;
pub mod localization;
pub mod variables;

pub use engine::{DialogueEventHandler, ScriptEngine};
pub use entities::{Component, ComponentType, Entity, EntityRegistry, EntityResolver};
pub use functions::{FunctionLibrary, ScriptFunction};
pub use localization::{LineProvider, StringTableLineProvider};
pub use variables::{InMemoryVariableStorage, VariableStorage};
