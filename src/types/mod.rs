//! Value objects exchanged between the engine, the orchestrator and views
//!
//! - Line / LocalizedLine: one unit of narrative text
//! - OptionSet: choices offered together
//! - Command: free-text directive for game-side behavior
//! - Value: script variables and function arguments

pub mod command;
pub mod line;
pub mod option;
pub mod value;

pub use command::Command;
pub use line::{Line, LineId, LineStatus, LocalizedLine};
pub use option::{DialogueOption, LocalizedOption, OptionId, OptionSet};
pub use value::Value;

/// What the engine should do after an event handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Keep executing immediately
    Next,
    /// Stop until the orchestrator calls `continue_dialogue`
    Wait,
}
