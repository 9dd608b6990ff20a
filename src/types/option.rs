//! Branch options offered to the player

use crate::types::line::{Line, LocalizedLine};
use serde::{Deserialize, Serialize};

/// Engine-assigned option identifier
pub type OptionId = usize;

/// One option as emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueOption {
    pub id: OptionId,
    pub line: Line,
    /// False when the option's condition failed; still shown, not selectable
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl DialogueOption {
    pub fn new(id: OptionId, line: Line) -> Self {
        Self {
            id,
            line,
            available: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.available = false;
        self
    }
}

/// Ordered set of options, immutable once received
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptionSet {
    options: Vec<DialogueOption>,
}

impl OptionSet {
    pub fn new(options: Vec<DialogueOption>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &[DialogueOption] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, id: OptionId) -> Option<&DialogueOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// An option with its line localized, as handed to views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedOption {
    pub id: OptionId,
    pub line: LocalizedLine,
    pub available: bool,
}
