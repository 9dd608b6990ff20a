//! Command text embedded in a script

use serde::{Deserialize, Serialize};

/// A command line, with `<<` `>>` delimiters already stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    text: String,
}

impl Command {
    /// Build a command from script text; surrounding `<<` `>>` are optional
    pub fn new(text: impl AsRef<str>) -> Self {
        let mut text = text.as_ref().trim();
        if let Some(inner) = text.strip_prefix("<<").and_then(|t| t.strip_suffix(">>")) {
            text = inner.trim();
        }
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Words split on literal spaces; runs of spaces do not produce empty words
    pub fn words(&self) -> Vec<&str> {
        self.text.split(' ').filter(|w| !w.is_empty()).collect()
    }

    pub fn name(&self) -> Option<&str> {
        self.text.split(' ').find(|w| !w.is_empty())
    }
}
