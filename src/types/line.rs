//! Lines emitted by the script engine and their localized form

use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::runtime::line_status::LineStatus;

/// Identifier of a line in the string table (e.g. `line:intro_01`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(String);

impl LineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A line as delivered by the engine, before localization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    /// Raw text, used when the string table has no entry for `id`
    pub text: String,
    /// Values for the `{0}`, `{1}`, ... placeholders
    #[serde(default)]
    pub substitutions: Vec<String>,
}

impl Line {
    pub fn new(id: impl Into<LineId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            substitutions: Vec::new(),
        }
    }

    pub fn with_substitutions(mut self, substitutions: Vec<String>) -> Self {
        self.substitutions = substitutions;
        self
    }
}

/// A line ready for presentation, carrying its current status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedLine {
    pub line: Line,
    /// Display text after string-table lookup and substitution
    pub text: String,
    pub status: LineStatus,
}

impl LocalizedLine {
    pub fn new(line: Line, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
            status: LineStatus::Running,
        }
    }

    pub fn id(&self) -> &LineId {
        &self.line.id
    }

    /// Speaker name for lines written as `Name: text`
    pub fn character_name(&self) -> Option<&str> {
        let (name, _) = self.text.split_once(": ")?;
        let name = name.trim();
        (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
    }

    /// Text with any `Name: ` prefix removed
    pub fn text_without_character_name(&self) -> &str {
        match self.character_name() {
            Some(_) => self
                .text
                .split_once(": ")
                .map(|(_, rest)| rest)
                .unwrap_or(&self.text),
            None => &self.text,
        }
    }
}
