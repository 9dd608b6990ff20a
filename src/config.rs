//! Orchestrator configuration

use crate::errors::DialogueError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Dismiss each line as soon as every view has delivered it,
    /// without waiting for the player
    pub auto_advance_lines: bool,
    /// Present the chosen option's text as a line before continuing
    pub run_selected_option_as_line: bool,
    /// Log lifecycle events at info level instead of debug
    pub verbose_logging: bool,
    /// Node used by `start()`
    pub start_node: Option<String>,
    /// Hint for hosts: start dialogue as soon as everything is wired up
    pub start_automatically: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            auto_advance_lines: false,
            run_selected_option_as_line: false,
            verbose_logging: false,
            start_node: Some("Start".to_string()),
            start_automatically: true,
        }
    }
}

impl DialogueConfig {
    pub fn from_json(json: &str) -> Result<Self, DialogueError> {
        serde_json::from_str(json).map_err(|e| DialogueError::config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DialogueError> {
        serde_json::to_string_pretty(self).map_err(|e| DialogueError::config(e.to_string()))
    }
}
