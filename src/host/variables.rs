//! Variable storage used by the script engine

use crate::errors::DialogueError;
use crate::types::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage for `$`-prefixed script variables
pub trait VariableStorage: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    fn set(&self, name: &str, value: Value) -> Result<(), DialogueError>;

    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct InMemoryVariableStorage {
    variables: RwLock<HashMap<String, Value>>,
}

impl InMemoryVariableStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every variable, sorted by name
    pub fn entries(&self) -> Vec<(String, Value)> {
        let variables = self
            .variables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries: Vec<_> = variables
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl VariableStorage for InMemoryVariableStorage {
    fn get(&self, name: &str) -> Option<Value> {
        self.variables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    fn set(&self, name: &str, value: Value) -> Result<(), DialogueError> {
        if !name.starts_with('$') {
            return Err(DialogueError::InvalidVariableName {
                name: name.to_string(),
            });
        }
        self.variables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), value);
        Ok(())
    }

    fn clear(&self) {
        self.variables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
