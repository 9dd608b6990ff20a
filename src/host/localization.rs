//! Line text resolution

use crate::types::{Line, LineId, LocalizedLine};
use std::collections::HashMap;

/// Turns an engine line into display text
pub trait LineProvider: Send + Sync {
    fn localize(&self, line: &Line) -> LocalizedLine;
}

/// String-table lookup with `{0}`-style substitution.
/// Lines missing from the table fall back to their raw text.
#[derive(Debug, Clone, Default)]
pub struct StringTableLineProvider {
    table: HashMap<LineId, String>,
}

impl StringTableLineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: impl Into<LineId>, text: impl Into<String>) -> Self {
        self.table.insert(id.into(), text.into());
        self
    }

    /// Load a table from a JSON object of `"line id": "text"` pairs
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self {
            table: entries
                .into_iter()
                .map(|(id, text)| (LineId::new(id), text))
                .collect(),
        })
    }
}

impl LineProvider for StringTableLineProvider {
    fn localize(&self, line: &Line) -> LocalizedLine {
        let template = match self.table.get(&line.id) {
            Some(text) => text.as_str(),
            None => {
                log::trace!("no string table entry for {}; using raw text", line.id);
                line.text.as_str()
            }
        };
        LocalizedLine::new(line.clone(), substitute(template, &line.substitutions))
    }
}

/// Replace `{N}` with the Nth substitution. Unknown indices are left as-is.
fn substitute(template: &str, substitutions: &[String]) -> String {
    if substitutions.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match key.parse::<usize>().ok().and_then(|i| substitutions.get(i)) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
