//! Parsing of `--model` / `//model` selections.

use crate::config::ModelEntry;
use crate::error::{ParleyError, Result};

/// Parses comma separated `name[=role]` lists.
pub struct ModelSelector;

impl ModelSelector {
    /// Parse `"gpt-4o,ollama/llama2=critic"` into ordered entries.
    ///
    /// Blank items are skipped; an item with an empty name is an error.
    pub fn parse_list(raw: &str) -> Result<Vec<ModelEntry>> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Self::parse_one)
            .collect()
    }

    /// Parse a single `name[=role]` item.
    pub fn parse_one(item: &str) -> Result<ModelEntry> {
        let (name, role) = match item.split_once('=') {
            Some((name, role)) => (name.trim(), Some(role.trim())),
            None => (item.trim(), None),
        };
        if name.is_empty() {
            return Err(ParleyError::InvalidArgument(format!(
                "Invalid model selection '{item}': expected 'name' or 'name=role'"
            )));
        }
        Ok(ModelEntry {
            name: name.to_string(),
            role: role.filter(|r| !r.is_empty()).map(str::to_string),
        })
    }
}
