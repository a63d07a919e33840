//! Named snapshots of every model's conversation history.
//!
//! A checkpoint's `position` is the reference (first) model's message count
//! when it was taken. Restoring to a checkpoint deletes every checkpoint with
//! a greater position: those snapshots describe turns that no longer exist.

mod review;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{Message, Role};
use crate::util::text::{single_line, truncate_with_ellipsis};

const PREVIEW_CHARS: usize = 40;

/// Anything whose conversation can be snapshotted and restored.
pub trait History {
    /// Key used to match stored histories back to live ones.
    fn history_id(&self) -> String;

    fn messages(&self) -> &[Message];

    fn replace_messages(&mut self, messages: Vec<Message>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub name: String,
    pub position: usize,
    /// Deep copies keyed by history id, in model order.
    pub histories: Vec<(String, Vec<Message>)>,
    pub created_at: DateTime<Local>,
    pub preview: String,
}

impl Checkpoint {
    pub fn history(&self, id: &str) -> Option<&[Message]> {
        self.histories
            .iter()
            .find(|(hid, _)| hid == id)
            .map(|(_, messages)| messages.as_slice())
    }
}

/// User-facing checkpoint failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("Checkpoint '{name}' not found. Available: {available}")]
    NotFound { name: String, available: String },

    #[error("No earlier checkpoint to restore. Available: {available}")]
    NothingToRestore { available: String },

    #[error("No active models")]
    NoActiveModels,
}

#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    checkpoints: Vec<Checkpoint>,
    counter: u64,
    last_name: Option<String>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every checkpoint and reset auto-naming.
    pub fn reset(&mut self) {
        self.checkpoints.clear();
        self.counter = 0;
        self.last_name = None;
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.name == name)
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// Names in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.checkpoints.iter().map(|c| c.name.as_str()).collect()
    }

    fn available(&self) -> String {
        if self.checkpoints.is_empty() {
            "none".to_string()
        } else {
            self.names().join(", ")
        }
    }

    /// Snapshot every history. A blank name takes the next counter value.
    /// Reusing a name replaces the older checkpoint.
    pub fn checkpoint<H: History>(
        &mut self,
        name: Option<&str>,
        contexts: &[H],
    ) -> Result<String, CheckpointError> {
        let reference = contexts.first().ok_or(CheckpointError::NoActiveModels)?;

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self.next_auto_name(),
        };

        let position = reference.messages().len();
        let preview = reference
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| truncate_with_ellipsis(&single_line(&m.text_content()), PREVIEW_CHARS))
            .unwrap_or_default();

        let checkpoint = Checkpoint {
            name: name.clone(),
            position,
            histories: contexts
                .iter()
                .map(|c| (c.history_id(), c.messages().to_vec()))
                .collect(),
            created_at: Local::now(),
            preview,
        };

        self.checkpoints.retain(|c| c.name != name);
        self.checkpoints.push(checkpoint);
        self.last_name = Some(name.clone());

        info!(checkpoint = %name, position, "Checkpoint created");
        Ok(format!("Checkpoint '{name}' created at position {position}"))
    }

    fn next_auto_name(&mut self) -> String {
        loop {
            self.counter += 1;
            let candidate = self.counter.to_string();
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Restore every history from a checkpoint.
    ///
    /// A blank name means the checkpoint with the second-highest position,
    /// one step back from the latest. Checkpoints positioned after the
    /// restored one are removed.
    pub fn restore<H: History>(
        &mut self,
        name: Option<&str>,
        contexts: &mut [H],
    ) -> Result<String, CheckpointError> {
        if contexts.is_empty() {
            return Err(CheckpointError::NoActiveModels);
        }

        let target = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self.get(name).cloned().ok_or_else(|| CheckpointError::NotFound {
                name: name.to_string(),
                available: self.available(),
            })?,
            None => self
                .previous_checkpoint()
                .cloned()
                .ok_or_else(|| CheckpointError::NothingToRestore {
                    available: self.available(),
                })?,
        };

        for context in contexts.iter_mut() {
            let id = context.history_id();
            match target.history(&id) {
                Some(messages) => context.replace_messages(messages.to_vec()),
                None => warn!(model = %id, checkpoint = %target.name, "No stored history for model"),
            }
        }

        let before = self.checkpoints.len();
        self.checkpoints.retain(|c| c.position <= target.position);
        let removed = before - self.checkpoints.len();
        self.last_name = Some(target.name.clone());

        info!(checkpoint = %target.name, removed, "Checkpoint restored");
        Ok(format!(
            "Restored checkpoint '{}' (position {}). Removed {removed} checkpoint(s)",
            target.name, target.position
        ))
    }

    /// The checkpoint with the second-highest position.
    pub fn previous_checkpoint(&self) -> Option<&Checkpoint> {
        let mut by_position: Vec<&Checkpoint> = self.checkpoints.iter().collect();
        by_position.sort_by(|a, b| b.position.cmp(&a.position));
        by_position.get(1).copied()
    }

    /// Reset every history, optionally keeping its system message, and drop
    /// all checkpoints.
    pub fn clear<H: History>(&mut self, keep_system: bool, contexts: &mut [H]) -> String {
        for context in contexts.iter_mut() {
            let system = context
                .messages()
                .iter()
                .find(|m| m.role == Role::System)
                .cloned();
            let fresh = match system {
                Some(system) if keep_system => vec![system],
                _ => Vec::new(),
            };
            context.replace_messages(fresh);
        }
        self.reset();

        if keep_system {
            "Conversation cleared (system prompt kept)".to_string()
        } else {
            "Conversation cleared".to_string()
        }
    }

    /// The reference history with checkpoint markers.
    pub fn review<H: History>(&self, contexts: &[H]) -> Result<String, CheckpointError> {
        let reference = contexts.first().ok_or(CheckpointError::NoActiveModels)?;
        Ok(review::render(
            &reference.history_id(),
            reference.messages(),
            &self.checkpoints,
        ))
    }

    /// Every checkpoint with position, creation time and preview.
    pub fn list(&self) -> String {
        if self.checkpoints.is_empty() {
            return "No checkpoints".to_string();
        }

        let mut sorted: Vec<&Checkpoint> = self.checkpoints.iter().collect();
        sorted.sort_by_key(|c| c.position);

        let mut lines = vec![format!("Checkpoints ({}):", sorted.len())];
        for c in sorted {
            let marker = if self.last_name.as_deref() == Some(c.name.as_str()) {
                " *"
            } else {
                ""
            };
            lines.push(format!(
                "  {}{marker}: position {}, {}, \"{}\"",
                c.name,
                c.position,
                c.created_at.format("%Y-%m-%d %H:%M:%S"),
                c.preview
            ));
        }
        lines.join("\n")
    }
}
