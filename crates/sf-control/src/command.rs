//! Undoable command pattern
//!
//! A command mutates the shared mixer in `execute()` and reverses itself in
//! `undo()`. Both return `Ok(false)` when there was nothing to do and `Err`
//! when the engine refused; neither panics.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SfResult;

/// Operation tag carried by every command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    CreateSoundSource,
    RemoveSoundSource,
    MoveSoundSource,
    CreateGlobalEffect,
    RemoveGlobalEffect,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSoundSource => "create_sound_source",
            Self::RemoveSoundSource => "remove_sound_source",
            Self::MoveSoundSource => "move_sound_source",
            Self::CreateGlobalEffect => "create_global_effect",
            Self::RemoveGlobalEffect => "remove_global_effect",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for undoable mixer commands
pub trait Command: Send + Sync {
    /// Apply the command; `Ok(false)` if it had nothing to act on
    fn execute(&mut self) -> SfResult<bool>;

    /// Reverse a successful `execute()`; `Ok(false)` if it cannot
    fn undo(&mut self) -> SfResult<bool>;

    /// Stable identity, assigned at construction
    fn id(&self) -> Uuid;

    fn kind(&self) -> CommandKind;

    /// Human-readable name for display
    fn name(&self) -> &str;

    /// Payload describing what the command acted on
    fn data(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Outcome of executing one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub command_id: Uuid,
    pub kind: CommandKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn succeeded(command: &dyn Command) -> Self {
        Self {
            success: true,
            command_id: command.id(),
            kind: command.kind(),
            message: format!("{} succeeded", command.name()),
            data: command.data(),
            error: None,
        }
    }

    /// `Ok(false)` from `execute()`: nothing was changed
    pub fn not_applied(command: &dyn Command) -> Self {
        Self {
            success: false,
            command_id: command.id(),
            kind: command.kind(),
            message: format!("{} was not applied", command.name()),
            data: command.data(),
            error: None,
        }
    }

    pub fn failed(command: &dyn Command, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            command_id: command.id(),
            kind: command.kind(),
            message: format!("{} failed", command.name()),
            data: command.data(),
            error: Some(error.to_string()),
        }
    }
}

/// Bounded history of executed commands, oldest evicted first
pub struct CommandHistory {
    entries: VecDeque<Box<dyn Command>>,
    max_history: usize,
}

impl CommandHistory {
    pub fn new(max_history: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_history.min(128)),
            max_history: max_history.max(1),
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        while self.entries.len() >= self.max_history {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!("Command history full, evicting '{}'", evicted.name());
            }
        }
        self.entries.push_back(command);
    }

    pub fn pop(&mut self) -> Option<Box<dyn Command>> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_history
    }

    /// Name of the command `pop()` would return
    pub fn last_name(&self) -> Option<&str> {
        self.entries.back().map(|c| c.name())
    }

    /// Ids from oldest to newest
    pub fn ids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|c| c.id()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("len", &self.entries.len())
            .field("max_history", &self.max_history)
            .finish()
    }
}
