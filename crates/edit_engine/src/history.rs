//! Linear undo/redo history with gesture merging

use crate::command::targets_overlap;
use crate::{Command, EditContext, EditError, Result};
use chrono::Duration;

/// Default number of entries kept before the oldest are dropped
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Ordered command stack with a cursor.
///
/// Commands below `position` are applied and can be undone; commands at or
/// above it have been undone and can be redone until something new is pushed.
pub struct History {
    commands: Vec<Box<dyn Command>>,
    position: usize,
    max_entries: usize,
    /// Set by `seal`; the next `merge` starts a new entry
    sealed: bool,
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            commands: Vec::new(),
            position: 0,
            max_entries: max_entries.max(1),
            sealed: false,
        }
    }

    /// Record an already-applied command, discarding the redo branch
    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.truncate(self.position);
        tracing::debug!(id = %command.id(), "push {}", command.description());
        self.commands.push(command);
        self.position = self.commands.len();
        self.sealed = false;
        self.trim();
    }

    /// Apply a command and record it. A command that fails is not recorded.
    pub fn execute(&mut self, mut command: Box<dyn Command>, ctx: &mut EditContext<'_>) -> Result<()> {
        command.execute(ctx)?;
        self.push(command);
        Ok(())
    }

    /// Apply a command and fold it into the top entry when both are the same
    /// kind of edit on overlapping layers within `window`. Returns whether it
    /// was merged.
    pub fn merge(&mut self, mut command: Box<dyn Command>, ctx: &mut EditContext<'_>, window: Duration) -> Result<bool> {
        command.execute(ctx)?;
        self.commands.truncate(self.position);

        if !self.sealed {
            if let Some(top) = self.commands.last_mut() {
                let same_kind = top.as_any().type_id() == command.as_any().type_id();
                let elapsed = command.time() - top.time();
                if same_kind
                    && targets_overlap(top.targets(), command.targets())
                    && elapsed >= Duration::zero()
                    && elapsed <= window
                {
                    if let Some(merged) = top.merge(command.as_ref()) {
                        tracing::debug!(id = %merged.id(), "merged {}", merged.description());
                        *top = merged;
                        return Ok(true);
                    }
                }
            }
        }

        self.push(command);
        Ok(false)
    }

    /// End the current gesture: the next `merge` never joins the top entry
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        if self.position == 0 {
            return Err(EditError::UndoStackEmpty);
        }
        let command = &mut self.commands[self.position - 1];
        command.undo(ctx)?;
        tracing::debug!(id = %command.id(), "undo {}", command.description());
        self.position -= 1;
        self.sealed = true;
        Ok(())
    }

    pub fn redo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        if self.position >= self.commands.len() {
            return Err(EditError::RedoStackEmpty);
        }
        let command = &mut self.commands[self.position];
        command.execute(ctx)?;
        tracing::debug!(id = %command.id(), "redo {}", command.description());
        self.position += 1;
        self.sealed = true;
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.commands.len()
    }

    /// Number of applied commands
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.commands.get(self.position).map(|c| c.description())
    }

    /// All recorded commands, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.iter().map(|c| c.as_ref())
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.position = 0;
        self.sealed = false;
    }

    fn trim(&mut self) {
        let excess = self.commands.len().saturating_sub(self.max_entries);
        if excess > 0 {
            self.commands.drain(..excess);
            self.position -= excess;
            tracing::debug!(dropped = excess, "history trimmed");
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("len", &self.commands.len())
            .field("position", &self.position)
            .field("max_entries", &self.max_entries)
            .field("sealed", &self.sealed)
            .finish()
    }
}
