//! Command trait and execution context

use crate::{EditError, Result};
use chrono::{DateTime, Utc};
use scene_model::{CacheManager, Document, GeometryProvider, LayerId, Scene};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing command identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandId(u64);

impl CommandId {
    pub fn next() -> Self {
        Self(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity and creation time shared by every command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMeta {
    pub id: CommandId,
    pub time: DateTime<Utc>,
}

impl CommandMeta {
    pub fn new() -> Self {
        Self {
            id: CommandId::next(),
            time: Utc::now(),
        }
    }

    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            id: CommandId::next(),
            time,
        }
    }

    /// Metadata for the result of merging `self` with a later command: the
    /// first command's id and the later command's time
    pub fn merged(&self, later: &CommandMeta) -> Self {
        Self {
            id: self.id,
            time: later.time,
        }
    }
}

impl Default for CommandMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a command touches while it runs
pub struct EditContext<'a> {
    pub document: &'a mut Document,
    pub cache: &'a dyn CacheManager,
    pub geometry: &'a dyn GeometryProvider,
}

impl<'a> EditContext<'a> {
    pub fn new(document: &'a mut Document, cache: &'a dyn CacheManager, geometry: &'a dyn GeometryProvider) -> Self {
        Self {
            document,
            cache,
            geometry,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.document.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.document.scene
    }
}

/// An undoable edit.
///
/// `execute` is called once per push and again only after an `undo`. Undo
/// data is captured during `execute` and kept in the command itself. Checks
/// that can fail without looking at live state belong in the constructor.
pub trait Command: fmt::Debug + Send + Sync + Any {
    /// Apply the edit
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()>;

    /// Restore every field `execute` changed
    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()>;

    /// Combine with a later command of the same type into one history entry
    fn merge(&self, _other: &dyn Command) -> Option<Box<dyn Command>> {
        None
    }

    /// Layers this command edits
    fn targets(&self) -> &[LayerId];

    /// Layers that must stay in the arena while this command is in history
    fn retained_layers(&self) -> Vec<LayerId> {
        self.targets().to_vec()
    }

    /// Text shown in undo/redo menus
    fn description(&self) -> &str;

    fn meta(&self) -> &CommandMeta;

    fn id(&self) -> CommandId {
        self.meta().id
    }

    fn time(&self) -> DateTime<Utc> {
        self.meta().time
    }

    fn as_any(&self) -> &dyn Any;
}

/// Whether two target lists share a layer
pub fn targets_overlap(a: &[LayerId], b: &[LayerId]) -> bool {
    if a.len() * b.len() <= 64 {
        return a.iter().any(|id| b.contains(id));
    }
    let set: HashSet<&LayerId> = a.iter().collect();
    b.iter().any(|id| set.contains(id))
}

/// Validate and deduplicate a target list, preserving order
pub(crate) fn check_targets(scene: &Scene, targets: Vec<LayerId>) -> Result<Vec<LayerId>> {
    if targets.is_empty() {
        return Err(EditError::PreconditionViolation("no target layers".to_string()));
    }
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(targets.len());
    for id in targets {
        if !scene.contains(id) {
            return Err(EditError::PreconditionViolation(format!("layer {} does not exist", id)));
        }
        if seen.insert(id) {
            result.push(id);
        }
    }
    Ok(result)
}

/// Validate that every target is attached below the root
pub(crate) fn check_attached(scene: &Scene, targets: &[LayerId]) -> Result<()> {
    for &id in targets {
        if id == scene.root_id() {
            return Err(EditError::PreconditionViolation("the root layer cannot be edited structurally".to_string()));
        }
        if !scene.is_attached(id) {
            return Err(EditError::PreconditionViolation(format!("layer {} is not in the document", id)));
        }
    }
    Ok(())
}
