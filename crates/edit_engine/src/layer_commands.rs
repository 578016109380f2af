//! Commands that add, remove and reorder layers

use crate::command::{check_attached, check_targets};
use crate::{Command, CommandMeta, EditContext, EditError, Result};
use scene_model::{Layer, LayerId, Scene};
use std::any::Any;

/// `parent` must be a container with room for `index`
fn check_destination(scene: &Scene, parent: LayerId, index: Option<usize>) -> Result<()> {
    let parent_layer = scene
        .get(parent)
        .ok_or_else(|| EditError::PreconditionViolation(format!("parent {} not found", parent)))?;
    if !parent_layer.is_container() {
        return Err(EditError::PreconditionViolation(format!("layer {} is not a container", parent)));
    }
    let len = parent_layer.children().len();
    match index {
        Some(index) if index > len => Err(EditError::PreconditionViolation(format!(
            "index {} is past the {} children of {}",
            index, len, parent
        ))),
        _ => Ok(()),
    }
}

/// Insert a layer under a container
#[derive(Debug)]
pub struct AddLayer {
    meta: CommandMeta,
    layer: LayerId,
    parent: LayerId,
    index: Option<usize>,
    /// The new layer until the first execute moves it into the arena
    pending: Option<Layer>,
    /// Index the layer landed at on the last execute
    inserted_at: Option<usize>,
}

impl AddLayer {
    /// Add a new layer
    pub fn new(scene: &Scene, layer: Layer, parent: LayerId, index: Option<usize>) -> Result<Self> {
        if scene.contains(layer.id()) {
            return Err(EditError::PreconditionViolation(format!(
                "layer {} is already in the scene",
                layer.id()
            )));
        }
        if layer.parent().is_some() {
            return Err(EditError::PreconditionViolation(format!(
                "layer {} already has a parent",
                layer.id()
            )));
        }
        if !layer.children().is_empty() {
            return Err(EditError::PreconditionViolation("a new container must be empty".to_string()));
        }
        check_destination(scene, parent, index)?;
        Ok(Self {
            meta: CommandMeta::new(),
            layer: layer.id(),
            parent,
            index,
            pending: Some(layer),
            inserted_at: None,
        })
    }

    /// Attach a detached layer already in the arena
    pub fn existing(scene: &Scene, id: LayerId, parent: LayerId, index: Option<usize>) -> Result<Self> {
        let layer = scene.layer(id)?;
        if let Some(current) = layer.parent() {
            return Err(EditError::PreconditionViolation(format!(
                "layer {} already has parent {}",
                id, current
            )));
        }
        check_destination(scene, parent, index)?;
        if id == parent || scene.is_ancestor(id, parent) {
            return Err(EditError::PreconditionViolation(format!(
                "layer {} cannot be attached inside itself",
                id
            )));
        }
        Ok(Self {
            meta: CommandMeta::new(),
            layer: id,
            parent,
            index,
            pending: None,
            inserted_at: None,
        })
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer
    }

    pub fn inserted_at(&self) -> Option<usize> {
        self.inserted_at
    }
}

impl Command for AddLayer {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let index = match self.pending.take() {
            Some(layer) => {
                scene.insert_layer(layer, self.parent, self.index)?;
                scene.index_of(self.layer).ok_or_else(|| {
                    EditError::InvariantViolation(format!("inserted layer {} has no index", self.layer))
                })?
            }
            None => scene.attach(self.layer, self.parent, self.index)?,
        };
        self.inserted_at = Some(index);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let index = ctx.scene_mut().remove_child(self.parent, self.layer)?;
        if Some(index) != self.inserted_at {
            tracing::warn!(layer = %self.layer, index, "added layer moved before undo");
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        std::slice::from_ref(&self.layer)
    }

    fn description(&self) -> &str {
        "Add Layer"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Detach layers from the tree
#[derive(Debug)]
pub struct RemoveLayers {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    /// Parent and index of each target at the last execute
    removed: Vec<(LayerId, usize)>,
}

impl RemoveLayers {
    pub fn new(scene: &Scene, targets: Vec<LayerId>) -> Result<Self> {
        let targets = check_targets(scene, targets)?;
        check_attached(scene, &targets)?;
        Ok(Self {
            meta: CommandMeta::new(),
            targets,
            removed: Vec::new(),
        })
    }
}

impl Command for RemoveLayers {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let mut removed = Vec::with_capacity(self.targets.len());
        for &id in &self.targets {
            match scene.detach(id) {
                Ok(position) => removed.push(position),
                Err(e) => {
                    for (&id, (parent, index)) in self.targets.iter().zip(removed).rev() {
                        scene.attach(id, parent, Some(index))?;
                    }
                    return Err(e.into());
                }
            }
        }
        self.removed = removed;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for (&id, &(parent, index)) in self.targets.iter().zip(&self.removed).rev() {
            scene.attach(id, parent, Some(index))?;
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn description(&self) -> &str {
        "Delete"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Move layers forward (negative delta) or backward within their parents.
///
/// The new index is clamped to the parent's child range; the index actually
/// left is recorded so undo returns each layer to where it was.
#[derive(Debug)]
pub struct ChangeZIndex {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    delta: isize,
    /// (old index, new index) per target from the last execute
    moves: Vec<(usize, usize)>,
}

impl ChangeZIndex {
    pub fn new(scene: &Scene, targets: Vec<LayerId>, delta: isize) -> Result<Self> {
        let targets = check_targets(scene, targets)?;
        check_attached(scene, &targets)?;
        Ok(Self {
            meta: CommandMeta::new(),
            targets,
            delta,
            moves: Vec::new(),
        })
    }

    /// Move to index 0, the front-most position
    pub fn bring_to_front(scene: &Scene, targets: Vec<LayerId>) -> Result<Self> {
        Self::new(scene, targets, isize::MIN)
    }

    /// Move to the last index, behind every sibling
    pub fn send_to_back(scene: &Scene, targets: Vec<LayerId>) -> Result<Self> {
        Self::new(scene, targets, isize::MAX)
    }

    pub fn delta(&self) -> isize {
        self.delta
    }

    /// Recorded `(old, new)` indices of the last execute
    pub fn moves(&self) -> &[(usize, usize)] {
        &self.moves
    }
}

impl Command for ChangeZIndex {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let mut moves = Vec::with_capacity(self.targets.len());
        for &id in &self.targets {
            let parent = scene
                .parent(id)
                .ok_or_else(|| EditError::InvariantViolation(format!("layer {} is not attached", id)))?;
            let last = scene.children(parent).len().saturating_sub(1);
            let old = scene
                .index_of(id)
                .ok_or_else(|| EditError::InvariantViolation(format!("layer {} missing from its parent", id)))?;
            let new = (old as isize).saturating_add(self.delta).clamp(0, last as isize) as usize;
            scene.move_child(id, new)?;
            moves.push((old, new));
        }
        self.moves = moves;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for (&id, &(old, _)) in self.targets.iter().zip(&self.moves).rev() {
            scene.move_child(id, old)?;
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn description(&self) -> &str {
        "Change Order"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
