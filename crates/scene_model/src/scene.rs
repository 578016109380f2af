//! Scene arena and tree operations
//!
//! The [`Scene`] owns every layer in a map keyed by [`LayerId`]. Containers
//! hold child ids; each layer holds its parent id. Both sides of a
//! parent/child link are written inside the same `&mut Scene` call, so no
//! reader can observe them disagreeing.
//!
//! Layers removed from the tree are not dropped. They stay in the arena
//! detached so that undo records referencing them keep resolving, until
//! [`Scene::purge_detached`] discards the ones nothing refers to anymore.

use crate::change::{ChangeKind, ChangeObserver, LayerChange};
use crate::layer::{GroupLayer, Layer, LayerKind};
use crate::paint::{PaintRef, Stroke};
use crate::{LayerId, Result, SceneError, Transform};
use kurbo::Affine;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Determinants below this are treated as singular
const SINGULAR_DETERMINANT: f64 = 1e-12;

/// The layer arena and tree
#[derive(Clone, Serialize, Deserialize)]
pub struct Scene {
    root: LayerId,
    layers: HashMap<LayerId, Layer>,
    #[serde(skip)]
    pending: Vec<LayerChange>,
    #[serde(skip)]
    observers: Vec<Arc<dyn ChangeObserver>>,
}

impl Scene {
    /// Create a scene holding an empty root group
    pub fn new() -> Self {
        let root = Layer::group().with_name("Root");
        let root_id = root.id();
        let mut layers = HashMap::new();
        layers.insert(root_id, root);
        Self {
            root: root_id,
            layers,
            pending: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn root_id(&self) -> LayerId {
        self.root
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    /// Look up a layer, failing with `LayerNotFound`
    pub fn layer(&self, id: LayerId) -> Result<&Layer> {
        self.layers.get(&id).ok_or(SceneError::LayerNotFound(id))
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        self.layers.get_mut(&id).ok_or(SceneError::LayerNotFound(id))
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    /// All layers in the arena, attached or not, in no particular order
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Number of layers in the arena, the root included
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Whether the arena holds nothing but the root
    pub fn has_no_layers(&self) -> bool {
        self.layers.len() <= 1
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Store a detached layer in the arena
    pub fn add_layer(&mut self, layer: Layer) -> Result<LayerId> {
        let id = layer.id();
        if self.layers.contains_key(&id) {
            return Err(SceneError::InvalidOperation(format!("layer {} already exists", id)));
        }
        if let Some(parent) = layer.parent() {
            return Err(SceneError::AlreadyParented { layer: id, parent });
        }
        if !layer.children().is_empty() {
            return Err(SceneError::InvalidOperation(
                "a new container must be empty; attach children through the scene".to_string(),
            ));
        }
        self.layers.insert(id, layer);
        Ok(id)
    }

    /// Store a new layer and attach it under `parent`
    pub fn insert_layer(&mut self, layer: Layer, parent: LayerId, index: Option<usize>) -> Result<LayerId> {
        // Validate the parent first so a failure leaves the arena untouched
        let parent_layer = self.layer(parent)?;
        if !parent_layer.is_container() {
            return Err(SceneError::NotAContainer(parent));
        }
        let len = parent_layer.children().len();
        if let Some(index) = index {
            if index > len {
                return Err(SceneError::IndexOutOfRange { index, len });
            }
        }

        let id = self.add_layer(layer)?;
        self.attach(id, parent, index)?;
        Ok(id)
    }

    /// Attach a detached layer under `parent` at `index` (end when `None`).
    /// Returns the index it was inserted at.
    pub fn attach(&mut self, child: LayerId, parent: LayerId, index: Option<usize>) -> Result<usize> {
        if child == self.root {
            return Err(SceneError::RootLayer);
        }
        let child_layer = self.layer(child)?;
        if let Some(existing) = child_layer.parent() {
            return Err(SceneError::AlreadyParented {
                layer: child,
                parent: existing,
            });
        }
        let parent_layer = self.layer(parent)?;
        if !parent_layer.is_container() {
            return Err(SceneError::NotAContainer(parent));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(SceneError::CycleDetected { layer: child, parent });
        }

        let len = parent_layer.children().len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(SceneError::IndexOutOfRange { index, len });
        }

        self.group_mut(parent)?.insert_child(index, child);
        self.layer_mut(child)?.set_parent(Some(parent));

        tracing::trace!(%child, %parent, index, "attached layer");
        self.raise(parent, ChangeKind::Children);
        Ok(index)
    }

    /// Detach a layer from its parent, returning the parent and the index it
    /// occupied
    pub fn detach(&mut self, child: LayerId) -> Result<(LayerId, usize)> {
        if child == self.root {
            return Err(SceneError::RootLayer);
        }
        let parent = self
            .layer(child)?
            .parent()
            .ok_or_else(|| SceneError::InvalidOperation(format!("layer {} is not attached", child)))?;
        let index = self.remove_child(parent, child)?;
        Ok((parent, index))
    }

    /// Remove `child` from `parent`, failing when it is not that parent's child
    pub fn remove_child(&mut self, parent: LayerId, child: LayerId) -> Result<usize> {
        if self.layer(child)?.parent() != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }
        let group = self.group_mut(parent)?;
        let index = group
            .index_of(child)
            .ok_or(SceneError::NotAChild { parent, child })?;
        group.remove_child_at(index);
        self.layer_mut(child)?.set_parent(None);

        tracing::trace!(%child, %parent, index, "detached layer");
        self.raise(parent, ChangeKind::Children);
        Ok(index)
    }

    /// Move a layer to `new_index` within its parent, returning its old index
    pub fn move_child(&mut self, child: LayerId, new_index: usize) -> Result<usize> {
        let parent = self
            .layer(child)?
            .parent()
            .ok_or_else(|| SceneError::InvalidOperation(format!("layer {} is not attached", child)))?;
        let group = self.group_mut(parent)?;
        let len = group.len();
        if new_index >= len {
            return Err(SceneError::IndexOutOfRange { index: new_index, len });
        }
        let old_index = group
            .index_of(child)
            .ok_or(SceneError::NotAChild { parent, child })?;
        if old_index != new_index {
            group.remove_child_at(old_index);
            group.insert_child(new_index, child);
            self.raise(parent, ChangeKind::Children);
        }
        Ok(old_index)
    }

    fn group_mut(&mut self, id: LayerId) -> Result<&mut GroupLayer> {
        self.layer_mut(id)?
            .kind_mut()
            .as_group_mut()
            .ok_or(SceneError::NotAContainer(id))
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.layers.get(&id).and_then(Layer::parent)
    }

    /// Children of a container; empty for leaves and unknown ids
    pub fn children(&self, id: LayerId) -> &[LayerId] {
        self.layers.get(&id).map(Layer::children).unwrap_or(&[])
    }

    /// Index of a layer within its parent
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Iterate the parent chain of a layer, nearest first
    pub fn ancestors(&self, id: LayerId) -> Ancestors<'_> {
        Ancestors {
            scene: self,
            next: self.parent(id),
        }
    }

    /// Number of ancestors; the root has depth 0
    pub fn depth(&self, id: LayerId) -> usize {
        self.ancestors(id).count()
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: LayerId, id: LayerId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Whether the layer is reachable from the root
    pub fn is_attached(&self, id: LayerId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    /// All descendants in pre-order (front-most first), excluding `id`
    pub fn descendants(&self, id: LayerId) -> Vec<LayerId> {
        let mut result = Vec::new();
        let mut stack: Vec<LayerId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// The parent's absolute transform, identity for roots and detached layers
    pub fn world_transform(&self, id: LayerId) -> Affine {
        match self.parent(id) {
            Some(parent) => self.absolute_transform(parent),
            None => Affine::IDENTITY,
        }
    }

    /// Transform from the layer's local space to document space
    pub fn absolute_transform(&self, id: LayerId) -> Affine {
        let local = self
            .layers
            .get(&id)
            .map(|layer| layer.transform().to_affine())
            .unwrap_or(Affine::IDENTITY);
        self.world_transform(id) * local
    }

    /// Replace a layer's local transform, returning the previous one
    pub fn set_transform(&mut self, id: LayerId, transform: Transform) -> Result<Transform> {
        let old = self.layer_mut(id)?.set_transform(transform);
        self.raise(id, ChangeKind::Transform);
        Ok(old)
    }

    /// Apply a delta expressed in local space (`local`) and/or in the space of
    /// the layer's parent chain (`global`):
    ///
    /// `T' = W⁻¹ · G · W · T · L`
    ///
    /// where `W` is the world transform. Returns the previous transform.
    pub fn apply_transform(&mut self, id: LayerId, local: Option<Affine>, global: Option<Affine>) -> Result<Transform> {
        let current = self.layer(id)?.transform().to_affine();
        let mut next = match local {
            Some(local) => current * local,
            None => current,
        };
        if let Some(global) = global {
            let world = self.world_transform(id);
            if world.determinant().abs() <= SINGULAR_DETERMINANT {
                return Err(SceneError::NotSupported(format!(
                    "world transform of {} is not invertible",
                    id
                )));
            }
            next = world.inverse() * global * world * next;
        }
        self.set_transform(id, Transform::from_affine(next))
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Mutate a layer and raise `change` afterwards.
    ///
    /// A container's child list cannot be changed this way; doing so is
    /// reverted and reported as an error.
    pub fn update<R>(&mut self, id: LayerId, change: ChangeKind, f: impl FnOnce(&mut Layer) -> R) -> Result<R> {
        let layer = self.layer_mut(id)?;
        let children_before = layer.kind().as_group().map(|g| g.children().to_vec());

        let result = f(layer);

        if let Some(children) = children_before {
            if layer.children() != children.as_slice() || !layer.is_container() {
                *layer.kind_mut() = LayerKind::Group(GroupLayer::from_children(children));
                return Err(SceneError::InvalidOperation(
                    "container children can only change through the scene".to_string(),
                ));
            }
        } else if !layer.children().is_empty() {
            *layer.kind_mut() = LayerKind::Group(GroupLayer::new());
            return Err(SceneError::InvalidOperation(
                "container children can only change through the scene".to_string(),
            ));
        }

        self.raise(id, change);
        Ok(result)
    }

    pub fn set_name(&mut self, id: LayerId, name: Option<String>) -> Result<Option<String>> {
        self.update(id, ChangeKind::Property, |layer| layer.set_name(name))
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> Result<f32> {
        self.update(id, ChangeKind::Property, |layer| layer.set_opacity(opacity))
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<bool> {
        self.update(id, ChangeKind::Property, |layer| layer.set_visible(visible))
    }

    pub fn set_selected(&mut self, id: LayerId, selected: bool) -> Result<bool> {
        self.update(id, ChangeKind::Property, |layer| layer.set_selected(selected))
    }

    /// Replace the fill of a filled layer, returning the released paint
    pub fn set_fill(&mut self, id: LayerId, fill: Option<PaintRef>) -> Result<Option<PaintRef>> {
        if self.layer(id)?.kind().as_filled().is_none() {
            return Err(SceneError::NotSupported(format!("layer {} has no fill", id)));
        }
        self.update(id, ChangeKind::Fill, |layer| {
            layer.kind_mut().as_filled_mut().and_then(|f| f.set_fill(fill))
        })
    }

    /// Replace the stroke of a stroked layer, returning the previous stroke
    pub fn set_stroke(&mut self, id: LayerId, stroke: Option<Stroke>) -> Result<Option<Stroke>> {
        if self.layer(id)?.kind().as_stroked().is_none() {
            return Err(SceneError::NotSupported(format!("layer {} has no stroke", id)));
        }
        self.update(id, ChangeKind::Stroke, |layer| {
            layer.kind_mut().as_stroked_mut().and_then(|s| s.set_stroke(stroke))
        })
    }

    pub fn set_clip(&mut self, id: LayerId, clip: Option<LayerId>) -> Result<Option<LayerId>> {
        self.check_reference(id, clip)?;
        self.update(id, ChangeKind::Geometry, |layer| layer.set_clip(clip))
    }

    pub fn set_mask(&mut self, id: LayerId, mask: Option<LayerId>) -> Result<Option<LayerId>> {
        self.check_reference(id, mask)?;
        self.update(id, ChangeKind::Property, |layer| layer.set_mask(mask))
    }

    fn check_reference(&self, id: LayerId, reference: Option<LayerId>) -> Result<()> {
        self.layer(id)?;
        if let Some(reference) = reference {
            self.layer(reference)?;
            if reference == id || self.is_ancestor(reference, id) {
                return Err(SceneError::CycleDetected { layer: reference, parent: id });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Change notification
    // =========================================================================

    /// Register an observer for committed changes
    pub fn subscribe(&mut self, observer: Arc<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    /// Queue a change at `origin` and propagate it up the parent chain
    pub fn raise(&mut self, origin: LayerId, kind: ChangeKind) {
        let bounds = kind.affects_bounds() || kind == ChangeKind::Bounds;
        self.pending.push(LayerChange::new(origin, origin, kind));
        if kind.affects_bounds() {
            self.pending.push(LayerChange::new(origin, origin, ChangeKind::Bounds));
        }

        let ancestors: Vec<LayerId> = self.ancestors(origin).collect();
        for ancestor in ancestors {
            self.pending.push(LayerChange::new(ancestor, origin, ChangeKind::Property));
            if bounds {
                self.pending.push(LayerChange::new(ancestor, origin, ChangeKind::Bounds));
            }
        }
    }

    /// Changes queued since the last flush
    pub fn pending_changes(&self) -> &[LayerChange] {
        &self.pending
    }

    /// Deliver queued changes to observers, returning them. Duplicates are
    /// delivered once, in order of first occurrence.
    pub fn flush_changes(&mut self) -> Vec<LayerChange> {
        let mut seen = HashSet::new();
        let changes: Vec<LayerChange> = self.pending.drain(..).filter(|c| seen.insert(*c)).collect();
        if !changes.is_empty() {
            tracing::trace!(count = changes.len(), observers = self.observers.len(), "flushing changes");
        }
        for change in &changes {
            for observer in &self.observers {
                observer.on_change(change);
            }
        }
        changes
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Drop detached layers (and their subtrees) that are neither in `keep`
    /// nor referenced as a clip, mask or clone target. Returns how many layers
    /// were removed.
    pub fn purge_detached(&mut self, keep: &HashSet<LayerId>) -> usize {
        let mut referenced: HashSet<LayerId> = keep.clone();
        for layer in self.layers.values() {
            referenced.extend(layer.clip());
            referenced.extend(layer.mask());
            if let LayerKind::Clone(clone) = layer.kind() {
                referenced.insert(clone.target);
            }
        }

        let candidates: Vec<LayerId> = self
            .layers
            .values()
            .filter(|layer| layer.parent().is_none() && layer.id() != self.root)
            .map(Layer::id)
            .filter(|id| !referenced.contains(id))
            .collect();

        let mut removed = 0;
        for candidate in candidates {
            let subtree = self.descendants(candidate);
            if subtree.iter().any(|id| referenced.contains(id)) {
                continue;
            }
            for id in subtree.into_iter().chain(std::iter::once(candidate)) {
                if self.layers.remove(&id).is_some() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "purged detached layers");
        }
        removed
    }

    /// Check the parent/child invariants of the whole arena
    pub fn validate(&self) -> Result<()> {
        let mut owned = HashSet::new();
        for layer in self.layers.values() {
            for &child in layer.children() {
                let child_layer = self.layer(child)?;
                if child_layer.parent() != Some(layer.id()) {
                    return Err(SceneError::NotAChild {
                        parent: layer.id(),
                        child,
                    });
                }
                if !owned.insert(child) {
                    return Err(SceneError::InvalidOperation(format!(
                        "layer {} appears in more than one container",
                        child
                    )));
                }
            }
            if let Some(parent) = layer.parent() {
                let parent_layer = self.layer(parent)?;
                if !parent_layer.children().contains(&layer.id()) {
                    return Err(SceneError::NotAChild {
                        parent,
                        child: layer.id(),
                    });
                }
            }
        }

        for layer in self.layers.values() {
            if self.ancestors(layer.id()).take(self.layers.len() + 1).count() > self.layers.len() {
                return Err(SceneError::CycleDetected {
                    layer: layer.id(),
                    parent: layer.parent().unwrap_or(layer.id()),
                });
            }
        }
        Ok(())
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("root", &self.root)
            .field("layers", &self.layers.len())
            .field("pending", &self.pending.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Iterator over a layer's ancestors, nearest first.
///
/// Created by [`Scene::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    scene: &'a Scene,
    next: Option<LayerId>,
}

impl Iterator for Ancestors<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        let current = self.next?;
        self.next = self.scene.parent(current);
        Some(current)
    }
}
