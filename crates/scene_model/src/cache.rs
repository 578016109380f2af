//! Derived geometry and bounds caching
//!
//! The scene stores no derived data. A [`CacheManager`] answers geometry and
//! bounds queries and is kept fresh by change notifications rather than by
//! calls from the graph.

use crate::bounds::compute_bounds;
use crate::change::{ChangeKind, ChangeObserver, LayerChange};
use crate::geometry::{Geometry, GeometryProvider};
use crate::layer::LayerKind;
use crate::path::PathInstruction;
use crate::{LayerId, Scene};
use kurbo::{Rect, Shape};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Clone chains deeper than this are treated as broken
const MAX_CLONE_DEPTH: usize = 32;

/// Source of derived geometry and bounds for layers
pub trait CacheManager: Send + Sync {
    /// Bounds of the layer in its own local space (before its transform)
    fn bounds(&self, scene: &Scene, id: LayerId) -> Rect;

    /// Geometry of the layer in its local space, `None` for containers
    fn geometry(&self, scene: &Scene, id: LayerId) -> Option<Arc<dyn Geometry>>;
}

/// Memoizing cache keyed by layer id.
///
/// Subscribe it to the scene so it drops stale entries:
/// `Bounds` drops the bounds entry; `Geometry` and `Layout` drop both.
pub struct SceneCache {
    provider: Arc<dyn GeometryProvider>,
    geometry: RwLock<HashMap<LayerId, Arc<dyn Geometry>>>,
    bounds: RwLock<HashMap<LayerId, Rect>>,
    /// Clone target -> clones whose geometry was derived from it
    dependents: RwLock<HashMap<LayerId, HashSet<LayerId>>>,
}

impl SceneCache {
    pub fn new(provider: Arc<dyn GeometryProvider>) -> Self {
        Self {
            provider,
            geometry: RwLock::new(HashMap::new()),
            bounds: RwLock::new(HashMap::new()),
            dependents: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn GeometryProvider> {
        &self.provider
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        if let Ok(mut map) = self.geometry.write() {
            map.clear();
        }
        if let Ok(mut map) = self.bounds.write() {
            map.clear();
        }
        if let Ok(mut map) = self.dependents.write() {
            map.clear();
        }
    }

    /// Drop cached entries of one layer and of clones derived from it
    pub fn invalidate(&self, id: LayerId, geometry: bool) {
        let mut pending = vec![id];
        let mut visited = HashSet::new();
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            if geometry {
                if let Ok(mut map) = self.geometry.write() {
                    map.remove(&current);
                }
            }
            if let Ok(mut map) = self.bounds.write() {
                map.remove(&current);
            }
            if let Ok(map) = self.dependents.read() {
                if let Some(clones) = map.get(&current) {
                    pending.extend(clones.iter().copied());
                }
            }
        }
    }

    /// Whether geometry for the layer is currently memoized
    pub fn has_geometry(&self, id: LayerId) -> bool {
        self.geometry.read().map(|map| map.contains_key(&id)).unwrap_or(false)
    }

    /// Whether bounds for the layer are currently memoized
    pub fn has_bounds(&self, id: LayerId) -> bool {
        self.bounds.read().map(|map| map.contains_key(&id)).unwrap_or(false)
    }

    fn build_geometry(&self, scene: &Scene, id: LayerId, depth: usize) -> Option<Arc<dyn Geometry>> {
        if depth > MAX_CLONE_DEPTH {
            tracing::warn!(%id, "clone chain too deep, ignoring geometry");
            return None;
        }
        if let Some(found) = self.geometry.read().ok().and_then(|map| map.get(&id).cloned()) {
            return Some(found);
        }

        let layer = scene.get(id)?;
        let built: Arc<dyn Geometry> = match layer.kind() {
            LayerKind::Group(_) => return None,
            LayerKind::Clone(clone) => {
                let target = scene.get(clone.target)?;
                let geometry = self.build_geometry(scene, clone.target, depth + 1)?;
                if let Ok(mut map) = self.dependents.write() {
                    map.entry(clone.target).or_default().insert(id);
                }
                Arc::from(geometry.transform(target.transform().to_affine()))
            }
            LayerKind::Text(text) => self.load(id, &rect_instructions(Rect::new(0.0, 0.0, text.width, text.height)))?,
            LayerKind::Picture(picture) => self.load(id, &rect_instructions(picture.rect()))?,
            kind => {
                let instructions = kind.as_geometric().map(|g| g.instructions()).unwrap_or_default();
                self.load(id, &instructions)?
            }
        };

        tracing::trace!(%id, "built layer geometry");
        if let Ok(mut map) = self.geometry.write() {
            map.insert(id, built.clone());
        }
        Some(built)
    }

    fn load(&self, id: LayerId, instructions: &[PathInstruction]) -> Option<Arc<dyn Geometry>> {
        match self.provider.load(instructions) {
            Ok(geometry) => Some(Arc::from(geometry)),
            Err(e) => {
                tracing::warn!("Failed to load geometry for {}: {}", id, e);
                None
            }
        }
    }
}

fn rect_instructions(rect: Rect) -> Vec<PathInstruction> {
    crate::path::from_bez_path(&rect.to_path(0.1))
}

impl CacheManager for SceneCache {
    fn bounds(&self, scene: &Scene, id: LayerId) -> Rect {
        if let Some(found) = self.bounds.read().ok().and_then(|map| map.get(&id).copied()) {
            return found;
        }
        let computed = compute_bounds(scene, id, self);
        if scene.contains(id) {
            if let Ok(mut map) = self.bounds.write() {
                map.insert(id, computed);
            }
        }
        computed
    }

    fn geometry(&self, scene: &Scene, id: LayerId) -> Option<Arc<dyn Geometry>> {
        self.build_geometry(scene, id, 0)
    }
}

impl ChangeObserver for SceneCache {
    fn on_change(&self, change: &LayerChange) {
        match change.kind {
            kind if kind.affects_geometry() => self.invalidate(change.layer, true),
            ChangeKind::Bounds => self.invalidate(change.layer, false),
            ChangeKind::Transform if change.is_local() => {
                // Clones of this layer embed its transform
                let clones: Vec<LayerId> = self
                    .dependents
                    .read()
                    .ok()
                    .and_then(|map| map.get(&change.layer).map(|set| set.iter().copied().collect()))
                    .unwrap_or_default();
                for clone in clones {
                    self.invalidate(clone, true);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for SceneCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geometry = self.geometry.read().map(|m| m.len()).unwrap_or(0);
        let bounds = self.bounds.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("SceneCache")
            .field("geometry", &geometry)
            .field("bounds", &bounds)
            .finish()
    }
}
