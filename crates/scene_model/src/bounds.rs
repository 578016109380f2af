//! Layer bounds

use crate::cache::CacheManager;
use crate::layer::LayerKind;
use crate::{LayerId, Scene};
use kurbo::Rect;

/// Compute a layer's bounds in its local space without consulting the
/// layer's own cache entry. Children are read through `cache`.
///
/// Empty containers and unknown layers yield `Rect::ZERO`.
pub fn compute_bounds(scene: &Scene, id: LayerId, cache: &dyn CacheManager) -> Rect {
    let Some(layer) = scene.get(id) else {
        return Rect::ZERO;
    };

    match layer.kind() {
        LayerKind::Group(group) => {
            let mut result: Option<Rect> = None;
            for &child in group.children() {
                let Some(child_layer) = scene.get(child) else {
                    continue;
                };
                if child_layer.is_container() && child_layer.children().is_empty() {
                    continue;
                }
                let child_bounds = cache.bounds(scene, child);
                let mapped = child_layer.transform().to_affine().transform_rect_bbox(child_bounds);
                result = Some(match result {
                    Some(acc) => acc.union(mapped),
                    None => mapped,
                });
            }
            result.unwrap_or(Rect::ZERO)
        }
        _ => {
            let Some(geometry) = cache.geometry(scene, id) else {
                return Rect::ZERO;
            };
            let bounds = geometry.bounds();
            match layer.stroke() {
                Some(stroke) if stroke.is_visible() => bounds.inflate(stroke.width / 2.0, stroke.width / 2.0),
                _ => bounds,
            }
        }
    }
}

/// Bounds of a layer in its local space (before its own transform)
pub fn layer_bounds(scene: &Scene, id: LayerId, cache: &dyn CacheManager) -> Rect {
    cache.bounds(scene, id)
}

/// Bounds of a layer in its parent's space (after its own transform)
pub fn parent_bounds(scene: &Scene, id: LayerId, cache: &dyn CacheManager) -> Rect {
    let local = cache.bounds(scene, id);
    match scene.get(id) {
        Some(layer) => layer.transform().to_affine().transform_rect_bbox(local),
        None => Rect::ZERO,
    }
}

/// Bounds of a layer in document space
pub fn absolute_bounds(scene: &Scene, id: LayerId, cache: &dyn CacheManager) -> Rect {
    let local = cache.bounds(scene, id);
    scene.absolute_transform(id).transform_rect_bbox(local)
}
