//! Render traversal
//!
//! The scene does not rasterize. [`render`] walks the tree and hands each
//! visible layer to a [`RenderContext`] together with its cached geometry.

use crate::cache::CacheManager;
use crate::geometry::Geometry;
use crate::layer::Layer;
use crate::{LayerId, Scene};
use kurbo::Affine;

/// Drawing backend driven by [`render`]
pub trait RenderContext {
    /// Concatenate `transform` onto the current transform
    fn push_transform(&mut self, transform: Affine);

    /// Restore the transform saved by the matching `push_transform`
    fn pop_transform(&mut self);

    /// Draw one layer's own content in the current transform.
    /// Containers are passed too so backends can open opacity groups.
    fn draw_layer(&mut self, layer: &Layer, geometry: Option<&dyn Geometry>);
}

/// Draw the whole scene, back to front
pub fn render(scene: &Scene, cache: &dyn CacheManager, ctx: &mut dyn RenderContext) {
    render_layer(scene, scene.root_id(), cache, ctx);
}

/// Draw one layer and its subtree
pub fn render_layer(scene: &Scene, id: LayerId, cache: &dyn CacheManager, ctx: &mut dyn RenderContext) {
    let Some(layer) = scene.get(id) else {
        return;
    };
    if !layer.is_visible() {
        return;
    }

    ctx.push_transform(layer.transform().to_affine());
    let geometry = cache.geometry(scene, id);
    ctx.draw_layer(layer, geometry.as_deref());
    // Index 0 is front-most, so draw from the end
    for &child in layer.children().iter().rev() {
        render_layer(scene, child, cache, ctx);
    }
    ctx.pop_transform();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BezGeometryProvider;
    use crate::{SceneCache, Transform};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recording {
        depth: usize,
        drawn: Vec<(LayerId, usize, bool)>,
    }

    impl RenderContext for Recording {
        fn push_transform(&mut self, _transform: Affine) {
            self.depth += 1;
        }

        fn pop_transform(&mut self) {
            self.depth -= 1;
        }

        fn draw_layer(&mut self, layer: &Layer, geometry: Option<&dyn Geometry>) {
            self.drawn.push((layer.id(), self.depth, geometry.is_some()));
        }
    }

    #[test]
    fn test_back_to_front_order() {
        let mut scene = Scene::new();
        let root = scene.root_id();
        let front = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), root, None).unwrap();
        let back = scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), root, None).unwrap();
        let hidden = scene
            .insert_layer(
                Layer::rectangle(0.0, 0.0, 1.0, 1.0).with_transform(Transform::from_translation(1.0, 1.0)),
                root,
                None,
            )
            .unwrap();
        scene.set_visible(hidden, false).unwrap();

        let cache = SceneCache::new(Arc::new(BezGeometryProvider::new()));
        let mut ctx = Recording::default();
        render(&scene, &cache, &mut ctx);

        assert_eq!(ctx.depth, 0);
        assert_eq!(ctx.drawn, vec![(root, 1, false), (back, 2, true), (front, 2, true)]);
    }
}
