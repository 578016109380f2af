//! Commands that change layer properties without touching the tree shape

use crate::command::check_targets;
use crate::{Command, CommandMeta, EditContext, EditError, Result};
use kurbo::{Affine, Point};
use scene_model::{Layer, LayerId, PaintRef, Scene, Stroke, Transform};
use std::any::Any;
use std::fmt;

// =============================================================================
// Transform
// =============================================================================

/// Apply a local and/or global affine delta to a set of layers
#[derive(Debug, Clone)]
pub struct TransformLayers {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    local: Option<Affine>,
    global: Option<Affine>,
    description: &'static str,
    /// Transforms captured by the last execute, one per target
    previous: Vec<Transform>,
}

impl TransformLayers {
    pub fn new(
        scene: &Scene,
        targets: Vec<LayerId>,
        local: Option<Affine>,
        global: Option<Affine>,
    ) -> Result<Self> {
        if local.is_none() && global.is_none() {
            return Err(EditError::PreconditionViolation("transform command without a delta".to_string()));
        }
        for delta in local.iter().chain(global.iter()) {
            if !delta.is_finite() {
                return Err(EditError::PreconditionViolation("transform delta is not finite".to_string()));
            }
        }
        Ok(Self {
            meta: CommandMeta::new(),
            targets: check_targets(scene, targets)?,
            local,
            global,
            description: "Transform",
            previous: Vec::new(),
        })
    }

    /// Move by `(dx, dy)` in document space
    pub fn translate(scene: &Scene, targets: Vec<LayerId>, dx: f64, dy: f64) -> Result<Self> {
        Ok(Self::new(scene, targets, None, Some(Affine::translate((dx, dy))))?.described("Move"))
    }

    /// Rotate by `angle` radians about a document-space point
    pub fn rotate_about(scene: &Scene, targets: Vec<LayerId>, angle: f64, center: Point) -> Result<Self> {
        Ok(Self::new(scene, targets, None, Some(Affine::rotate_about(angle, center)))?.described("Rotate"))
    }

    /// Scale about a document-space point
    pub fn scale_about(scene: &Scene, targets: Vec<LayerId>, sx: f64, sy: f64, center: Point) -> Result<Self> {
        let center = center.to_vec2();
        let delta = Affine::translate(center) * Affine::scale_non_uniform(sx, sy) * Affine::translate(-center);
        Ok(Self::new(scene, targets, None, Some(delta))?.described("Scale"))
    }

    /// Delta applied in each layer's own space
    pub fn local(scene: &Scene, targets: Vec<LayerId>, delta: Affine) -> Result<Self> {
        Self::new(scene, targets, Some(delta), None)
    }

    /// Delta applied in document space
    pub fn global(scene: &Scene, targets: Vec<LayerId>, delta: Affine) -> Result<Self> {
        Self::new(scene, targets, None, Some(delta))
    }

    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = meta;
        self
    }

    fn described(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn local_delta(&self) -> Option<Affine> {
        self.local
    }

    pub fn global_delta(&self) -> Option<Affine> {
        self.global
    }
}

/// Compose two optional deltas, `None` being identity
fn compose(outer: Option<Affine>, inner: Option<Affine>) -> Option<Affine> {
    match (outer, inner) {
        (Some(a), Some(b)) => Some(a * b),
        (a, None) => a,
        (None, b) => b,
    }
}

impl Command for TransformLayers {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let mut previous = Vec::with_capacity(self.targets.len());
        for &id in &self.targets {
            match scene.apply_transform(id, self.local, self.global) {
                Ok(old) => previous.push(old),
                Err(e) => {
                    for (&id, old) in self.targets.iter().zip(previous).rev() {
                        scene.set_transform(id, old)?;
                    }
                    return Err(e.into());
                }
            }
        }
        self.previous = previous;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for (&id, old) in self.targets.iter().zip(&self.previous).rev() {
            scene.set_transform(id, *old)?;
        }
        Ok(())
    }

    fn merge(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<TransformLayers>()?;
        if other.targets != self.targets {
            return None;
        }
        Some(Box::new(TransformLayers {
            meta: self.meta.merged(&other.meta),
            targets: self.targets.clone(),
            // T'' = W⁻¹·G2·G1·W · T · L1·L2
            local: compose(self.local, other.local),
            global: compose(other.global, self.global),
            description: self.description,
            previous: self.previous.clone(),
        }))
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn description(&self) -> &str {
        self.description
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Replace-value properties
// =============================================================================

/// A layer property that can be read and replaced through the scene
pub trait LayerProperty: fmt::Debug + Send + Sync + 'static {
    type Value: fmt::Debug + Clone + Send + Sync + 'static;

    /// Undo menu text
    const DESCRIPTION: &'static str;

    fn get(layer: &Layer) -> Self::Value;

    /// Write the value, returning the previous one
    fn set(scene: &mut Scene, id: LayerId, value: Self::Value) -> Result<Self::Value>;

    /// Whether the layer has this property
    fn supports(_layer: &Layer) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpacityProperty;

impl LayerProperty for OpacityProperty {
    type Value = f32;
    const DESCRIPTION: &'static str = "Change Opacity";

    fn get(layer: &Layer) -> f32 {
        layer.opacity()
    }

    fn set(scene: &mut Scene, id: LayerId, value: f32) -> Result<f32> {
        Ok(scene.set_opacity(id, value)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VisibilityProperty;

impl LayerProperty for VisibilityProperty {
    type Value = bool;
    const DESCRIPTION: &'static str = "Change Visibility";

    fn get(layer: &Layer) -> bool {
        layer.is_visible()
    }

    fn set(scene: &mut Scene, id: LayerId, value: bool) -> Result<bool> {
        Ok(scene.set_visible(id, value)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionProperty;

impl LayerProperty for SelectionProperty {
    type Value = bool;
    const DESCRIPTION: &'static str = "Select";

    fn get(layer: &Layer) -> bool {
        layer.is_selected()
    }

    fn set(scene: &mut Scene, id: LayerId, value: bool) -> Result<bool> {
        Ok(scene.set_selected(id, value)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NameProperty;

impl LayerProperty for NameProperty {
    type Value = Option<String>;
    const DESCRIPTION: &'static str = "Rename";

    fn get(layer: &Layer) -> Option<String> {
        layer.name().map(str::to_string)
    }

    fn set(scene: &mut Scene, id: LayerId, value: Option<String>) -> Result<Option<String>> {
        Ok(scene.set_name(id, value)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FillProperty;

impl LayerProperty for FillProperty {
    type Value = Option<PaintRef>;
    const DESCRIPTION: &'static str = "Change Fill";

    fn get(layer: &Layer) -> Option<PaintRef> {
        layer.fill().cloned()
    }

    fn set(scene: &mut Scene, id: LayerId, value: Option<PaintRef>) -> Result<Option<PaintRef>> {
        Ok(scene.set_fill(id, value)?)
    }

    fn supports(layer: &Layer) -> bool {
        layer.kind().as_filled().is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrokeProperty;

impl LayerProperty for StrokeProperty {
    type Value = Option<Stroke>;
    const DESCRIPTION: &'static str = "Change Stroke";

    fn get(layer: &Layer) -> Option<Stroke> {
        layer.stroke().cloned()
    }

    fn set(scene: &mut Scene, id: LayerId, value: Option<Stroke>) -> Result<Option<Stroke>> {
        Ok(scene.set_stroke(id, value)?)
    }

    fn supports(layer: &Layer) -> bool {
        layer.kind().as_stroked().is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClipProperty;

impl LayerProperty for ClipProperty {
    type Value = Option<LayerId>;
    const DESCRIPTION: &'static str = "Change Clip";

    fn get(layer: &Layer) -> Option<LayerId> {
        layer.clip()
    }

    fn set(scene: &mut Scene, id: LayerId, value: Option<LayerId>) -> Result<Option<LayerId>> {
        Ok(scene.set_clip(id, value)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MaskProperty;

impl LayerProperty for MaskProperty {
    type Value = Option<LayerId>;
    const DESCRIPTION: &'static str = "Change Mask";

    fn get(layer: &Layer) -> Option<LayerId> {
        layer.mask()
    }

    fn set(scene: &mut Scene, id: LayerId, value: Option<LayerId>) -> Result<Option<LayerId>> {
        Ok(scene.set_mask(id, value)?)
    }
}

/// Replace one property on a set of layers
#[derive(Debug)]
pub struct SetLayerProperty<P: LayerProperty> {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    value: P::Value,
    previous: Vec<P::Value>,
}

pub type SetOpacity = SetLayerProperty<OpacityProperty>;
pub type SetVisibility = SetLayerProperty<VisibilityProperty>;
pub type SetSelection = SetLayerProperty<SelectionProperty>;
pub type RenameLayers = SetLayerProperty<NameProperty>;
pub type SetFill = SetLayerProperty<FillProperty>;
pub type SetStroke = SetLayerProperty<StrokeProperty>;
pub type SetClip = SetLayerProperty<ClipProperty>;
pub type SetMask = SetLayerProperty<MaskProperty>;

impl<P: LayerProperty> SetLayerProperty<P> {
    pub fn new(scene: &Scene, targets: Vec<LayerId>, value: P::Value) -> Result<Self> {
        let targets = check_targets(scene, targets)?;
        for &id in &targets {
            let layer = scene.layer(id)?;
            if !P::supports(layer) {
                return Err(EditError::PreconditionViolation(format!(
                    "{} cannot be applied to {} layer {}",
                    P::DESCRIPTION,
                    layer.layer_type().default_name(),
                    id
                )));
            }
        }
        Ok(Self {
            meta: CommandMeta::new(),
            targets,
            value,
            previous: Vec::new(),
        })
    }

    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn value(&self) -> &P::Value {
        &self.value
    }

    /// Values the layers had before the last execute
    pub fn previous(&self) -> &[P::Value] {
        &self.previous
    }
}

impl<P: LayerProperty> Command for SetLayerProperty<P> {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let mut previous = Vec::with_capacity(self.targets.len());
        for &id in &self.targets {
            match P::set(scene, id, self.value.clone()) {
                Ok(old) => previous.push(old),
                Err(e) => {
                    for (&id, old) in self.targets.iter().zip(previous).rev() {
                        P::set(scene, id, old)?;
                    }
                    return Err(e);
                }
            }
        }
        self.previous = previous;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for (&id, old) in self.targets.iter().zip(&self.previous).rev() {
            P::set(scene, id, old.clone())?;
        }
        Ok(())
    }

    fn merge(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<SetLayerProperty<P>>()?;
        if other.targets != self.targets {
            return None;
        }
        Some(Box::new(SetLayerProperty::<P> {
            meta: self.meta.merged(&other.meta),
            targets: self.targets.clone(),
            value: other.value.clone(),
            previous: self.previous.clone(),
        }))
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn retained_layers(&self) -> Vec<LayerId> {
        let mut layers = self.targets.clone();
        // Clip and mask commands keep their referenced layers alive too
        let any_value: &dyn Any = &self.value;
        if let Some(Some(reference)) = any_value.downcast_ref::<Option<LayerId>>() {
            layers.push(*reference);
        }
        for old in &self.previous {
            let any_old: &dyn Any = old;
            if let Some(Some(reference)) = any_old.downcast_ref::<Option<LayerId>>() {
                layers.push(*reference);
            }
        }
        layers
    }

    fn description(&self) -> &str {
        P::DESCRIPTION
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Opacity delta
// =============================================================================

/// Add a delta to the opacity of each layer, clamped to [0, 1]
#[derive(Debug, Clone)]
pub struct ChangeOpacity {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    delta: f32,
    previous: Vec<f32>,
}

impl ChangeOpacity {
    pub fn new(scene: &Scene, targets: Vec<LayerId>, delta: f32) -> Result<Self> {
        if !delta.is_finite() {
            return Err(EditError::PreconditionViolation("opacity delta is not finite".to_string()));
        }
        Ok(Self {
            meta: CommandMeta::new(),
            targets: check_targets(scene, targets)?,
            delta,
            previous: Vec::new(),
        })
    }

    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }
}

impl Command for ChangeOpacity {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let mut previous = Vec::with_capacity(self.targets.len());
        for &id in &self.targets {
            let current = scene.layer(id)?.opacity();
            previous.push(scene.set_opacity(id, current + self.delta)?);
        }
        self.previous = previous;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for (&id, &old) in self.targets.iter().zip(&self.previous).rev() {
            scene.set_opacity(id, old)?;
        }
        Ok(())
    }

    fn merge(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<ChangeOpacity>()?;
        if other.targets != self.targets {
            return None;
        }
        Some(Box::new(ChangeOpacity {
            meta: self.meta.merged(&other.meta),
            targets: self.targets.clone(),
            delta: self.delta + other.delta,
            previous: self.previous.clone(),
        }))
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn description(&self) -> &str {
        "Change Opacity"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
