//! Commands that replace layers with path layers

use crate::command::{check_attached, check_targets};
use crate::{Command, CommandMeta, EditContext, EditError, Result};
use scene_model::{CombineOp, Layer, LayerId, LayerKind, Scene};
use std::any::Any;

/// Determinants below this are treated as singular
const SINGULAR_DETERMINANT: f64 = 1e-12;

fn check_geometric(scene: &Scene, id: LayerId) -> Result<()> {
    if scene.layer(id)?.kind().as_geometric().is_none() {
        return Err(EditError::PreconditionViolation(format!("layer {} has no path geometry", id)));
    }
    Ok(())
}

/// Copy the presentation of `source` onto a new path layer
fn path_like(source: &Layer, id: LayerId, instructions: Vec<scene_model::PathInstruction>) -> Layer {
    let mut path = Layer::path(instructions)
        .with_id(id)
        .with_transform(*source.transform())
        .with_opacity(source.opacity());
    if let Some(fill) = source.fill() {
        path = path.with_fill(fill.clone());
    }
    if let Some(stroke) = source.stroke() {
        path = path.with_stroke(stroke.clone());
    }
    path.set_visible(source.is_visible());
    path
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    parent: LayerId,
    index: usize,
}

/// Combine two shapes into one path with a boolean operation
#[derive(Debug)]
pub struct BinaryOperation {
    meta: CommandMeta,
    op: CombineOp,
    /// `[first, second]`
    operands: [LayerId; 2],
    path: LayerId,
    /// Where each operand was detached from on the last execute
    placements: Option<(Placement, Placement)>,
}

impl BinaryOperation {
    pub fn new(scene: &Scene, op: CombineOp, first: LayerId, second: LayerId) -> Result<Self> {
        if first == second {
            return Err(EditError::PreconditionViolation(
                "a boolean operation needs two different layers".to_string(),
            ));
        }
        let operands = check_targets(scene, vec![first, second])?;
        check_attached(scene, &operands)?;
        for &id in &operands {
            check_geometric(scene, id)?;
        }
        Ok(Self {
            meta: CommandMeta::new(),
            op,
            operands: [first, second],
            path: LayerId::new(),
            placements: None,
        })
    }

    pub fn union(scene: &Scene, first: LayerId, second: LayerId) -> Result<Self> {
        Self::new(scene, CombineOp::Union, first, second)
    }

    pub fn intersect(scene: &Scene, first: LayerId, second: LayerId) -> Result<Self> {
        Self::new(scene, CombineOp::Intersect, first, second)
    }

    pub fn xor(scene: &Scene, first: LayerId, second: LayerId) -> Result<Self> {
        Self::new(scene, CombineOp::Xor, first, second)
    }

    pub fn exclude(scene: &Scene, first: LayerId, second: LayerId) -> Result<Self> {
        Self::new(scene, CombineOp::Exclude, first, second)
    }

    /// Id of the path layer this command creates
    pub fn path_id(&self) -> LayerId {
        self.path
    }

    pub fn op(&self) -> CombineOp {
        self.op
    }

    fn build_path(&self, ctx: &EditContext<'_>) -> Result<Layer> {
        let scene = ctx.scene();
        let [first, second] = self.operands;
        let geometry = |id: LayerId| {
            ctx.cache
                .geometry(scene, id)
                .ok_or_else(|| EditError::NotSupported(format!("layer {} has no geometry", id)))
        };

        let first_abs = scene.absolute_transform(first);
        if first_abs.determinant().abs() <= SINGULAR_DETERMINANT {
            return Err(EditError::NotSupported(format!(
                "absolute transform of {} is not invertible",
                first
            )));
        }
        let a = geometry(first)?.transform(first_abs);
        let b = geometry(second)?.transform(scene.absolute_transform(second));
        let combined = a.combine(b.as_ref(), self.op)?;
        let instructions = combined.transform(first_abs.inverse()).read()?;
        // The engine must accept what it produced before the scene stores it
        ctx.geometry.load(&instructions)?;

        Ok(path_like(scene.layer(first)?, self.path, instructions))
    }
}

impl Command for BinaryOperation {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        if !ctx.scene().contains(self.path) {
            let path = self.build_path(ctx)?;
            ctx.scene_mut().add_layer(path)?;
        }

        let scene = ctx.scene_mut();
        let [first, second] = self.operands;
        let (first_parent, first_index) = scene.detach(first)?;
        let (second_parent, second_index) = match scene.detach(second) {
            Ok(position) => position,
            Err(e) => {
                scene.attach(first, first_parent, Some(first_index))?;
                return Err(e.into());
            }
        };

        let insert_at = if second_parent == first_parent && second_index < first_index {
            first_index - 1
        } else {
            first_index
        };
        scene.attach(self.path, first_parent, Some(insert_at))?;

        self.placements = Some((
            Placement {
                parent: first_parent,
                index: first_index,
            },
            Placement {
                parent: second_parent,
                index: second_index,
            },
        ));
        tracing::debug!(op = self.op.display_name(), path = %self.path, "combined layers");
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let (first_at, second_at) = self
            .placements
            .ok_or_else(|| EditError::InvariantViolation("boolean operation undone before execute".to_string()))?;
        let scene = ctx.scene_mut();
        let [first, second] = self.operands;
        scene.remove_child(first_at.parent, self.path)?;
        scene.attach(second, second_at.parent, Some(second_at.index))?;
        scene.attach(first, first_at.parent, Some(first_at.index))?;
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &self.operands
    }

    fn retained_layers(&self) -> Vec<LayerId> {
        vec![self.operands[0], self.operands[1], self.path]
    }

    fn description(&self) -> &str {
        self.op.display_name()
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Replace rectangles and ellipses with equivalent path layers
#[derive(Debug)]
pub struct ConvertToPath {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    /// New path id per target, fixed so redo reuses the same layers
    paths: Vec<LayerId>,
    /// Placement of each converted layer on the last execute
    placements: Vec<Placement>,
}

impl ConvertToPath {
    /// Path layers in `targets` are skipped; at least one other layer is
    /// required and every target must have path geometry
    pub fn new(scene: &Scene, targets: Vec<LayerId>) -> Result<Self> {
        let targets = check_targets(scene, targets)?;
        check_attached(scene, &targets)?;

        let mut convertible = Vec::with_capacity(targets.len());
        for id in targets {
            check_geometric(scene, id)?;
            if !matches!(scene.layer(id)?.kind(), LayerKind::Path(_)) {
                convertible.push(id);
            }
        }
        if convertible.is_empty() {
            return Err(EditError::PreconditionViolation("nothing to convert".to_string()));
        }

        let paths = convertible.iter().map(|_| LayerId::new()).collect();
        Ok(Self {
            meta: CommandMeta::new(),
            targets: convertible,
            paths,
            placements: Vec::new(),
        })
    }

    /// `(original, path)` pairs
    pub fn conversions(&self) -> impl Iterator<Item = (LayerId, LayerId)> + '_ {
        self.targets.iter().copied().zip(self.paths.iter().copied())
    }
}

impl Command for ConvertToPath {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        // Build every missing path first so a failure leaves the tree untouched
        let mut built = Vec::new();
        for (&id, &path_id) in self.targets.iter().zip(&self.paths) {
            if ctx.scene().contains(path_id) {
                continue;
            }
            let scene = ctx.scene();
            let geometry = ctx
                .cache
                .geometry(scene, id)
                .ok_or_else(|| EditError::NotSupported(format!("layer {} has no geometry", id)))?;
            let instructions = geometry.read()?;
            ctx.geometry.load(&instructions)?;
            let source = scene.layer(id)?;
            let mut path = path_like(source, path_id, instructions);
            path.set_name(source.name().map(str::to_string));
            built.push(path);
        }

        let scene = ctx.scene_mut();
        for path in built {
            scene.add_layer(path)?;
        }

        let mut placements = Vec::with_capacity(self.targets.len());
        for (&id, &path_id) in self.targets.iter().zip(&self.paths) {
            let (parent, index) = scene.detach(id)?;
            scene.attach(path_id, parent, Some(index))?;
            placements.push(Placement { parent, index });
        }
        self.placements = placements;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let swaps = self.targets.iter().zip(&self.paths).zip(&self.placements);
        for ((&id, &path_id), placement) in swaps.rev() {
            scene.remove_child(placement.parent, path_id)?;
            scene.attach(id, placement.parent, Some(placement.index))?;
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn retained_layers(&self) -> Vec<LayerId> {
        self.targets.iter().chain(&self.paths).copied().collect()
    }

    fn description(&self) -> &str {
        "Convert to Path"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
