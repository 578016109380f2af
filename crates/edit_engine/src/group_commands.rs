//! Grouping and ungrouping

use crate::command::{check_attached, check_targets};
use crate::{Command, CommandMeta, EditContext, EditError, Result};
use scene_model::{Layer, LayerId, Scene, Transform};
use std::any::Any;

/// Move sibling layers into a new group placed where the front-most of
/// them was
#[derive(Debug)]
pub struct GroupLayers {
    meta: CommandMeta,
    /// Targets sorted by their index in the parent
    targets: Vec<LayerId>,
    parent: LayerId,
    group: LayerId,
    /// The new group until the first execute moves it into the arena
    pending: Option<Layer>,
    /// Index of each target before the last execute
    positions: Vec<usize>,
}

impl GroupLayers {
    pub fn new(scene: &Scene, targets: Vec<LayerId>) -> Result<Self> {
        let mut targets = check_targets(scene, targets)?;
        check_attached(scene, &targets)?;

        let parent = scene
            .parent(targets[0])
            .ok_or_else(|| EditError::PreconditionViolation("layer is not attached".to_string()))?;
        if targets.iter().any(|&id| scene.parent(id) != Some(parent)) {
            return Err(EditError::PreconditionViolation(
                "grouped layers must share one parent".to_string(),
            ));
        }
        targets.sort_by_key(|&id| scene.index_of(id).unwrap_or(usize::MAX));

        let group = Layer::group();
        Ok(Self {
            meta: CommandMeta::new(),
            targets,
            parent,
            group: group.id(),
            pending: Some(group),
            positions: Vec::new(),
        })
    }

    /// Id of the group this command creates
    pub fn group_id(&self) -> LayerId {
        self.group
    }
}

impl Command for GroupLayers {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let positions = self
            .targets
            .iter()
            .map(|&id| {
                scene
                    .index_of(id)
                    .filter(|_| scene.parent(id) == Some(self.parent))
                    .ok_or_else(|| EditError::InvariantViolation(format!("layer {} left its parent", id)))
            })
            .collect::<Result<Vec<usize>>>()?;
        let insert_at = positions.iter().copied().min().unwrap_or(0);

        // Highest index first so the remaining indices stay valid
        let mut order: Vec<usize> = (0..self.targets.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(positions[i]));
        for i in order {
            scene.remove_child(self.parent, self.targets[i])?;
        }

        match self.pending.take() {
            Some(group) => {
                scene.insert_layer(group, self.parent, Some(insert_at))?;
            }
            None => {
                scene.attach(self.group, self.parent, Some(insert_at))?;
            }
        }
        for &id in &self.targets {
            scene.attach(id, self.group, None)?;
        }

        self.positions = positions;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for &id in &self.targets {
            scene.remove_child(self.group, id)?;
        }
        scene.remove_child(self.parent, self.group)?;

        let mut restore: Vec<(usize, LayerId)> = self.positions.iter().copied().zip(self.targets.iter().copied()).collect();
        restore.sort_by_key(|&(index, _)| index);
        for (index, id) in restore {
            scene.attach(id, self.parent, Some(index))?;
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn retained_layers(&self) -> Vec<LayerId> {
        let mut layers = self.targets.clone();
        layers.push(self.group);
        layers
    }

    fn description(&self) -> &str {
        "Group"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
struct UngroupRecord {
    group: LayerId,
    parent: LayerId,
    index: usize,
    /// Children in order with their transforms inside the group
    children: Vec<(LayerId, Transform)>,
}

/// Dissolve groups, moving their children into the groups' parents with
/// their on-canvas placement unchanged
#[derive(Debug)]
pub struct UngroupLayers {
    meta: CommandMeta,
    targets: Vec<LayerId>,
    records: Vec<UngroupRecord>,
}

impl UngroupLayers {
    pub fn new(scene: &Scene, targets: Vec<LayerId>) -> Result<Self> {
        let targets = check_targets(scene, targets)?;
        check_attached(scene, &targets)?;
        for &id in &targets {
            if !scene.layer(id)?.is_container() {
                return Err(EditError::PreconditionViolation(format!("layer {} is not a group", id)));
            }
        }
        Ok(Self {
            meta: CommandMeta::new(),
            targets,
            records: Vec::new(),
        })
    }
}

impl Command for UngroupLayers {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        let mut records = Vec::with_capacity(self.targets.len());

        for &group in &self.targets {
            let parent = scene
                .parent(group)
                .ok_or_else(|| EditError::InvariantViolation(format!("group {} is not attached", group)))?;
            let group_affine = scene.layer(group)?.transform().to_affine();
            let children = scene
                .children(group)
                .iter()
                .map(|&child| Ok((child, *scene.layer(child)?.transform())))
                .collect::<Result<Vec<(LayerId, Transform)>>>()?;

            let index = scene.remove_child(parent, group)?;
            for (offset, &(child, transform)) in children.iter().enumerate() {
                scene.remove_child(group, child)?;
                // Child' = Child · Group keeps the absolute transform
                scene.set_transform(child, Transform::from_affine(group_affine * transform.to_affine()))?;
                scene.attach(child, parent, Some(index + offset))?;
            }

            records.push(UngroupRecord {
                group,
                parent,
                index,
                children,
            });
        }

        self.records = records;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        for record in self.records.iter().rev() {
            for &(child, transform) in &record.children {
                scene.remove_child(record.parent, child)?;
                scene.set_transform(child, transform)?;
                scene.attach(child, record.group, None)?;
            }
            scene.attach(record.group, record.parent, Some(record.index))?;
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &self.targets
    }

    fn retained_layers(&self) -> Vec<LayerId> {
        let mut layers = self.targets.clone();
        for record in &self.records {
            layers.extend(record.children.iter().map(|&(child, _)| child));
        }
        layers
    }

    fn description(&self) -> &str {
        "Ungroup"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_model::{affine_approx_eq, BezGeometryProvider, Document, SceneCache};
    use std::sync::Arc;

    fn ctx_parts() -> (SceneCache, BezGeometryProvider) {
        (SceneCache::new(Arc::new(BezGeometryProvider::new())), BezGeometryProvider::new())
    }

    #[test]
    fn test_group_preserves_order_and_position() {
        let mut doc = Document::new();
        let (cache, provider) = ctx_parts();
        let root = doc.scene.root_id();
        let ids: Vec<LayerId> = (0..4)
            .map(|_| doc.scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), root, None).unwrap())
            .collect();

        let mut cmd = GroupLayers::new(&doc.scene, vec![ids[3], ids[1]]).unwrap();
        let group = cmd.group_id();
        cmd.execute(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();

        assert_eq!(doc.scene.children(root), &[ids[0], group, ids[2]]);
        assert_eq!(doc.scene.children(group), &[ids[1], ids[3]]);

        cmd.undo(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert_eq!(doc.scene.children(root), ids.as_slice());
        assert!(!doc.scene.is_attached(group));

        cmd.execute(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert_eq!(doc.scene.children(root), &[ids[0], group, ids[2]]);
        doc.scene.validate().unwrap();
    }

    #[test]
    fn test_group_requires_shared_parent() {
        let mut doc = Document::new();
        let root = doc.scene.root_id();
        let inner = doc.scene.insert_layer(Layer::group(), root, None).unwrap();
        let a = doc.scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), root, None).unwrap();
        let b = doc.scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), inner, None).unwrap();
        assert!(matches!(
            GroupLayers::new(&doc.scene, vec![a, b]),
            Err(EditError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_ungroup_keeps_absolute_transforms() {
        let mut doc = Document::new();
        let (cache, provider) = ctx_parts();
        let root = doc.scene.root_id();
        let group = doc
            .scene
            .insert_layer(
                Layer::group().with_transform(Transform::new(
                    kurbo::Vec2::new(2.0, 2.0),
                    0.0,
                    0.5,
                    kurbo::Vec2::new(10.0, 20.0),
                )),
                root,
                None,
            )
            .unwrap();
        let child = doc
            .scene
            .insert_layer(
                Layer::rectangle(0.0, 0.0, 1.0, 1.0).with_transform(Transform::from_translation(3.0, 4.0)),
                group,
                None,
            )
            .unwrap();
        let before = doc.scene.absolute_transform(child);

        let mut cmd = UngroupLayers::new(&doc.scene, vec![group]).unwrap();
        cmd.execute(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert_eq!(doc.scene.parent(child), Some(root));
        assert!(affine_approx_eq(doc.scene.absolute_transform(child), before, 1e-9));
        assert!(!doc.scene.is_attached(group));

        cmd.undo(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert_eq!(doc.scene.parent(child), Some(group));
        assert_eq!(*doc.scene.get(child).unwrap().transform(), Transform::from_translation(3.0, 4.0));
        doc.scene.validate().unwrap();
    }

    #[test]
    fn test_ungroup_rejects_leaves() {
        let mut doc = Document::new();
        let root = doc.scene.root_id();
        let leaf = doc.scene.insert_layer(Layer::rectangle(0.0, 0.0, 1.0, 1.0), root, None).unwrap();
        assert!(UngroupLayers::new(&doc.scene, vec![leaf]).is_err());
    }
}
