//! Text editing commands
//!
//! Each command snapshots the layer's value and format list before it runs;
//! undo restores the snapshot exactly rather than replaying the inverse edit.

use crate::{Command, CommandMeta, EditContext, EditError, Result};
use scene_model::{ChangeKind, Format, LayerId, Scene, TextLayer};
use std::any::Any;

type Snapshot = (String, Vec<Format>);

fn text_layer(scene: &Scene, layer: LayerId) -> Result<&TextLayer> {
    scene
        .layer(layer)?
        .kind()
        .as_text()
        .ok_or_else(|| EditError::PreconditionViolation(format!("layer {} is not a text layer", layer)))
}

/// Run `edit` on a text layer and return the value and formats it replaced
fn edit_text(scene: &mut Scene, layer: LayerId, edit: impl FnOnce(&mut TextLayer)) -> Result<Snapshot> {
    let snapshot = scene.update(layer, ChangeKind::Layout, |l| {
        l.kind_mut().as_text_mut().map(|text| {
            let snapshot = (text.value().to_string(), text.formats().to_vec());
            edit(text);
            snapshot
        })
    })?;
    snapshot.ok_or_else(|| EditError::InvariantViolation(format!("layer {} is no longer text", layer)))
}

fn restore_text(scene: &mut Scene, layer: LayerId, snapshot: Option<&Snapshot>) -> Result<()> {
    let (value, formats) = snapshot
        .cloned()
        .ok_or_else(|| EditError::InvariantViolation("text command undone before execute".to_string()))?;
    scene.update(layer, ChangeKind::Layout, |l| {
        if let Some(text) = l.kind_mut().as_text_mut() {
            text.restore(value, formats);
        }
    })?;
    Ok(())
}

fn check_position(scene: &Scene, layer: LayerId, end: usize) -> Result<()> {
    let len = text_layer(scene, layer)?.char_len();
    if end > len {
        return Err(EditError::PreconditionViolation(format!(
            "position {} is past the end of text of length {}",
            end, len
        )));
    }
    Ok(())
}

/// Insert characters into a text layer
#[derive(Debug)]
pub struct InsertText {
    meta: CommandMeta,
    layer: LayerId,
    position: usize,
    text: String,
    snapshot: Option<Snapshot>,
}

impl InsertText {
    pub fn new(scene: &Scene, layer: LayerId, position: usize, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(EditError::PreconditionViolation("inserted text is empty".to_string()));
        }
        check_position(scene, layer, position)?;
        Ok(Self {
            meta: CommandMeta::new(),
            layer,
            position,
            text,
            snapshot: None,
        })
    }

    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character index right after the inserted text
    fn end(&self) -> usize {
        self.position + self.text.chars().count()
    }
}

impl Command for InsertText {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        check_position(scene, self.layer, self.position)?;
        let (position, text) = (self.position, self.text.as_str());
        self.snapshot = Some(edit_text(scene, self.layer, |t| t.insert_text(position, text))?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        restore_text(ctx.scene_mut(), self.layer, self.snapshot.as_ref())
    }

    fn merge(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<InsertText>()?;
        if other.layer != self.layer || other.position != self.end() {
            return None;
        }
        Some(Box::new(InsertText {
            meta: self.meta.merged(&other.meta),
            layer: self.layer,
            position: self.position,
            text: format!("{}{}", self.text, other.text),
            snapshot: self.snapshot.clone(),
        }))
    }

    fn targets(&self) -> &[LayerId] {
        std::slice::from_ref(&self.layer)
    }

    fn description(&self) -> &str {
        "Typing"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Delete a run of characters from a text layer
#[derive(Debug)]
pub struct RemoveText {
    meta: CommandMeta,
    layer: LayerId,
    position: usize,
    length: usize,
    snapshot: Option<Snapshot>,
}

impl RemoveText {
    pub fn new(scene: &Scene, layer: LayerId, position: usize, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(EditError::PreconditionViolation("nothing to remove".to_string()));
        }
        let end = position
            .checked_add(length)
            .ok_or_else(|| EditError::PreconditionViolation("removed range overflows".to_string()))?;
        check_position(scene, layer, end)?;
        Ok(Self {
            meta: CommandMeta::new(),
            layer,
            position,
            length,
            snapshot: None,
        })
    }
}

impl Command for RemoveText {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let scene = ctx.scene_mut();
        check_position(scene, self.layer, self.position + self.length)?;
        let (position, length) = (self.position, self.length);
        self.snapshot = Some(edit_text(scene, self.layer, |t| {
            t.remove_text(position, length);
        })?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        restore_text(ctx.scene_mut(), self.layer, self.snapshot.as_ref())
    }

    fn targets(&self) -> &[LayerId] {
        std::slice::from_ref(&self.layer)
    }

    fn description(&self) -> &str {
        "Delete Text"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Apply a character format over a range of a text layer
#[derive(Debug)]
pub struct SetTextFormat {
    meta: CommandMeta,
    layer: LayerId,
    format: Format,
    snapshot: Option<Snapshot>,
}

impl SetTextFormat {
    pub fn new(scene: &Scene, layer: LayerId, format: Format) -> Result<Self> {
        if format.length == 0 {
            return Err(EditError::PreconditionViolation("format range is empty".to_string()));
        }
        if format.index.checked_add(format.length).is_none() {
            return Err(EditError::PreconditionViolation("format range overflows".to_string()));
        }
        check_position(scene, layer, format.index)?;
        Ok(Self {
            meta: CommandMeta::new(),
            layer,
            format,
            snapshot: None,
        })
    }
}

impl Command for SetTextFormat {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let format = self.format.clone();
        self.snapshot = Some(edit_text(ctx.scene_mut(), self.layer, |t| t.set_format(format))?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        restore_text(ctx.scene_mut(), self.layer, self.snapshot.as_ref())
    }

    fn targets(&self) -> &[LayerId] {
        std::slice::from_ref(&self.layer)
    }

    fn description(&self) -> &str {
        "Format Text"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
