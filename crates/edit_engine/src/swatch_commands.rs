//! Commands on the document's swatch list

use crate::{Command, CommandMeta, EditContext, EditError, Result};
use scene_model::{Document, LayerId, Swatch};
use std::any::Any;

/// Add a named swatch, appending unless an index is given
#[derive(Debug)]
pub struct AddSwatch {
    meta: CommandMeta,
    swatch: Swatch,
    index: Option<usize>,
    inserted_at: Option<usize>,
}

impl AddSwatch {
    pub fn new(document: &Document, swatch: Swatch, index: Option<usize>) -> Result<Self> {
        if document.swatch(&swatch.name).is_some() {
            return Err(EditError::PreconditionViolation(format!(
                "swatch '{}' already exists",
                swatch.name
            )));
        }
        let len = document.swatches().len();
        if let Some(index) = index.filter(|&i| i > len) {
            return Err(EditError::PreconditionViolation(format!(
                "swatch index {} is past the end of {}",
                index, len
            )));
        }
        Ok(Self {
            meta: CommandMeta::new(),
            swatch,
            index,
            inserted_at: None,
        })
    }
}

impl Command for AddSwatch {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let document = &mut *ctx.document;
        let index = match self.index {
            Some(index) => {
                document.insert_swatch(index, self.swatch.clone())?;
                index
            }
            None => document.add_swatch(self.swatch.clone())?,
        };
        self.inserted_at = Some(index);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let (index, _) = ctx.document.remove_swatch(&self.swatch.name)?;
        if Some(index) != self.inserted_at {
            tracing::warn!(swatch = %self.swatch.name, index, "swatch moved before undo");
        }
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &[]
    }

    fn description(&self) -> &str {
        "Add Swatch"
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Remove a swatch by name; undo puts it back at the same index
#[derive(Debug)]
pub struct RemoveSwatch {
    meta: CommandMeta,
    name: String,
    removed: Option<(usize, Swatch)>,
}

impl RemoveSwatch {
    pub fn new(document: &Document, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if document.swatch(&name).is_none() {
            return Err(EditError::PreconditionViolation(format!("swatch '{}' not found", name)));
        }
        Ok(Self {
            meta: CommandMeta::new(),
            name,
            removed: None,
        })
    }
}

impl Command for RemoveSwatch {
    fn execute(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        self.removed = Some(ctx.document.remove_swatch(&self.name)?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let (index, swatch) = self
            .removed
            .take()
            .ok_or_else(|| EditError::InvariantViolation("swatch removal undone before execute".to_string()))?;
        ctx.document.insert_swatch(index, swatch)?;
        Ok(())
    }

    fn targets(&self) -> &[LayerId] {
        &[]
    }

    fn description(&self) -> &str {
        "Delete Swatch"
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
    use scene_model::{BezGeometryProvider, Color, Paint, SceneCache};
    use std::sync::Arc;

    fn swatch(name: &str) -> Swatch {
        Swatch::new(name, Paint::solid(Color::RED))
    }

    #[test]
    fn test_add_and_remove_swatch() {
        let mut doc = Document::new();
        let cache = SceneCache::new(Arc::new(BezGeometryProvider::new()));
        let provider = BezGeometryProvider::new();
        doc.add_swatch(swatch("a")).unwrap();
        doc.add_swatch(swatch("c")).unwrap();

        let mut add = AddSwatch::new(&doc, swatch("b"), Some(1)).unwrap();
        add.execute(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert_eq!(doc.swatch_index("b"), Some(1));

        let mut remove = RemoveSwatch::new(&doc, "a").unwrap();
        remove.execute(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert!(doc.swatch("a").is_none());

        remove.undo(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        assert_eq!(doc.swatch_index("a"), Some(0));

        add.undo(&mut EditContext::new(&mut doc, &cache, &provider)).unwrap();
        let names: Vec<&str> = doc.swatches().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_swatch_preconditions() {
        let mut doc = Document::new();
        doc.add_swatch(swatch("a")).unwrap();
        let rejected = |result: Result<()>| matches!(result, Err(EditError::PreconditionViolation(_)));

        assert!(rejected(AddSwatch::new(&doc, swatch("a"), None).map(drop)));
        assert!(rejected(AddSwatch::new(&doc, swatch("b"), Some(2)).map(drop)));
        assert!(rejected(RemoveSwatch::new(&doc, "missing").map(drop)));
        assert!(AddSwatch::new(&doc, swatch("b"), Some(1)).is_ok());
        assert_eq!(doc.swatches().len(), 1);
    }

    #[test]
    fn test_duplicate_added_after_construction_fails_at_execute() {
        let mut doc = Document::new();
        let cache = SceneCache::new(Arc::new(BezGeometryProvider::new()));
        let provider = BezGeometryProvider::new();

        let mut add = AddSwatch::new(&doc, swatch("a"), None).unwrap();
        doc.add_swatch(swatch("a")).unwrap();
        assert!(add.execute(&mut EditContext::new(&mut doc, &cache, &provider)).is_err());
        assert_eq!(doc.swatches().len(), 1);
    }
}
