//! Document container

use crate::paint::Swatch;
use crate::{Result, Scene, SceneError};
use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Default canvas size for new documents (A4 at 96 dpi)
pub const DEFAULT_DOCUMENT_SIZE: Size = Size::new(794.0, 1123.0);

/// Handle shared between the edit thread and render readers
pub type SharedDocument = Arc<RwLock<Document>>;

/// An open vector document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The layer tree
    pub scene: Scene,
    /// Where the document was opened from or last saved to
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Canvas size in document units
    pub size: Size,
    /// Named reusable paints, names unique
    #[serde(default)]
    swatches: Vec<Swatch>,
}

impl Document {
    pub fn new() -> Self {
        Self::with_size(DEFAULT_DOCUMENT_SIZE)
    }

    pub fn with_size(size: Size) -> Self {
        Self {
            scene: Scene::new(),
            path: None,
            size,
            swatches: Vec::new(),
        }
    }

    /// Wrap the document in a shared handle
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    /// Canvas rectangle
    pub fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    pub fn swatches(&self) -> &[Swatch] {
        &self.swatches
    }

    pub fn swatch(&self, name: &str) -> Option<&Swatch> {
        self.swatches.iter().find(|s| s.name == name)
    }

    pub fn swatch_index(&self, name: &str) -> Option<usize> {
        self.swatches.iter().position(|s| s.name == name)
    }

    /// Append a swatch, returning its index
    pub fn add_swatch(&mut self, swatch: Swatch) -> Result<usize> {
        let index = self.swatches.len();
        self.insert_swatch(index, swatch)?;
        Ok(index)
    }

    pub fn insert_swatch(&mut self, index: usize, swatch: Swatch) -> Result<()> {
        if self.swatch(&swatch.name).is_some() {
            return Err(SceneError::InvalidOperation(format!(
                "swatch '{}' already exists",
                swatch.name
            )));
        }
        if index > self.swatches.len() {
            return Err(SceneError::IndexOutOfRange {
                index,
                len: self.swatches.len(),
            });
        }
        self.swatches.insert(index, swatch);
        Ok(())
    }

    /// Remove a swatch by name, returning its index and value
    pub fn remove_swatch(&mut self, name: &str) -> Result<(usize, Swatch)> {
        let index = self
            .swatch_index(name)
            .ok_or_else(|| SceneError::InvalidOperation(format!("swatch '{}' not found", name)))?;
        Ok((index, self.swatches.remove(index)))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
