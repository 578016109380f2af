//! Error types for scene graph operations

use crate::LayerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),

    #[error("Layer {layer} already has parent {parent}")]
    AlreadyParented { layer: LayerId, parent: LayerId },

    #[error("Layer {child} is not a child of {parent}")]
    NotAChild { parent: LayerId, child: LayerId },

    #[error("Layer is not a container: {0}")]
    NotAContainer(LayerId),

    #[error("Attaching {layer} under {parent} would create a cycle")]
    CycleDetected { layer: LayerId, parent: LayerId },

    #[error("Index {index} out of range for {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("The root layer cannot be reparented or removed")]
    RootLayer,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Geometry error: {0}")]
    Geometry(String),
}

pub type Result<T> = std::result::Result<T, SceneError>;
