//! Error types for editing operations

use scene_model::SceneError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    /// A command could not be constructed; nothing was mutated
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// The scene was found in a state a command cannot have produced
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Undo stack is empty")]
    UndoStackEmpty,

    #[error("Redo stack is empty")]
    RedoStackEmpty,

    #[error("Document lock poisoned")]
    LockPoisoned,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EditError>;
