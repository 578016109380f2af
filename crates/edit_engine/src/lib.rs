//! Edit Engine - Undoable commands and history for the layer scene graph
//!
//! Every document mutation is a [`Command`] that can be executed, undone and
//! redone. [`History`] keeps the linear undo stack and merges continuous
//! gestures; [`EditingEngine`] ties it to a shared document and its cache.

mod command;
mod config;
mod error;
mod executor;
mod group_commands;
mod history;
mod layer_commands;
mod path_commands;
mod property_commands;
mod swatch_commands;
mod text_commands;

pub use command::*;
pub use config::*;
pub use error::*;
pub use executor::*;
pub use group_commands::*;
pub use history::*;
pub use layer_commands::*;
pub use path_commands::*;
pub use property_commands::*;
pub use swatch_commands::*;
pub use text_commands::*;

pub use scene_model;
