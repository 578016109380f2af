//! Scene Model - Layer tree for vector documents
//!
//! This crate provides the data model for the vector editor: an arena of
//! layers addressed by stable ids, decomposed transforms, shared paints, path
//! instructions, rich text formats, and the contracts for the external
//! geometry engine and derived-data cache. Hit-testing, bounds and render
//! traversal are built on those contracts.

mod layer_id;
mod error;
mod transform;
mod paint;
mod path;
mod geometry;
mod text;
mod layer;
mod change;
mod scene;
mod cache;
mod bounds;
mod render;
mod document;

pub use layer_id::*;
pub use error::*;
pub use transform::*;
pub use paint::*;
pub use path::*;
pub use geometry::*;
pub use text::*;
pub use layer::*;
pub use change::*;
pub use scene::*;
pub use cache::*;
pub use bounds::*;
pub use hit_test::*;
pub use render::*;
pub use document::*;

/// Re-exported 2D math types used throughout the public API
pub use kurbo;
