//! Change notification
//!
//! Scene mutations queue [`LayerChange`] records. Every change is recorded on
//! the layer where it happened and propagated to each ancestor tagged with
//! its origin, so a cache can invalidate a leaf and all of its containers
//! without the graph knowing anything about caching. Queued changes are
//! delivered to [`ChangeObserver`]s by [`Scene::flush_changes`] once the
//! triggering edit has completed.
//!
//! [`Scene::flush_changes`]: crate::Scene::flush_changes

use crate::LayerId;
use serde::{Deserialize, Serialize};

/// What changed on a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Generic property (name, opacity, visibility, selection, clip, mask)
    Property,
    /// Local transform
    Transform,
    /// Bounds of this layer or of something it contains
    Bounds,
    Fill,
    Stroke,
    /// Path data or primitive shape parameters
    Geometry,
    /// Text value, formats or typography
    Layout,
    /// Child list membership or order
    Children,
}

impl ChangeKind {
    /// Whether this change can alter the bounds of the layer and its ancestors
    pub fn affects_bounds(self) -> bool {
        matches!(
            self,
            ChangeKind::Transform
                | ChangeKind::Geometry
                | ChangeKind::Layout
                | ChangeKind::Stroke
                | ChangeKind::Children
        )
    }

    /// Whether derived geometry of the layer itself is stale
    pub fn affects_geometry(self) -> bool {
        matches!(self, ChangeKind::Geometry | ChangeKind::Layout)
    }
}

/// A change notification delivered to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerChange {
    /// Layer receiving the notification
    pub layer: LayerId,
    /// Layer where the mutation happened
    pub origin: LayerId,
    pub kind: ChangeKind,
}

impl LayerChange {
    pub fn new(layer: LayerId, origin: LayerId, kind: ChangeKind) -> Self {
        Self { layer, origin, kind }
    }

    /// Whether the change happened on this layer rather than a descendant
    pub fn is_local(&self) -> bool {
        self.layer == self.origin
    }
}

/// Receiver of committed change notifications
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, change: &LayerChange);
}
