//! Layer entity and layer kinds
//!
//! A [`Layer`] carries the properties every node shares (identity, name,
//! opacity, visibility, transform, clip and mask) plus a [`LayerKind`] with
//! the kind-specific data. Capabilities such as "has a fill" are expressed by
//! the [`Filled`], [`Stroked`] and [`Geometric`] traits and queried by pattern
//! matching on the kind.

use crate::paint::{PaintRef, Stroke};
use crate::path::{from_bez_path, PathInstruction};
use crate::text::TextLayer;
use crate::{LayerId, Transform};
use kurbo::{Ellipse, Point, Rect, RoundedRect, Shape, Vec2};
use serde::{Deserialize, Serialize};

/// Tolerance for deriving curves from primitive shapes
const SHAPE_TOLERANCE: f64 = 0.1;

/// Discriminant of a layer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    Group,
    Rectangle,
    Ellipse,
    Path,
    Text,
    Clone,
    Picture,
}

impl LayerType {
    /// Name shown when a layer has no name of its own
    pub fn default_name(self) -> &'static str {
        match self {
            LayerType::Group => "Group",
            LayerType::Rectangle => "Rectangle",
            LayerType::Ellipse => "Ellipse",
            LayerType::Path => "Path",
            LayerType::Text => "Text",
            LayerType::Clone => "Clone",
            LayerType::Picture => "Picture",
        }
    }
}

/// Layer that has a fill paint
pub trait Filled {
    fn fill(&self) -> Option<&PaintRef>;

    /// Replace the fill, returning the released reference
    fn set_fill(&mut self, fill: Option<PaintRef>) -> Option<PaintRef>;
}

/// Layer that has a stroke
pub trait Stroked {
    fn stroke(&self) -> Option<&Stroke>;

    /// Replace the stroke, returning the previous one
    fn set_stroke(&mut self, stroke: Option<Stroke>) -> Option<Stroke>;
}

/// Layer whose content is a vector path
pub trait Geometric {
    /// The instruction stream in the layer's local space
    fn instructions(&self) -> Vec<PathInstruction>;
}

/// Container layer holding an ordered list of children.
///
/// Index 0 is the front-most child. The list is only changed through the
/// [`Scene`](crate::Scene) so that parent pointers stay consistent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupLayer {
    children: Vec<LayerId>,
}

impl GroupLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[LayerId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn index_of(&self, child: LayerId) -> Option<usize> {
        self.children.iter().position(|&id| id == child)
    }

    pub(crate) fn from_children(children: Vec<LayerId>) -> Self {
        Self { children }
    }

    pub(crate) fn insert_child(&mut self, index: usize, child: LayerId) {
        self.children.insert(index, child);
    }

    pub(crate) fn remove_child_at(&mut self, index: usize) -> LayerId {
        self.children.remove(index)
    }
}

/// Fill and stroke shared by shape kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub fill: Option<PaintRef>,
    pub stroke: Option<Stroke>,
}

/// Axis-aligned rectangle with optional rounded corners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleLayer {
    pub origin: Point,
    pub size: Vec2,
    pub corner_radius: f64,
    pub style: ShapeStyle,
}

impl RectangleLayer {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Vec2::new(width, height),
            corner_radius: 0.0,
            style: ShapeStyle::default(),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.size.to_size())
    }
}

/// Axis-aligned ellipse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipseLayer {
    pub center: Point,
    pub radii: Vec2,
    pub style: ShapeStyle,
}

impl EllipseLayer {
    pub fn new(center: Point, rx: f64, ry: f64) -> Self {
        Self {
            center,
            radii: Vec2::new(rx, ry),
            style: ShapeStyle::default(),
        }
    }
}

/// Shape with an explicit instruction stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathLayer {
    pub instructions: Vec<PathInstruction>,
    pub style: ShapeStyle,
}

impl PathLayer {
    pub fn new(instructions: Vec<PathInstruction>) -> Self {
        Self {
            instructions,
            style: ShapeStyle::default(),
        }
    }
}

/// Instance of another layer rendered under this layer's transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneLayer {
    pub target: LayerId,
}

/// Bitmap placed in a rectangle at the local origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureLayer {
    pub width: f64,
    pub height: f64,
    /// Image location (path or data URI); decoding is external
    pub source: String,
}

impl PictureLayer {
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Kind-specific layer data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    Group(GroupLayer),
    Rectangle(RectangleLayer),
    Ellipse(EllipseLayer),
    Path(PathLayer),
    Text(TextLayer),
    Clone(CloneLayer),
    Picture(PictureLayer),
}

impl LayerKind {
    pub fn layer_type(&self) -> LayerType {
        match self {
            LayerKind::Group(_) => LayerType::Group,
            LayerKind::Rectangle(_) => LayerType::Rectangle,
            LayerKind::Ellipse(_) => LayerType::Ellipse,
            LayerKind::Path(_) => LayerType::Path,
            LayerKind::Text(_) => LayerType::Text,
            LayerKind::Clone(_) => LayerType::Clone,
            LayerKind::Picture(_) => LayerType::Picture,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, LayerKind::Group(_))
    }

    pub fn as_group(&self) -> Option<&GroupLayer> {
        match self {
            LayerKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut GroupLayer> {
        match self {
            LayerKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextLayer> {
        match self {
            LayerKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextLayer> {
        match self {
            LayerKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_filled(&self) -> Option<&dyn Filled> {
        match self {
            LayerKind::Rectangle(l) => Some(l),
            LayerKind::Ellipse(l) => Some(l),
            LayerKind::Path(l) => Some(l),
            LayerKind::Text(l) => Some(l),
            LayerKind::Group(_) | LayerKind::Clone(_) | LayerKind::Picture(_) => None,
        }
    }

    pub fn as_filled_mut(&mut self) -> Option<&mut dyn Filled> {
        match self {
            LayerKind::Rectangle(l) => Some(l),
            LayerKind::Ellipse(l) => Some(l),
            LayerKind::Path(l) => Some(l),
            LayerKind::Text(l) => Some(l),
            LayerKind::Group(_) | LayerKind::Clone(_) | LayerKind::Picture(_) => None,
        }
    }

    pub fn as_stroked(&self) -> Option<&dyn Stroked> {
        match self {
            LayerKind::Rectangle(l) => Some(l),
            LayerKind::Ellipse(l) => Some(l),
            LayerKind::Path(l) => Some(l),
            LayerKind::Text(l) => Some(l),
            LayerKind::Group(_) | LayerKind::Clone(_) | LayerKind::Picture(_) => None,
        }
    }

    pub fn as_stroked_mut(&mut self) -> Option<&mut dyn Stroked> {
        match self {
            LayerKind::Rectangle(l) => Some(l),
            LayerKind::Ellipse(l) => Some(l),
            LayerKind::Path(l) => Some(l),
            LayerKind::Text(l) => Some(l),
            LayerKind::Group(_) | LayerKind::Clone(_) | LayerKind::Picture(_) => None,
        }
    }

    pub fn as_geometric(&self) -> Option<&dyn Geometric> {
        match self {
            LayerKind::Rectangle(l) => Some(l),
            LayerKind::Ellipse(l) => Some(l),
            LayerKind::Path(l) => Some(l),
            LayerKind::Group(_) | LayerKind::Text(_) | LayerKind::Clone(_) | LayerKind::Picture(_) => None,
        }
    }
}

macro_rules! impl_shape_style {
    ($($ty:ty),*) => {
        $(
            impl Filled for $ty {
                fn fill(&self) -> Option<&PaintRef> {
                    self.style.fill.as_ref()
                }

                fn set_fill(&mut self, fill: Option<PaintRef>) -> Option<PaintRef> {
                    std::mem::replace(&mut self.style.fill, fill)
                }
            }

            impl Stroked for $ty {
                fn stroke(&self) -> Option<&Stroke> {
                    self.style.stroke.as_ref()
                }

                fn set_stroke(&mut self, stroke: Option<Stroke>) -> Option<Stroke> {
                    std::mem::replace(&mut self.style.stroke, stroke)
                }
            }
        )*
    };
}

impl_shape_style!(RectangleLayer, EllipseLayer, PathLayer);

impl Filled for TextLayer {
    fn fill(&self) -> Option<&PaintRef> {
        self.fill.as_ref()
    }

    fn set_fill(&mut self, fill: Option<PaintRef>) -> Option<PaintRef> {
        std::mem::replace(&mut self.fill, fill)
    }
}

impl Stroked for TextLayer {
    fn stroke(&self) -> Option<&Stroke> {
        self.stroke.as_ref()
    }

    fn set_stroke(&mut self, stroke: Option<Stroke>) -> Option<Stroke> {
        std::mem::replace(&mut self.stroke, stroke)
    }
}

impl Geometric for RectangleLayer {
    fn instructions(&self) -> Vec<PathInstruction> {
        let rect = self.rect().abs();
        if self.corner_radius > 0.0 {
            from_bez_path(&RoundedRect::from_rect(rect, self.corner_radius).to_path(SHAPE_TOLERANCE))
        } else {
            from_bez_path(&rect.to_path(SHAPE_TOLERANCE))
        }
    }
}

impl Geometric for EllipseLayer {
    fn instructions(&self) -> Vec<PathInstruction> {
        from_bez_path(&Ellipse::new(self.center, self.radii, 0.0).to_path(SHAPE_TOLERANCE))
    }
}

impl Geometric for PathLayer {
    fn instructions(&self) -> Vec<PathInstruction> {
        self.instructions.clone()
    }
}

/// A node in the scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    parent: Option<LayerId>,
    name: Option<String>,
    opacity: f32,
    visible: bool,
    selected: bool,
    transform: Transform,
    clip: Option<LayerId>,
    mask: Option<LayerId>,
    kind: LayerKind,
}

impl Layer {
    /// Create a detached layer of the given kind
    pub fn new(kind: LayerKind) -> Self {
        Self {
            id: LayerId::new(),
            parent: None,
            name: None,
            opacity: 1.0,
            visible: true,
            selected: false,
            transform: Transform::IDENTITY,
            clip: None,
            mask: None,
            kind,
        }
    }

    pub fn group() -> Self {
        Self::new(LayerKind::Group(GroupLayer::new()))
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(LayerKind::Rectangle(RectangleLayer::new(x, y, width, height)))
    }

    pub fn ellipse(center: Point, rx: f64, ry: f64) -> Self {
        Self::new(LayerKind::Ellipse(EllipseLayer::new(center, rx, ry)))
    }

    pub fn path(instructions: Vec<PathInstruction>) -> Self {
        Self::new(LayerKind::Path(PathLayer::new(instructions)))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(LayerKind::Text(TextLayer::new(value)))
    }

    pub fn clone_of(target: LayerId) -> Self {
        Self::new(LayerKind::Clone(CloneLayer { target }))
    }

    pub fn picture(width: f64, height: f64, source: impl Into<String>) -> Self {
        Self::new(LayerKind::Picture(PictureLayer {
            width,
            height,
            source: source.into(),
        }))
    }

    /// Use a specific id (e.g. when a command must recreate the same layer)
    pub fn with_id(mut self, id: LayerId) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn with_fill(mut self, fill: PaintRef) -> Self {
        if let Some(filled) = self.kind.as_filled_mut() {
            filled.set_fill(Some(fill));
        }
        self
    }

    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        if let Some(stroked) = self.kind.as_stroked_mut() {
            stroked.set_stroke(Some(stroke));
        }
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<LayerId>) {
        self.parent = parent;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The layer's name, or the default name of its kind
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.layer_type().default_name())
    }

    pub fn set_name(&mut self, name: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.name, name)
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set opacity clamped to [0, 1], returning the previous value
    pub fn set_opacity(&mut self, opacity: f32) -> f32 {
        let clamped = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
        std::mem::replace(&mut self.opacity, clamped)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) -> bool {
        std::mem::replace(&mut self.visible, visible)
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) -> bool {
        std::mem::replace(&mut self.selected, selected)
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub(crate) fn set_transform(&mut self, transform: Transform) -> Transform {
        std::mem::replace(&mut self.transform, transform)
    }

    pub fn clip(&self) -> Option<LayerId> {
        self.clip
    }

    pub fn set_clip(&mut self, clip: Option<LayerId>) -> Option<LayerId> {
        std::mem::replace(&mut self.clip, clip)
    }

    pub fn mask(&self) -> Option<LayerId> {
        self.mask
    }

    pub fn set_mask(&mut self, mask: Option<LayerId>) -> Option<LayerId> {
        std::mem::replace(&mut self.mask, mask)
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Mutable kind data. Group children stay read-only through this.
    pub fn kind_mut(&mut self) -> &mut LayerKind {
        &mut self.kind
    }

    pub fn layer_type(&self) -> LayerType {
        self.kind.layer_type()
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Children of a container, empty for leaves
    pub fn children(&self) -> &[LayerId] {
        self.kind.as_group().map(GroupLayer::children).unwrap_or(&[])
    }

    pub fn fill(&self) -> Option<&PaintRef> {
        self.kind.as_filled().and_then(Filled::fill)
    }

    pub fn stroke(&self) -> Option<&Stroke> {
        self.kind.as_stroked().and_then(Stroked::stroke)
    }
}
