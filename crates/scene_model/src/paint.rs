//! Paint resources, strokes and swatches
//!
//! Paints are immutable values shared between layers through [`PaintRef`].
//! Acquiring a reference clones the `Arc`; releasing it drops the clone, so a
//! paint lives exactly as long as the last layer, swatch or undo record that
//! holds it.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 128, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not opaque
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Some(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Self::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// A color stop in a gradient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient (0.0 - 1.0)
    pub offset: f32,
    pub color: Color,
}

impl GradientStop {
    pub fn new(offset: f32, color: Color) -> Self {
        Self {
            offset: offset.clamp(0.0, 1.0),
            color,
        }
    }
}

/// A paint that can fill or stroke a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Paint {
    Solid(Color),
    LinearGradient {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
    },
    RadialGradient {
        center: Point,
        radius: f64,
        stops: Vec<GradientStop>,
    },
}

impl Paint {
    /// Shared handle to a solid color paint
    pub fn solid(color: Color) -> PaintRef {
        Arc::new(Paint::Solid(color))
    }

    /// Shared handle to a two-stop linear gradient
    pub fn linear(start: Point, end: Point, from: Color, to: Color) -> PaintRef {
        Arc::new(Paint::LinearGradient {
            start,
            end,
            stops: vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)],
        })
    }

    /// Whether the paint contributes nothing visible
    pub fn is_transparent(&self) -> bool {
        match self {
            Paint::Solid(color) => color.a == 0,
            Paint::LinearGradient { stops, .. } | Paint::RadialGradient { stops, .. } => {
                stops.iter().all(|stop| stop.color.a == 0)
            }
        }
    }
}

/// Shared, reference-counted paint handle
pub type PaintRef = Arc<Paint>;

/// Number of live references to a paint (layers, swatches and history)
pub fn paint_ref_count(paint: &PaintRef) -> usize {
    Arc::strong_count(paint)
}

/// Whether two handles refer to the same paint resource
pub fn same_paint(a: &Option<PaintRef>, b: &Option<PaintRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Line cap style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Line join style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Stroke settings for an outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub paint: Option<PaintRef>,
    /// Width in local units
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    /// Dash lengths, empty for a solid line
    pub dashes: Vec<f64>,
    pub dash_offset: f64,
}

impl Stroke {
    /// A solid stroke of the given paint and width
    pub fn new(paint: PaintRef, width: f64) -> Self {
        Self {
            paint: Some(paint),
            width: width.max(0.0),
            ..Self::default()
        }
    }

    /// Set a dash pattern
    pub fn with_dashes(mut self, dashes: Vec<f64>, offset: f64) -> Self {
        self.dashes = dashes;
        self.dash_offset = offset;
        self
    }

    /// Whether the stroke paints anything
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.paint.as_ref().is_some_and(|p| !p.is_transparent())
    }
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            paint: None,
            width: 1.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 4.0,
            dashes: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

/// A named reusable paint resource held by the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swatch {
    pub name: String,
    pub paint: PaintRef,
}

impl Swatch {
    pub fn new(name: impl Into<String>, paint: PaintRef) -> Self {
        Self {
            name: name.into(),
            paint,
        }
    }
}
