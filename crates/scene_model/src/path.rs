//! Path instruction streams
//!
//! A [`PathInstruction`] stream is the explicit geometry stored by path
//! layers and the exchange format of the geometry collaborator. Other shape
//! kinds derive their stream on demand.

use kurbo::{BezPath, PathEl, Point, SvgArc, Vec2};
use serde::{Deserialize, Serialize};

/// Tolerance used when flattening arcs into cubic segments
pub const ARC_TOLERANCE: f64 = 0.1;

/// A single drawing instruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathInstruction {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    /// Elliptical arc in SVG endpoint parameterization
    ArcTo {
        radii: Vec2,
        /// Rotation of the ellipse's x axis in radians
        x_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    Close,
}

impl PathInstruction {
    /// End point of the instruction, if it moves the pen
    pub fn end_point(&self) -> Option<Point> {
        match *self {
            PathInstruction::MoveTo(p) | PathInstruction::LineTo(p) => Some(p),
            PathInstruction::QuadTo(_, p) | PathInstruction::CubicTo(_, _, p) => Some(p),
            PathInstruction::ArcTo { to, .. } => Some(to),
            PathInstruction::Close => None,
        }
    }
}

/// Build a kurbo path from an instruction stream.
///
/// Arcs are converted to cubic segments; an arc that cannot be represented
/// (zero radius, coincident end points) degrades to a straight line, matching
/// SVG's out-of-range rules.
pub fn to_bez_path(instructions: &[PathInstruction]) -> BezPath {
    let mut path = BezPath::new();
    let mut current = Point::ZERO;
    let mut subpath_start = Point::ZERO;
    let mut open = false;

    for instruction in instructions {
        match *instruction {
            PathInstruction::MoveTo(p) => {
                path.move_to(p);
                current = p;
                subpath_start = p;
                open = true;
                continue;
            }
            PathInstruction::Close => {
                if open {
                    path.close_path();
                    current = subpath_start;
                    open = false;
                }
                continue;
            }
            _ => {}
        }

        // Drawing without a current subpath starts one at the pen position
        if !open {
            path.move_to(current);
            subpath_start = current;
            open = true;
        }

        match *instruction {
            PathInstruction::LineTo(p) => path.line_to(p),
            PathInstruction::QuadTo(c, p) => path.quad_to(c, p),
            PathInstruction::CubicTo(c1, c2, p) => path.curve_to(c1, c2, p),
            PathInstruction::ArcTo {
                radii,
                x_rotation,
                large_arc,
                sweep,
                to,
            } => {
                let svg_arc = SvgArc {
                    from: current,
                    to,
                    radii,
                    x_rotation,
                    large_arc,
                    sweep,
                };
                match kurbo::Arc::from_svg_arc(&svg_arc) {
                    Some(arc) => {
                        for el in arc.append_iter(ARC_TOLERANCE) {
                            path.push(el);
                        }
                    }
                    None => path.line_to(to),
                }
            }
            PathInstruction::MoveTo(_) | PathInstruction::Close => {}
        }

        if let Some(end) = instruction.end_point() {
            current = end;
        }
    }

    path
}

/// Read a kurbo path back into an instruction stream
pub fn from_bez_path(path: &BezPath) -> Vec<PathInstruction> {
    path.elements()
        .iter()
        .map(|el| match *el {
            PathEl::MoveTo(p) => PathInstruction::MoveTo(p),
            PathEl::LineTo(p) => PathInstruction::LineTo(p),
            PathEl::QuadTo(c, p) => PathInstruction::QuadTo(c, p),
            PathEl::CurveTo(c1, c2, p) => PathInstruction::CubicTo(c1, c2, p),
            PathEl::ClosePath => PathInstruction::Close,
        })
        .collect()
}
