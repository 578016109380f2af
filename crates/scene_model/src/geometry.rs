//! Geometry collaborator contract
//!
//! The scene graph never fills or strokes pixels and never performs boolean
//! path combination itself. It talks to a geometry engine through
//! [`GeometryProvider`] and the opaque [`Geometry`] handles it hands out.
//!
//! [`BezGeometryProvider`] is a `kurbo`-backed implementation. Containment
//! tests are exact, including for boolean combinations. It can only read back
//! the outline of a combination when that outline is made of the operands'
//! own contours: unions, and operands whose bounds do not overlap. Any other
//! combination reads back as [`SceneError::NotSupported`]; producing those
//! outlines is the job of a full geometry engine.

use crate::path::{from_bez_path, to_bez_path, PathInstruction};
use crate::{Result, SceneError};
use kurbo::{Affine, BezPath, ParamCurveNearest, Point, Rect, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy used for nearest-point queries on stroke hit tests
const NEAREST_ACCURACY: f64 = 1e-6;

/// Boolean combination applied to two geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombineOp {
    Union,
    Intersect,
    Xor,
    /// Area of the first operand not covered by the second
    Exclude,
}

impl CombineOp {
    /// Combine two containment results
    pub fn apply(self, a: bool, b: bool) -> bool {
        match self {
            CombineOp::Union => a || b,
            CombineOp::Intersect => a && b,
            CombineOp::Xor => a != b,
            CombineOp::Exclude => a && !b,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CombineOp::Union => "Union",
            CombineOp::Intersect => "Intersect",
            CombineOp::Xor => "Xor",
            CombineOp::Exclude => "Exclude",
        }
    }
}

/// Opaque path handle produced by a geometry engine
pub trait Geometry: fmt::Debug + Send + Sync {
    /// Read the geometry back as an instruction stream
    fn read(&self) -> Result<Vec<PathInstruction>>;

    /// A copy of this geometry mapped through `affine`
    fn transform(&self, affine: Affine) -> Box<dyn Geometry>;

    /// Boolean combination with another geometry
    fn combine(&self, other: &dyn Geometry, op: CombineOp) -> Result<Box<dyn Geometry>>;

    /// Whether the filled area contains `point`
    fn fill_contains(&self, point: Point) -> bool;

    /// Whether a stroke of `width` along the outline contains `point`
    fn stroke_contains(&self, point: Point, width: f64) -> bool;

    /// Axis-aligned bounds of the filled area
    fn bounds(&self) -> Rect;

    fn union(&self, other: &dyn Geometry) -> Result<Box<dyn Geometry>> {
        self.combine(other, CombineOp::Union)
    }

    fn intersection(&self, other: &dyn Geometry) -> Result<Box<dyn Geometry>> {
        self.combine(other, CombineOp::Intersect)
    }

    fn xor(&self, other: &dyn Geometry) -> Result<Box<dyn Geometry>> {
        self.combine(other, CombineOp::Xor)
    }

    fn difference(&self, other: &dyn Geometry) -> Result<Box<dyn Geometry>> {
        self.combine(other, CombineOp::Exclude)
    }
}

/// Factory for geometry handles
pub trait GeometryProvider: Send + Sync {
    /// An empty geometry
    fn create_geometry(&self) -> Box<dyn Geometry>;

    /// A geometry loaded from an instruction stream
    fn load(&self, instructions: &[PathInstruction]) -> Result<Box<dyn Geometry>>;
}

/// `kurbo`-backed geometry provider
#[derive(Debug, Clone, Copy, Default)]
pub struct BezGeometryProvider;

impl BezGeometryProvider {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryProvider for BezGeometryProvider {
    fn create_geometry(&self) -> Box<dyn Geometry> {
        Box::new(BezGeometry::from_path(BezPath::new()))
    }

    fn load(&self, instructions: &[PathInstruction]) -> Result<Box<dyn Geometry>> {
        let invalid = instructions.iter().filter_map(|i| i.end_point()).any(|p| !p.is_finite());
        if invalid {
            return Err(SceneError::Geometry(
                "instruction stream contains non-finite coordinates".to_string(),
            ));
        }
        Ok(Box::new(BezGeometry::from_instructions(instructions)))
    }
}

#[derive(Debug, Clone)]
enum Outline {
    Path(BezPath),
    Combined {
        op: CombineOp,
        first: Box<BezGeometry>,
        second: Box<BezGeometry>,
    },
}

/// Geometry held as a kurbo path or a boolean combination of two geometries
#[derive(Debug, Clone)]
pub struct BezGeometry {
    outline: Outline,
}

impl BezGeometry {
    pub fn from_path(path: BezPath) -> Self {
        Self {
            outline: Outline::Path(path),
        }
    }

    pub fn from_instructions(instructions: &[PathInstruction]) -> Self {
        Self::from_path(to_bez_path(instructions))
    }

    /// Outline as a single path whose nonzero fill matches `fill_contains`
    fn outline_path(&self) -> Result<BezPath> {
        let (op, first, second) = match &self.outline {
            Outline::Path(path) => return Ok(path.clone()),
            Outline::Combined { op, first, second } => (*op, first, second),
        };
        let (a, b) = (first.outline_path()?, second.outline_path()?);
        let disjoint = !overlaps(first.bounds(), second.bounds());
        match op {
            CombineOp::Union => Ok(concat(positive(a), positive(b))),
            CombineOp::Xor if disjoint => Ok(concat(positive(a), positive(b))),
            CombineOp::Exclude if disjoint => Ok(a),
            CombineOp::Intersect if disjoint => Ok(BezPath::new()),
            _ => Err(SceneError::NotSupported(format!(
                "{} of overlapping outlines",
                op.display_name()
            ))),
        }
    }

    fn transformed(&self, affine: Affine) -> BezGeometry {
        match &self.outline {
            Outline::Path(path) => {
                let mut path = path.clone();
                path.apply_affine(affine);
                BezGeometry::from_path(path)
            }
            Outline::Combined { op, first, second } => BezGeometry {
                outline: Outline::Combined {
                    op: *op,
                    first: Box::new(first.transformed(affine)),
                    second: Box::new(second.transformed(affine)),
                },
            },
        }
    }
}

impl Geometry for BezGeometry {
    fn read(&self) -> Result<Vec<PathInstruction>> {
        Ok(from_bez_path(&self.outline_path()?))
    }

    fn transform(&self, affine: Affine) -> Box<dyn Geometry> {
        Box::new(self.transformed(affine))
    }

    fn combine(&self, other: &dyn Geometry, op: CombineOp) -> Result<Box<dyn Geometry>> {
        let second = BezGeometry::from_instructions(&other.read()?);
        Ok(Box::new(BezGeometry {
            outline: Outline::Combined {
                op,
                first: Box::new(self.clone()),
                second: Box::new(second),
            },
        }))
    }

    fn fill_contains(&self, point: Point) -> bool {
        match &self.outline {
            Outline::Path(path) => path.winding(point) != 0,
            Outline::Combined { op, first, second } => {
                op.apply(first.fill_contains(point), second.fill_contains(point))
            }
        }
    }

    fn stroke_contains(&self, point: Point, width: f64) -> bool {
        let half = width.max(0.0) / 2.0;
        match &self.outline {
            Outline::Path(path) => path
                .segments()
                .any(|seg| seg.nearest(point, NEAREST_ACCURACY).distance_sq <= half * half),
            Outline::Combined { first, second, .. } => {
                first.stroke_contains(point, width) || second.stroke_contains(point, width)
            }
        }
    }

    fn bounds(&self) -> Rect {
        match &self.outline {
            Outline::Path(path) => {
                if path.elements().is_empty() {
                    Rect::ZERO
                } else {
                    path.bounding_box()
                }
            }
            Outline::Combined { op, first, second } => {
                let (a, b) = (first.bounds(), second.bounds());
                match op {
                    CombineOp::Union | CombineOp::Xor => a.union(b),
                    CombineOp::Intersect => {
                        if overlaps(a, b) {
                            a.intersect(b)
                        } else {
                            Rect::ZERO
                        }
                    }
                    CombineOp::Exclude => a,
                }
            }
        }
    }
}

fn overlaps(a: Rect, b: Rect) -> bool {
    let overlap = a.intersect(b);
    overlap.width() > 0.0 && overlap.height() > 0.0
}

/// `path` with its contours reversed when it winds negatively overall, so
/// concatenating two such paths fills their union under the nonzero rule
fn positive(path: BezPath) -> BezPath {
    if path.area() < 0.0 {
        path.reverse_subpaths()
    } else {
        path
    }
}

fn concat(mut first: BezPath, second: BezPath) -> BezPath {
    first.extend(second.elements().iter().copied());
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_geometry(x0: f64, y0: f64, x1: f64, y1: f64) -> Box<dyn Geometry> {
        Box::new(BezGeometry::from_path(Rect::new(x0, y0, x1, y1).to_path(0.1)))
    }

    #[test]
    fn test_empty_geometry() {
        let geometry = BezGeometryProvider.create_geometry();
        assert_eq!(geometry.bounds(), Rect::ZERO);
        assert!(geometry.read().unwrap().is_empty());
        assert!(!geometry.fill_contains(Point::ZERO));
    }

    #[test]
    fn test_fill_and_stroke_contains() {
        let geometry = rect_geometry(0.0, 0.0, 10.0, 10.0);
        assert!(geometry.fill_contains(Point::new(5.0, 5.0)));
        assert!(!geometry.fill_contains(Point::new(15.0, 5.0)));
        assert!(geometry.stroke_contains(Point::new(10.5, 5.0), 2.0));
        assert!(!geometry.stroke_contains(Point::new(5.0, 5.0), 2.0));
    }

    #[test]
    fn test_boolean_containment() {
        let a = rect_geometry(0.0, 0.0, 10.0, 10.0);
        let b = rect_geometry(5.0, 5.0, 15.0, 15.0);
        let inside_both = Point::new(7.0, 7.0);
        let only_a = Point::new(2.0, 2.0);
        let only_b = Point::new(12.0, 12.0);

        let union = a.union(b.as_ref()).unwrap();
        assert!(union.fill_contains(inside_both) && union.fill_contains(only_a) && union.fill_contains(only_b));
        assert_eq!(union.bounds(), Rect::new(0.0, 0.0, 15.0, 15.0));

        let intersection = a.intersection(b.as_ref()).unwrap();
        assert!(intersection.fill_contains(inside_both));
        assert!(!intersection.fill_contains(only_a));
        assert_eq!(intersection.bounds(), Rect::new(5.0, 5.0, 10.0, 10.0));

        let xor = a.xor(b.as_ref()).unwrap();
        assert!(!xor.fill_contains(inside_both) && xor.fill_contains(only_b));

        let difference = a.difference(b.as_ref()).unwrap();
        assert!(difference.fill_contains(only_a));
        assert!(!difference.fill_contains(inside_both));
        assert!(!difference.fill_contains(only_b));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = rect_geometry(0.0, 0.0, 1.0, 1.0);
        let b = rect_geometry(5.0, 5.0, 6.0, 6.0);
        assert_eq!(a.intersection(b.as_ref()).unwrap().bounds(), Rect::ZERO);
    }

    #[test]
    fn test_union_outline_fills_both_operands() {
        let a = rect_geometry(0.0, 0.0, 10.0, 10.0);
        // Mirrored, so its contour winds the other way
        let b = rect_geometry(0.0, 0.0, 10.0, 10.0).transform(Affine::new([-1.0, 0.0, 0.0, 1.0, 15.0, 5.0]));

        let union = a.union(b.as_ref()).unwrap();
        let outline = BezGeometryProvider.load(&union.read().unwrap()).unwrap();
        for point in [Point::new(2.0, 2.0), Point::new(7.0, 7.0), Point::new(12.0, 12.0)] {
            assert!(outline.fill_contains(point), "{:?} missing from union outline", point);
        }
        assert!(!outline.fill_contains(Point::new(12.0, 2.0)));
    }

    #[test]
    fn test_overlapping_outline_not_supported() {
        let a = rect_geometry(0.0, 0.0, 10.0, 10.0);
        let b = rect_geometry(5.0, 5.0, 15.0, 15.0);
        for op in [CombineOp::Intersect, CombineOp::Xor, CombineOp::Exclude] {
            let combined = a.combine(b.as_ref(), op).unwrap();
            assert!(matches!(combined.read(), Err(SceneError::NotSupported(_))), "{:?}", op);
        }
    }

    #[test]
    fn test_disjoint_outlines_read_back_exactly() {
        let a = rect_geometry(0.0, 0.0, 10.0, 10.0);
        let b = rect_geometry(20.0, 0.0, 30.0, 10.0);
        let only_a = Point::new(5.0, 5.0);
        let only_b = Point::new(25.0, 5.0);
        let load = |g: Box<dyn Geometry>| BezGeometryProvider.load(&g.read().unwrap()).unwrap();

        let exclude = load(a.difference(b.as_ref()).unwrap());
        assert!(exclude.fill_contains(only_a) && !exclude.fill_contains(only_b));

        let xor = load(a.xor(b.as_ref()).unwrap());
        assert!(xor.fill_contains(only_a) && xor.fill_contains(only_b));

        assert!(a.intersection(b.as_ref()).unwrap().read().unwrap().is_empty());
    }

    #[test]
    fn test_transform_moves_containment() {
        let moved = rect_geometry(0.0, 0.0, 10.0, 10.0).transform(Affine::translate((100.0, 0.0)));
        assert!(moved.fill_contains(Point::new(105.0, 5.0)));
        assert!(!moved.fill_contains(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_load_rejects_non_finite() {
        let result = BezGeometryProvider.load(&[PathInstruction::MoveTo(Point::new(f64::NAN, 0.0))]);
        assert!(matches!(result, Err(SceneError::Geometry(_))));
    }
}
