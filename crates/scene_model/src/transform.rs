//! Decomposed 2D transform
//!
//! A layer's local transform is stored as independent components so that
//! edits to scale, skew, rotation and position stay separate, reversible
//! degrees of freedom. The matrix form is derived on demand.
//!
//! Components compose in a fixed order: scale, then skew, then rotate, then
//! translate. With kurbo's column-vector convention that is
//! `T * R * K * S`.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Tolerance used when comparing decomposed transforms
pub const TRANSFORM_EPSILON: f64 = 1e-9;

/// Below this a scale column is treated as collapsed
const DEGENERATE_SCALE: f64 = 1e-12;

/// A 2D affine transform kept in decomposed form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Scale along the local x and y axes. Reflection is carried by `scale.y`.
    pub scale: Vec2,
    /// Horizontal skew angle in radians
    pub skew: f64,
    /// Rotation in radians (counter-clockwise in a y-up frame)
    pub rotation: f64,
    /// Translation applied last
    pub translation: Vec2,
}

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self {
        scale: Vec2::new(1.0, 1.0),
        skew: 0.0,
        rotation: 0.0,
        translation: Vec2::ZERO,
    };

    /// Create a transform from explicit components
    pub fn new(scale: Vec2, skew: f64, rotation: f64, translation: Vec2) -> Self {
        Self {
            scale,
            skew,
            rotation,
            translation,
        }
    }

    /// A pure translation
    pub fn from_translation(x: f64, y: f64) -> Self {
        Self {
            translation: Vec2::new(x, y),
            ..Self::IDENTITY
        }
    }

    /// A pure rotation (radians)
    pub fn from_rotation(radians: f64) -> Self {
        Self {
            rotation: radians,
            ..Self::IDENTITY
        }
    }

    /// A pure non-uniform scale
    pub fn from_scale(sx: f64, sy: f64) -> Self {
        Self {
            scale: Vec2::new(sx, sy),
            ..Self::IDENTITY
        }
    }

    /// Translation component as a point
    pub fn position(&self) -> Point {
        self.translation.to_point()
    }

    /// Compose the components into a matrix
    pub fn to_affine(&self) -> Affine {
        Affine::translate(self.translation)
            * Affine::rotate(self.rotation)
            * Affine::skew(self.skew.tan(), 0.0)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }

    /// Decompose a matrix back into components.
    ///
    /// Exact (to floating point) for every invertible matrix. A matrix whose
    /// second column is parallel to a non-zero first column has no skew/scale
    /// representation and loses that column.
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        let translation = Vec2::new(e, f);
        let sx = a.hypot(b);

        if sx <= DEGENERATE_SCALE {
            let sy = c.hypot(d);
            let rotation = if sy > DEGENERATE_SCALE { (-c).atan2(d) } else { 0.0 };
            return Self {
                scale: Vec2::new(0.0, sy),
                skew: 0.0,
                rotation,
                translation,
            };
        }

        let rotation = b.atan2(a);
        let (sin, cos) = rotation.sin_cos();
        let sy = (a * d - b * c) / sx;
        let skew = if sy.abs() > DEGENERATE_SCALE {
            ((c * cos + d * sin) / sy).atan()
        } else {
            0.0
        };

        Self {
            scale: Vec2::new(sx, sy),
            skew,
            rotation,
            translation,
        }
    }

    /// Inverse matrix, if the transform is invertible
    pub fn inverse_affine(&self) -> Option<Affine> {
        let affine = self.to_affine();
        if affine.determinant().abs() <= DEGENERATE_SCALE {
            None
        } else {
            Some(affine.inverse())
        }
    }

    /// Whether both transforms produce the same matrix within `eps`
    pub fn approx_eq(&self, other: &Transform, eps: f64) -> bool {
        affine_approx_eq(self.to_affine(), other.to_affine(), eps)
    }

    /// Whether this is the identity within tolerance
    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Self::IDENTITY, TRANSFORM_EPSILON)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Affine> for Transform {
    fn from(affine: Affine) -> Self {
        Self::from_affine(affine)
    }
}

impl From<Transform> for Affine {
    fn from(transform: Transform) -> Self {
        transform.to_affine()
    }
}

/// Compare two matrices coefficient by coefficient
pub fn affine_approx_eq(a: Affine, b: Affine, eps: f64) -> bool {
    a.as_coeffs()
        .iter()
        .zip(b.as_coeffs().iter())
        .all(|(x, y)| (x - y).abs() <= eps * (1.0 + x.abs().max(y.abs())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_identity_round_trip() {
        let t = Transform::from_affine(Affine::IDENTITY);
        assert!(t.is_identity());
        assert_eq!(Transform::IDENTITY.to_affine(), Affine::IDENTITY);
    }

    #[test]
    fn test_translation_composes() {
        let outer = Transform::from_translation(5.0, 5.0).to_affine();
        let inner = Transform::from_translation(10.0, 10.0).to_affine();
        let absolute = Transform::from_affine(outer * inner);
        assert!(absolute.approx_eq(&Transform::from_translation(15.0, 15.0), TRANSFORM_EPSILON));
    }

    #[test]
    fn test_component_order() {
        // Scale is applied before rotation: a unit x vector scaled by 2 then
        // rotated a quarter turn lands on (0, 2).
        let t = Transform::new(Vec2::new(2.0, 1.0), 0.0, FRAC_PI_2, Vec2::ZERO);
        let p = t.to_affine() * Point::new(1.0, 0.0);
        assert!((p.x - 0.0).abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_reflection_goes_to_scale_y() {
        let t = Transform::from_affine(Affine::FLIP_Y);
        assert!((t.scale.x - 1.0).abs() < 1e-12);
        assert!((t.scale.y + 1.0).abs() < 1e-12);
        assert!(t.rotation.abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_first_column() {
        let affine = Affine::new([0.0, 0.0, 0.0, 3.0, 1.0, 2.0]);
        let t = Transform::from_affine(affine);
        assert_eq!(t.scale.x, 0.0);
        assert!((t.scale.y - 3.0).abs() < 1e-12);
        assert!(affine_approx_eq(t.to_affine(), affine, 1e-12));
        assert!(t.inverse_affine().is_none());
    }

    #[test]
    fn test_skew_decomposition() {
        let t = Transform::new(Vec2::new(1.5, 0.5), FRAC_PI_4 / 2.0, PI / 3.0, Vec2::new(3.0, -4.0));
        let back = Transform::from_affine(t.to_affine());
        assert!((back.skew - t.skew).abs() < 1e-9);
        assert!((back.rotation - t.rotation).abs() < 1e-9);
        assert!((back.scale - t.scale).hypot() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_decompose_recompose(
            sx in 0.05f64..20.0,
            sy in prop_oneof![-20.0f64..-0.05, 0.05f64..20.0],
            skew in -1.2f64..1.2,
            rotation in -3.1f64..3.1,
            tx in -1000.0f64..1000.0,
            ty in -1000.0f64..1000.0,
        ) {
            let t = Transform::new(Vec2::new(sx, sy), skew, rotation, Vec2::new(tx, ty));
            let back = Transform::from_affine(t.to_affine());
            prop_assert!(back.approx_eq(&t, 1e-9));
            prop_assert!((back.scale.x - sx).abs() < 1e-6);
            prop_assert!((back.scale.y - sy).abs() < 1e-6);
            prop_assert!((back.skew - skew).abs() < 1e-6);
            prop_assert!((back.rotation - rotation).abs() < 1e-6);
        }
    }
}
