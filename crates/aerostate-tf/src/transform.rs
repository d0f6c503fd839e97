//! Rigid-body transform algebra.
//!
//! A [`RigidTransform`] relates two named frames: it is the pose of the child
//! frame expressed in the parent frame.  To move a point from child to parent
//! coordinates, rotate it by `rotation` then add `translation`.
//!
//! Chains read left to right.  If `a` is `X → Y` and `b` is `Y → Z` then
//! [`compose(a, b)`][compose] is `X → Z`.
//!
//! # Example
//!
//! ```rust
//! use aerostate_tf::transform::{RigidTransform, compose, invert};
//! use nalgebra::Vector3;
//!
//! let map_to_odom = RigidTransform::from_translation(Vector3::new(4.0, 0.0, 0.0));
//! let odom_to_body = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
//!
//! let map_to_body = compose(&map_to_odom, &odom_to_body);
//! assert!((map_to_body.translation.x - 5.0).abs() < 1e-12);
//!
//! let back = compose(&map_to_body, &invert(&odom_to_body));
//! assert!((back.translation.x - 4.0).abs() < 1e-12);
//! ```

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::TfError;

/// Quaternions whose norm falls below this are rejected as degenerate.
const MIN_QUATERNION_NORM: f64 = 1.0e-9;

// ────────────────────────────────────────────────────────────────────────────
// RigidTransform
// ────────────────────────────────────────────────────────────────────────────

/// Translation plus unit-quaternion rotation between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl RigidTransform {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Zero translation, identity rotation.
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(translation, UnitQuaternion::identity())
    }

    /// Build a transform from a position and roll/pitch/yaw angles (radians).
    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Build a transform from a raw (possibly unnormalised) quaternion as it
    /// arrives on the wire.
    ///
    /// Fails with [`TfError::NonFinite`] for NaN/inf components and with
    /// [`TfError::InvalidRotation`] when the quaternion is too close to zero
    /// to normalise.
    pub fn from_parts(translation: Vector3<f64>, rotation: Quaternion<f64>) -> Result<Self, TfError> {
        if !translation.iter().all(|c| c.is_finite()) {
            return Err(TfError::NonFinite("translation"));
        }
        if !rotation.coords.iter().all(|c| c.is_finite()) {
            return Err(TfError::NonFinite("rotation"));
        }
        let rotation = UnitQuaternion::try_new(rotation, MIN_QUATERNION_NORM).ok_or(
            TfError::InvalidRotation {
                norm: rotation.norm(),
            },
        )?;
        Ok(Self::new(translation, rotation))
    }

    /// `true` when every translation and rotation component is finite.
    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|c| c.is_finite())
            && self.rotation.coords.iter().all(|c| c.is_finite())
    }

    /// Chain `self` (`X → Y`) with `other` (`Y → Z`), yielding `X → Z`.
    pub fn compose(&self, other: &Self) -> Self {
        compose(self, other)
    }

    /// The reverse transform (`Y → X` for `self` = `X → Y`).
    pub fn inverse(&self) -> Self {
        invert(self)
    }

    /// Rotate a free vector (velocity, direction) from the child frame into
    /// the parent frame.  Translation does not apply to free vectors.
    pub fn rotate_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Algebra
// ────────────────────────────────────────────────────────────────────────────

/// Compose `a` (`X → Y`) with `b` (`Y → Z`) into `X → Z`.
///
/// `b`'s translation is rotated into `X` by `a`'s rotation before `a`'s
/// translation is added; rotations multiply as `a * b`.
pub fn compose(a: &RigidTransform, b: &RigidTransform) -> RigidTransform {
    let translation = a.translation + a.rotation * b.translation;
    let mut rotation = a.rotation * b.rotation;
    rotation.renormalize();
    RigidTransform::new(translation, rotation)
}

/// Invert `t`: rotation becomes its conjugate and translation becomes
/// `-(q⁻¹ · translation)`.  The result is renormalised.
pub fn invert(t: &RigidTransform) -> RigidTransform {
    let mut rotation = t.rotation.inverse();
    rotation.renormalize();
    let translation = -(rotation * t.translation);
    RigidTransform::new(translation, rotation)
}

/// The transform `d` with `compose(b, d) == a`, i.e. `invert(b) ∘ a`.
///
/// When `a` and `b` are both poses relative to a common root, `d` is the pose
/// of `a`'s frame expressed in `b`'s frame.
pub fn difference(a: &RigidTransform, b: &RigidTransform) -> RigidTransform {
    compose(&invert(b), a)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn samples() -> Vec<RigidTransform> {
        vec![
            RigidTransform::identity(),
            RigidTransform::from_translation(Vector3::new(1.0, -2.0, 0.5)),
            RigidTransform::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2),
            RigidTransform::from_xyz_rpy(3.0, 1.0, -1.0, 0.1, -0.4, 2.5),
            RigidTransform::from_xyz_rpy(-7.5, 0.25, 12.0, FRAC_PI_4, 0.3, -1.2),
        ]
    }

    fn assert_is_identity(t: &RigidTransform) {
        assert!(t.translation.norm() < 1e-9, "translation = {:?}", t.translation);
        assert!(t.rotation.angle() < 1e-9, "angle = {}", t.rotation.angle());
    }

    fn assert_same(a: &RigidTransform, b: &RigidTransform) {
        assert_relative_eq!(a.translation, b.translation, epsilon = 1e-9);
        assert!(
            a.rotation.angle_to(&b.rotation) < 1e-9,
            "rotations differ by {}",
            a.rotation.angle_to(&b.rotation)
        );
    }

    // ── compose ─────────────────────────────────────────────────────────────

    #[test]
    fn identity_compose_is_noop() {
        for t in samples() {
            assert_same(&compose(&RigidTransform::identity(), &t), &t);
            assert_same(&compose(&t, &RigidTransform::identity()), &t);
        }
    }

    #[test]
    fn compose_translations_add_without_rotation() {
        let a = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let b = RigidTransform::from_translation(Vector3::new(2.0, 0.5, 0.0));
        let c = compose(&a, &b);
        assert_relative_eq!(c.translation, Vector3::new(3.0, 0.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn compose_rotates_child_translation_into_parent() {
        // Parent yawed 90°: a step along the child's +X lands on the parent's +Y.
        let a = RigidTransform::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let b = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let c = compose(&a, &b);
        assert_relative_eq!(c.translation, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn compose_is_not_commutative() {
        let a = RigidTransform::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let b = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let ab = compose(&a, &b);
        let ba = compose(&b, &a);
        assert_relative_eq!(ab.translation, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(ba.translation, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn compose_is_associative() {
        let s = samples();
        let left = compose(&compose(&s[1], &s[3]), &s[4]);
        let right = compose(&s[1], &compose(&s[3], &s[4]));
        assert_same(&left, &right);
    }

    // ── invert ──────────────────────────────────────────────────────────────

    #[test]
    fn compose_with_inverse_is_identity() {
        for t in samples() {
            assert_is_identity(&compose(&t, &invert(&t)));
            assert_is_identity(&compose(&invert(&t), &t));
        }
    }

    #[test]
    fn inverse_of_yawed_offset() {
        let t = RigidTransform::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let inv = invert(&t);
        // Parent origin seen from the child: one metre along the child's +Y.
        assert_relative_eq!(inv.translation, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(inv.rotation.angle(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn inverse_keeps_unit_norm() {
        for t in samples() {
            let inv = invert(&invert(&invert(&t)));
            assert_relative_eq!(inv.rotation.norm(), 1.0, epsilon = 1e-12);
        }
    }

    // ── difference ──────────────────────────────────────────────────────────

    #[test]
    fn difference_is_right_inverse_of_compose() {
        let s = samples();
        for a in &s {
            for b in &s {
                let ab = compose(a, b);
                let d = difference(&ab, a);
                assert_same(&compose(a, &d), &ab);
                assert_same(&d, b);
            }
        }
    }

    #[test]
    fn difference_of_equal_transforms_is_identity() {
        for t in samples() {
            assert_is_identity(&difference(&t, &t));
        }
    }

    // ── construction ────────────────────────────────────────────────────────

    #[test]
    fn from_parts_normalises_rotation() {
        let t = RigidTransform::from_parts(Vector3::zeros(), Quaternion::new(2.0, 0.0, 0.0, 0.0))
            .expect("valid quaternion");
        assert_relative_eq!(t.rotation.norm(), 1.0, epsilon = 1e-12);
        assert!(t.rotation.angle() < 1e-12);
    }

    #[test]
    fn from_parts_rejects_zero_quaternion() {
        let err = RigidTransform::from_parts(Vector3::zeros(), Quaternion::new(0.0, 0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, TfError::InvalidRotation { .. }));
    }

    #[test]
    fn from_parts_rejects_nan() {
        let err = RigidTransform::from_parts(
            Vector3::new(f64::NAN, 0.0, 0.0),
            Quaternion::identity(),
        )
        .unwrap_err();
        assert_eq!(err, TfError::NonFinite("translation"));
    }

    #[test]
    fn rotate_vector_ignores_translation() {
        let t = RigidTransform::from_xyz_rpy(10.0, 10.0, 10.0, 0.0, 0.0, FRAC_PI_2);
        let v = t.rotate_vector(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }
}
