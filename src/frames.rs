//! Internal rigid-frame representation used by the closed-form kinematics.
//!
//! The solver composes Denavit-Hartenberg link transforms and manipulates the
//! rotation part as a plain 3x3 matrix (the coefficient construction multiplies
//! and transposes orientation matrices directly), so frames are kept as
//! matrix + vector internally and converted to a quaternion-based `Pose` only
//! at the API boundary.

use std::f64::consts::PI;
use std::ops::Mul;

use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};

use crate::kinematic_traits::Pose;
use crate::utils::near_equal;

#[derive(Clone, Debug)]
pub(crate) struct Frame {
    pub ori: Matrix3<f64>,
    pub pos: Vector3<f64>,
}

impl Frame {
    pub fn identity() -> Self {
        Frame { ori: Matrix3::identity(), pos: Vector3::zeros() }
    }

    /// Construct a link frame from DH parameters.
    pub fn from_dh(d: f64, theta: f64, a: f64, alpha: f64) -> Self {
        // alpha usually is a multiple of PI/2 and the rotation entries must be
        // exactly 0/±1 there, not sin/cos rounding noise
        let (sa, ca) = if near_equal(alpha, -PI / 2.0) {
            (-1.0, 0.0)
        } else if near_equal(alpha, 0.0) {
            (0.0, 1.0)
        } else if near_equal(alpha, PI / 2.0) {
            (1.0, 0.0)
        } else {
            (alpha.sin(), alpha.cos())
        };

        let (st, ct) = (theta.sin(), theta.cos());

        let ori = Matrix3::new(
            ct, -st * ca, st * sa, //
            st, ct * ca, -ct * sa, //
            0.0, sa, ca,
        );
        let pos = Vector3::new(a * ct, a * st, d);

        Frame { ori, pos }
    }

    pub fn from_pose(pose: &Pose) -> Self {
        Frame {
            ori: pose.rotation.to_rotation_matrix().into_inner(),
            pos: pose.translation.vector,
        }
    }

    pub fn to_pose(&self) -> Pose {
        let rotation = Rotation3::from_matrix_unchecked(self.ori);
        Pose::from_parts(
            Translation3::from(self.pos),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }

    pub fn all_finite(&self) -> bool {
        self.ori.iter().all(|v| v.is_finite()) && self.pos.iter().all(|v| v.is_finite())
    }
}

impl Mul for &Frame {
    type Output = Frame;

    fn mul(self, rhs: &Frame) -> Frame {
        Frame { ori: self.ori * rhs.ori, pos: self.ori * rhs.pos + self.pos }
    }
}

/// Skew-symmetric cross-product matrix of a vector.
pub(crate) fn cross_matrix(vec: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -vec[2], vec[1], //
        vec[2], 0.0, -vec[0], //
        -vec[1], vec[0], 0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_dh_identity() {
        let frame = Frame::from_dh(0.0, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(frame.ori, Matrix3::identity(), epsilon = 1e-12);
        assert!(frame.pos.norm() < 1e-12);
    }

    #[test]
    fn test_dh_translation_along_z() {
        let frame = Frame::from_dh(0.4, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(frame.pos, Vector3::new(0.0, 0.0, 0.4), epsilon = 1e-12);
    }

    #[test]
    fn test_exact_quarter_turns() {
        // twist of -PI/2 must produce an exact 0/±1 matrix
        let frame = Frame::from_dh(0.0, 0.0, 0.0, -PI / 2.0);
        let expected = Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, //
            0.0, -1.0, 0.0,
        );
        assert_eq!(frame.ori, expected);
    }

    #[test]
    fn test_composition_matches_pose_product() {
        let a = Frame::from_dh(0.34, 0.3, 0.0, -PI / 2.0);
        let b = Frame::from_dh(0.0, -0.7, 0.0, PI / 2.0);
        let composed = (&a * &b).to_pose();
        let reference = a.to_pose() * b.to_pose();

        assert!((composed.translation.vector - reference.translation.vector).norm() < 1e-12);
        assert!(composed.rotation.angle_to(&reference.rotation) < 1e-12);
    }

    #[test]
    fn test_pose_round_trip() {
        let frame = Frame::from_dh(0.1, 0.4, 0.2, 0.3);
        let back = Frame::from_pose(&frame.to_pose());
        assert_abs_diff_eq!(frame.ori, back.ori, epsilon = 1e-12);
        assert_abs_diff_eq!(frame.pos, back.pos, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_matrix() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let w = Vector3::new(-0.4, 0.5, 0.6);
        assert!((cross_matrix(&v) * w - v.cross(&w)).norm() < 1e-12);
    }
}
