//! Numeric helpers shared across the solver: tolerance-aware comparisons,
//! clamped inverse trigonometry and small inspection utilities.

use std::f64::consts::PI;

use crate::kinematic_traits::{Joints, Solutions, NUM_JOINTS};

/// All values in the range ]-ZERO_ROUNDING_TOL, ZERO_ROUNDING_TOL[ are
/// considered zero. Every equality and sign test in the solver goes through
/// this tolerance.
pub const ZERO_ROUNDING_TOL: f64 = 1e-7;

pub(crate) fn near_zero(f: f64) -> bool {
    f.abs() <= ZERO_ROUNDING_TOL
}

pub(crate) fn near_equal(lhs: f64, rhs: f64) -> bool {
    near_zero(lhs - rhs)
}

/// Not definitely negative: f >= -ZERO_ROUNDING_TOL.
pub(crate) fn greater_or_zero(f: f64) -> bool {
    f >= -ZERO_ROUNDING_TOL
}

pub(crate) fn definitely_greater(lhs: f64, rhs: f64) -> bool {
    lhs > rhs + ZERO_ROUNDING_TOL
}

pub(crate) fn definitely_smaller(lhs: f64, rhs: f64) -> bool {
    lhs < rhs - ZERO_ROUNDING_TOL
}

/// acos with the argument clamped into [-1, 1]. Arguments may leave the valid
/// range by a rounding error when the arm is stretched or folded exactly.
pub(crate) fn clamped_acos(f: f64) -> f64 {
    if f <= -1.0 {
        debug_assert!(near_zero(f + 1.0));
        return PI;
    }

    if f >= 1.0 {
        debug_assert!(near_zero(f - 1.0));
        return 0.0;
    }

    f.acos()
}

/// sqrt of a value that is non-negative up to the rounding tolerance.
pub(crate) fn clamped_sqrt(f: f64) -> f64 {
    debug_assert!(greater_or_zero(f));

    if f <= 0.0 {
        return 0.0;
    }

    f.sqrt()
}

pub(crate) fn sign(f: f64) -> f64 {
    if f > 0.0 {
        1.0
    } else if f < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Maps an angle into the [-PI, PI] range.
pub fn wrap_angle(angle: f64) -> f64 {
    let mut angle = angle;

    while angle > PI {
        angle -= 2.0 * PI;
    }

    while angle < -PI {
        angle += 2.0 * PI;
    }

    angle
}

/// Checks if all angles in the vector are finite.
pub fn is_valid(qs: &Joints) -> bool {
    qs.iter().all(|&q| q.is_finite())
}

/// Weighted squared joint-space distance used to rank candidate solutions
/// against the seed state.
pub fn weighted_distance(a: &Joints, b: &Joints, weights: &Joints) -> f64 {
    let mut distance = 0.0;
    for i in 0..NUM_JOINTS {
        let delta = a[i] - b[i];
        distance += weights[i] * delta * delta;
    }

    distance
}

/// Angle in radians as a `deg(value)` string, used by the YAML representation.
pub fn deg(angle: &f64) -> String {
    format!("deg({})", angle.to_degrees())
}

/// Prints a joint vector in degrees, one value per column.
pub fn dump_joints(joints: &Joints) {
    for (i, &angle) in joints.iter().enumerate() {
        print!("{}: {:5.2} ", i, angle.to_degrees());
    }
    println!();
}

/// Prints all solutions of an inverse kinematics call, one per line, with the
/// configuration, arm angle and status.
pub fn dump_solutions(solutions: &Solutions) {
    if solutions.is_empty() {
        println!("No solutions");
    }

    for solution in solutions {
        print!(
            "gc {} psi {:6.3} [{}] ",
            solution.config.value(),
            solution.arm_angle,
            solution.status.message()
        );
        dump_joints(&solution.joints);
    }
}
