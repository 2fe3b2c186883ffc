//! Rust implementation of analytical forward and inverse kinematic solutions for
//! seven-axis redundant manipulators with a spherical shoulder, a revolute elbow
//! and a spherical wrist (S-R-S structure, such as the KUKA LBR iiwa family).
//!
//! This work builds upon the closed-form parameterisation of the elbow self-motion
//! described in _Analytical Inverse Kinematic Computation for 7-DOF Redundant
//! Manipulators With Joint Limits and Its Application to Redundancy Resolution_ by
//! Masayuki Shimizu et al. (IEEE Transactions on Robotics, 2008) and on the
//! arm-angle interval treatment used by redundancy-resolution controllers for
//! iiwa-class arms (Faria et al., 2018).
//!
//! The one-dimensional self-motion of the arm is parameterised by the scalar
//! *arm angle* ψ ∈ \[−π, π\]: the rotation of the elbow about the line from the
//! shoulder to the wrist, measured against a reference plane. Together with three
//! binary branch choices (the *global configuration* of shoulder, elbow and
//! wrist signs, packed into 0..=7), the pair (ψ, GC) selects exactly one joint
//! vector for a reachable pose.
//!
//! # Features
//!
//! - Forward kinematics returns the flange pose together with the arm angle and
//!   the global configuration, so a pose can be reproduced exactly.
//! - Hard joint limits are mapped through the closed form into *blocked* and
//!   *feasible* arm-angle intervals on the circle, so the solver knows the exact
//!   set of admissible ψ before evaluating a single candidate.
//! - The inverse solver enumerates global configurations per a selectable policy
//!   (keep the seed's, search near the seed, caller-specified, or all eight),
//!   picks ψ exactly, by snapping to the closest feasible interval, or by a
//!   velocity/acceleration-bounded step from the seed state.
//! - Candidate solutions are ranked by a weighted joint-space distance to the
//!   seed; the full sorted list is returned so callers can fall back to
//!   alternatives when a downstream check (e.g. collision) rejects the best one.
//! - Pivot singularities and stretched/overhead poses are detected and reported
//!   as graded statuses instead of producing garbage angles.
//! - Numeric 6×7 Jacobian, end-effector velocity and torque mapping.
//!
//! # Example
//!
//! ```
//! use rs_srs_kinematics::kinematic_traits::{Kinematics, SeedState};
//! use rs_srs_kinematics::kinematics_impl::SrsKinematics;
//! use rs_srs_kinematics::parameters::srs_kinematics::Parameters;
//! use rs_srs_kinematics::resolution::IkOptions;
//!
//! let robot = SrsKinematics::new(Parameters::lbr_iiwa_7_r800()).expect("valid preset");
//!
//! let joints = [0.0, 0.5236, 0.0, -1.5708, 0.0, 1.0472, 0.0];
//! let fk = robot.forward(&joints).expect("within limits");
//!
//! let seed = SeedState::new(joints);
//! let solution = robot
//!     .inverse_arm_angle(&fk.pose, &seed, fk.arm_angle, &IkOptions::default())
//!     .expect("pose is reachable");
//! assert!(solution.status.success());
//! ```

pub mod kinematic_traits;
pub mod parameters;
pub mod parameters_robots;

#[cfg(feature = "allow_filesystem")]
pub mod parameters_from_file;
pub mod parameter_error;

pub mod utils;
mod frames;

mod coefficients;
pub mod arm_angle;
pub mod kinematics_impl;
pub mod resolution;

pub mod jacobian;

#[cfg(test)]
mod tests;
