//! Forward-then-inverse round trips: the returned arm angle and global
//! configuration must reproduce the joint state exactly.

use crate::kinematic_traits::{Kinematics, SeedState, Status};
use crate::resolution::{GlobalConfigMode, IkOptions, PositionIkMode};
use crate::tests::test_utils::{iiwa, max_joint_difference, HOME_JOINTS};

const ROUND_TRIP_TOL: f64 = 1e-6;

fn exact_options(config: crate::kinematic_traits::GlobalConfig, arm_angle: f64) -> IkOptions {
    let mut options = IkOptions::default();
    options.global_configuration_mode = GlobalConfigMode::UserSpecified(config);
    options.position_ik_mode = PositionIkMode::ExactPsi;
    options.target_arm_angle = arm_angle;
    options
}

#[test]
fn test_home_pose_round_trip() {
    let robot = iiwa();

    let fk = robot.forward(&HOME_JOINTS).expect("home pose is valid");
    assert_eq!(fk.status, Status::Success);

    let seed = SeedState::new(HOME_JOINTS);
    let solution = robot
        .inverse_arm_angle(&fk.pose, &seed, fk.arm_angle, &exact_options(fk.config, fk.arm_angle))
        .expect("home pose is reachable");

    assert!(solution.status.success());
    assert_eq!(solution.config, fk.config);
    assert!(solution.same_interval);
    assert!(
        max_joint_difference(&solution.joints, &HOME_JOINTS) < ROUND_TRIP_TOL,
        "round trip error {}",
        max_joint_difference(&solution.joints, &HOME_JOINTS)
    );
}

#[test]
fn test_forward_kinematics_is_deterministic() {
    let robot = iiwa();

    let first = robot.forward(&HOME_JOINTS).expect("valid");
    let second = robot.forward(&HOME_JOINTS).expect("valid");

    // reported arm angle and configuration are reproduced bit for bit
    assert_eq!(first.arm_angle.to_bits(), second.arm_angle.to_bits());
    assert_eq!(first.config, second.config);
    assert_eq!(
        first.pose.translation.vector.x.to_bits(),
        second.pose.translation.vector.x.to_bits()
    );
}

#[test]
fn test_round_trip_grid() {
    let robot = iiwa();

    // a grid of generic joint states, away from limits and from the hinge
    // singularities at zero
    let q1_values = [-1.2, 0.4];
    let q2_values = [0.4, 1.2];
    let q3_values = [-0.8, 0.9];
    let q4_values = [-1.8, -0.9, 1.1];
    let q5_values = [-1.0, 0.7];
    let q6_values = [-0.9, 0.5, 1.3];
    let q7_values = [-0.7, 1.0];

    let mut checked = 0;
    for &q1 in &q1_values {
        for &q2 in &q2_values {
            for &q3 in &q3_values {
                for &q4 in &q4_values {
                    for &q5 in &q5_values {
                        for &q6 in &q6_values {
                            for &q7 in &q7_values {
                                let joints = [q1, q2, q3, q4, q5, q6, q7];

                                let fk = robot.forward(&joints).expect("grid joints are valid");
                                let seed = SeedState::new(joints);
                                let solution = robot
                                    .inverse_arm_angle(
                                        &fk.pose,
                                        &seed,
                                        fk.arm_angle,
                                        &exact_options(fk.config, fk.arm_angle),
                                    )
                                    .expect("pose generated by forward kinematics is reachable");

                                let error = max_joint_difference(&solution.joints, &joints);
                                assert!(
                                    error < ROUND_TRIP_TOL,
                                    "round trip error {} for joints {:?}",
                                    error,
                                    joints
                                );
                                checked += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    assert_eq!(checked, 288);
}

#[test]
fn test_round_trip_with_resolve_mode_keeps_pose() {
    let robot = iiwa();

    let fk = robot.forward(&HOME_JOINTS).expect("valid");
    let seed = SeedState::new(HOME_JOINTS);

    // default policy: resolve ψ from the seed; the seed already is an exact
    // solution, so the engine must not move it
    let mut options = IkOptions::default();
    options.target_arm_angle = fk.arm_angle;

    let solutions = robot.inverse(&fk.pose, &seed, &options).expect("reachable");
    let best = &solutions[0];

    assert!(best.status.success());
    assert!(max_joint_difference(&best.joints, &HOME_JOINTS) < ROUND_TRIP_TOL);
    assert!((best.arm_angle - fk.arm_angle).abs() < ROUND_TRIP_TOL);
}
