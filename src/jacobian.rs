//! Numeric Jacobian of the arm, with velocity and torque mappings.

extern crate nalgebra as na;

use na::{Isometry3, SMatrix, SVector, Vector6};
use rayon::prelude::*;

use crate::kinematic_traits::{Joints, Kinematics, Status, NUM_JOINTS};

type JacobianMatrix = SMatrix<f64, 6, { NUM_JOINTS }>;

/// Struct representing the 6x7 Jacobian matrix of the arm.
///
/// The Jacobian matrix maps the joint velocities to the end-effector
/// velocities. Each column corresponds to a joint, and each row corresponds to
/// a degree of freedom of the end-effector (linear and angular velocities).
pub struct Jacobian {
    matrix: JacobianMatrix,

    /// The disturbance value used for computing the Jacobian
    epsilon: f64,
}

impl Jacobian {
    /// Constructs a new Jacobian struct by computing the Jacobian matrix for
    /// the given robot and joint configuration.
    ///
    /// # Arguments
    ///
    /// * `robot` - A reference to the robot implementing the Kinematics trait
    /// * `qs` - A reference to the joint configuration
    /// * `epsilon` - A small value used for numerical differentiation
    ///
    /// Fails with the forward kinematics status when the joint configuration
    /// itself is invalid.
    pub fn new(robot: &(impl Kinematics + Sync), qs: &Joints, epsilon: f64) -> Result<Self, Status> {
        let matrix = compute_jacobian(robot, qs, epsilon)?;
        Ok(Self { matrix, epsilon })
    }

    /// Computes the joint velocities required to achieve a desired
    /// end-effector velocity.
    ///
    /// # Arguments
    ///
    /// * `desired_end_effector_velocity` - An Isometry3 representing the
    ///   desired linear and angular velocity of the end-effector
    ///
    /// # Returns
    ///
    /// `Result<Joints, &'static str>` - Joint positions, with values
    /// representing joint velocities rather than angles, or an error message if
    /// the computation fails.
    pub fn velocities(
        &self,
        desired_end_effector_velocity: &Isometry3<f64>,
    ) -> Result<Joints, &'static str> {
        // Extract the linear velocity (translation) and angular velocity (rotation)
        let linear_velocity = desired_end_effector_velocity.translation.vector;
        let angular_velocity = desired_end_effector_velocity.rotation.scaled_axis();

        // Combine into a single 6D vector
        let desired_velocity = Vector6::new(
            linear_velocity.x, linear_velocity.y, linear_velocity.z,
            angular_velocity.x, angular_velocity.y, angular_velocity.z,
        );

        self.velocities_from_vector(&desired_velocity)
    }

    /// Computes the joint velocities required to achieve a desired
    /// end-effector velocity given as a 6D vector.
    ///
    /// A 6x7 Jacobian is never invertible, so the velocities are always
    /// computed through the SVD pseudoinverse; among the one-parameter family
    /// of joint velocities realising the end-effector velocity this yields the
    /// one with the smallest norm (no motion in the null space).
    pub fn velocities_from_vector(
        &self,
        desired_end_effector_velocity: &Vector6<f64>,
    ) -> Result<Joints, &'static str> {
        match self.matrix.pseudo_inverse(self.epsilon) {
            Ok(jacobian_pseudoinverse) => {
                let joint_velocities = jacobian_pseudoinverse * desired_end_effector_velocity;
                Ok(vector_to_joints(&joint_velocities))
            }
            Err(_) => Err("Unable to compute the pseudoinverse of the Jacobian matrix"),
        }
    }

    /// Computes the joint torques required to resist (or exert) a desired
    /// end-effector force/torque.
    ///
    /// # Arguments
    ///
    /// * `desired_force_torque` - isometry structure representing forces and
    ///   torques rather than dimensions and angles.
    pub fn torques(&self, desired_force_torque: &Isometry3<f64>) -> Joints {
        let linear_force = desired_force_torque.translation.vector;
        let angular_torque = desired_force_torque.rotation.scaled_axis();

        let desired_force_torque_vector = Vector6::new(
            linear_force.x, linear_force.y, linear_force.z,
            angular_torque.x, angular_torque.y, angular_torque.z,
        );

        let joint_torques = self.matrix.transpose() * desired_force_torque_vector;
        vector_to_joints(&joint_torques)
    }

    /// Same as [`Jacobian::torques`] but for a 6D force/torque vector.
    pub fn torques_from_vector(&self, desired_force_torque: &Vector6<f64>) -> Joints {
        let joint_torques = self.matrix.transpose() * desired_force_torque;
        vector_to_joints(&joint_torques)
    }
}

fn vector_to_joints(v: &SVector<f64, { NUM_JOINTS }>) -> Joints {
    let mut joints = [0.0; NUM_JOINTS];
    for i in 0..NUM_JOINTS {
        joints[i] = v[i];
    }
    joints
}

/// Function to compute the Jacobian matrix for a given robot and joint
/// configuration by numerical differentiation of the forward kinematics. The
/// columns are evaluated in parallel.
pub fn compute_jacobian(
    robot: &(impl Kinematics + Sync),
    joints: &Joints,
    epsilon: f64,
) -> Result<JacobianMatrix, Status> {
    let current_pose = robot.forward(joints)?.pose;
    let current_position = current_pose.translation.vector;
    let current_orientation = current_pose.rotation;

    let jacobian_columns: Result<Vec<_>, Status> = (0..NUM_JOINTS)
        .into_par_iter()
        .map(|i| {
            let mut perturbed_qs = *joints;
            perturbed_qs[i] += epsilon;
            let perturbed_pose = robot.forward(&perturbed_qs)?.pose;
            let perturbed_position = perturbed_pose.translation.vector;
            let perturbed_orientation = perturbed_pose.rotation;

            let delta_position = (perturbed_position - current_position) / epsilon;
            let delta_orientation =
                (perturbed_orientation * current_orientation.inverse()).scaled_axis() / epsilon;

            Ok((delta_position, delta_orientation))
        })
        .collect();

    let mut jacobian = JacobianMatrix::zeros();
    for (i, (delta_position, delta_orientation)) in jacobian_columns?.into_iter().enumerate() {
        jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&delta_position);
        jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&delta_orientation);
    }

    Ok(jacobian)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_angle::ArmAngleInterval;
    use crate::kinematic_traits::{
        FkSolution, GlobalConfig, IkSolution, Pose, SeedState, Solutions,
    };
    use crate::resolution::IkOptions;
    use na::{Translation3, UnitQuaternion, Vector3};

    const EPSILON: f64 = 1e-6;

    /// Example implementation of the Kinematics trait for a single rotary
    /// joint robot of arm length 1. When the first joint rotates, it affects
    /// the Y-position and the Z-orientation of the end-effector; no other
    /// joint has any effect.
    struct SingleRotaryJointRobot;

    impl Kinematics for SingleRotaryJointRobot {
        fn forward(&self, qs: &Joints) -> Result<FkSolution, Status> {
            let angle = qs[0];
            let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, angle);
            let translation = Translation3::new(angle.cos(), angle.sin(), 0.0);

            Ok(FkSolution {
                pose: Pose::from_parts(translation, rotation),
                arm_angle: 0.0,
                config: GlobalConfig::default(),
                status: Status::Success,
            })
        }

        fn inverse(
            &self,
            _pose: &Pose,
            _seed: &SeedState,
            _options: &IkOptions,
        ) -> Result<Solutions, Status> {
            panic!() // Should not be used
        }

        fn inverse_arm_angle(
            &self,
            _pose: &Pose,
            _seed: &SeedState,
            _arm_angle: f64,
            _options: &IkOptions,
        ) -> Result<IkSolution, Status> {
            panic!() // Should not be used
        }

        fn feasible_intervals(
            &self,
            _pose: &Pose,
            _config: GlobalConfig,
        ) -> Result<Vec<ArmAngleInterval>, Status> {
            panic!() // Should not be used
        }
    }

    #[test]
    fn test_compute_jacobian() {
        let robot = SingleRotaryJointRobot;
        let joints: Joints = [0.0; NUM_JOINTS];
        let jacobian = compute_jacobian(&robot, &joints, EPSILON).expect("valid joints");

        let mut expected = JacobianMatrix::zeros();
        expected[(1, 0)] = 1.0; // Y position is affected by the first joint
        expected[(5, 0)] = 1.0; // Z orientation is affected by the first joint

        for i in 0..6 {
            for j in 0..NUM_JOINTS {
                assert!(
                    (jacobian[(i, j)] - expected[(i, j)]).abs() < EPSILON,
                    "jacobian[{},{}] = {} differs from {}",
                    i, j, jacobian[(i, j)], expected[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_velocities_from_iso() {
        let robot = SingleRotaryJointRobot;
        let initial_qs = [0.0; NUM_JOINTS];
        let jacobian = Jacobian::new(&robot, &initial_qs, EPSILON).expect("valid joints");

        // Given an end effector located 1 meter away from the axis of
        // rotation, with the joint rotating at 1 radian per second, the tip
        // velocity is one meter per second, all in the y component.
        let desired_velocity_isometry = Isometry3::new(
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        );
        let joint_velocities = jacobian
            .velocities(&desired_velocity_isometry)
            .expect("pseudoinverse exists");

        assert!((joint_velocities[0] - 1.0).abs() < 1e-4);
        for velocity in &joint_velocities[1..] {
            assert!(velocity.abs() < 1e-4);
        }
    }

    #[test]
    fn test_compute_joint_torques() {
        let robot = SingleRotaryJointRobot;
        let initial_qs = [0.0; NUM_JOINTS];
        let jacobian = Jacobian::new(&robot, &initial_qs, EPSILON).expect("valid joints");

        // For a single joint robot, the torque on the joint is what we apply
        // at the effector
        let desired_force_torque = Isometry3::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.234),
        );

        let joint_torques = jacobian.torques(&desired_force_torque);
        assert!((joint_torques[0] - 1.234).abs() < 1e-6);
        for torque in &joint_torques[1..] {
            assert!(torque.abs() < 1e-6);
        }
    }
}
