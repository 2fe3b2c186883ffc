//! The S-R-S kinematics engine: forward kinematics with arm-angle extraction
//! and the per-configuration closed-form inverse evaluation.

use std::f64::consts::PI;

use nalgebra::Vector3;
use tracing::debug;

use crate::arm_angle::FeasibleIntervals;
use crate::coefficients::{virtual_joint_angle_1, virtual_joint_angle_2, CoeffsCore, IkCoefficients};
use crate::frames::Frame;
use crate::kinematic_traits::{
    FkSolution, GlobalConfig, IkSolution, Joints, Kinematics, Pose, SeedState, Solutions, Status,
};
use crate::parameter_error::ParameterError;
use crate::parameters::srs_kinematics::Parameters;
use crate::resolution::{self, IkOptions, PositionIkMode};
use crate::utils::{
    clamped_acos, definitely_greater, definitely_smaller, is_valid, near_zero, sign, wrap_angle,
};

/// A warning is returned if the angular distance to a singular configuration is
/// below this value.
pub const SINGULARITY_CHECK_DISTANCE_TOL: f64 = 5.0 / 180.0 * PI;

/// Analytical kinematics for a 7-DOF arm with spherical shoulder, revolute
/// elbow and spherical wrist. Owns only the constant geometry and limits, so a
/// single instance can serve concurrent calls from multiple threads.
pub struct SrsKinematics {
    parameters: Parameters,
}

impl SrsKinematics {
    /// Creates a new `SrsKinematics` instance after validating the parameters.
    pub fn new(parameters: Parameters) -> Result<Self, ParameterError> {
        parameters.validate()?;
        Ok(SrsKinematics { parameters })
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub(crate) fn joint_limits_violated(&self, joints: &Joints) -> bool {
        joints.iter().enumerate().any(|(i, &q)| {
            definitely_smaller(q, self.parameters.lower_joint_limits[i])
                || definitely_greater(q, self.parameters.upper_joint_limits[i])
        })
    }

    pub(crate) fn build_core(&self, pose: &Frame, elbow_sign: f64) -> Result<CoeffsCore, Status> {
        CoeffsCore::build(pose, elbow_sign, &self.parameters)
    }

    /// Arm angle of a joint state under a configuration.
    pub(crate) fn arm_angle_of(&self, joints: &Joints, config: GlobalConfig) -> Result<f64, Status> {
        self.arm_angle_full(joints, config).map(|(arm_angle, ..)| arm_angle)
    }

    /// Arm angle plus the flange frame and the shoulder-wrist / wrist-flange
    /// unit vectors of a joint state.
    fn arm_angle_full(
        &self,
        joints: &Joints,
        config: GlobalConfig,
    ) -> Result<(f64, Frame, Vector3<f64>, Vector3<f64>), Status> {
        if self.joint_limits_violated(joints) {
            return Err(Status::JointLimitViolated);
        }

        let l = &self.parameters.limb_lengths;

        // shoulder, elbow, wrist and flange poses
        let mbs = &Frame::from_dh(l[0], joints[0], 0.0, -PI / 2.0)
            * &Frame::from_dh(0.0, joints[1], 0.0, PI / 2.0);
        let mbe = &(&mbs * &Frame::from_dh(l[1], joints[2], 0.0, PI / 2.0))
            * &Frame::from_dh(0.0, joints[3], 0.0, -PI / 2.0);
        let mbw = &(&mbe * &Frame::from_dh(l[2], joints[4], 0.0, -PI / 2.0))
            * &Frame::from_dh(0.0, joints[5], 0.0, PI / 2.0);
        let mbf = &mbw * &Frame::from_dh(l[3], joints[6], 0.0, 0.0);

        let xsw = mbw.pos - mbs.pos;
        let lsw = xsw.norm();
        let sw_n = xsw / lsw;
        let wf_n = (mbf.pos - mbw.pos).normalize();

        // the reference plane contains the elbow of the virtual manipulator
        // whose first pivot is aligned with the shoulder-wrist direction
        let joint_angle_1_v = virtual_joint_angle_1(&xsw);
        let joint_angle_2_v = virtual_joint_angle_2(&xsw, lsw, config.elbow_sign(), l);

        let mbs_v = &Frame::from_dh(l[0], joint_angle_1_v, 0.0, -PI / 2.0)
            * &Frame::from_dh(0.0, joint_angle_2_v, 0.0, PI / 2.0);
        let xse_v = Vector3::new(0.0, 0.0, l[1]);
        let xseb_n_v = (mbs_v.ori * xse_v).normalize();

        let xseb_n = (mbe.pos - mbs.pos).normalize();

        let v_sew_v = xseb_n_v.cross(&sw_n);
        let v_sew = xseb_n.cross(&sw_n);
        if near_zero(v_sew_v.norm()) || near_zero(v_sew.norm()) {
            // shoulder, elbow and wrist are collinear (stretched arm or
            // overhead); the reference plane is undefined and zero is chosen
            return Ok((0.0, mbf, sw_n, wf_n));
        }
        let v_sew_v = v_sew_v.normalize();
        let v_sew = v_sew.normalize();

        let psi_sign = sign(v_sew_v.cross(&v_sew).dot(&xsw));
        let arm_angle = psi_sign * clamped_acos(v_sew_v.dot(&v_sew));

        Ok((arm_angle, mbf, sw_n, wf_n))
    }

    /// Grades the distance of a joint state to the singular configurations of
    /// the arm: hinge joints at zero and the overhead alignment of the first
    /// and last axis.
    pub(crate) fn check_singularities(
        &self,
        joints: &Joints,
        sw_n: &Vector3<f64>,
        wf_n: &Vector3<f64>,
    ) -> Status {
        for j in (1..=5).step_by(2) {
            if near_zero(joints[j]) {
                return Status::TargetTooCloseToSingularity;
            }
        }

        let z = Vector3::z();
        let overhead_sw = clamped_acos(sw_n.dot(&z));
        let overhead_wf = clamped_acos(wf_n.dot(&z));

        if near_zero(overhead_sw) && near_zero(overhead_wf) {
            return Status::TargetTooCloseToSingularity;
        }

        let aligned = |angle: f64| {
            angle < SINGULARITY_CHECK_DISTANCE_TOL || angle > PI - SINGULARITY_CHECK_DISTANCE_TOL
        };
        if aligned(overhead_sw) && aligned(overhead_wf) {
            return Status::CloseToSingularity;
        }

        for j in (1..=5).step_by(2) {
            if joints[j].abs() < SINGULARITY_CHECK_DISTANCE_TOL {
                return Status::CloseToSingularity;
            }
        }

        Status::Success
    }

    /// Evaluates the closed form at one arm angle and guards the joint limits.
    pub(crate) fn joints_from_arm_angle(
        &self,
        arm_angle: f64,
        coeffs: &IkCoefficients,
    ) -> Result<(Joints, Status), Status> {
        let joints = coeffs.joints_at(arm_angle);

        if self.joint_limits_violated(&joints) {
            return Err(Status::JointLimitViolated);
        }

        Ok((
            joints,
            self.check_singularities(&joints, coeffs.shoulder_wrist_axis(), coeffs.wrist_flange_axis()),
        ))
    }

    /// Evaluates an externally fixed arm angle. When the elbow angle is near
    /// zero the elbow branch cannot be identified uniquely and the reference
    /// planes of the two branches are mirrored, so the mirrored arm angle is
    /// tried before giving up; this keeps pivot joints from flipping by PI.
    /// Returns the joints, the singularity grading and the arm angle actually
    /// used.
    pub(crate) fn joints_from_fixed_arm_angle(
        &self,
        arm_angle: f64,
        coeffs: &IkCoefficients,
    ) -> Result<(Joints, Status, f64), Status> {
        match self.joints_from_arm_angle(arm_angle, coeffs) {
            Ok((joints, status)) => Ok((joints, status, arm_angle)),
            Err(error) => {
                if near_zero(coeffs.joint_angle_4()) {
                    let mirrored = wrap_angle(arm_angle + PI);
                    if let Ok((joints, status)) = self.joints_from_arm_angle(mirrored, coeffs) {
                        debug!(arm_angle, mirrored, "elbow at zero, mirrored arm angle used");
                        return Ok((joints, status, mirrored));
                    }
                }

                Err(error)
            }
        }
    }
}

impl Kinematics for SrsKinematics {
    fn forward(&self, joints: &Joints) -> Result<FkSolution, Status> {
        if !is_valid(joints) {
            debug!("forward kinematics input contains non-finite joint values");
            return Err(Status::GeneralError);
        }

        let config = GlobalConfig::from_joints(joints);
        let (arm_angle, flange, sw_n, wf_n) = self.arm_angle_full(joints, config)?;
        let status = self.check_singularities(joints, &sw_n, &wf_n);

        Ok(FkSolution { pose: flange.to_pose(), arm_angle, config, status })
    }

    fn inverse(
        &self,
        pose: &Pose,
        seed: &SeedState,
        options: &IkOptions,
    ) -> Result<Solutions, Status> {
        resolution::solve(self, pose, seed, options)
    }

    fn inverse_arm_angle(
        &self,
        pose: &Pose,
        seed: &SeedState,
        arm_angle: f64,
        options: &IkOptions,
    ) -> Result<IkSolution, Status> {
        let mut options = options.clone();
        options.position_ik_mode = PositionIkMode::ExactPsi;
        options.target_arm_angle = arm_angle;

        let solutions = self.inverse(pose, seed, &options)?;
        solutions.into_iter().next().ok_or(Status::GeneralError)
    }

    fn feasible_intervals(
        &self,
        pose: &Pose,
        config: GlobalConfig,
    ) -> Result<Vec<crate::arm_angle::ArmAngleInterval>, Status> {
        let frame = Frame::from_pose(pose);
        if !frame.all_finite() {
            debug!("pose contains non-finite values");
            return Err(Status::GeneralError);
        }

        let core = self.build_core(&frame, config.elbow_sign())?;
        let coeffs = IkCoefficients::new(core, config);
        let intervals = FeasibleIntervals::compute(
            &coeffs,
            &self.parameters.lower_joint_limits,
            &self.parameters.upper_joint_limits,
        );

        Ok(intervals.feasible().to_vec())
    }
}
