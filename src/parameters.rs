//! Defines the S-R-S geometry and limit data structure.

pub mod srs_kinematics {
    use crate::kinematic_traits::{Joints, NUM_JOINTS};
    use crate::parameter_error::ParameterError;
    use crate::utils::deg;

    /// Geometry and limits of the arm. The four limb lengths are, base to
    /// flange: base to shoulder centre, shoulder to elbow, elbow to wrist
    /// centre, wrist centre to flange (metres). All joints rotate positive
    /// about their DH axis with the arm at zero sticking straight up; no offset
    /// or sign-correction table is needed for this family.
    ///
    /// See parameters_robots.rs for concrete robot models.
    #[derive(Debug, Clone)]
    pub struct Parameters {
        pub limb_lengths: [f64; 4],
        pub lower_joint_limits: Joints,
        pub upper_joint_limits: Joints,
        pub max_joint_velocities: Joints,
        pub max_joint_accelerations: Joints,
    }

    impl Parameters {
        /// Checks the parameter set for internal consistency: finite values,
        /// positive limb lengths, ordered position limits and strictly positive
        /// velocity/acceleration limits.
        pub fn validate(&self) -> Result<(), ParameterError> {
            for (i, &length) in self.limb_lengths.iter().enumerate() {
                if !length.is_finite() || length <= 0.0 {
                    return Err(ParameterError::KinematicsConfigurationError(format!(
                        "limb length {} must be finite and positive (got {})",
                        i, length
                    )));
                }
            }

            for i in 0..NUM_JOINTS {
                let (lower, upper) = (self.lower_joint_limits[i], self.upper_joint_limits[i]);
                if !lower.is_finite() || !upper.is_finite() || lower >= upper {
                    return Err(ParameterError::KinematicsConfigurationError(format!(
                        "joint {} position limits must be finite and ordered (got [{}, {}])",
                        i, lower, upper
                    )));
                }

                for (label, value) in [
                    ("velocity", self.max_joint_velocities[i]),
                    ("acceleration", self.max_joint_accelerations[i]),
                ] {
                    if !value.is_finite() || value <= 0.0 {
                        return Err(ParameterError::KinematicsConfigurationError(format!(
                            "joint {} {} limit must be finite and positive (got {})",
                            i, label, value
                        )));
                    }
                }
            }

            Ok(())
        }

        /// The largest shoulder-to-wrist distance the arm can span.
        pub fn maximum_reach(&self) -> f64 {
            self.limb_lengths[1] + self.limb_lengths[2]
        }

        /// Convert to string yaml representation (quick viewing, etc).
        pub fn to_yaml(&self) -> String {
            let list = |values: &[f64]| {
                values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
            };
            let angles = |values: &Joints| {
                values.iter().map(deg).collect::<Vec<_>>().join(", ")
            };
            format!(
                "srs_kinematics_limb_lengths: [{}]\n\
                 srs_kinematics_joint_limits:\n  \
                 lower: [{}]\n  \
                 upper: [{}]\n\
                 srs_kinematics_max_velocities: [{}]\n\
                 srs_kinematics_max_accelerations: [{}]\n",
                list(&self.limb_lengths),
                angles(&self.lower_joint_limits),
                angles(&self.upper_joint_limits),
                list(&self.max_joint_velocities),
                list(&self.max_joint_accelerations),
            )
        }
    }
}
