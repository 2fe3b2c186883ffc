//! Supports extracting S-R-S parameters from a YAML file (optional).

use std::path::Path;

use serde::Deserialize;

use crate::kinematic_traits::{Joints, NUM_JOINTS};
use crate::parameter_error::ParameterError;
use crate::parameters::srs_kinematics::Parameters;

#[derive(Deserialize)]
struct JointLimits {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

#[derive(Deserialize)]
struct Root {
    srs_kinematics_limb_lengths: Vec<f64>,
    srs_kinematics_joint_limits: JointLimits,
    srs_kinematics_max_velocities: Vec<f64>,
    srs_kinematics_max_accelerations: Vec<f64>,
}

impl Parameters {
    /// Read the robot configuration from a YAML file. A file like this is
    /// supported:
    /// ```yaml
    /// # KUKA LBR iiwa 7 R800
    /// srs_kinematics_limb_lengths: [0.34, 0.4, 0.4, 0.126]
    /// srs_kinematics_joint_limits:
    ///   lower: [-2.93215, -2.05949, -2.93215, -2.05949, -2.93215, -2.05949, -3.01942]
    ///   upper: [2.93215, 2.05949, 2.93215, 2.05949, 2.93215, 2.05949, 3.01942]
    /// srs_kinematics_max_velocities: [1.7104, 1.7104, 1.7453, 2.2689, 2.4434, 3.1415, 3.1415]
    /// srs_kinematics_max_accelerations: [5.4444, 5.4444, 5.5555, 7.2222, 7.7777, 10.0, 10.0]
    /// ```
    /// All five lists are required; the result is validated like any other
    /// parameter set.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [`Parameters::from_yaml_file`] but for an already loaded string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        let root: Root = serde_yaml::from_str(contents)
            .map_err(|e| ParameterError::ParseError(format!("{}", e)))?;

        let parameters = Parameters {
            limb_lengths: vec_to_array::<4>(root.srs_kinematics_limb_lengths)?,
            lower_joint_limits: vec_to_joints(root.srs_kinematics_joint_limits.lower)?,
            upper_joint_limits: vec_to_joints(root.srs_kinematics_joint_limits.upper)?,
            max_joint_velocities: vec_to_joints(root.srs_kinematics_max_velocities)?,
            max_joint_accelerations: vec_to_joints(root.srs_kinematics_max_accelerations)?,
        };

        parameters.validate()?;

        Ok(parameters)
    }
}

fn vec_to_array<const N: usize>(v: Vec<f64>) -> Result<[f64; N], ParameterError> {
    if v.len() != N {
        return Err(ParameterError::InvalidLength { expected: N, found: v.len() });
    }

    let mut out = [0.0; N];
    out.copy_from_slice(&v);
    Ok(out)
}

fn vec_to_joints(v: Vec<f64>) -> Result<Joints, ParameterError> {
    vec_to_array::<NUM_JOINTS>(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IIWA_YAML: &str = "\
# KUKA LBR iiwa 7 R800
srs_kinematics_limb_lengths: [0.34, 0.4, 0.4, 0.126]
srs_kinematics_joint_limits:
  lower: [-2.93215, -2.05949, -2.93215, -2.05949, -2.93215, -2.05949, -3.01942]
  upper: [2.93215, 2.05949, 2.93215, 2.05949, 2.93215, 2.05949, 3.01942]
srs_kinematics_max_velocities: [1.7104, 1.7104, 1.7453, 2.2689, 2.4434, 3.1415, 3.1415]
srs_kinematics_max_accelerations: [5.4444, 5.4444, 5.5555, 7.2222, 7.7777, 10.0, 10.0]
";

    #[test]
    fn test_parse_iiwa_description() {
        let parameters = Parameters::from_yaml_str(IIWA_YAML).expect("valid description");
        let reference = Parameters::lbr_iiwa_7_r800();

        assert_eq!(parameters.limb_lengths, reference.limb_lengths);
        assert_eq!(parameters.lower_joint_limits, reference.lower_joint_limits);
        assert_eq!(parameters.upper_joint_limits, reference.upper_joint_limits);
        assert_eq!(parameters.max_joint_velocities, reference.max_joint_velocities);
        assert_eq!(parameters.max_joint_accelerations, reference.max_joint_accelerations);
    }

    #[test]
    fn test_rejects_wrong_joint_count() {
        let truncated = IIWA_YAML.replace(
            "srs_kinematics_max_velocities: [1.7104, 1.7104, 1.7453, 2.2689, 2.4434, 3.1415, 3.1415]",
            "srs_kinematics_max_velocities: [1.7104, 1.7104]",
        );
        assert!(Parameters::from_yaml_str(&truncated).is_err());
    }

    #[test]
    fn test_rejects_missing_field() {
        let incomplete = "srs_kinematics_limb_lengths: [0.34, 0.4, 0.4, 0.126]\n";
        assert!(Parameters::from_yaml_str(incomplete).is_err());
    }
}
