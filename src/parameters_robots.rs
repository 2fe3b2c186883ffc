//! Parameter presets for commercially available S-R-S arms.

use crate::parameters::srs_kinematics::Parameters;

impl Parameters {
    /// KUKA LBR iiwa 7 R800 (7 kg payload, 800 mm reach).
    pub fn lbr_iiwa_7_r800() -> Self {
        Parameters {
            limb_lengths: [0.34, 0.4, 0.4, 0.126],
            lower_joint_limits: [
                -2.93215, -2.05949, -2.93215, -2.05949, -2.93215, -2.05949, -3.01942,
            ],
            upper_joint_limits: [
                2.93215, 2.05949, 2.93215, 2.05949, 2.93215, 2.05949, 3.01942,
            ],
            max_joint_velocities: [1.7104, 1.7104, 1.7453, 2.2689, 2.4434, 3.1415, 3.1415],
            max_joint_accelerations: [5.4444, 5.4444, 5.5555, 7.2222, 7.7777, 10.0, 10.0],
        }
    }

    /// KUKA LBR iiwa 14 R820 (14 kg payload, 820 mm reach).
    pub fn lbr_iiwa_14_r820() -> Self {
        Parameters {
            limb_lengths: [0.36, 0.42, 0.4, 0.126],
            lower_joint_limits: [
                -2.93215, -2.05949, -2.93215, -2.05949, -2.93215, -2.05949, -3.01942,
            ],
            upper_joint_limits: [
                2.93215, 2.05949, 2.93215, 2.05949, 2.93215, 2.05949, 3.01942,
            ],
            max_joint_velocities: [1.4835, 1.4835, 1.7453, 1.3089, 2.2689, 2.3562, 2.3562],
            max_joint_accelerations: [4.8111, 4.8111, 5.5555, 4.1666, 7.2222, 7.5000, 7.5000],
        }
    }
}
