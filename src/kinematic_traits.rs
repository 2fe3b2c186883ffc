//! Defines the shared value types and the trait for direct and inverse kinematics.

extern crate nalgebra as na;

use na::Isometry3;

use crate::arm_angle::ArmAngleInterval;
use crate::resolution::IkOptions;
use crate::utils::ZERO_ROUNDING_TOL;

/// Number of joints of the supported arm.
pub const NUM_JOINTS: usize = 7;

/// Number of distinct global configurations (three binary branch flags).
pub const NUM_GLOBAL_CONFIGS: u8 = 8;

/// Pose of the robot flange. It contains both the Cartesian position (metres) and
/// the rotation quaternion. nalgebra stores the unit quaternion scalar-first
/// (w, i, j, k).
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Seven rotary joints of the robot with angles in radians, base to flange.
pub type Joints = [f64; NUM_JOINTS];

/// Joint vector with all angles at zero (arm stretched straight up).
#[allow(dead_code)]
pub const JOINTS_AT_ZERO: Joints = [0.0; NUM_JOINTS];

/// Outcome of a kinematics call. Warnings still come with usable joint values;
/// errors do not. Callers are expected to pattern-match and may retry with an
/// alternative entry of the returned solution list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The arm is within `SINGULARITY_CHECK_DISTANCE_TOL` of a singular
    /// configuration. The solution is valid but small Cartesian motions may
    /// demand large joint motions.
    CloseToSingularity,
    /// The target pose is singular (stretched elbow, overhead alignment or a
    /// pivot singularity). A fallback arm angle of zero is used so that joint
    /// values can still be offered.
    TargetTooCloseToSingularity,
    /// The requested arm angle lies in a blocked interval; the returned solution
    /// uses the midpoint of the circularly closest feasible interval instead.
    ArmAngleNotInSameInterval,
    /// A joint would have to leave its position limits, or the pose is outside
    /// the reachable workspace of the arm.
    JointLimitViolated,
    /// No arm angle at all is feasible for this pose and configuration.
    NoSolutionForArmAngle,
    /// Invalid input or an inconsistent option combination; the call was a no-op.
    GeneralError,
}

/// Coarse severity of a [`Status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Informational,
    Error,
}

impl Status {
    pub fn severity(&self) -> Severity {
        match self {
            Status::Success
            | Status::CloseToSingularity
            | Status::TargetTooCloseToSingularity
            | Status::ArmAngleNotInSameInterval => Severity::Informational,
            Status::JointLimitViolated | Status::NoSolutionForArmAngle | Status::GeneralError => {
                Severity::Error
            }
        }
    }

    /// True for success and warnings (yellow means green, like with traffic lights).
    pub fn success(&self) -> bool {
        self.severity() == Severity::Informational
    }

    pub fn error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn message(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::CloseToSingularity => "close to a singular configuration",
            Status::TargetTooCloseToSingularity => {
                "target pose is too close to a singularity, fallback arm angle used"
            }
            Status::ArmAngleNotInSameInterval => {
                "requested arm angle is not in a feasible interval, fallback arm angle used"
            }
            Status::JointLimitViolated => "a joint position limit is violated",
            Status::NoSolutionForArmAngle => "no feasible arm angle exists for this pose",
            Status::GeneralError => "invalid input",
        }
    }
}

/// One of the eight kinematic branches of the arm, determined by the signs of the
/// shoulder (joint 2), elbow (joint 4) and wrist (joint 6) hinge angles. Packed
/// into an integer 0..=7: bit 0 set means a negative shoulder angle, bit 1 a
/// negative elbow angle, bit 2 a negative wrist angle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalConfig(u8);

impl GlobalConfig {
    /// Wraps a packed configuration value; `None` if out of the 0..=7 range.
    pub fn new(config: u8) -> Option<Self> {
        if config < NUM_GLOBAL_CONFIGS {
            Some(GlobalConfig(config))
        } else {
            None
        }
    }

    /// Reads the configuration off a joint vector. Angles within the rounding
    /// tolerance of zero count as positive.
    pub fn from_joints(joints: &Joints) -> Self {
        let bit = |angle: f64| u8::from(angle < -ZERO_ROUNDING_TOL);
        GlobalConfig(bit(joints[1]) | bit(joints[3]) << 1 | bit(joints[5]) << 2)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn shoulder_sign(&self) -> f64 {
        self.sign_at(0)
    }

    pub fn elbow_sign(&self) -> f64 {
        self.sign_at(1)
    }

    pub fn wrist_sign(&self) -> f64 {
        self.sign_at(2)
    }

    /// Positive elbow maps to 0, negative to 1. Useful for caching data that
    /// depends on the elbow branch only.
    pub fn elbow_index(&self) -> usize {
        usize::from(self.elbow_sign() < 0.0)
    }

    /// All eight configurations in ascending packed order.
    pub fn all() -> impl Iterator<Item = GlobalConfig> {
        (0..NUM_GLOBAL_CONFIGS).map(GlobalConfig)
    }

    pub(crate) fn toggled(&self, bit: u8) -> Self {
        GlobalConfig(self.0 ^ (1 << bit))
    }

    fn sign_at(&self, bit: u8) -> f64 {
        if self.0 & (1 << bit) == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

/// Joint states used to seed the inverse kinematics: the current measured joints
/// and, optionally, the previously commanded joints. The previous entry lets
/// callers that stream a trajectory supply enough history for acceleration-aware
/// checks; a single entry is sufficient for everything else.
#[derive(Clone, Debug)]
pub struct SeedState {
    current: Joints,
    previous: Option<Joints>,
}

impl SeedState {
    pub fn new(current: Joints) -> Self {
        SeedState { current, previous: None }
    }

    pub fn with_previous(current: Joints, previous: Joints) -> Self {
        SeedState { current, previous: Some(previous) }
    }

    pub fn current(&self) -> &Joints {
        &self.current
    }

    pub fn previous(&self) -> Option<&Joints> {
        self.previous.as_ref()
    }

    pub fn all_finite(&self) -> bool {
        crate::utils::is_valid(&self.current)
            && self.previous.map_or(true, |p| crate::utils::is_valid(&p))
    }
}

/// Result of a forward kinematics call: the flange pose plus the redundancy
/// coordinates that reproduce it exactly through [`Kinematics::inverse_arm_angle`].
#[derive(Clone, Debug)]
pub struct FkSolution {
    pub pose: Pose,
    pub arm_angle: f64,
    pub config: GlobalConfig,
    pub status: Status,
}

/// A single inverse kinematics candidate.
#[derive(Clone, Debug)]
pub struct IkSolution {
    pub joints: Joints,
    pub arm_angle: f64,
    pub config: GlobalConfig,
    /// True when the resolved arm angle lies in the same feasible interval as
    /// the arm angle of the seed state, i.e. the motion does not have to cross a
    /// blocked region of the self-motion circle.
    pub same_interval: bool,
    pub status: Status,
}

/// For providing solutions, ordered best (closest to the seed) first. Invalid
/// candidates are discarded, so this may be shorter than the number of global
/// configurations (and the inverse call errors instead of returning an empty
/// vector).
pub type Solutions = Vec<IkSolution>;

/// Defines agreed functionality of direct and inverse kinematics for a 7-DOF
/// S-R-S arm. All angles are radians in \[−π, π\].
pub trait Kinematics {
    /// Find forward kinematics: flange pose, arm angle and global configuration
    /// from joint positions. Fails if the joints are outside their limits or not
    /// finite; singular configurations are reported through the status of the
    /// returned solution.
    fn forward(&self, joints: &Joints) -> Result<FkSolution, Status>;

    /// Find inverse kinematics (joint positions) for this pose. Global
    /// configuration candidates and the arm-angle policy are taken from the
    /// options; the returned solutions are sorted by weighted distance to the
    /// seed, closest first.
    fn inverse(&self, pose: &Pose, seed: &SeedState, options: &IkOptions)
        -> Result<Solutions, Status>;

    /// Inverse kinematics for an exact, caller-chosen arm angle. Returns the
    /// best solution only; the arm angle must lie in a feasible interval of the
    /// selected configuration.
    fn inverse_arm_angle(
        &self,
        pose: &Pose,
        seed: &SeedState,
        arm_angle: f64,
        options: &IkOptions,
    ) -> Result<IkSolution, Status>;

    /// The feasible arm-angle intervals of the pose under one global
    /// configuration: the exact subset of \[−π, π\] where every joint stays
    /// within its position limits.
    fn feasible_intervals(
        &self,
        pose: &Pose,
        config: GlobalConfig,
    ) -> Result<Vec<ArmAngleInterval>, Status>;
}
