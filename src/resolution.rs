//! Redundancy resolution: the solver policy options, candidate collection
//! across global configurations, weighted ranking against the seed state and
//! the time-optimal step scaler.

use std::f64::consts::PI;

use tracing::debug;

use crate::arm_angle::FeasibleIntervals;
use crate::coefficients::{CoeffsCore, IkCoefficients};
use crate::frames::Frame;
use crate::kinematic_traits::{
    GlobalConfig, IkSolution, Joints, Pose, SeedState, Solutions, Status, NUM_GLOBAL_CONFIGS,
    NUM_JOINTS,
};
use crate::kinematics_impl::SrsKinematics;
use crate::utils::{
    definitely_greater, near_equal, weighted_distance, wrap_angle, ZERO_ROUNDING_TOL,
};

/// If the absolute value of a hinge joint angle is below this value, the global
/// configurations determined by the respective joint count as close to the
/// seed and are searched as well.
pub const GLOBAL_CONFIG_DISTANCE_TOL: f64 = 5.0 / 180.0 * PI;

/// Default weights of the squared joint-space distance metric. Rotation of the
/// smaller wrist-side joints costs less than rotation of the shoulder-side
/// joints; the weights sum to 7.0.
pub const DEFAULT_DISTANCE_WEIGHTS: Joints = [1.2, 1.1, 1.1, 1.0, 0.9, 0.9, 0.8];

// A scaled step below this fraction of the requested one barely moves towards
// the target; such candidates are rejected.
const STEP_SCALING_FLOOR: f64 = 0.01;

const STEP_SCALING_ITERATIONS: usize = 30;

/// How the set of global-configuration candidates is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlobalConfigMode {
    /// Evaluate all eight configurations and return a solution for every
    /// feasible one.
    ReturnAll,
    /// Use only the configuration of the seed state.
    KeepCurrent,
    /// Prefer the seed's configuration; also try configurations whose defining
    /// hinge joint is close to zero in the seed, and fall back to the remaining
    /// ones when nothing else yields a solution.
    #[default]
    SelectBySeed,
    /// Use a single, caller-chosen configuration.
    UserSpecified(GlobalConfig),
}

/// How the arm angle of a solution is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositionIkMode {
    /// The target arm angle must be met exactly; a configuration where it is
    /// blocked fails with `NoSolutionForArmAngle`.
    ExactPsi,
    /// Use the target arm angle when feasible, otherwise snap to the midpoint
    /// of the circularly closest feasible interval and report the
    /// `ArmAngleNotInSameInterval` warning.
    ClosestFeasiblePsi,
    /// Move from the seed's arm angle towards the target, with the step
    /// clamped so that no joint exceeds its velocity or acceleration budget
    /// over `delta_t`.
    #[default]
    ResolvePsi,
}

/// Options of an inverse kinematics call.
#[derive(Clone, Debug)]
pub struct IkOptions {
    pub global_configuration_mode: GlobalConfigMode,
    pub position_ik_mode: PositionIkMode,
    /// Target arm angle in \[−π, π\]: the exact value for `ExactPsi`, the
    /// desired value for the other modes.
    pub target_arm_angle: f64,
    /// Fraction (0, 1] of the per-joint maximum velocity available to a step.
    pub joint_velocity_scaling_factor: f64,
    /// Fraction (0, 1] of the per-joint maximum acceleration available to a step.
    pub joint_acceleration_scaling_factor: f64,
    /// Timestep in seconds against which the `ResolvePsi` step is checked.
    pub delta_t: f64,
    /// Weights of the squared joint-space distance used to rank candidates
    /// against the seed.
    pub joint_distance_weights: Joints,
}

impl Default for IkOptions {
    fn default() -> Self {
        IkOptions {
            global_configuration_mode: GlobalConfigMode::default(),
            position_ik_mode: PositionIkMode::default(),
            target_arm_angle: 0.0,
            joint_velocity_scaling_factor: 1.0,
            joint_acceleration_scaling_factor: 1.0,
            delta_t: 0.1,
            joint_distance_weights: DEFAULT_DISTANCE_WEIGHTS,
        }
    }
}

impl IkOptions {
    pub(crate) fn validate(&self) -> Result<(), Status> {
        let scaling_valid = |s: f64| s.is_finite() && s > 0.0 && s <= 1.0;

        if !scaling_valid(self.joint_velocity_scaling_factor)
            || !scaling_valid(self.joint_acceleration_scaling_factor)
        {
            debug!("velocity/acceleration scaling factors must lie in (0, 1]");
            return Err(Status::GeneralError);
        }

        if !self.delta_t.is_finite() || self.delta_t <= 0.0 {
            debug!("delta_t must be a positive number of seconds");
            return Err(Status::GeneralError);
        }

        if !self.target_arm_angle.is_finite()
            || self.target_arm_angle.abs() > PI + ZERO_ROUNDING_TOL
        {
            debug!("target arm angle must lie in [-PI, PI]");
            return Err(Status::GeneralError);
        }

        if self.joint_distance_weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            debug!("joint distance weights must be positive");
            return Err(Status::GeneralError);
        }

        Ok(())
    }
}

struct Candidate {
    solution: IkSolution,
    distance: f64,
}

/// The full inverse pipeline: enumerate configurations, compute feasibility,
/// resolve the arm angle per the options and rank the candidates.
pub(crate) fn solve(
    robot: &SrsKinematics,
    pose: &Pose,
    seed: &SeedState,
    options: &IkOptions,
) -> Result<Solutions, Status> {
    options.validate()?;

    if !seed.all_finite() {
        debug!("seed state contains non-finite joint values");
        return Err(Status::GeneralError);
    }

    let frame = Frame::from_pose(pose);
    if !frame.all_finite() {
        debug!("pose contains non-finite values");
        return Err(Status::GeneralError);
    }

    let seed_config = GlobalConfig::from_joints(seed.current());
    let mut configs = candidate_configs(seed_config, seed.current(), options);

    // the seed arm angle is always measured against the seed's own
    // configuration; candidates on the flipped elbow branch remap it by PI
    let seed_arm_angle = robot.arm_angle_of(seed.current(), seed_config);

    // the coefficient core depends on the elbow branch only, two cores serve
    // all eight configurations
    let mut cores: [Option<Result<CoeffsCore, Status>>; 2] = [None, None];
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut last_error = Status::GeneralError;

    let mut i = 0;
    while i < configs.len() {
        let config = configs[i];
        let elbow_index = config.elbow_index();

        let core_entry = cores[elbow_index]
            .get_or_insert_with(|| robot.build_core(&frame, config.elbow_sign()));

        match core_entry {
            Ok(core) => {
                let coeffs = IkCoefficients::new(core.clone(), config);
                let intervals = FeasibleIntervals::compute(
                    &coeffs,
                    &robot.parameters().lower_joint_limits,
                    &robot.parameters().upper_joint_limits,
                );

                match evaluate_candidate(
                    robot,
                    &coeffs,
                    &intervals,
                    config,
                    seed,
                    seed_config,
                    &seed_arm_angle,
                    options,
                ) {
                    Ok(solution) => {
                        let distance = weighted_distance(
                            &solution.joints,
                            seed.current(),
                            &options.joint_distance_weights,
                        );
                        candidates.push(Candidate { solution, distance });
                    }
                    Err(status) => {
                        debug!(config = config.value(), status = status.message(), "configuration rejected");
                        last_error = status;
                    }
                }
            }
            Err(status) => {
                debug!(config = config.value(), status = status.message(), "coefficients not buildable");
                last_error = *status;
            }
        }

        // when the seed-adjacent search found nothing, widen to the remaining
        // configurations before giving up
        if options.global_configuration_mode == GlobalConfigMode::SelectBySeed
            && i == configs.len() - 1
            && candidates.is_empty()
            && configs.len() < NUM_GLOBAL_CONFIGS as usize
        {
            add_remaining_configs(&mut configs);
        }

        i += 1;
    }

    if candidates.is_empty() {
        return Err(last_error);
    }

    let prefer_seed_config = matches!(
        options.global_configuration_mode,
        GlobalConfigMode::KeepCurrent | GlobalConfigMode::SelectBySeed
    );
    candidates.sort_by(|a, b| {
        if prefer_seed_config {
            let a_keeps = a.solution.config == seed_config;
            let b_keeps = b.solution.config == seed_config;
            if a_keeps != b_keeps {
                return b_keeps.cmp(&a_keeps);
            }
        }

        a.distance
            .total_cmp(&b.distance)
            .then(a.solution.config.value().cmp(&b.solution.config.value()))
            .then(a.solution.arm_angle.total_cmp(&b.solution.arm_angle))
    });

    Ok(candidates.into_iter().map(|c| c.solution).collect())
}

fn candidate_configs(
    seed_config: GlobalConfig,
    seed: &Joints,
    options: &IkOptions,
) -> Vec<GlobalConfig> {
    match options.global_configuration_mode {
        GlobalConfigMode::ReturnAll => GlobalConfig::all().collect(),
        GlobalConfigMode::KeepCurrent => vec![seed_config],
        GlobalConfigMode::UserSpecified(config) => vec![config],
        GlobalConfigMode::SelectBySeed => {
            // keep the current configuration (preferred), then flip each branch
            // whose defining hinge joint is close to zero
            let mut configs = vec![seed_config];

            if seed[1].abs() < GLOBAL_CONFIG_DISTANCE_TOL {
                configs.push(configs[0].toggled(0));
            }

            if seed[3].abs() < GLOBAL_CONFIG_DISTANCE_TOL {
                let current = configs.len();
                for i in 0..current {
                    configs.push(configs[i].toggled(1));
                }
            }

            if seed[5].abs() < GLOBAL_CONFIG_DISTANCE_TOL {
                let current = configs.len();
                for i in 0..current {
                    configs.push(configs[i].toggled(2));
                }
            }

            configs
        }
    }
}

fn add_remaining_configs(configs: &mut Vec<GlobalConfig>) {
    for config in GlobalConfig::all() {
        if !configs.contains(&config) {
            configs.push(config);
        }
    }
}

/// The two elbow branches measure the arm angle against mirrored reference
/// planes, so a seed arm angle carries over to a flipped-elbow candidate
/// shifted by PI.
fn map_arm_angle_for_elbow(
    seed_config: GlobalConfig,
    selected_config: GlobalConfig,
    seed_arm_angle: f64,
) -> f64 {
    if !near_equal(seed_config.elbow_sign(), selected_config.elbow_sign()) {
        return wrap_angle(seed_arm_angle + PI);
    }

    seed_arm_angle
}

#[allow(clippy::too_many_arguments)]
fn evaluate_candidate(
    robot: &SrsKinematics,
    coeffs: &IkCoefficients,
    intervals: &FeasibleIntervals,
    config: GlobalConfig,
    seed: &SeedState,
    seed_config: GlobalConfig,
    seed_arm_angle: &Result<f64, Status>,
    options: &IkOptions,
) -> Result<IkSolution, Status> {
    // the seed arm angle expressed on this candidate's elbow branch; not
    // available when the seed state itself is invalid
    let mapped_seed_psi = seed_arm_angle
        .as_ref()
        .map(|psi| map_arm_angle_for_elbow(seed_config, config, *psi));

    let same_interval_with = |solution_psi: f64| match &mapped_seed_psi {
        Ok(seed_psi) => intervals.same_feasible_interval(*seed_psi, wrap_angle(solution_psi)),
        Err(_) => false,
    };

    match options.position_ik_mode {
        PositionIkMode::ExactPsi => {
            let query = intervals.interval_for_arm_angle(options.target_arm_angle);
            match query.status {
                Status::Success => {
                    let (joints, status, used_psi) =
                        robot.joints_from_fixed_arm_angle(options.target_arm_angle, coeffs)?;

                    Ok(IkSolution {
                        joints,
                        arm_angle: wrap_angle(used_psi),
                        config,
                        same_interval: same_interval_with(used_psi),
                        status,
                    })
                }
                Status::NoSolutionForArmAngle => singular_fallback(robot, coeffs, config),
                _ => Err(Status::NoSolutionForArmAngle),
            }
        }

        PositionIkMode::ClosestFeasiblePsi => {
            let query = intervals.interval_for_arm_angle(options.target_arm_angle);
            match query.status {
                Status::Success => {
                    let (joints, status, used_psi) =
                        robot.joints_from_fixed_arm_angle(options.target_arm_angle, coeffs)?;

                    Ok(IkSolution {
                        joints,
                        arm_angle: wrap_angle(used_psi),
                        config,
                        same_interval: same_interval_with(used_psi),
                        status,
                    })
                }
                Status::ArmAngleNotInSameInterval => {
                    let (joints, _, used_psi) =
                        robot.joints_from_fixed_arm_angle(query.fallback_arm_angle, coeffs)?;

                    Ok(IkSolution {
                        joints,
                        arm_angle: wrap_angle(used_psi),
                        config,
                        same_interval: false,
                        status: Status::ArmAngleNotInSameInterval,
                    })
                }
                _ => singular_fallback(robot, coeffs, config),
            }
        }

        PositionIkMode::ResolvePsi => {
            let seed_psi = match mapped_seed_psi {
                Ok(psi) => psi,
                Err(status) => return Err(*status),
            };

            let query = intervals.interval_for_arm_angle(seed_psi);
            match query.status {
                Status::Success => {
                    let interval = match query.interval {
                        Some(interval) => interval,
                        None => return Err(Status::GeneralError),
                    };
                    // query.arm_angle may live beyond PI when the interval
                    // wraps; express the goal on the same contiguous range
                    let psi_start = query.arm_angle;
                    let goal = nearest_representation(options.target_arm_angle, psi_start);
                    let psi_goal = if near_equal(interval.lower(), -PI)
                        && near_equal(interval.upper(), PI)
                    {
                        // the whole circle is feasible, the goal may cross the seam
                        goal
                    } else {
                        goal.clamp(interval.lower(), interval.upper())
                    };

                    let psi_new = scale_step(robot, coeffs, seed, psi_start, psi_goal, options)?;
                    let (joints, status) = robot.joints_from_arm_angle(psi_new, coeffs)?;

                    Ok(IkSolution {
                        joints,
                        arm_angle: wrap_angle(psi_new),
                        config,
                        same_interval: true,
                        status,
                    })
                }
                Status::ArmAngleNotInSameInterval => {
                    // the seed arm angle is blocked at this configuration;
                    // restart from the closest feasible interval midpoint
                    let (joints, _, used_psi) =
                        robot.joints_from_fixed_arm_angle(query.fallback_arm_angle, coeffs)?;

                    Ok(IkSolution {
                        joints,
                        arm_angle: wrap_angle(used_psi),
                        config,
                        same_interval: false,
                        status: Status::ArmAngleNotInSameInterval,
                    })
                }
                _ => singular_fallback(robot, coeffs, config),
            }
        }
    }
}

/// No feasible interval exists. The pose may be singular with the arm angle
/// undefined there; joint angles evaluated at zero can then still be valid and
/// are offered with the singularity status.
fn singular_fallback(
    robot: &SrsKinematics,
    coeffs: &IkCoefficients,
    config: GlobalConfig,
) -> Result<IkSolution, Status> {
    match robot.joints_from_fixed_arm_angle(0.0, coeffs) {
        Ok((joints, status, used_psi))
            if matches!(
                status,
                Status::TargetTooCloseToSingularity | Status::CloseToSingularity
            ) =>
        {
            Ok(IkSolution {
                joints,
                arm_angle: wrap_angle(used_psi),
                config,
                same_interval: false,
                status: Status::TargetTooCloseToSingularity,
            })
        }
        _ => Err(Status::NoSolutionForArmAngle),
    }
}

/// Chooses the representation of an angle closest to `start` on the circle;
/// `start` may live beyond ±π on a seam-rewritten interval.
fn nearest_representation(angle: f64, start: f64) -> f64 {
    let mut best = angle;
    for candidate in [angle + 2.0 * PI, angle - 2.0 * PI] {
        if (candidate - start).abs() < (best - start).abs() {
            best = candidate;
        }
    }

    best
}

/// Clamps the arm-angle step from `psi_start` to `psi_goal` so that no joint
/// moves further than its velocity and acceleration budget allows within one
/// timestep. The budget per joint is
/// `min(v_max·s_v·Δt, 0.5·a_max·s_a·Δt²)`; if the full step exceeds it, the
/// smallest scaling α of Δψ is found whose closed-form joint step satisfies
/// every budget, and the joints are re-evaluated at the scaled arm angle
/// rather than interpolated.
fn scale_step(
    robot: &SrsKinematics,
    coeffs: &IkCoefficients,
    seed: &SeedState,
    psi_start: f64,
    psi_goal: f64,
    options: &IkOptions,
) -> Result<f64, Status> {
    let parameters = robot.parameters();

    let mut max_delta = [0.0; NUM_JOINTS];
    for i in 0..NUM_JOINTS {
        let by_velocity = parameters.max_joint_velocities[i]
            * options.joint_velocity_scaling_factor
            * options.delta_t;
        let by_acceleration = 0.5
            * parameters.max_joint_accelerations[i]
            * options.joint_acceleration_scaling_factor
            * options.delta_t
            * options.delta_t;
        max_delta[i] = by_velocity.min(by_acceleration);
    }

    // the elbow angle is fixed by the pose and cannot be scaled through ψ
    let elbow_step = (coeffs.joint_angle_4() - seed.current()[3]).abs();
    if definitely_greater(elbow_step, max_delta[3]) {
        debug!(
            elbow_step,
            budget = max_delta[3],
            "pose demands a larger elbow step than the dynamic limits allow"
        );
        return Err(Status::GeneralError);
    }

    // largest per-joint step at ψ, as a fraction of its budget
    let step_ratio = |psi: f64| -> f64 {
        let joints = coeffs.joints_at(psi);
        let mut worst: f64 = 0.0;
        for i in 0..NUM_JOINTS {
            worst = worst.max((joints[i] - seed.current()[i]).abs() / max_delta[i]);
        }
        worst
    };

    if step_ratio(psi_goal) <= 1.0 {
        // the full step already satisfies the budgets, nothing to alter
        return Ok(psi_goal);
    }

    // q(ψ) is not linear in ψ, so α is refined inside a bracket until the
    // largest joint step matches its budget from below
    let mut alpha_ok: f64 = 0.0; // largest scaling known to satisfy the budgets
    let mut alpha_bad: f64 = 1.0; // smallest scaling known to violate them
    let mut alpha: f64 = 1.0;
    for _ in 0..STEP_SCALING_ITERATIONS {
        let ratio = step_ratio(psi_start + alpha * (psi_goal - psi_start));
        if !ratio.is_finite() {
            break;
        }
        if (ratio - 1.0).abs() <= 1e-6 {
            alpha_ok = alpha;
            break;
        }

        if ratio > 1.0 {
            alpha_bad = alpha;
        } else {
            alpha_ok = alpha;
        }

        // Newton-style proposal, kept inside the bracket
        let mut proposal = if ratio > 0.0 { alpha / ratio } else { alpha_bad };
        if proposal <= alpha_ok || proposal >= alpha_bad {
            proposal = 0.5 * (alpha_ok + alpha_bad);
        }
        alpha = proposal;
    }

    if alpha_ok < STEP_SCALING_FLOOR {
        debug!(alpha_ok, "step scaling fell below the floor, rejecting the candidate");
        return Err(Status::GeneralError);
    }

    Ok(psi_start + alpha_ok * (psi_goal - psi_start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        assert!(IkOptions::default().validate().is_ok());

        let mut options = IkOptions::default();
        options.joint_velocity_scaling_factor = 0.0;
        assert_eq!(options.validate(), Err(Status::GeneralError));

        let mut options = IkOptions::default();
        options.joint_acceleration_scaling_factor = 1.5;
        assert_eq!(options.validate(), Err(Status::GeneralError));

        let mut options = IkOptions::default();
        options.delta_t = -0.1;
        assert_eq!(options.validate(), Err(Status::GeneralError));

        let mut options = IkOptions::default();
        options.target_arm_angle = 4.0;
        assert_eq!(options.validate(), Err(Status::GeneralError));

        let mut options = IkOptions::default();
        options.joint_distance_weights[2] = 0.0;
        assert_eq!(options.validate(), Err(Status::GeneralError));
    }

    #[test]
    fn test_candidate_configs_keep_current() {
        let seed = [0.0, 0.5, 0.0, -1.2, 0.0, 0.8, 0.0];
        let seed_config = GlobalConfig::from_joints(&seed);

        let mut options = IkOptions::default();
        options.global_configuration_mode = GlobalConfigMode::KeepCurrent;
        let configs = candidate_configs(seed_config, &seed, &options);
        assert_eq!(configs, vec![seed_config]);
    }

    #[test]
    fn test_candidate_configs_return_all() {
        let seed = [0.0; 7];
        let mut options = IkOptions::default();
        options.global_configuration_mode = GlobalConfigMode::ReturnAll;
        let configs = candidate_configs(GlobalConfig::from_joints(&seed), &seed, &options);
        assert_eq!(configs.len(), 8);
    }

    #[test]
    fn test_candidate_configs_near_zero_hinges() {
        // shoulder clearly positive, elbow and wrist close to zero: four
        // configurations are reachable without a large hinge motion
        let seed = [0.0, 0.5, 0.0, -0.01, 0.0, 0.02, 0.0];
        let configs =
            candidate_configs(GlobalConfig::from_joints(&seed), &seed, &IkOptions::default());

        assert_eq!(configs.len(), 4);
        assert_eq!(configs[0], GlobalConfig::from_joints(&seed));
        // all four share the positive shoulder branch
        assert!(configs.iter().all(|c| c.shoulder_sign() > 0.0));
    }

    #[test]
    fn test_add_remaining_configs() {
        let mut configs = vec![GlobalConfig::new(3).expect("valid")];
        add_remaining_configs(&mut configs);
        assert_eq!(configs.len(), 8);
        assert_eq!(configs[0].value(), 3);
    }

    #[test]
    fn test_map_arm_angle_for_elbow() {
        let positive = GlobalConfig::new(0).expect("valid");
        let negative = GlobalConfig::new(2).expect("valid");

        assert_eq!(map_arm_angle_for_elbow(positive, positive, 0.4), 0.4);
        let mapped = map_arm_angle_for_elbow(positive, negative, 0.4);
        assert!((mapped - (0.4 - PI)).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_representation_crosses_the_seam() {
        // start beyond PI on a rewritten interval, goal given in [-PI, PI]
        let wrapped = nearest_representation(-3.0, 3.2);
        assert!((wrapped - (2.0 * PI - 3.0)).abs() < 1e-12);

        assert_eq!(nearest_representation(0.9, 0.0), 0.9);
        let below = nearest_representation(3.0, -3.1);
        assert!((below - (3.0 - 2.0 * PI)).abs() < 1e-12);
    }
}
