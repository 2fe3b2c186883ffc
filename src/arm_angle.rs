//! Feasible and blocked arm-angle intervals on the self-motion circle.
//!
//! For a fixed pose and global configuration, every joint is a closed-form
//! function of the arm angle ψ. Mapping the box limits of each joint through
//! the inverse of that closed form yields the exact sub-arcs of \[−π, π\] where
//! the joint would leave its limits. The union of those blocked arcs over all
//! joints, complemented, is the set of feasible arm angles: the solver can then
//! answer containment and "closest feasible ψ" queries without sampling.

use std::f64::consts::PI;

use tracing::debug;

use crate::coefficients::{IkCoefficients, JointType, NUM_HINGE_JOINTS, NUM_PIVOT_JOINTS};
use crate::kinematic_traits::{Joints, Status};
use crate::utils::{definitely_greater, definitely_smaller, near_equal, near_zero, ZERO_ROUNDING_TOL};

/// A closed sub-arc \[lower, upper\] of the arm-angle circle. `overlapping`
/// marks intervals with an endpoint on the ±π seam: such an interval logically
/// continues on the other side of the seam.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArmAngleInterval {
    lower: f64,
    upper: f64,
    overlapping: bool,
}

impl ArmAngleInterval {
    pub(crate) fn new(lower: f64, upper: f64) -> Self {
        let mut interval = ArmAngleInterval { lower, upper, overlapping: false };
        interval.set_lower(lower);
        interval.set_upper(upper);
        interval
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// True when the interval touches the ±π seam and therefore continues in
    /// the interval on the other side.
    pub fn overlapping(&self) -> bool {
        self.overlapping
    }

    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    pub fn contains(&self, arm_angle: f64) -> bool {
        arm_angle >= self.lower && arm_angle <= self.upper
    }

    pub(crate) fn set_lower(&mut self, lower: f64) {
        self.lower = lower;
        if !self.overlapping {
            self.overlapping = near_equal(lower, -PI);
        }
    }

    pub(crate) fn set_upper(&mut self, upper: f64) {
        self.upper = upper;
        if !self.overlapping {
            self.overlapping = near_equal(upper, PI);
        }
    }
}

/// A point where a joint touches one of its box limits: the arm angle, the
/// joint angle there (the limit) and dq/dψ. The derivative decides on which
/// side of the crossing the joint is outside its limits.
#[derive(Clone, Copy, Debug)]
struct IntervalLimit {
    arm_angle: f64,
    joint_angle: f64,
    joint_derivative: f64,
}

/// Outcome of an arm-angle containment query.
#[derive(Clone, Debug)]
pub(crate) struct ArmAngleQuery {
    pub status: Status,
    /// The feasible interval containing the query. If that interval wraps
    /// across ±π it is rewritten onto a contiguous range `[lower, lower + arc]`
    /// reaching beyond π, so callers can compare plain numbers.
    pub interval: Option<ArmAngleInterval>,
    /// The query angle, shifted by +2π when it sits on the far side of the
    /// seam of a rewritten wrapping interval.
    pub arm_angle: f64,
    /// Midpoint of the circularly closest feasible interval when the query is
    /// blocked; zero when nothing is feasible.
    pub fallback_arm_angle: f64,
}

/// The blocked/feasible decomposition of the arm-angle circle for one
/// (pose, global configuration) pair.
#[derive(Clone, Debug, Default)]
pub(crate) struct FeasibleIntervals {
    blocked: Vec<ArmAngleInterval>,
    feasible: Vec<ArmAngleInterval>,
}

impl FeasibleIntervals {
    /// Maps every joint limit through the closed form and assembles the sorted,
    /// disjoint feasible interval list.
    pub fn compute(coeffs: &IkCoefficients, lower: &Joints, upper: &Joints) -> Self {
        // a pivot singularity does not block a finite arc by itself, a small
        // guard interval is placed around it
        const SINGULARITY_MARGIN: f64 = 10.0 * ZERO_ROUNDING_TOL;

        let mut intervals = FeasibleIntervals::default();

        for i in 0..NUM_PIVOT_JOINTS {
            if let Some(psi_singular) = coeffs.pivot_singularity(i) {
                debug!(pivot = i, psi = psi_singular, "guarding pivot singularity");
                intervals.blocked.push(ArmAngleInterval::new(
                    psi_singular - SINGULARITY_MARGIN,
                    psi_singular + SINGULARITY_MARGIN,
                ));
            }

            intervals.map_limits_to_arm_angle(
                coeffs,
                JointType::Pivot,
                lower[2 * i],
                upper[2 * i],
                i,
            );
        }

        for i in 0..NUM_HINGE_JOINTS {
            intervals.map_limits_to_arm_angle(
                coeffs,
                JointType::Hinge,
                lower[4 * i + 1],
                upper[4 * i + 1],
                i,
            );
        }

        intervals.blocked.sort_by(|a, b| a.lower.total_cmp(&b.lower));
        intervals.merge_sorted_blocked_intervals();
        intervals.feasible_intervals_from_blocked();

        debug!(
            blocked = intervals.blocked.len(),
            feasible = intervals.feasible.len(),
            "arm angle intervals computed"
        );

        intervals
    }

    pub fn feasible(&self) -> &[ArmAngleInterval] {
        &self.feasible
    }

    #[cfg(test)]
    pub fn blocked(&self) -> &[ArmAngleInterval] {
        &self.blocked
    }

    /// Locates the feasible interval containing the query arm angle, or the
    /// closest fallback if the query is blocked. See [`ArmAngleQuery`].
    pub fn interval_for_arm_angle(&self, query: f64) -> ArmAngleQuery {
        if self.feasible.is_empty() {
            // No feasible arm angle. The robot could be in a singular position
            // for the goal pose where the arm angle is not defined; zero can
            // then still produce usable joint angles.
            return ArmAngleQuery {
                status: Status::NoSolutionForArmAngle,
                interval: None,
                arm_angle: query,
                fallback_arm_angle: 0.0,
            };
        }

        let mut containing: Option<ArmAngleInterval> = None;
        let mut stop_index: Option<usize> = None;

        for (i, interval) in self.feasible.iter().enumerate() {
            if query <= interval.upper {
                if query >= interval.lower {
                    containing = Some(*interval);
                }

                // the query is at or below interval i, no need to keep
                // searching; remember the index for the fallback search
                stop_index = Some(i);
                break;
            }
        }

        if let Some(mut interval) = containing {
            let mut arm_angle = query;

            if !interval.overlapping
                || (near_equal(interval.lower, -PI) && near_equal(interval.upper, PI))
            {
                return ArmAngleQuery {
                    status: Status::Success,
                    interval: Some(interval),
                    arm_angle,
                    fallback_arm_angle: query,
                };
            }

            if near_equal(interval.lower, -PI) {
                // wraps at -PI: map the part below the seam to [PI, 3 PI] and
                // continue the interval from the lower limit of the last one
                if arm_angle < interval.upper {
                    arm_angle += 2.0 * PI;
                }
                let upper = interval.upper + 2.0 * PI;
                interval.set_upper(upper);
                if let Some(last) = self.feasible.last() {
                    interval.set_lower(last.lower);
                }
            } else if near_equal(interval.upper, PI) {
                // wraps at PI: extend the interval into the first one beyond
                // the seam
                if let Some(first) = self.feasible.first() {
                    interval.set_upper(2.0 * PI + first.upper);
                    if arm_angle < first.upper {
                        arm_angle += 2.0 * PI;
                    }
                }
            }

            return ArmAngleQuery {
                status: Status::Success,
                interval: Some(interval),
                arm_angle,
                fallback_arm_angle: query,
            };
        }

        self.closest_feasible_arm_angle(stop_index, query)
    }

    /// True when both arm angles lie inside the same feasible interval, the
    /// two seam intervals counting as one arc. A motion between two such
    /// angles never has to cross a blocked region.
    pub fn same_feasible_interval(&self, psi_a: f64, psi_b: f64) -> bool {
        match (self.index_of(psi_a), self.index_of(psi_b)) {
            (Some(a), Some(b)) => self.logical_index(a) == self.logical_index(b),
            _ => false,
        }
    }

    fn index_of(&self, arm_angle: f64) -> Option<usize> {
        self.feasible.iter().position(|interval| interval.contains(arm_angle))
    }

    fn logical_index(&self, index: usize) -> usize {
        let n = self.feasible.len();
        if n > 1
            && index == n - 1
            && near_equal(self.feasible[0].lower, -PI)
            && near_equal(self.feasible[n - 1].upper, PI)
        {
            return 0;
        }

        index
    }

    /// Fallback for a blocked query: the midpoint of the circularly closest
    /// feasible interval. Candidates are the intervals directly below and above
    /// the query (wrapping across the seam); a tie goes to the interval above.
    fn closest_feasible_arm_angle(&self, stop_index: Option<usize>, query: f64) -> ArmAngleQuery {
        let first = self.feasible[0].midpoint();
        let last = self.feasible[self.feasible.len() - 1].midpoint();

        let fallback = match stop_index {
            Some(index) if index > 0 => {
                // between two feasible intervals, the upper one is at index
                let middle_upper = self.feasible[index].midpoint();
                let middle_lower = self.feasible[index - 1].midpoint();

                if middle_upper - query <= query - middle_lower {
                    middle_upper
                } else {
                    middle_lower
                }
            }
            Some(_) => {
                // below the lowest feasible interval, the last interval
                // competes across the seam
                if first - query <= (query + PI) + (PI - last) {
                    first
                } else {
                    last
                }
            }
            None => {
                // above the highest feasible interval
                if query - last <= (PI - query) + (first + PI) {
                    last
                } else {
                    first
                }
            }
        };

        ArmAngleQuery {
            status: Status::ArmAngleNotInSameInterval,
            interval: None,
            arm_angle: query,
            fallback_arm_angle: fallback,
        }
    }

    fn map_limits_to_arm_angle(
        &mut self,
        coeffs: &IkCoefficients,
        joint_type: JointType,
        lower_joint_limit: f64,
        upper_joint_limit: f64,
        index: usize,
    ) {
        let mut interval_limits: Vec<IntervalLimit> = Vec::with_capacity(4);

        for joint_limit in [lower_joint_limit, upper_joint_limit] {
            if let Some((arm_angle_lower, arm_angle_upper)) =
                coeffs.arm_angle_for_joint_limit(joint_type, index, joint_limit)
            {
                insert_limit(&mut interval_limits, coeffs, joint_type, joint_limit, arm_angle_lower, index);
                insert_limit(&mut interval_limits, coeffs, joint_type, joint_limit, arm_angle_upper, index);
            }
        }

        if interval_limits.is_empty() {
            // the joint never crosses a limit, so any arm angle tells whether
            // the whole circle is feasible for it
            let joint_angle_test = coeffs.joint_angle(joint_type, index, 0.0);
            if definitely_greater(joint_angle_test, upper_joint_limit)
                || definitely_smaller(joint_angle_test, lower_joint_limit)
            {
                self.blocked.push(ArmAngleInterval::new(-PI, PI));
            }

            return;
        }

        interval_limits.sort_by(|a, b| a.arm_angle.total_cmp(&b.arm_angle));
        self.determine_blocked_intervals(&interval_limits);
    }

    fn determine_blocked_intervals(&mut self, interval_limits: &[IntervalLimit]) {
        // a sub-arc between consecutive crossings is blocked iff the joint
        // leaves its limit at the left crossing or enters it at the right one,
        // which follows from the signs of q and dq/dψ there
        let size = interval_limits.len();

        for j in 0..size {
            let j_next = (j + 1) % size;

            let leaving = interval_limits[j].joint_angle.is_sign_negative()
                == interval_limits[j].joint_derivative.is_sign_negative();
            let entering = interval_limits[j_next].joint_angle.is_sign_negative()
                != interval_limits[j_next].joint_derivative.is_sign_negative();

            if leaving || entering {
                if j == size - 1 {
                    // blocked arc wraps across ±PI, split it at the seam
                    self.blocked
                        .push(ArmAngleInterval::new(-PI, interval_limits[0].arm_angle));
                    self.blocked
                        .push(ArmAngleInterval::new(interval_limits[j].arm_angle, PI));
                } else {
                    self.blocked.push(ArmAngleInterval::new(
                        interval_limits[j].arm_angle,
                        interval_limits[j + 1].arm_angle,
                    ));
                }
            }
        }
    }

    fn merge_sorted_blocked_intervals(&mut self) {
        if self.blocked.is_empty() {
            return;
        }

        let mut merged: Vec<ArmAngleInterval> = Vec::with_capacity(self.blocked.len());
        merged.push(self.blocked[0]);

        for interval in &self.blocked[1..] {
            if let Some(back) = merged.last_mut() {
                if back.upper < interval.lower {
                    // a feasible gap separates them, a new blocked interval starts
                    merged.push(*interval);
                } else if interval.upper <= back.upper {
                    // fully contained in the merged tail, nothing to extend
                } else {
                    back.set_upper(interval.upper);
                }
            }
        }

        self.blocked = merged;
    }

    fn feasible_intervals_from_blocked(&mut self) {
        if self.blocked.is_empty() {
            self.feasible.push(ArmAngleInterval::new(-PI, PI));
            return;
        }

        if self.blocked.len() == 1
            && near_equal(self.blocked[0].lower, -PI)
            && near_equal(self.blocked[0].upper, PI)
        {
            // everything is blocked
            return;
        }

        if self.blocked[0].lower > -PI {
            self.feasible.push(ArmAngleInterval::new(-PI, PI));
        }

        for i in 0..self.blocked.len() {
            let blocked_interval = self.blocked[i];

            if let Some(last) = self.feasible.last_mut() {
                last.set_upper(blocked_interval.lower);
            }

            if blocked_interval.upper < PI {
                self.feasible
                    .push(ArmAngleInterval::new(blocked_interval.upper, PI));
            }
        }
    }

    #[cfg(test)]
    fn from_blocked(blocked: Vec<ArmAngleInterval>) -> Self {
        let mut intervals = FeasibleIntervals { blocked, feasible: Vec::new() };
        intervals.blocked.sort_by(|a, b| a.lower.total_cmp(&b.lower));
        intervals.merge_sorted_blocked_intervals();
        intervals.feasible_intervals_from_blocked();
        intervals
    }
}

fn insert_limit(
    interval_limits: &mut Vec<IntervalLimit>,
    coeffs: &IkCoefficients,
    joint_type: JointType,
    joint_angle: f64,
    arm_angle: f64,
    index: usize,
) {
    // verify that the algebraic solution actually hits the limit; the
    // tan-half-angle inversion can produce spurious roots
    if near_zero(joint_angle - coeffs.joint_angle(joint_type, index, arm_angle)) {
        let joint_derivative = coeffs.joint_derivative(joint_type, index, arm_angle, joint_angle);

        interval_limits.push(IntervalLimit { arm_angle, joint_angle, joint_derivative });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(lower: f64, upper: f64) -> ArmAngleInterval {
        ArmAngleInterval::new(lower, upper)
    }

    #[test]
    fn test_overlap_flag() {
        assert!(interval(-PI, -2.5).overlapping());
        assert!(interval(2.5, PI).overlapping());
        assert!(!interval(-2.5, 2.5).overlapping());
    }

    #[test]
    fn test_no_blocked_means_full_circle() {
        let intervals = FeasibleIntervals::from_blocked(vec![]);
        assert_eq!(intervals.feasible().len(), 1);
        assert_eq!(intervals.feasible()[0].lower(), -PI);
        assert_eq!(intervals.feasible()[0].upper(), PI);

        let query = intervals.interval_for_arm_angle(1.234);
        assert_eq!(query.status, Status::Success);
        assert_eq!(query.arm_angle, 1.234);
    }

    #[test]
    fn test_fully_blocked_circle() {
        let intervals = FeasibleIntervals::from_blocked(vec![interval(-PI, PI)]);
        assert!(intervals.feasible().is_empty());

        let query = intervals.interval_for_arm_angle(0.3);
        assert_eq!(query.status, Status::NoSolutionForArmAngle);
        assert_eq!(query.fallback_arm_angle, 0.0);
    }

    #[test]
    fn test_merge_skips_contained_interval() {
        let intervals = FeasibleIntervals::from_blocked(vec![
            interval(-2.0, -1.0),
            interval(-1.5, -1.2),
            interval(0.5, 2.0),
        ]);

        assert_eq!(intervals.blocked().len(), 2);
        assert_eq!(intervals.blocked()[0], interval(-2.0, -1.0));
        assert_eq!(intervals.blocked()[1], interval(0.5, 2.0));
    }

    #[test]
    fn test_merge_extends_overlapping_interval() {
        let intervals =
            FeasibleIntervals::from_blocked(vec![interval(-1.0, 0.5), interval(0.0, 1.5)]);
        assert_eq!(intervals.blocked().len(), 1);
        assert_eq!(intervals.blocked()[0].lower(), -1.0);
        assert_eq!(intervals.blocked()[0].upper(), 1.5);
    }

    #[test]
    fn test_complement_construction() {
        let intervals =
            FeasibleIntervals::from_blocked(vec![interval(-PI, -2.0), interval(1.0, 2.0)]);

        let feasible = intervals.feasible();
        assert_eq!(feasible.len(), 2);
        assert_eq!(feasible[0].lower(), -2.0);
        assert_eq!(feasible[0].upper(), 1.0);
        assert_eq!(feasible[1].lower(), 2.0);
        assert_eq!(feasible[1].upper(), PI);
    }

    #[test]
    fn test_coverage_is_exact() {
        let intervals =
            FeasibleIntervals::from_blocked(vec![interval(-2.8, -1.0), interval(0.3, 0.9)]);

        // feasible and blocked must alternate and tile the circle exactly
        let mut bounds: Vec<(f64, f64)> = intervals
            .feasible()
            .iter()
            .chain(intervals.blocked())
            .map(|i| (i.lower(), i.upper()))
            .collect();
        bounds.sort_by(|a, b| a.0.total_cmp(&b.0));

        assert_eq!(bounds[0].0, -PI);
        assert_eq!(bounds[bounds.len() - 1].1, PI);
        for pair in bounds.windows(2) {
            assert!(
                (pair[0].1 - pair[1].0).abs() <= ZERO_ROUNDING_TOL,
                "gap or overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_fallback_prefers_circularly_closest_interval() {
        // feasible intervals around 0.2 and 2.5
        let intervals =
            FeasibleIntervals::from_blocked(vec![interval(-PI, 0.1), interval(0.3, 2.4), interval(2.6, PI)]);
        assert_eq!(intervals.feasible().len(), 2);

        let query = intervals.interval_for_arm_angle(1.4);
        assert_eq!(query.status, Status::ArmAngleNotInSameInterval);
        // 2.5 is 1.1 away, 0.2 is 1.2 away
        assert!((query.fallback_arm_angle - 2.5).abs() < 1e-12);

        // tie breaks towards the interval above
        let tie = intervals.interval_for_arm_angle(1.35);
        assert!((tie.fallback_arm_angle - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_wraps_below_first_interval() {
        let intervals =
            FeasibleIntervals::from_blocked(vec![interval(-PI, 0.5), interval(1.0, 2.0), interval(2.5, PI)]);
        // feasible: [0.5, 1.0] and [2.0, 2.5]

        // -3.0 is much closer to the last interval midpoint across the seam
        let query = intervals.interval_for_arm_angle(-3.0);
        assert_eq!(query.status, Status::ArmAngleNotInSameInterval);
        assert!((query.fallback_arm_angle - 2.25).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_wraps_above_last_interval() {
        let intervals =
            FeasibleIntervals::from_blocked(vec![interval(-PI, -2.5), interval(-2.0, -1.0), interval(-0.5, PI)]);
        // feasible: [-2.5, -2.0] and [-1.0, -0.5]

        let query = intervals.interval_for_arm_angle(3.0);
        assert_eq!(query.status, Status::ArmAngleNotInSameInterval);
        // across the seam the first interval midpoint (-2.25) is closest
        assert!((query.fallback_arm_angle + 2.25).abs() < 1e-12);
    }

    #[test]
    fn test_wrapping_interval_is_rewritten() {
        let intervals = FeasibleIntervals::from_blocked(vec![interval(-2.5, 2.5)]);
        // feasible: [-PI, -2.5] and [2.5, PI], one arc across the seam

        let above = intervals.interval_for_arm_angle(2.8);
        assert_eq!(above.status, Status::Success);
        let rewritten = above.interval.expect("interval returned");
        assert_eq!(rewritten.lower(), 2.5);
        assert!((rewritten.upper() - (2.0 * PI - 2.5)).abs() < 1e-12);
        assert_eq!(above.arm_angle, 2.8);

        let below = intervals.interval_for_arm_angle(-3.0);
        assert_eq!(below.status, Status::Success);
        let rewritten = below.interval.expect("interval returned");
        assert_eq!(rewritten.lower(), 2.5);
        assert!((rewritten.upper() - (2.0 * PI - 2.5)).abs() < 1e-12);
        // the query is mapped beyond PI so it compares against the rewritten bounds
        assert!((below.arm_angle - (2.0 * PI - 3.0)).abs() < 1e-12);
        assert!(rewritten.contains(below.arm_angle));
    }

    #[test]
    fn test_same_feasible_interval() {
        let intervals = FeasibleIntervals::from_blocked(vec![interval(-2.5, 2.5)]);
        // the two seam intervals form one arc
        assert!(intervals.same_feasible_interval(2.8, -3.0));

        let split =
            FeasibleIntervals::from_blocked(vec![interval(-PI, 0.1), interval(0.3, 2.4), interval(2.6, PI)]);
        assert!(split.same_feasible_interval(0.15, 0.25));
        assert!(!split.same_feasible_interval(0.15, 2.5));
        assert!(!split.same_feasible_interval(1.0, 1.0));
    }
}
