//! Per-call coefficient tables expressing every joint angle as a closed-form
//! function of the arm angle.
//!
//! For a fixed pose and elbow branch, each pivot joint (1, 3, 5, 7) follows
//! `atan2(a·sinψ + b·cosψ + c, a'·sinψ + b'·cosψ + c')` and each hinge joint
//! (2, 6) follows `±acos(a·sinψ + b·cosψ + c)`. The elbow (joint 4) is fixed by
//! the shoulder-wrist distance and carries the elbow branch sign. The tables
//! are built once per inverse call from the helper matrices of the virtual
//! (reference-plane) manipulator and afterwards evaluated, differentiated and
//! inverted in O(1), without touching the pose again.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};

use crate::frames::{cross_matrix, Frame};
use crate::kinematic_traits::{GlobalConfig, Joints, Status, NUM_JOINTS};
use crate::parameters::srs_kinematics::Parameters;
use crate::utils::{
    clamped_acos, clamped_sqrt, definitely_greater, definitely_smaller, greater_or_zero,
    near_equal, near_zero,
};

pub(crate) const NUM_PIVOT_JOINTS: usize = 4;
// excluding the elbow joint, the elbow is always treated separately
pub(crate) const NUM_HINGE_JOINTS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JointType {
    Pivot,
    Hinge,
}

/// First virtual shoulder angle: the pivot that aligns the reference plane with
/// the shoulder-wrist direction.
pub(crate) fn virtual_joint_angle_1(xsw: &Vector3<f64>) -> f64 {
    let dist_z = clamped_sqrt(xsw[0] * xsw[0] + xsw[1] * xsw[1]);
    if near_zero(dist_z) {
        // shoulder-wrist vector aligned with the axis of the first joint,
        // overhead singularity, any value works and zero is chosen
        return 0.0;
    }

    xsw[1].atan2(xsw[0])
}

/// Second virtual shoulder angle, depending on the elbow branch. phi is the
/// angle between the shoulder-wrist vector and the upper arm.
pub(crate) fn virtual_joint_angle_2(
    xsw: &Vector3<f64>,
    lsw: f64,
    elbow_sign: f64,
    limb_lengths: &[f64; 4],
) -> f64 {
    let (l1, l2) = (limb_lengths[1], limb_lengths[2]);
    let phi = clamped_acos((l1 * l1 + lsw * lsw - l2 * l2) / (2.0 * l1 * lsw));

    clamped_sqrt(xsw[0] * xsw[0] + xsw[1] * xsw[1]).atan2(xsw[2]) + elbow_sign * phi
}

/// Coefficients that depend on the pose and the elbow branch only. Candidates
/// sharing the elbow sign reuse one core; the shoulder/wrist signs are applied
/// per configuration by [`IkCoefficients`].
#[derive(Clone, Debug)]
pub(crate) struct CoeffsCore {
    // pivot joints: atan2 numerator and denominator coefficients
    an: [f64; NUM_PIVOT_JOINTS],
    bn: [f64; NUM_PIVOT_JOINTS],
    cn: [f64; NUM_PIVOT_JOINTS],
    ad: [f64; NUM_PIVOT_JOINTS],
    bd: [f64; NUM_PIVOT_JOINTS],
    cd: [f64; NUM_PIVOT_JOINTS],
    // precalculated pivot derivative coefficients
    at: [f64; NUM_PIVOT_JOINTS],
    bt: [f64; NUM_PIVOT_JOINTS],
    ct: [f64; NUM_PIVOT_JOINTS],
    // hinge joints
    a: [f64; NUM_HINGE_JOINTS],
    b: [f64; NUM_HINGE_JOINTS],
    c: [f64; NUM_HINGE_JOINTS],

    sw_n: Vector3<f64>,
    wf_n: Vector3<f64>,
    joint_angle_4: f64,
}

impl CoeffsCore {
    /// Builds the coefficient tables for a pose and an elbow branch. Fails with
    /// `JointLimitViolated` when the wrist is outside the annulus the shoulder
    /// can reach or the elbow angle leaves its limits.
    pub fn build(pose: &Frame, elbow_sign: f64, parameters: &Parameters) -> Result<Self, Status> {
        let l = &parameters.limb_lengths;

        // wrist and shoulder centre in base coordinates
        let xw = pose.ori * Vector3::new(0.0, 0.0, -l[3]) + pose.pos;
        let xs = Vector3::new(0.0, 0.0, l[0]);

        let wf_n = (pose.pos - xw).normalize();
        let xsw = xw - xs;
        let lsw = xsw.norm();

        if definitely_greater(lsw, l[1] + l[2]) || definitely_smaller(lsw, (l[1] - l[2]).abs()) {
            return Err(Status::JointLimitViolated);
        }

        let joint_angle_4 =
            elbow_sign * clamped_acos((lsw * lsw - l[1] * l[1] - l[2] * l[2]) / (2.0 * l[1] * l[2]));
        if definitely_smaller(joint_angle_4, parameters.lower_joint_limits[3])
            || definitely_greater(joint_angle_4, parameters.upper_joint_limits[3])
        {
            return Err(Status::JointLimitViolated);
        }

        let joint_angle_1_v = virtual_joint_angle_1(&xsw);
        let joint_angle_2_v = virtual_joint_angle_2(&xsw, lsw, elbow_sign, l);

        let sw_n = xsw / lsw;
        let sw_cross = cross_matrix(&sw_n);

        // virtual upper arm pose, elbow in the reference plane
        let mbu_v = &(&Frame::from_dh(l[0], joint_angle_1_v, 0.0, -PI / 2.0)
            * &Frame::from_dh(0.0, joint_angle_2_v, 0.0, PI / 2.0))
            * &Frame::from_dh(l[1], 0.0, 0.0, PI / 2.0);

        // helper matrices rotating the virtual upper arm about the
        // shoulder-wrist axis (Rodrigues split of the rotation by ψ)
        let hm_as: Matrix3<f64> = sw_cross * mbu_v.ori;
        let hm_bs: Matrix3<f64> = -sw_cross * hm_as;
        let hm_cs: Matrix3<f64> = (sw_n * sw_n.transpose()) * mbu_v.ori;

        // elbow pose in upper arm coordinates, same as the virtual elbow pose
        let mue = Frame::from_dh(0.0, joint_angle_4, 0.0, -PI / 2.0);

        let hm_aw: Matrix3<f64> = mue.ori.transpose() * hm_as.transpose() * pose.ori;
        let hm_bw: Matrix3<f64> = mue.ori.transpose() * hm_bs.transpose() * pose.ori;
        let hm_cw: Matrix3<f64> = mue.ori.transpose() * hm_cs.transpose() * pose.ori;

        // shoulder pivots read the first two joints off the rotated shoulder
        // matrix, wrist pivots off the rotated wrist matrix
        let an = [hm_as[(1, 1)], -hm_as[(2, 2)], hm_aw[(1, 2)], hm_aw[(2, 1)]];
        let bn = [hm_bs[(1, 1)], -hm_bs[(2, 2)], hm_bw[(1, 2)], hm_bw[(2, 1)]];
        let cn = [hm_cs[(1, 1)], -hm_cs[(2, 2)], hm_cw[(1, 2)], hm_cw[(2, 1)]];
        let ad = [hm_as[(0, 1)], -hm_as[(2, 0)], hm_aw[(0, 2)], -hm_aw[(2, 0)]];
        let bd = [hm_bs[(0, 1)], -hm_bs[(2, 0)], hm_bw[(0, 2)], -hm_bw[(2, 0)]];
        let cd = [hm_cs[(0, 1)], -hm_cs[(2, 0)], hm_cw[(0, 2)], -hm_cw[(2, 0)]];

        let a = [hm_as[(2, 1)], hm_aw[(2, 2)]];
        let b = [hm_bs[(2, 1)], hm_bw[(2, 2)]];
        let c = [hm_cs[(2, 1)], hm_cw[(2, 2)]];

        // pivot derivative coefficients, free of the branch signs
        let mut at = [0.0; NUM_PIVOT_JOINTS];
        let mut bt = [0.0; NUM_PIVOT_JOINTS];
        let mut ct = [0.0; NUM_PIVOT_JOINTS];
        for i in 0..NUM_PIVOT_JOINTS {
            at[i] = cn[i] * bd[i] - bn[i] * cd[i];
            bt[i] = an[i] * cd[i] - cn[i] * ad[i];
            ct[i] = an[i] * bd[i] - bn[i] * ad[i];
        }

        Ok(CoeffsCore {
            an, bn, cn, ad, bd, cd, at, bt, ct, a, b, c,
            sw_n,
            wf_n,
            joint_angle_4,
        })
    }
}

/// A coefficient core with the shoulder and wrist branch signs applied: the
/// complete closed form for one (pose, global configuration) pair. A value
/// object, moved into the interval engine and the solver; nothing is shared
/// across a call.
#[derive(Clone, Debug)]
pub(crate) struct IkCoefficients {
    core: CoeffsCore,
    gc_p: [f64; NUM_PIVOT_JOINTS],
    gc_h: [f64; NUM_HINGE_JOINTS],
}

impl IkCoefficients {
    pub fn new(core: CoeffsCore, config: GlobalConfig) -> Self {
        let (gc2, gc6) = (config.shoulder_sign(), config.wrist_sign());
        IkCoefficients { core, gc_p: [gc2, gc2, gc6, gc6], gc_h: [gc2, gc6] }
    }

    pub fn joint_angle_4(&self) -> f64 {
        self.core.joint_angle_4
    }

    pub fn shoulder_wrist_axis(&self) -> &Vector3<f64> {
        &self.core.sw_n
    }

    pub fn wrist_flange_axis(&self) -> &Vector3<f64> {
        &self.core.wf_n
    }

    pub fn joint_angle(&self, joint_type: JointType, i: usize, arm_angle: f64) -> f64 {
        match joint_type {
            JointType::Pivot => self.joint_angle_pivot(i, arm_angle),
            JointType::Hinge => self.joint_angle_hinge(i, arm_angle),
        }
    }

    pub fn joint_angle_pivot(&self, i: usize, arm_angle: f64) -> f64 {
        let c = &self.core;
        let (s, co) = arm_angle.sin_cos();

        let numerator = self.gc_p[i] * (c.an[i] * s + c.bn[i] * co + c.cn[i]);
        let denominator = self.gc_p[i] * (c.ad[i] * s + c.bd[i] * co + c.cd[i]);
        if near_zero(numerator) && near_zero(denominator) {
            // pivot singularity, the joint angle is undefined here; zero is
            // chosen explicitly instead of whatever atan2 makes of the signed
            // zeros
            return 0.0;
        }

        numerator.atan2(denominator)
    }

    pub fn joint_angle_hinge(&self, i: usize, arm_angle: f64) -> f64 {
        let c = &self.core;
        let (s, co) = arm_angle.sin_cos();

        self.gc_h[i] * clamped_acos(c.a[i] * s + c.b[i] * co + c.c[i])
    }

    pub fn joint_derivative(
        &self,
        joint_type: JointType,
        i: usize,
        arm_angle: f64,
        joint_angle: f64,
    ) -> f64 {
        match joint_type {
            JointType::Pivot => self.joint_derivative_pivot(i, arm_angle),
            JointType::Hinge => self.joint_derivative_hinge(i, arm_angle, joint_angle),
        }
    }

    pub fn joint_derivative_pivot(&self, i: usize, arm_angle: f64) -> f64 {
        let c = &self.core;
        let (s, co) = arm_angle.sin_cos();
        let u = c.an[i] * s + c.bn[i] * co + c.cn[i];
        let v = c.ad[i] * s + c.bd[i] * co + c.cd[i];

        (c.at[i] * s + c.bt[i] * co + c.ct[i]) / (u * u + v * v)
    }

    pub fn joint_derivative_hinge(&self, i: usize, arm_angle: f64, joint_angle: f64) -> f64 {
        let c = &self.core;
        // abs is needed because sin(joint_angle) stands in for
        // sqrt(1 - cos²(joint_angle)); division by zero is possible at the
        // hinge singularity, callers only evaluate this at limits away from 0
        -self.gc_h[i] * (c.a[i] * arm_angle.cos() - c.b[i] * arm_angle.sin())
            / joint_angle.sin().abs()
    }

    /// Inverts the closed form: the up to two arm angles at which joint `i`
    /// takes the value `joint_angle`. `None` when the joint never attains that
    /// value on the circle, or only touches it tangentially (a touch is a
    /// global extremum of the joint over ψ, not a crossing, so it cannot open
    /// or close a blocked interval).
    pub fn arm_angle_for_joint_limit(
        &self,
        joint_type: JointType,
        i: usize,
        joint_angle: f64,
    ) -> Option<(f64, f64)> {
        let solutions = match joint_type {
            JointType::Pivot => self.arm_angle_pivot(i, joint_angle),
            JointType::Hinge => self.arm_angle_hinge(i, joint_angle),
        };

        match solutions {
            Some((lower, upper)) if near_equal(lower, upper) => None,
            other => other,
        }
    }

    fn arm_angle_pivot(&self, i: usize, joint_angle: f64) -> Option<(f64, f64)> {
        let c = &self.core;
        let gc = self.gc_p[i];
        let t = joint_angle.tan();

        // tan(ψ/2) substitution turns atan2(num, den) = θ into a quadratic
        let ap = gc * ((c.cd[i] - c.bd[i]) * t + (c.bn[i] - c.cn[i]));
        let bp = 2.0 * gc * (c.ad[i] * t - c.an[i]);
        let cp = gc * ((c.bd[i] + c.cd[i]) * t - (c.bn[i] + c.cn[i]));

        let discriminant = bp * bp - 4.0 * ap * cp;
        if !greater_or_zero(discriminant) {
            // joint angle is not reached in the null space for this pose
            return None;
        }
        let sqrt_discr = clamped_sqrt(discriminant);

        Some((
            2.0 * ((-bp - sqrt_discr) / (2.0 * ap)).atan(),
            2.0 * ((-bp + sqrt_discr) / (2.0 * ap)).atan(),
        ))
    }

    fn arm_angle_hinge(&self, i: usize, joint_angle: f64) -> Option<(f64, f64)> {
        let c = &self.core;
        let cos_limit = joint_angle.cos();

        let discriminant =
            c.a[i] * c.a[i] + c.b[i] * c.b[i] - (c.c[i] - cos_limit) * (c.c[i] - cos_limit);
        if !greater_or_zero(discriminant) {
            return None;
        }
        let sqrt_discr = clamped_sqrt(discriminant);
        let denominator = cos_limit + c.b[i] - c.c[i];

        Some((
            2.0 * ((c.a[i] - sqrt_discr) / denominator).atan(),
            2.0 * ((c.a[i] + sqrt_discr) / denominator).atan(),
        ))
    }

    /// Detects a pivot singularity: an arm angle where the numerator and
    /// denominator of the pivot atan2 vanish together and the joint angle is
    /// undefined.
    pub fn pivot_singularity(&self, i: usize) -> Option<f64> {
        let c = &self.core;

        if near_zero(c.at[i]) && near_zero(c.bt[i] - c.ct[i]) {
            // the half-angle equation degenerates; this happens at poses where
            // the pivot is undefined for every arm angle (e.g. a fully
            // stretched overhead arm), so there is no isolated arm angle to
            // guard
            return None;
        }

        let discriminant = c.at[i] * c.at[i] + c.bt[i] * c.bt[i] - c.ct[i] * c.ct[i];
        if greater_or_zero(discriminant) && near_zero(clamped_sqrt(discriminant)) {
            return Some(2.0 * (c.at[i] / (c.bt[i] - c.ct[i])).atan());
        }

        None
    }

    /// Evaluates the whole joint vector at the given arm angle. Pivot joints
    /// land on indices 0, 2, 4, 6, hinge joints on 1 and 5; the elbow (3) is
    /// independent of ψ.
    pub fn joints_at(&self, arm_angle: f64) -> Joints {
        let mut joints = [0.0; NUM_JOINTS];

        for i in 0..NUM_PIVOT_JOINTS {
            joints[i * 2] = self.joint_angle_pivot(i, arm_angle);
        }
        for i in 0..NUM_HINGE_JOINTS {
            joints[i * 4 + 1] = self.joint_angle_hinge(i, arm_angle);
        }
        joints[3] = self.core.joint_angle_4;

        joints
    }
}
