//! Altitude bands.
//!
//! Target altitudes lie on an absolute grid `min_alt + j * alt_step`. Each
//! target is flown with a level-out maneuver: accelerate to the vertical
//! rate, hold it, then decelerate onto the target. The first and last phases
//! are sampled once a second; the constant-rate phase and the leveled-off
//! continuation are checked analytically.

use super::integer::{self, green_runs, SearchContext, Step};
use super::parameters::KinematicBandsParameters;
use super::real::{AxisModel, AxisRange};
use crate::criteria::vertical_repulsive_criterion;
use crate::detection::Detection3D;
use crate::interval::Integerval;
use crate::kinematics::{
    vs_accel_until, vs_level_out_calc, vs_level_out_times, LevelOutTimes, State,
};
use crate::traffic::TrafficState;
use crate::util::almost_equals;
use crate::vect::{Vect3Ext, vect3};

/// Sampling period of the acceleration phases, seconds.
const SAMPLE: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AltAxis;

impl AltAxis {
    fn grid_len(range: &AxisRange) -> i32 {
        ((range.max - range.min) / range.step + 1e-9).floor() as i32
    }

    fn level_out_state(own: &TrafficState, target: f64, lt: &LevelOutTimes, t: f64) -> Step {
        let (z, vz) = vs_level_out_calc(own.s.z, own.v.z, target, lt, t);
        let s = own.s.linear(&own.v, t);
        Step {
            s: vect3(s.x, s.y, z),
            v: own.v.mk_vs(vz),
            t,
        }
    }

    /// Loss of separation at `st` within either detector window.
    fn los(ctx: &SearchContext<'_>, st: &Step) -> bool {
        (st.t >= ctx.b
            && st.t <= ctx.t
            && integer::any_los_aircraft(ctx.conflict_det, st, ctx.traffic))
            || ctx.recovery_det.is_some_and(|det| {
                st.t >= ctx.b2 && st.t <= ctx.t2 && integer::any_los_aircraft(det, st, ctx.traffic)
            })
    }

    /// Straight-line conflict over `[from, to]` starting at `st`, clipped to
    /// the window `[b, t]`.
    fn segment_conflict(
        det: &dyn Detection3D,
        b: f64,
        t: f64,
        st: &Step,
        to: f64,
        traffic: &[TrafficState],
    ) -> bool {
        let lo = b.max(st.t);
        let hi = t.min(to);
        if lo > hi {
            return false;
        }
        traffic.iter().any(|ac| {
            let si = ac.s.linear(&ac.v, st.t);
            det.conflict(&st.s, &st.v, &si, &ac.v, lo - st.t, hi - st.t)
        })
    }

    fn sample_phase(
        ctx: &SearchContext<'_>,
        own: &TrafficState,
        target: f64,
        lt: &LevelOutTimes,
        from: f64,
        to: f64,
    ) -> bool {
        let mut t = from;
        while t < to {
            if Self::los(ctx, &Self::level_out_state(own, target, lt, t)) {
                return true;
            }
            t += SAMPLE;
        }
        Self::los(ctx, &Self::level_out_state(own, target, lt, to))
    }

    /// Conflict-free maneuver to `target`.
    fn green(&self, ctx: &SearchContext<'_>, p: &KinematicBandsParameters, target: f64) -> bool {
        let own = ctx.ownship;
        if self.time_step(own, p, 1.0) <= 0.0 {
            let (s, v) = self.jump(own, target);
            let st = Step { s, v, t: 0.0 };
            return !Self::los(ctx, &st)
                && integer::no_conflict(ctx, &st)
                && Self::repulsive(ctx, p, target);
        }
        if !Self::repulsive(ctx, p, target) {
            return false;
        }
        let lt = vs_level_out_times(
            own.s.z,
            own.v.z,
            p.vertical_rate,
            target,
            p.vertical_accel,
            -p.vertical_accel,
            true,
        );
        if !lt.is_valid() {
            return false;
        }
        if Self::sample_phase(ctx, own, target, &lt, 0.0, lt.t1) {
            return false;
        }
        let climb = Self::level_out_state(own, target, &lt, lt.t1);
        if Self::segment_conflict(ctx.conflict_det, ctx.b, ctx.t, &climb, lt.t2, ctx.traffic)
            || ctx
                .recovery_det
                .is_some_and(|det| {
                    Self::segment_conflict(det, ctx.b2, ctx.t2, &climb, lt.t2, ctx.traffic)
                })
        {
            return false;
        }
        if Self::sample_phase(ctx, own, target, &lt, lt.t2, lt.t3) {
            return false;
        }
        integer::no_conflict(ctx, &Self::level_out_state(own, target, &lt, lt.t3))
    }

    fn repulsive(ctx: &SearchContext<'_>, p: &KinematicBandsParameters, target: f64) -> bool {
        let own = ctx.ownship;
        let Some(repac) = ctx.vcrit() else {
            return true;
        };
        if almost_equals(target, own.s.z) {
            return true;
        }
        let sign = if target > own.s.z { 1.0 } else { -1.0 };
        let rate = if p.vertical_rate > 0.0 { p.vertical_rate } else { (target - own.s.z).abs() };
        vertical_repulsive_criterion(&own.v, &repac.v, &own.v.mk_vs(sign * rate), ctx.epsv)
    }

    fn target(range: &AxisRange, own: &TrafficState, k: i32, dir: bool) -> f64 {
        let sign = if dir { 1.0 } else { -1.0 };
        (own.s.z + sign * f64::from(k) * range.step).clamp(range.min, range.max)
    }
}

impl AxisModel for AltAxis {
    fn name(&self) -> &'static str {
        "altitude"
    }

    fn own_val(&self, own: &TrafficState) -> f64 {
        own.s.z
    }

    fn time_step(&self, _own: &TrafficState, p: &KinematicBandsParameters, _step: f64) -> f64 {
        if p.vertical_rate > 0.0 && p.vertical_accel > 0.0 {
            SAMPLE
        } else {
            0.0
        }
    }

    fn trajectory(
        &self,
        own: &TrafficState,
        p: &KinematicBandsParameters,
        t: f64,
        dir: bool,
    ) -> State {
        let goal = if dir { p.vertical_rate } else { -p.vertical_rate };
        vs_accel_until(&own.s, &own.v, t, goal, p.vertical_accel)
    }

    fn jump(&self, own: &TrafficState, val: f64) -> State {
        (vect3(own.s.x, own.s.y, val), own.v.mk_vs(0.0))
    }

    fn int_bands(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
    ) -> (Vec<Integerval>, f64) {
        let runs = green_runs(Self::grid_len(range), |j| {
            self.green(ctx, p, range.min + f64::from(j) * range.step)
        });
        (runs, range.min)
    }

    fn any_red(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
    ) -> bool {
        (0..=Self::grid_len(range)).any(|j| {
            !self.green(ctx, p, range.min + f64::from(j) * range.step)
        })
    }

    fn all_red(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
    ) -> bool {
        (0..=Self::grid_len(range)).all(|j| {
            !self.green(ctx, p, range.min + f64::from(j) * range.step)
        })
    }

    fn first_green(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
        dir: bool,
    ) -> Option<i32> {
        let own = ctx.ownship;
        let max = if dir { range.maxup(own.s.z) } else { range.maxdown(own.s.z) };
        (0..=max).find(|&k| self.green(ctx, p, Self::target(range, own, k, dir)))
    }
}
