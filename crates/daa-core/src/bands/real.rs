//! Real-valued bands over one maneuver axis.
//!
//! [`KinematicRealBands`] turns the integer step search into colored
//! intervals of the axis, one conflict-free set per alert level, and adds
//! recovery bands, resolutions and region queries on top.

use std::cell::OnceCell;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::KinematicBandsCore;
use super::integer::{self, SearchContext, Step, StepModel};
use super::parameters::KinematicBandsParameters;
use super::{BandsRange, BandsRegion};
use crate::detection::{CDCylinder, Detection3D};
use crate::interval::{Integerval, Interval, IntervalSet};
use crate::kinematics::State;
use crate::traffic::TrafficState;
use crate::util::{almost_equals, almost_geq, almost_greater, almost_leq, modulo};

/// Extent, granularity and wrap-around of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Lower bound, relative to the current value when `rel` is set
    pub min: f64,
    /// Upper bound, relative to the current value when `rel` is set
    pub max: f64,
    pub rel: bool,
    /// Bands wrap around modulo this value when positive
    pub modulo: f64,
    pub step: f64,
    /// Compute recovery bands when the conflict level saturates
    pub recovery: bool,
}

impl AxisRange {
    pub fn absolute(min: f64, max: f64, step: f64, recovery: bool) -> Self {
        Self {
            min,
            max,
            rel: false,
            modulo: 0.0,
            step,
            recovery,
        }
    }

    /// Range `[min, max]` around the current value, `min <= 0 <= max`.
    pub fn relative(min: f64, max: f64, modulo: f64, step: f64) -> Self {
        Self {
            min,
            max,
            rel: true,
            modulo,
            step,
            recovery: false,
        }
    }

    pub fn with_recovery(mut self, recovery: bool) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn mod_val(&self, val: f64) -> f64 {
        if self.modulo > 0.0 {
            modulo(val, self.modulo)
        } else {
            val
        }
    }

    /// Whether bands can be computed around the current value `val`.
    pub fn accepts(&self, val: f64) -> bool {
        if !(self.step > 0.0 && self.min.is_finite() && self.max.is_finite()) {
            return false;
        }
        let around = if self.rel {
            self.min <= 0.0 && self.max >= 0.0
        } else {
            self.min <= val && val <= self.max
        };
        let max_bound = if self.rel { self.modulo / 2.0 } else { self.modulo };
        around
            && self.modulo >= 0.0
            && (self.modulo == 0.0
                || (almost_leq(self.max - self.min, self.modulo)
                    && almost_leq(self.max, max_bound)))
    }

    /// Covers the whole circle.
    pub fn is_circular(&self) -> bool {
        self.modulo > 0.0 && almost_equals(self.max - self.min, self.modulo)
    }

    /// Lowest value of the band; may exceed [`max_val`](Self::max_val)
    /// when the range wraps.
    pub fn min_val(&self, val: f64) -> f64 {
        if self.is_circular() {
            0.0
        } else if self.rel {
            self.mod_val(val + self.min)
        } else {
            self.min
        }
    }

    pub fn max_val(&self, val: f64) -> f64 {
        if self.is_circular() {
            self.modulo
        } else if self.rel {
            self.mod_val(val + self.max)
        } else {
            self.max
        }
    }

    /// Non-negative distance from `val` down to the minimum.
    pub fn min_rel(&self, val: f64) -> f64 {
        if self.is_circular() {
            self.modulo / 2.0
        } else if self.rel {
            -self.min
        } else {
            self.mod_val(val - self.min)
        }
    }

    /// Non-negative distance from `val` up to the maximum.
    pub fn max_rel(&self, val: f64) -> f64 {
        if self.is_circular() {
            self.modulo / 2.0
        } else if self.rel {
            self.max
        } else {
            self.mod_val(self.max - val)
        }
    }

    fn max_steps(&self, dist: f64) -> i32 {
        let n = (dist / self.step).ceil() as i32;
        if self.modulo > 0.0 && almost_greater(f64::from(n) * self.step, self.modulo / 2.0) {
            n - 1
        } else {
            n
        }
    }

    pub fn maxdown(&self, val: f64) -> i32 {
        self.max_steps(self.min_rel(val))
    }

    pub fn maxup(&self, val: f64) -> i32 {
        self.max_steps(self.max_rel(val))
    }

    /// Maps integer runs to `scal*k + add`, clipped to `[min, max]` with
    /// wrap-around.
    pub fn to_interval_set(
        &self,
        l: &[Integerval],
        scal: f64,
        add: f64,
        min: f64,
        max: f64,
    ) -> IntervalSet {
        let mut set = IntervalSet::new();
        let m = self.modulo;
        for ii in l {
            let lb = scal * f64::from(ii.lb) + add;
            let ub = scal * f64::from(ii.ub) + add;
            if m == 0.0 {
                set.almost_union(Interval::new(lb.max(min), ub.min(max)));
                continue;
            }
            let lb = self.mod_val(lb);
            let ub = self.mod_val(ub);
            if almost_equals(lb, ub) && ii.lb != ii.ub {
                if min <= max {
                    set.almost_union(Interval::new(min, max));
                } else {
                    set.almost_union(Interval::new(min, m));
                    set.almost_union(Interval::new(0.0, max));
                }
            } else if min <= max && lb <= ub {
                set.almost_union(Interval::new(lb.max(min), ub.min(max)));
            } else if min <= max {
                let mm = Interval::new(min, max);
                set.almost_union(Interval::new(lb, m).intersect(&mm));
                set.almost_union(Interval::new(0.0, ub).intersect(&mm));
            } else if lb <= ub {
                let lbub = Interval::new(lb, ub);
                set.almost_union(Interval::new(0.0, max).intersect(&lbub));
                set.almost_union(Interval::new(min, m).intersect(&lbub));
            } else {
                set.almost_union(Interval::new(lb.max(min), m));
                set.almost_union(Interval::new(0.0, ub.min(max)));
            }
        }
        set
    }

    fn full_set(&self, min: f64, max: f64) -> IntervalSet {
        let mut set = IntervalSet::new();
        if self.modulo == 0.0 || min <= max {
            set.almost_union(Interval::new(min, max));
        } else {
            set.almost_union(Interval::new(min, self.modulo));
            set.almost_union(Interval::new(0.0, max));
        }
        set
    }
}

/// Kinematics of one maneuver axis.
///
/// The search methods have generic step-based defaults; an axis whose
/// maneuvers are not a uniform sequence of steps overrides them.
pub trait AxisModel: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Current value of the axis for the ownship.
    fn own_val(&self, own: &TrafficState) -> f64;

    /// Seconds to move one `step` along the axis; zero when maneuvers are
    /// instantaneous.
    fn time_step(&self, own: &TrafficState, p: &KinematicBandsParameters, step: f64) -> f64;

    /// Ownship state after maneuvering `t` seconds toward `dir`.
    fn trajectory(
        &self,
        own: &TrafficState,
        p: &KinematicBandsParameters,
        t: f64,
        dir: bool,
    ) -> State;

    /// Ownship state right after an instantaneous change of the axis to `val`.
    fn jump(&self, own: &TrafficState, val: f64) -> State;

    /// Conflict-free runs of step indices and the axis value of index 0.
    fn int_bands(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
    ) -> (Vec<Integerval>, f64) {
        let val = self.own_val(ctx.ownship);
        let stepper = AxisStepper::new(self, ctx.ownship, p, range.step);
        (integer::kinematic_bands_combine(&stepper, ctx, range.maxdown(val), range.maxup(val)), val)
    }

    fn any_red(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
    ) -> bool {
        let val = self.own_val(ctx.ownship);
        let stepper = AxisStepper::new(self, ctx.ownship, p, range.step);
        integer::any_int_red(&stepper, ctx, range.maxdown(val), range.maxup(val), 0)
    }

    fn all_red(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
    ) -> bool {
        let val = self.own_val(ctx.ownship);
        let stepper = AxisStepper::new(self, ctx.ownship, p, range.step);
        integer::all_int_red(&stepper, ctx, range.maxdown(val), range.maxup(val), 0)
    }

    /// Steps from the current value to the first conflict-free one toward `dir`.
    fn first_green(
        &self,
        ctx: &SearchContext<'_>,
        range: &AxisRange,
        p: &KinematicBandsParameters,
        dir: bool,
    ) -> Option<i32> {
        let val = self.own_val(ctx.ownship);
        let max = if dir { range.maxup(val) } else { range.maxdown(val) };
        let stepper = AxisStepper::new(self, ctx.ownship, p, range.step);
        integer::first_green(&stepper, ctx, dir, max)
    }
}

/// [`StepModel`] of an axis around the ownship.
pub struct AxisStepper<'a, A: ?Sized> {
    axis: &'a A,
    own: &'a TrafficState,
    params: &'a KinematicBandsParameters,
    step: f64,
    tstep: f64,
}

impl<'a, A: AxisModel + ?Sized> AxisStepper<'a, A> {
    pub fn new(
        axis: &'a A,
        own: &'a TrafficState,
        params: &'a KinematicBandsParameters,
        step: f64,
    ) -> Self {
        Self {
            axis,
            own,
            params,
            step,
            tstep: axis.time_step(own, params, step),
        }
    }
}

impl<A: AxisModel + ?Sized> StepModel for AxisStepper<'_, A> {
    fn tstep(&self) -> f64 {
        self.tstep
    }

    fn step(&self, k: i32, dir: bool) -> Step {
        if self.instantaneous() {
            let sign = if dir { 1.0 } else { -1.0 };
            let val = self.axis.own_val(self.own) + sign * f64::from(k) * self.step;
            let (s, v) = self.axis.jump(self.own, val);
            return Step { s, v, t: 0.0 };
        }
        let t = f64::from(k) * self.tstep;
        let (s, v) = self.axis.trajectory(self.own, self.params, t, dir);
        Step { s, v, t }
    }
}

#[derive(Debug, Clone)]
struct Computed {
    /// Aircraft not in conflict but reachable into conflict, per alert level.
    peripheral: Vec<Vec<TrafficState>>,
    ranges: Vec<BandsRange>,
    /// NaN when no recovery bands were computed, negative infinity when
    /// no recovery is possible within the early alerting time.
    recovery_time: f64,
    /// Closest resolutions below and above the current value, per alert
    /// level. NaN when not in conflict, infinite when none exists.
    resolutions: Vec<Interval>,
}

impl Computed {
    fn empty(levels: usize) -> Self {
        Self {
            peripheral: vec![Vec::new(); levels],
            ranges: Vec::new(),
            recovery_time: f64::NAN,
            resolutions: Vec::new(),
        }
    }
}

/// Bands of one axis, cached until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct KinematicRealBands<A> {
    axis: A,
    range: AxisRange,
    cache: OnceCell<Computed>,
}

impl<A: AxisModel> KinematicRealBands<A> {
    pub fn new(axis: A, range: AxisRange) -> Self {
        Self {
            axis,
            range,
            cache: OnceCell::new(),
        }
    }

    pub fn axis(&self) -> &A {
        &self.axis
    }

    pub fn range(&self) -> &AxisRange {
        &self.range
    }

    pub fn set_range(&mut self, range: AxisRange) {
        self.range = range;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.cache.take();
    }

    pub fn is_fresh(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn check_input(&self, own: &TrafficState) -> bool {
        own.is_valid() && self.range.accepts(self.axis.own_val(own))
    }

    pub fn min_val(&self, own: &TrafficState) -> f64 {
        self.range.min_val(self.axis.own_val(own))
    }

    pub fn max_val(&self, own: &TrafficState) -> f64 {
        self.range.max_val(self.axis.own_val(own))
    }

    fn instantaneous(&self, own: &TrafficState, p: &KinematicBandsParameters) -> bool {
        self.axis.time_step(own, p, self.range.step) <= 0.0
    }

    /// Conflict-free values of the axis.
    pub fn none_bands(&self, ctx: &SearchContext<'_>, p: &KinematicBandsParameters) -> IntervalSet {
        let val = self.axis.own_val(ctx.ownship);
        let (l, origin) = self.axis.int_bands(ctx, &self.range, p);
        self.range
            .to_interval_set(
                &l,
                self.range.step,
                origin,
                self.range.min_val(val),
                self.range.max_val(val),
            )
    }

    pub fn any_red(&self, ctx: &SearchContext<'_>, p: &KinematicBandsParameters) -> bool {
        self.axis.any_red(ctx, &self.range, p)
    }

    pub fn all_red(&self, ctx: &SearchContext<'_>, p: &KinematicBandsParameters) -> bool {
        self.axis.all_red(ctx, &self.range, p)
    }

    pub fn all_green(&self, ctx: &SearchContext<'_>, p: &KinematicBandsParameters) -> bool {
        !self.any_red(ctx, p)
    }

    pub fn any_green(&self, ctx: &SearchContext<'_>, p: &KinematicBandsParameters) -> bool {
        !self.all_red(ctx, p)
    }

    /// First conflict-free value toward `dir` (false is down). NaN when the
    /// current value is conflict-free, infinite when there is none.
    pub fn resolution(
        &self,
        ctx: &SearchContext<'_>,
        p: &KinematicBandsParameters,
        dir: bool,
    ) -> f64 {
        let sign = if dir { 1.0 } else { -1.0 };
        let val = self.axis.own_val(ctx.ownship);
        match self.axis.first_green(ctx, &self.range, p, dir) {
            Some(0) => f64::NAN,
            None => sign * f64::INFINITY,
            Some(k) if self.range.modulo > 0.0 => self.range.mod_val(
                val + sign * f64::from(k) * self.range.step,
            ),
            Some(k) => (val + sign * f64::from(k) * self.range.step).clamp(
                self.range.min_val(val),
                self.range.max_val(val),
            ),
        }
    }

    /// Some maneuver along this axis leads into conflict with `ac` within
    /// `alerting_time`.
    pub fn kinematic_conflict(
        &self,
        core: &KinematicBandsCore,
        ac: &TrafficState,
        det: &dyn Detection3D,
        alerting_time: f64,
    ) -> bool {
        let Some(own) = core.ownship() else {
            return false;
        };
        if !self.check_input(own) {
            return false;
        }
        let ctx = SearchContext::new(
            det,
            0.0,
            alerting_time,
            own,
            std::slice::from_ref(ac),
        ).with_criteria(
            core.criteria_ac(),
            core.epsilon_h(),
            core.epsilon_v(),
        );
        self.any_red(&ctx, core.parameters())
    }

    fn computed(&self, core: &KinematicBandsCore) -> &Computed {
        self.cache.get_or_init(|| self.compute(core))
    }

    pub fn ranges(&self, core: &KinematicBandsCore) -> &[BandsRange] {
        &self.computed(core).ranges
    }

    pub fn len(&self, core: &KinematicBandsCore) -> usize {
        self.ranges(core).len()
    }

    pub fn is_empty(&self, core: &KinematicBandsCore) -> bool {
        self.ranges(core).is_empty()
    }

    pub fn interval(&self, core: &KinematicBandsCore, i: usize) -> Interval {
        self.ranges(core).get(i).map_or(Interval::EMPTY, |r| r.interval)
    }

    pub fn region(&self, core: &KinematicBandsCore, i: usize) -> BandsRegion {
        self.ranges(core).get(i).map_or(BandsRegion::Unknown, |r| r.region)
    }

    /// Seconds until recovery bands become available; see [`Computed`].
    pub fn time_to_recovery(&self, core: &KinematicBandsCore) -> f64 {
        self.computed(core).recovery_time
    }

    /// Peripheral aircraft of `level`; 0 means the conflict level.
    pub fn peripheral_aircraft(&self, core: &KinematicBandsCore, level: usize) -> &[TrafficState] {
        let level = if level == 0 {
            core.alertor().conflict_alert_level()
        } else {
            level
        };
        level
            .checked_sub(1)
            .and_then(|i| self.computed(core).peripheral.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn rollover(&self, ranges: &[BandsRange]) -> bool {
        match (ranges.first(), ranges.last()) {
            (Some(first), Some(last)) => {
                self.range.modulo > 0.0
                    && almost_equals(first.interval.low, 0.0)
                    && almost_equals(last.interval.up, self.range.modulo)
            }
            _ => false,
        }
    }

    /// Index of the range holding `val`. A boundary belongs to the more
    /// severe of its two neighbors.
    pub fn range_of(&self, core: &KinematicBandsCore, val: f64) -> Option<usize> {
        let own = core.ownship()?;
        if !self.check_input(own) {
            return None;
        }
        let ranges = self.ranges(core);
        let last = ranges.len().checked_sub(1)?;
        let val = self.range.mod_val(val);
        let rov = self.rollover(ranges);
        for (i, r) in ranges.iter().enumerate() {
            let none = r.region.is_resolution_band();
            let order = r.region.order();
            let lb_close = none
                || (i > 0 && order <= ranges[i - 1].region.order())
                || (i == 0 && rov && order <= ranges[last].region.order());
            let ub_close = none
                || (i < last && order <= ranges[i + 1].region.order())
                || (i == last && rov && order <= ranges[0].region.order());
            if r.interval.contains(val, lb_close, ub_close) {
                return Some(i);
            }
        }
        if rov {
            almost_equals(val, 0.0).then_some(0)
        } else if almost_equals(val, self.min_val(own)) {
            Some(0)
        } else if almost_equals(val, self.max_val(own)) {
            Some(last)
        } else {
            None
        }
    }

    pub fn region_of(&self, core: &KinematicBandsCore, val: f64) -> BandsRegion {
        self.range_of(core, val)
            .map_or(BandsRegion::Unknown, |i| self.region(core, i))
    }

    /// Resolution at `level` (0 is the conflict level) toward `dir`. NaN
    /// when not in conflict or the level has no conflict region.
    pub fn compute_resolution(&self, core: &KinematicBandsCore, level: usize, dir: bool) -> f64 {
        let alertor = core.alertor();
        let level = if level == 0 {
            alertor.conflict_alert_level()
        } else {
            level
        };
        let computed = self.computed(core);
        let conflict_region = alertor.level(level).is_some_and(|l| l.region().is_conflict_band());
        if computed.ranges.is_empty() || !conflict_region {
            return f64::NAN;
        }
        computed
            .resolutions
            .get(level - 1)
            .map_or(f64::NAN, |r| if dir { r.up } else { r.low })
    }

    /// True when the resolution above the current value is the closer one.
    pub fn preferred_direction(&self, core: &KinematicBandsCore, level: usize) -> bool {
        let Some(own) = core.ownship() else {
            return false;
        };
        let up = self.compute_resolution(core, level, true);
        let down = self.compute_resolution(core, level, false);
        if !up.is_finite() {
            return false;
        }
        if !down.is_finite() {
            return true;
        }
        let val = self.axis.own_val(own);
        almost_leq(self.range.mod_val(up - val), self.range.mod_val(val - down))
    }

    /// Latest time at which a maneuver along this axis still avoids the
    /// conflict with `ac` at the conflict level. NaN when there is no such
    /// conflict, negative infinity when it is already too late.
    pub fn last_time_to_maneuver(&self, core: &KinematicBandsCore, ac: &TrafficState) -> f64 {
        let Some(own) = core.ownship() else {
            return f64::NAN;
        };
        let alertor = core.alertor();
        let Some(level) = alertor.level(alertor.conflict_alert_level()) else {
            return f64::NAN;
        };
        if !self.check_input(own) {
            return f64::NAN;
        }
        let det = level.detector();
        let t = level.early_alerting_time();
        let cd = det.conflict_detection(&own.s, &own.v, &ac.s, &ac.v, 0.0, t);
        if !cd.conflict() {
            return f64::NAN;
        }
        let mut pivot_red = cd.time_in();
        if pivot_red == 0.0 {
            return f64::NEG_INFINITY;
        }
        let mut pivot_green = 0.0;
        let mut pivot = pivot_green;
        while pivot_red - pivot_green > 0.5 {
            let ownship = own.linear_projection(pivot);
            let intruder = ac.linear_projection(pivot);
            let ctx = SearchContext::new(det, 0.0, t, &ownship, std::slice::from_ref(&intruder))
                .with_criteria(core.criteria_ac(), 0, 0);
            if det.violation(&ownship.s, &ownship.v, &intruder.s, &intruder.v)
                || self.all_red(&ctx, core.parameters())
            {
                pivot_red = pivot;
            } else {
                pivot_green = pivot;
            }
            pivot = (pivot_red + pivot_green) / 2.0;
        }
        if pivot_green == 0.0 {
            f64::NEG_INFINITY
        } else {
            pivot_green
        }
    }

    fn peripheral_at(
        &self,
        core: &KinematicBandsCore,
        own: &TrafficState,
        level: usize,
    ) -> Vec<TrafficState> {
        let Some(thr) = core.alertor().level(level) else {
            return Vec::new();
        };
        let det = thr.detector();
        let t = thr.alerting_time();
        core.traffic()
            .iter()
            .filter(|ac| {
                !det.conflict_detection(&own.s, &own.v, &ac.s, &ac.v, 0.0, t).conflict()
                    && self.kinematic_conflict(core, ac, det, t)
            })
            .cloned()
            .collect()
    }

    fn compute(&self, core: &KinematicBandsCore) -> Computed {
        let alertor = core.alertor();
        let n = alertor.most_severe_alert_level();
        let mut out = Computed::empty(n);
        let Some(own) = core.ownship() else {
            return out;
        };
        for (i, thr) in alertor.iter().enumerate() {
            if thr.region().is_conflict_band() {
                out.peripheral[i] = self.peripheral_at(core, own, i + 1);
            }
        }
        if !self.check_input(own) {
            return out;
        }

        let mut none_sets = Vec::new();
        let mut regions = Vec::new();
        let mut recovery = false;
        let mut level = 1;
        while level <= n && !recovery {
            let mut region = alertor.level(level).map_or(BandsRegion::Unknown, |l| l.region());
            if region.is_conflict_band() {
                let (noneset, recovery_time) =
                    self.compute_level(core, own, level, &out.peripheral[level - 1]);
                if !recovery_time.is_nan() {
                    recovery = true;
                    out.recovery_time = recovery_time;
                    region = alertor
                        .level(core.last_conflict_alert_level())
                        .map_or(region, |l| l.region());
                }
                out.resolutions.push(self.find_resolution(own, &noneset));
                none_sets.push(noneset);
                regions.push(region);
            } else {
                out.resolutions.push(Interval::new(f64::NAN, f64::NAN));
            }
            level += 1;
        }
        // Levels past a saturated one have no resolution.
        while level <= n {
            out.resolutions.push(Interval::new(f64::NEG_INFINITY, f64::INFINITY));
            level += 1;
        }
        out.ranges = self.color_bands(own, &none_sets, &regions, recovery);
        debug!(
            axis = self.axis.name(),
            ranges = out.ranges.len(),
            recovery_time = out.recovery_time,
            "Computed bands"
        );
        out
    }

    /// Conflict-free set of one level, and the recovery time (NaN when no
    /// recovery bands were needed).
    fn compute_level(
        &self,
        core: &KinematicBandsCore,
        own: &TrafficState,
        level: usize,
        peripheral: &[TrafficState],
    ) -> (IntervalSet, f64) {
        let val = self.axis.own_val(own);
        let min = self.range.min_val(val);
        let max = self.range.max_val(val);
        let conflict = core.conflict_aircraft(level);
        if peripheral.is_empty() && conflict.is_empty() {
            return (self.range.full_set(min, max), f64::NAN);
        }
        let noneset = self.compute_none_bands(core, own, level, peripheral);
        if self.range.recovery && level == core.alertor().conflict_alert_level() {
            if noneset.is_empty() {
                let alerting_set: Vec<TrafficState> =
                    peripheral.iter().chain(conflict).cloned().collect();
                return self.compute_recovery_bands(core, own, &alerting_set);
            }
            if self.instantaneous(own, core.parameters())
                && core.time_interval_of_violation(level).low == 0.0
            {
                return (noneset, 0.0);
            }
        }
        (noneset, f64::NAN)
    }

    fn compute_none_bands(
        &self,
        core: &KinematicBandsCore,
        own: &TrafficState,
        level: usize,
        peripheral: &[TrafficState],
    ) -> IntervalSet {
        let Some(thr) = core.alertor().level(level) else {
            return IntervalSet::new();
        };
        let p = core.parameters();
        let det = thr.detector();
        let base = SearchContext::new(det, 0.0, thr.alerting_time(), own, peripheral).with_criteria(
            core.criteria_ac(),
            core.epsilon_h(),
            core.epsilon_v(),
        );
        let near = self.none_bands(&base, p);
        let early = SearchContext {
            t: thr.early_alerting_time(),
            ..base.with_traffic(core.conflict_aircraft(level))
        };
        near.intersect(&self.none_bands(&early, p))
    }

    /// Bands that reach recovery separation from the aircraft in
    /// `alerting_set`, shrinking the recovery cylinder toward NMAC when
    /// collision-avoidance bands are enabled.
    fn compute_recovery_bands(
        &self,
        core: &KinematicBandsCore,
        own: &TrafficState,
        alerting_set: &[TrafficState],
    ) -> (IntervalSet, f64) {
        let mut recovery_time = f64::NEG_INFINITY;
        let alertor = core.alertor();
        let Some(thr) = alertor.level(alertor.conflict_alert_level()) else {
            return (IntervalSet::new(), recovery_time);
        };
        let p = core.parameters();
        let det = thr.detector();
        let t = thr.early_alerting_time();
        let nmac = CDCylinder::with_dimensions(p.horizontal_nmac, p.vertical_nmac);
        let base = SearchContext::new(&nmac, 0.0, t, own, alerting_set).with_criteria(
            core.recovery_ac(),
            core.epsilon_h(),
            core.epsilon_v(),
        );
        let mut noneset = self.none_bands(&base, p);
        if noneset.is_empty() {
            // Every maneuver crosses the NMAC cylinder.
            return (noneset, recovery_time);
        }
        let factor = 1.0 - p.ca_factor;
        let mut cyl = CDCylinder::with_dimensions(
            core.min_horizontal_recovery(),
            core.min_vertical_recovery(),
        );
        while cyl.d() > p.horizontal_nmac || cyl.h() > p.vertical_nmac {
            noneset = self.none_bands(&SearchContext { conflict_det: &cyl, ..base }, p);
            let solid_red = noneset.is_empty();
            if solid_red && !p.ca_bands {
                return (noneset, recovery_time);
            }
            if !solid_red {
                let recovering = |b: f64| SearchContext {
                    conflict_det: det,
                    recovery_det: Some(&cyl),
                    b,
                    t2: b,
                    ..base
                };
                let mut pivot_red = 0.0;
                let mut pivot_green = t + 1.0;
                let mut pivot = pivot_green - 1.0;
                while pivot_green - pivot_red > 0.5 {
                    if self.none_bands(&recovering(pivot), p).is_empty() {
                        pivot_red = pivot;
                    } else {
                        pivot_green = pivot;
                    }
                    pivot = (pivot_red + pivot_green) / 2.0;
                }
                recovery_time = if pivot_green <= t {
                    (pivot_green + p.recovery_stability_time).min(t)
                } else {
                    pivot_red
                };
                noneset = self.none_bands(&recovering(recovery_time), p);
                let solid_red = noneset.is_empty();
                if solid_red {
                    recovery_time = f64::NEG_INFINITY;
                }
                debug!(
                    axis = self.axis.name(),
                    d = cyl.d(),
                    h = cyl.h(),
                    recovery_time,
                    "Recovery bands search"
                );
                if !solid_red || !p.ca_bands {
                    return (noneset, recovery_time);
                }
            }
            cyl = CDCylinder::with_dimensions(cyl.d() * factor, cyl.h() * factor);
        }
        (noneset, recovery_time)
    }

    /// Paints the axis from the most severe level down: a value takes the
    /// region of the most severe level whose conflict-free set misses it.
    fn color_bands(
        &self,
        own: &TrafficState,
        none_sets: &[IntervalSet],
        regions: &[BandsRegion],
        recovery: bool,
    ) -> Vec<BandsRange> {
        let val = self.axis.own_val(own);
        let min = self.range.min_val(val);
        let max = self.range.max_val(val);
        let m = self.range.modulo;
        let green = if recovery {
            BandsRegion::Recovery
        } else {
            BandsRegion::None
        };
        let last_level = if recovery { none_sets.len().saturating_sub(1) } else { 0 };
        let color = |x: f64| {
            (last_level..none_sets.len())
                .rev()
                .find(|&level| !none_sets[level].in_cc(x))
                .map_or(green, |level| regions[level])
        };
        let segments = if m == 0.0 || min <= max {
            vec![(min, max)]
        } else {
            vec![(0.0, max), (min, m)]
        };

        let mut out: Vec<BandsRange> = Vec::new();
        for (lo, hi) in segments {
            let mut cuts = vec![lo, hi];
            for i in none_sets.iter().flat_map(IntervalSet::iter) {
                cuts.extend([i.low, i.up].into_iter().filter(|&x| x > lo && x < hi));
            }
            cuts.sort_by(f64::total_cmp);
            cuts.dedup_by(|a, b| almost_equals(*a, *b));
            if let Some(last) = cuts.last_mut() {
                *last = hi;
            }
            if cuts.len() < 2 {
                out.push(BandsRange::new(Interval::new(lo, hi), color(lo)));
                continue;
            }
            let first_of_segment = out.len();
            for w in cuts.windows(2) {
                let region = color((w[0] + w[1]) / 2.0);
                let merge = out.len() > first_of_segment
                    && out.last().is_some_and(|p| p.region == region);
                match out.last_mut() {
                    Some(prev) if merge => prev.interval.up = w[1],
                    _ => out.push(BandsRange::new(Interval::new(w[0], w[1]), region)),
                }
            }
        }
        out
    }

    /// Closest conflict-free values below and above the current value.
    fn find_resolution(&self, own: &TrafficState, noneset: &IntervalSet) -> Interval {
        let mut l = f64::NEG_INFINITY;
        let mut u = f64::INFINITY;
        let m = self.range.modulo;
        let val = self.axis.own_val(own);
        let sets: Vec<&Interval> = noneset.iter().collect();
        let n = sets.len();
        for (i, ii) in sets.iter().enumerate() {
            if ii.in_cc(val) {
                return Interval::new(f64::NAN, f64::NAN);
            }
            if ii.up < val {
                if i + 1 == n {
                    l = ii.up;
                    if m > 0.0 {
                        u = sets[0].low;
                        if almost_geq(self.range.mod_val(u - val), m / 2.0) {
                            u = f64::INFINITY;
                        }
                    }
                    break;
                } else if val < sets[i + 1].low {
                    l = ii.up;
                    u = sets[i + 1].low;
                    break;
                }
            } else if val < ii.low && i == 0 {
                if m > 0.0 {
                    l = sets[n - 1].up;
                    if almost_geq(self.range.mod_val(val - l), m / 2.0) {
                        l = f64::NEG_INFINITY;
                    }
                }
                u = ii.low;
                break;
            }
        }
        Interval::new(l, u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_relative_circular_range() {
        let r = AxisRange::relative(-PI, PI, 2.0 * PI, 1.0f64.to_radians());
        assert!(r.accepts(0.3));
        assert!(r.is_circular());
        assert_eq!(r.min_val(0.3), 0.0);
        assert_eq!(r.max_val(0.3), 2.0 * PI);
        assert_eq!(r.maxdown(0.3), 180);
        assert_eq!(r.maxup(0.3), 180);
    }

    #[test]
    fn test_absolute_range_checks_current_value() {
        let r = AxisRange::absolute(0.0, 100.0, 1.0, false);
        assert!(r.accepts(50.0));
        assert!(!r.accepts(150.0));
        assert_eq!(r.maxdown(50.0), 50);
        assert_eq!(r.maxup(50.0), 50);
        assert!(!AxisRange::absolute(0.0, 100.0, 0.0, false).accepts(50.0));
    }

    #[test]
    fn test_interval_set_clips_and_wraps() {
        let r = AxisRange::absolute(0.0, 100.0, 1.0, false);
        let set = r.to_interval_set(
            &[Integerval::new(-60, -10), Integerval::new(5, 80)],
            1.0,
            50.0,
            0.0,
            100.0,
        );
        let got: Vec<Interval> = set.iter().copied().collect();
        assert_eq!(got, vec![Interval::new(0.0, 40.0), Interval::new(55.0, 100.0)]);

        let deg = 1.0f64.to_radians();
        let circ = AxisRange::relative(-PI, PI, 2.0 * PI, deg);
        // Runs crossing north wrap into two pieces.
        let set = circ.to_interval_set(&[Integerval::new(-20, 10)], deg, 0.0, 0.0, 2.0 * PI);
        assert_eq!(set.len(), 2);
        assert!(set.in_cc(5.0 * deg));
        assert!(set.in_cc(2.0 * PI - 5.0 * deg));
        assert!(!set.in_cc(PI));
    }
}
