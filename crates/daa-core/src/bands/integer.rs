//! Integer band search along one maneuver axis.
//!
//! Step `k` in direction `dir` (false is left/down, true is right/up) is the
//! ownship state reached after maneuvering `k` steps. A step is conflict-free
//! when the straight-line continuation from that state has no conflict with
//! any aircraft inside the lookahead window. The search stops at the first
//! step that crosses a loss of separation or breaks the repulsive criteria
//! against the designated aircraft.

use crate::criteria::{horizontal_repulsive_criterion, vertical_repulsive_criterion};
use crate::detection::Detection3D;
use crate::interval::Integerval;
use crate::traffic::TrafficState;
use crate::util::almost_equals;
use crate::vect::{Vect3, Vect3Ext};

/// Ownship state after `k` steps, reached `t` seconds from now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub s: Vect3,
    pub v: Vect3,
    pub t: f64,
}

/// Maps a step index to an ownship state.
pub trait StepModel {
    /// Seconds per step. Zero means the maneuver is instantaneous and every
    /// step is reached at time 0.
    fn tstep(&self) -> f64;

    fn step(&self, k: i32, dir: bool) -> Step;

    fn instantaneous(&self) -> bool {
        self.tstep() <= 0.0
    }
}

/// Everything the search needs besides the step model.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub conflict_det: &'a dyn Detection3D,
    /// Detector checked over `[b2, t2]` on top of the conflict detector.
    pub recovery_det: Option<&'a dyn Detection3D>,
    pub b: f64,
    pub t: f64,
    pub b2: f64,
    pub t2: f64,
    pub ownship: &'a TrafficState,
    pub traffic: &'a [TrafficState],
    /// Aircraft the repulsive criteria are checked against.
    pub repac: Option<&'a TrafficState>,
    pub epsh: i32,
    pub epsv: i32,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        conflict_det: &'a dyn Detection3D,
        b: f64,
        t: f64,
        ownship: &'a TrafficState,
        traffic: &'a [TrafficState],
    ) -> Self {
        Self {
            conflict_det,
            recovery_det: None,
            b,
            t,
            b2: 0.0,
            t2: b,
            ownship,
            traffic,
            repac: None,
            epsh: 0,
            epsv: 0,
        }
    }

    pub fn with_recovery(mut self, det: Option<&'a dyn Detection3D>) -> Self {
        self.recovery_det = det;
        self
    }

    pub fn with_criteria(mut self, repac: Option<&'a TrafficState>, epsh: i32, epsv: i32) -> Self {
        self.repac = repac;
        self.epsh = epsh;
        self.epsv = epsv;
        self
    }

    /// Same search restricted to other traffic.
    pub fn with_traffic(mut self, traffic: &'a [TrafficState]) -> Self {
        self.traffic = traffic;
        self
    }

    pub fn hcrit(&self) -> Option<&'a TrafficState> {
        self.repac.filter(|_| self.epsh != 0)
    }

    pub fn vcrit(&self) -> Option<&'a TrafficState> {
        self.repac.filter(|_| self.epsv != 0)
    }
}

fn los_at(det: &dyn Detection3D, st: &Step, ac: &TrafficState) -> bool {
    let si = ac.s.linear(&ac.v, st.t);
    det.violation(&st.s, &st.v, &si, &ac.v)
}

pub fn any_los_aircraft(det: &dyn Detection3D, st: &Step, traffic: &[TrafficState]) -> bool {
    traffic.iter().any(|ac| los_at(det, st, ac))
}

/// Conflict in `[b, t]` for the straight-line continuation from `st`.
fn cd_future_traj(det: &dyn Detection3D, b: f64, t: f64, st: &Step, ac: &TrafficState) -> bool {
    if st.t > t || b >= t {
        return false;
    }
    let si = ac.s.linear(&ac.v, st.t);
    if b > st.t {
        return det.conflict(&st.s, &st.v, &si, &ac.v, b - st.t, t - st.t);
    }
    if almost_equals(t, st.t) {
        return det.violation(&st.s, &st.v, &si, &ac.v);
    }
    det.conflict(&st.s, &st.v, &si, &ac.v, 0.0, t - st.t)
}

pub fn any_conflict_aircraft(
    det: &dyn Detection3D,
    b: f64,
    t: f64,
    st: &Step,
    traffic: &[TrafficState],
) -> bool {
    traffic.iter().any(|ac| cd_future_traj(det, b, t, st, ac))
}

pub fn no_conflict(ctx: &SearchContext<'_>, st: &Step) -> bool {
    !any_conflict_aircraft(ctx.conflict_det, ctx.b, ctx.t, st, ctx.traffic)
        && !ctx
            .recovery_det
            .is_some_and(|det| any_conflict_aircraft(det, ctx.b2, ctx.t2, st, ctx.traffic))
}

fn first_los_step(
    model: &dyn StepModel,
    det: &dyn Detection3D,
    dir: bool,
    min: i32,
    max: i32,
    traffic: &[TrafficState],
) -> Option<i32> {
    (min.max(0)..=max).find(|&k| any_los_aircraft(det, &model.step(k, dir), traffic))
}

/// First step index reached inside `[b, t]`, and the last one, capped at `max`.
fn step_window(tstep: f64, b: f64, t: f64, max: i32) -> (i32, i32) {
    let first = (b / tstep).ceil() as i32;
    let last = if t.is_finite() {
        ((t / tstep).floor() as i32).min(max)
    } else {
        max
    };
    (first, last)
}

fn first_los_search_index(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    dir: bool,
    max: i32,
) -> i32 {
    if model.instantaneous() {
        return max + 1;
    }
    let tstep = model.tstep();
    let (k, n) = step_window(tstep, ctx.b, ctx.t, max);
    let los = first_los_step(model, ctx.conflict_det, dir, k, n, ctx.traffic).unwrap_or(max + 1);
    let los_init = ctx
        .recovery_det
        .and_then(|det| {
            let (k2, n2) = step_window(tstep, ctx.b2, ctx.t2, max);
            first_los_step(model, det, dir, k2, n2, ctx.traffic)
        })
        .unwrap_or(max + 1);
    los.min(los_init)
}

/// Average velocity over step `k`, or the step velocity when instantaneous.
fn linvel(model: &dyn StepModel, dir: bool, k: i32) -> Vect3 {
    if model.instantaneous() {
        return model.step(k, dir).v;
    }
    let s1 = model.step(k + 1, dir).s;
    let s0 = model.step(k, dir).s;
    (s1 - s0) / model.tstep()
}

fn repulsive_at(
    model: &dyn StepModel,
    dir: bool,
    k: i32,
    own: &TrafficState,
    repac: &TrafficState,
    epsh: i32,
) -> bool {
    if k == 0 {
        return true;
    }
    let so = own.s.vect2();
    let vo = own.v.vect2();
    let si = repac.s.vect2();
    let vi = repac.v.vect2();
    if model.instantaneous() {
        let nvo = model.step(k, dir).v.vect2();
        return horizontal_repulsive_criterion(&(so - si), &vo, &vi, &nvo, epsh);
    }
    if k == 1
        && !horizontal_repulsive_criterion(
            &(so - si),
            &vo,
            &vi,
            &linvel(model, dir, 0).vect2(),
            epsh,
        )
    {
        return false;
    }
    let st = model.step(k, dir);
    let sit = si + vi * st.t;
    let s = st.s.vect2() - sit;
    let vot = st.v.vect2();
    let vop = linvel(model, dir, k - 1).vect2();
    let vok = linvel(model, dir, k).vect2();
    horizontal_repulsive_criterion(&s, &vop, &vi, &vot, epsh)
        && horizontal_repulsive_criterion(&s, &vot, &vi, &vok, epsh)
        && horizontal_repulsive_criterion(&s, &vop, &vi, &vok, epsh)
}

fn vert_repul_at(
    model: &dyn StepModel,
    dir: bool,
    k: i32,
    own: &TrafficState,
    repac: &TrafficState,
    epsv: i32,
) -> bool {
    if k == 0 {
        return true;
    }
    let vi = repac.v;
    if model.instantaneous() {
        return vertical_repulsive_criterion(&own.v, &vi, &model.step(k, dir).v, epsv);
    }
    if k == 1 && !vertical_repulsive_criterion(&own.v, &vi, &linvel(model, dir, 0), epsv) {
        return false;
    }
    let vot = model.step(k, dir).v;
    let vop = linvel(model, dir, k - 1);
    let vok = linvel(model, dir, k);
    vertical_repulsive_criterion(&vop, &vi, &vot, epsv)
        && vertical_repulsive_criterion(&vot, &vi, &vok, epsv)
        && vertical_repulsive_criterion(&vop, &vi, &vok, epsv)
}

fn first_nonrepulsive_step(
    model: &dyn StepModel,
    dir: bool,
    max: i32,
    own: &TrafficState,
    repac: &TrafficState,
    epsh: i32,
) -> Option<i32> {
    (0..=max).find(|&k| !repulsive_at(model, dir, k, own, repac, epsh))
}

fn first_nonvert_repul_step(
    model: &dyn StepModel,
    dir: bool,
    max: i32,
    own: &TrafficState,
    repac: &TrafficState,
    epsv: i32,
) -> Option<i32> {
    (0..=max).find(|&k| !vert_repul_at(model, dir, k, own, repac, epsv))
}

/// First step beyond which the search is pointless: a loss of separation
/// along the maneuver or a non-repulsive step.
fn bands_search_index(model: &dyn StepModel, ctx: &SearchContext<'_>, dir: bool, max: i32) -> i32 {
    let first_los = first_los_search_index(model, ctx, dir, max);
    let first_prob_h = match ctx.hcrit() {
        Some(repac) if first_los > 0 => {
            first_nonrepulsive_step(
                model,
                dir,
                first_los - 1,
                ctx.ownship,
                repac,
                ctx.epsh,
            ).unwrap_or(max + 1)
        }
        _ => max + 1,
    };
    let first_prob_hl = first_los.min(first_prob_h);
    let first_prob_v = match ctx.vcrit() {
        Some(repac) if first_prob_hl > 0 => {
            first_nonvert_repul_step(
                model,
                dir,
                first_prob_hl - 1,
                ctx.ownship,
                repac,
                ctx.epsv,
            ).unwrap_or(max + 1)
        }
        _ => max + 1,
    };
    first_prob_hl.min(first_prob_v)
}

/// Maximal runs of `0..=max` where `green` holds.
pub fn green_runs(max: i32, mut green: impl FnMut(i32) -> bool) -> Vec<Integerval> {
    let mut runs = Vec::new();
    let mut start: Option<i32> = None;
    for k in 0..=max {
        match (start, green(k)) {
            (Some(_), true) => {}
            (Some(d), false) => {
                runs.push(Integerval::new(d, k - 1));
                start = None;
            }
            (None, true) => start = Some(k),
            (None, false) => {}
        }
    }
    if let Some(d) = start {
        runs.push(Integerval::new(d, max));
    }
    runs
}

pub fn traj_conflict_only_bands(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    dir: bool,
    max: i32,
) -> Vec<Integerval> {
    green_runs(max, |k| no_conflict(ctx, &model.step(k, dir)))
}

fn kinematic_bands(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    dir: bool,
    max: i32,
) -> Vec<Integerval> {
    let bsi = bands_search_index(model, ctx, dir, max);
    if bsi == 0 {
        return Vec::new();
    }
    traj_conflict_only_bands(model, ctx, dir, bsi - 1)
}

/// Negates every run and reverses the list, turning left-steps into
/// negative indices in increasing order.
pub fn neg(l: &mut [Integerval]) {
    l.reverse();
    for i in l.iter_mut() {
        *i = Integerval::new(-i.ub, -i.lb);
    }
}

/// Appends `r` to `l`, merging the boundary runs when they touch.
pub fn append_intband(l: &mut Vec<Integerval>, mut r: Vec<Integerval>) {
    if let (Some(last), Some(first)) = (l.last_mut(), r.first()) {
        if first.lb - last.ub <= 1 {
            last.ub = first.ub;
            r.remove(0);
        }
    }
    l.extend(r);
}

/// Conflict-free runs over `[-maxl, maxr]`.
pub fn kinematic_bands_combine(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    maxl: i32,
    maxr: i32,
) -> Vec<Integerval> {
    let mut l = kinematic_bands(model, ctx, false, maxl);
    let r = kinematic_bands(model, ctx, true, maxr);
    neg(&mut l);
    append_intband(&mut l, r);
    l
}

/// First conflict-free step in `dir`, or `None` when a loss of separation or
/// a criteria violation is reached first.
pub fn first_green(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    dir: bool,
    max: i32,
) -> Option<i32> {
    let hcrit = ctx.hcrit();
    let vcrit = ctx.vcrit();
    for k in 0..=max {
        let st = model.step(k, dir);
        let blocked =
            (st.t >= ctx.b && st.t <= ctx.t && any_los_aircraft(ctx.conflict_det, &st, ctx.traffic))
            || ctx.recovery_det.is_some_and(|det| {
                st.t >= ctx.b2 && st.t <= ctx.t2 && any_los_aircraft(det, &st, ctx.traffic)
            })
            || hcrit.is_some_and(|ac| !repulsive_at(model, dir, k, ctx.ownship, ac, ctx.epsh))
            || vcrit.is_some_and(|ac| !vert_repul_at(model, dir, k, ctx.ownship, ac, ctx.epsv));
        if blocked {
            return None;
        }
        if no_conflict(ctx, &st) {
            return Some(k);
        }
    }
    None
}

/// No conflict-free step on the requested side(s): `dir < 0` left only,
/// `dir > 0` right only, `0` both.
pub fn all_int_red(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    maxl: i32,
    maxr: i32,
    dir: i32,
) -> bool {
    let left = dir > 0 || first_green(model, ctx, false, maxl).is_none();
    let right = dir < 0 || first_green(model, ctx, true, maxr).is_none();
    left && right
}

fn any_conflict_step(
    model: &dyn StepModel,
    det: &dyn Detection3D,
    b: f64,
    t: f64,
    dir: bool,
    max: i32,
    traffic: &[TrafficState],
) -> bool {
    (0..=max).any(|k| any_conflict_aircraft(det, b, t, &model.step(k, dir), traffic))
}

fn red_band_exist(model: &dyn StepModel, ctx: &SearchContext<'_>, dir: bool, max: i32) -> bool {
    ctx.hcrit()
        .is_some_and(|ac| {
            first_nonrepulsive_step(model, dir, max, ctx.ownship, ac, ctx.epsh).is_some()
        })
        || ctx
            .vcrit()
            .is_some_and(|ac| {
                first_nonvert_repul_step(model, dir, max, ctx.ownship, ac, ctx.epsv).is_some()
            })
        || any_conflict_step(model, ctx.conflict_det, ctx.b, ctx.t, dir, max, ctx.traffic)
        || ctx
            .recovery_det
            .is_some_and(|det| any_conflict_step(model, det, ctx.b2, ctx.t2, dir, max, ctx.traffic))
}

/// Some step on the requested side(s) is in conflict.
pub fn any_int_red(
    model: &dyn StepModel,
    ctx: &SearchContext<'_>,
    maxl: i32,
    maxr: i32,
    dir: i32,
) -> bool {
    (dir <= 0 && red_band_exist(model, ctx, false, maxl))
        || (dir >= 0 && red_band_exist(model, ctx, true, maxr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::CDCylinder;
    use crate::vect::{vect3, Vect3Ext};

    /// Instantaneous track change of `k` degrees.
    struct InstantTrack<'a> {
        own: &'a TrafficState,
    }

    impl StepModel for InstantTrack<'_> {
        fn tstep(&self) -> f64 {
            0.0
        }

        fn step(&self, k: i32, dir: bool) -> Step {
            let delta = if dir { f64::from(k) } else { -f64::from(k) };
            let v = self.own.v.mk_trk(self.own.v.trk() + delta.to_radians());
            Step { s: self.own.s, v, t: 0.0 }
        }
    }

    #[test]
    fn test_green_runs() {
        let runs = green_runs(9, |k| !(3..=5).contains(&k));
        assert_eq!(runs, vec![Integerval::new(0, 2), Integerval::new(6, 9)]);
        assert!(green_runs(4, |_| false).is_empty());
        assert_eq!(green_runs(0, |_| true), vec![Integerval::new(0, 0)]);
    }

    #[test]
    fn test_neg_and_append() {
        let mut l = vec![Integerval::new(0, 2), Integerval::new(5, 7)];
        neg(&mut l);
        assert_eq!(l, vec![Integerval::new(-7, -5), Integerval::new(-2, 0)]);
        append_intband(&mut l, vec![Integerval::new(0, 4)]);
        assert_eq!(l, vec![Integerval::new(-7, -5), Integerval::new(-2, 4)]);
        append_intband(&mut l, vec![Integerval::new(6, 8)]);
        assert_eq!(l.len(), 3);
    }

    #[test]
    fn test_head_on_track_bands_are_symmetric() {
        let own = TrafficState::new("own", Vect3::zeros(), vect3(0.0, 100.0, 0.0));
        let intruder = TrafficState::new("ac", vect3(0.0, 20000.0, 0.0), vect3(0.0, -100.0, 0.0));
        let traffic = vec![intruder];
        let det = CDCylinder::with_dimensions(1000.0, 300.0);
        let ctx = SearchContext::new(&det, 0.0, 300.0, &own, &traffic);
        let model = InstantTrack { own: &own };
        let l = kinematic_bands_combine(&model, &ctx, 180, 180);
        assert_eq!(l.len(), 2);
        let (left, right) = (l[0], l[1]);
        assert_eq!(left.lb, -180);
        assert_eq!(right.ub, 180);
        // Current track is red, and the red band is centered on it.
        assert!(left.ub < 0 && right.lb > 0);
        assert_eq!(left.ub, -right.lb);
        assert_eq!(first_green(&model, &ctx, true, 180), Some(right.lb));
        assert!(any_int_red(&model, &ctx, 180, 180, 0));
        assert!(!all_int_red(&model, &ctx, 180, 180, 0));
    }

    #[test]
    fn test_future_conflict_window() {
        let det = CDCylinder::with_dimensions(1000.0, 300.0);
        let ac = TrafficState::new("ac", vect3(5000.0, 0.0, 0.0), Vect3::zeros());
        let st = Step { s: Vect3::zeros(), v: vect3(100.0, 0.0, 0.0), t: 10.0 };
        // Reached at t=10; loss starts 40 s later.
        assert!(cd_future_traj(&det, 0.0, 60.0, &st, &ac));
        assert!(!cd_future_traj(&det, 0.0, 45.0, &st, &ac));
        assert!(!cd_future_traj(&det, 0.0, 5.0, &st, &ac));
        assert!(!cd_future_traj(&det, 60.0, 60.0, &st, &ac));
    }
}
