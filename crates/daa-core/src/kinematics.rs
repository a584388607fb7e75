//! Kinematic projections of an aircraft state.
//!
//! A state is a `(position, velocity)` pair. Turns are coordinated turns at a
//! constant track rate, speed changes use constant acceleration, and altitude
//! changes use the three-phase level-out profile.

use serde::{Deserialize, Serialize};

use crate::units::G;
use crate::util::{almost_equals, root};
use crate::vect::{Vect3, Vect3Ext};

pub type State = (Vect3, Vect3);

/// Straight-line projection.
pub fn linear(so: &Vect3, vo: &Vect3, t: f64) -> State {
    (so.linear(vo, t), *vo)
}

/// Track rate (rad/s) for a coordinated turn at `bank` radians.
pub fn turn_rate(gs: f64, bank: f64) -> f64 {
    if almost_equals(bank, 0.0) || gs <= 0.0 {
        return 0.0;
    }
    G * bank.tan() / gs
}

/// Bank angle producing track rate `omega` at ground speed `gs`.
pub fn bank_angle(gs: f64, omega: f64) -> f64 {
    (gs * omega / G).atan()
}

/// State after turning for `t` seconds at track rate `omega`; positive turns right.
pub fn turn_omega(so: &Vect3, vo: &Vect3, t: f64, omega: f64) -> State {
    if almost_equals(omega, 0.0) {
        return linear(so, vo, t);
    }
    let a = omega * t;
    let (sin, cos) = a.sin_cos();
    let nv = Vect3::new(vo.x * cos + vo.y * sin, vo.y * cos - vo.x * sin, vo.z);
    let ns = Vect3::new(
        so.x + (vo.y - nv.y) / omega,
        so.y + (nv.x - vo.x) / omega,
        so.z + vo.z * t,
    );
    (ns, nv)
}

/// State after `t` seconds of constant ground speed acceleration `a`.
pub fn gs_accel(so: &Vect3, vo: &Vect3, t: f64, a: f64) -> State {
    let vo2 = vo.vect2();
    let dist = vo2.norm() * t + 0.5 * a * t * t;
    let hat = if vo2.norm() > 0.0 { vo2 / vo2.norm() } else { vo2 };
    let s2 = so.vect2() + hat * dist;
    let ns = Vect3::new(s2.x, s2.y, so.z + vo.z * t);
    (ns, vo.mk_gs(vo.gs() + a * t))
}

/// Accelerates at `|accel|` toward `goal_gs`, then holds it.
pub fn gs_accel_until(so: &Vect3, vo: &Vect3, t: f64, goal_gs: f64, accel: f64) -> State {
    let accel = accel.abs();
    let delta = (vo.gs() - goal_gs).abs();
    if delta == 0.0 || accel == 0.0 {
        return linear(so, vo, t);
    }
    let accel_time = delta / accel;
    let a = if goal_gs < vo.gs() { -accel } else { accel };
    if t <= accel_time {
        return gs_accel(so, vo, t, a);
    }
    let (ns, nv) = gs_accel(so, vo, accel_time, a);
    linear(&ns, &nv, t - accel_time)
}

/// State after `t` seconds of constant vertical acceleration `a`.
pub fn vs_accel(so: &Vect3, vo: &Vect3, t: f64, a: f64) -> State {
    let ns = Vect3::new(so.x + t * vo.x, so.y + t * vo.y, so.z + vo.z * t + 0.5 * a * t * t);
    (ns, vo.mk_vs(vo.vs() + a * t))
}

/// Accelerates vertically at `|accel|` toward `goal_vs`, then holds it.
pub fn vs_accel_until(so: &Vect3, vo: &Vect3, t: f64, goal_vs: f64, accel: f64) -> State {
    let accel = accel.abs();
    let delta = (vo.vs() - goal_vs).abs();
    if delta == 0.0 || accel == 0.0 {
        return linear(so, vo, t);
    }
    let accel_time = delta / accel;
    let a = if goal_vs < vo.vs() { -accel } else { accel };
    if t <= accel_time {
        return vs_accel(so, vo, t, a);
    }
    let (ns, _) = vs_accel(so, vo, accel_time, a);
    let nv = Vect3::new(vo.x, vo.y, goal_vs);
    linear(&ns, &nv, t - accel_time)
}

/// Phase boundaries of a level-out maneuver: acceleration ends at `t1`,
/// constant rate ends at `t2`, level at `t3`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelOutTimes {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub a1: f64,
    pub a2: f64,
}

impl LevelOutTimes {
    /// A negative first phase marks an overshoot.
    pub fn is_valid(&self) -> bool {
        self.t1 >= 0.0
    }

    fn shifted(self, dt: f64) -> Self {
        Self {
            t1: self.t1 + dt,
            t2: self.t2 + dt,
            t3: self.t3 + dt,
            ..self
        }
    }
}

fn v1(voz: f64, a1: f64, t: f64) -> f64 {
    voz + a1 * t
}

fn s1(voz: f64, a1: f64, t: f64) -> f64 {
    voz * t + 0.5 * a1 * t * t
}

fn t3(voz: f64, a: f64) -> f64 {
    -voz / a
}

fn s3(voz: f64, a: f64) -> f64 {
    s1(voz, a, t3(voz, a))
}

#[allow(clippy::too_many_arguments)]
fn level_out_times_from_rest_dir(
    s0z: f64,
    v0z: f64,
    climb_rate: f64,
    target_alt: f64,
    accel_up: f64,
    accel_down: f64,
    allow_rate_change: bool,
) -> LevelOutTimes {
    let alt_dir = if target_alt >= s0z { 1.0 } else { -1.0 };
    let mut climb_rate = alt_dir * climb_rate.abs();
    if allow_rate_change {
        climb_rate = alt_dir * climb_rate.abs().max(v0z.abs());
    }
    let s = target_alt - s0z;
    let a1 = if climb_rate >= v0z { accel_up } else { accel_down };
    let a2 = if target_alt >= s0z { accel_down } else { accel_up };
    let t1 = (climb_rate - v0z) / a1;

    if s.abs() >= (s1(v0z, a1, t1) + s3(v1(v0z, a1, t1), a2)).abs() {
        let t2 = (s - s1(v0z, a1, t1) - s3(v1(v0z, a1, t1), a2)) / climb_rate;
        return LevelOutTimes {
            t1,
            t2: t1 + t2,
            t3: t1 + t2 + t3(climb_rate, a2),
            a1,
            a2,
        };
    }
    let aa = 0.5 * a1 * (1.0 - a1 / a2);
    let bb = v0z * (1.0 - a1 / a2);
    let cc = -v0z * v0z / (2.0 * a2) - s;
    let t1 = match (root(aa, bb, cc, 1), root(aa, bb, cc, -1)) {
        (Some(r1), Some(r2)) if r1 < 0.0 => r2,
        (Some(r1), Some(r2)) if r2 < 0.0 => r1,
        (Some(r1), Some(r2)) => r1.min(r2),
        (Some(r), None) | (None, Some(r)) => r,
        (None, None) => -1.0,
    };
    LevelOutTimes {
        t1,
        t2: t1,
        t3: t1 + t3(v1(v0z, a1, t1), a2),
        a1,
        a2,
    }
}

/// Phase times to reach `target_alt` at `climb_rate` with accelerations
/// `accel_up > 0` and `accel_down < 0`.
#[allow(clippy::too_many_arguments)]
pub fn vs_level_out_times(
    s0z: f64,
    v0z: f64,
    climb_rate: f64,
    target_alt: f64,
    accel_up: f64,
    accel_down: f64,
    allow_rate_change: bool,
) -> LevelOutTimes {
    let sgnv = if v0z >= 0.0 { 1 } else { -1 };
    let alt_dir = if target_alt >= s0z { 1 } else { -1 };
    let s = target_alt - s0z;
    let a1 = if target_alt >= s0z { accel_up } else { accel_down };
    let a2 = if target_alt >= s0z { accel_down } else { accel_up };

    if sgnv == alt_dir || almost_equals(v0z, 0.0) {
        if s.abs() >= s3(v0z, a2).abs() {
            return level_out_times_from_rest_dir(
                s0z,
                v0z,
                climb_rate,
                target_alt,
                accel_up,
                accel_down,
                allow_rate_change,
            );
        }
        // Stop first, then come back.
        level_out_times_from_rest_dir(
            s0z + s3(v0z, a2),
            0.0,
            climb_rate,
            target_alt,
            accel_up,
            accel_down,
            allow_rate_change,
        )
            .shifted(-v0z / a2)
    } else {
        level_out_times_from_rest_dir(
            s0z + s3(v0z, a1),
            0.0,
            climb_rate,
            target_alt,
            accel_up,
            accel_down,
            allow_rate_change,
        )
            .shifted(-v0z / a1)
    }
}

/// Altitude and vertical speed at time `t` along a level-out profile.
pub fn vs_level_out_calc(
    soz: f64,
    voz: f64,
    target_alt: f64,
    lt: &LevelOutTimes,
    t: f64,
) -> (f64, f64) {
    let LevelOutTimes { t1, t2, t3, a1, a2 } = *lt;
    if t <= t1 {
        (soz + s1(voz, a1, t), voz + a1 * t)
    } else if t <= t2 {
        (soz + s1(voz, a1, t1) + v1(voz, a1, t1) * (t - t1), voz + a1 * t1)
    } else if t <= t3 {
        (
            soz + s1(voz, a1, t1) + v1(voz, a1, t1) * (t2 - t1) + s1(v1(voz, a1, t1), a2, t - t2),
            voz + a1 * t1 + a2 * (t - t2),
        )
    } else {
        (target_alt, 0.0)
    }
}

/// State at `t` of a symmetric (`accel`, `-accel`) level-out to `target_alt`.
pub fn vs_level_out(
    so: &Vect3,
    vo: &Vect3,
    t: f64,
    climb_rate: f64,
    target_alt: f64,
    accel: f64,
) -> State {
    let lt = vs_level_out_times(so.z, vo.z, climb_rate, target_alt, accel, -accel, true);
    level_out_state(so, vo, target_alt, &lt, t)
}

fn level_out_state(so: &Vect3, vo: &Vect3, target_alt: f64, lt: &LevelOutTimes, t: f64) -> State {
    let (nz, nvs) = vs_level_out_calc(so.z, vo.z, target_alt, lt, t);
    let mut ns = so.linear(vo, t);
    ns.z = nz;
    (ns, vo.mk_vs(nvs))
}

/// Final state and time of a level-out, or `None` when the maneuver overshoots.
pub fn vs_level_out_final(
    so: &Vect3,
    vo: &Vect3,
    climb_rate: f64,
    target_alt: f64,
    accel: f64,
) -> Option<(State, f64)> {
    let lt = vs_level_out_times(so.z, vo.z, climb_rate, target_alt, accel, -accel, true);
    if !lt.is_valid() {
        return None;
    }
    Some((level_out_state(so, vo, target_alt, &lt, lt.t3), lt.t3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{DEG, FPM, FT, KN};
    use crate::vect::{from_trk_gs_vs, vect3};
    use std::f64::consts::PI;

    #[test]
    fn test_half_turn_returns_reversed() {
        let vo = from_trk_gs_vs(0.0, 100.0, 0.0);
        let omega = 3.0 * DEG;
        let (s, v) = turn_omega(&Vect3::zeros(), &vo, PI / omega, omega);
        assert!((v.trk() - PI).abs() < 1e-9);
        // Right turn ends a diameter to the east.
        assert!((s.x - 2.0 * 100.0 / omega).abs() < 1e-6);
        assert!(s.y.abs() < 1e-6);
    }

    #[test]
    fn test_turn_rate_round_trip() {
        let gs = 250.0 * KN;
        let omega = turn_rate(gs, 25.0 * DEG);
        assert!((bank_angle(gs, omega) - 25.0 * DEG).abs() < 1e-12);
        assert_eq!(turn_rate(gs, 0.0), 0.0);
    }

    #[test]
    fn test_gs_accel_until_holds_goal() {
        let vo = from_trk_gs_vs(0.0, 100.0, 0.0);
        let (s, v) = gs_accel_until(&Vect3::zeros(), &vo, 20.0, 110.0, 2.0);
        assert!((v.gs() - 110.0).abs() < 1e-9);
        // 5 s accelerating covers 525 m, then 15 s at 110 m/s.
        assert!((s.y - (525.0 + 1650.0)).abs() < 1e-6);
    }

    #[test]
    fn test_vs_accel_until() {
        let vo = vect3(0.0, 100.0, 0.0);
        let (s, v) = vs_accel_until(&Vect3::zeros(), &vo, 10.0, 10.0, 2.0);
        assert!((v.z - 10.0).abs() < 1e-9);
        assert!((s.z - (25.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_level_out_reaches_target() {
        let so = vect3(0.0, 0.0, 5000.0 * FT);
        let vo = vect3(0.0, 200.0 * KN, 0.0);
        let target = 6000.0 * FT;
        let ((s, v), t3) = vs_level_out_final(&so, &vo, 2000.0 * FPM, target, 0.3 * G).unwrap();
        assert!((s.z - target).abs() < 1e-6);
        assert!(v.z.abs() < 1e-9);
        assert!(t3 > 0.0);
        let (mid, _) = vs_level_out(&so, &vo, t3 / 2.0, 2000.0 * FPM, target, 0.3 * G);
        assert!(mid.z > so.z && mid.z < target);
    }

    #[test]
    fn test_level_out_against_current_climb() {
        let so = vect3(0.0, 0.0, 1000.0);
        let vo = vect3(0.0, 100.0, 10.0);
        let lt = vs_level_out_times(so.z, vo.z, 5.0, 900.0, 2.0, -2.0, true);
        assert!(lt.is_valid());
        let (z, vz) = vs_level_out_calc(so.z, vo.z, 900.0, &lt, lt.t3);
        assert!((z - 900.0).abs() < 1e-6);
        assert!(vz.abs() < 1e-6);
    }
}
