//! Implicit coordination and repulsiveness criteria.
//!
//! Two aircraft that each evaluate these functions on their own view of the
//! encounter pick compatible maneuver directions: the horizontal epsilon
//! comes from the sign of `det(v, s)`, the vertical one from the geometry of
//! the conflict, with ties broken on the aircraft identifiers.

use crate::detection::{cd2d, cd3d};
use crate::horizontal::{self, ENTRY};
use crate::units::{DEG, FPM, KN};
use crate::util::{almost_equals, almost_equals_eps, sign, sq, turn_delta};
use crate::vect::{lift, Vect2, Vect2Ext, Vect3, Vect3Ext};

pub fn horizontal_coordination(s: &Vect3, v: &Vect3) -> i32 {
    sign(v.vect2().det(&s.vect2()))
}

/// Vertical epsilon for a pair, using the loss-of-separation rule when the
/// aircraft are already inside the `d`/`h` cylinder.
#[allow(clippy::too_many_arguments)]
pub fn vertical_coordination(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    d: f64,
    h: f64,
    nmac_d: f64,
    nmac_h: f64,
    ownship: &str,
    traffic: &str,
) -> i32 {
    if cd3d::los(s, d, h) {
        vertical_coordination_los(s, vo, vi, nmac_d, nmac_h, ownship, traffic)
    } else {
        vertical_coordination_conflict(s, &(vo - vi), d, ownship, traffic)
    }
}

fn vertical_coordination_conflict(
    s: &Vect3,
    v: &Vect3,
    d: f64,
    ownship: &str,
    traffic: &str,
) -> i32 {
    let s2 = s.vect2();
    let v2 = v.vect2();
    let a = v2.sqv();
    let b = s2.dot(&v2);
    let c = s2.sqv() - sq(d);
    let discr = sq(b) - a * c;
    let e = s.z * a - v.z * b;
    if almost_equals(v.z, 0.0) || v2.is_zero() || discr < 0.0 || eq(v.z, discr, e) {
        return break_symmetry(s, ownship, traffic);
    }
    if gt(v.z, discr, e) {
        -1
    } else {
        1
    }
}

/// Vertical epsilon inside the loss cylinder, decided against the NMAC volume.
pub fn vertical_coordination_los(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    nmac_d: f64,
    nmac_h: f64,
    ownship: &str,
    traffic: &str,
) -> i32 {
    break_symmetry(&vertical_decision_vect(s, vo, vi, nmac_d, nmac_h), ownship, traffic)
}

fn eq(a: f64, b: f64, e: f64) -> bool {
    a * e >= 0.0 && sq(a) * b == sq(e)
}

fn gt(a: f64, b: f64, e: f64) -> bool {
    if a >= 0.0 {
        e < 0.0 || sq(a) * b > sq(e)
    } else {
        e < 0.0 && sq(a) * b < sq(e)
    }
}

fn vertical_decision_vect(s: &Vect3, vo: &Vect3, vi: &Vect3, ca_d: f64, ca_h: f64) -> Vect3 {
    let s2 = s.vect2();
    let vo2 = vo.vect2();
    let vi2 = vi.vect2();
    let v = vo - vi;
    if (!s.is_zero() && cd3d::cd3d(s, vo, vi, ca_d, ca_h)) || almost_equals(vo.z, vi.z) {
        *s
    } else if vo2.almost_eq(&vi2) || s.is_zero() {
        v
    } else if s2.dot(&v.vect2()) <= 0.0 {
        s + v * cd2d::tcpa(&s2, &vo2, &vi2)
    } else {
        *s
    }
}

/// `+1` when ownship should take the upper side, `-1` otherwise. With no
/// vertical separation the reversed identifiers are compared.
pub fn break_symmetry(s: &Vect3, ownship: &str, traffic: &str) -> i32 {
    if almost_equals(s.z, 0.0) {
        let own: String = ownship.chars().rev().collect();
        let traf: String = traffic.chars().rev().collect();
        if own <= traf {
            1
        } else {
            -1
        }
    } else if s.z > 0.0 {
        1
    } else {
        -1
    }
}

fn tangent_ratio(sp: &Vect2, d: f64) -> f64 {
    (sp.sqv() - sq(d)).sqrt() / d
}

/// Relative velocity `v` passes the protected circle on the `eps` side.
pub fn horizontal_criterion(sp: &Vect2, v: &Vect2, d: f64, eps: i32) -> bool {
    sp.dot(v) >= tangent_ratio(sp, d) * f64::from(eps) * sp.det(v)
}

fn closed_region_3d(s: &Vect3, p: &Vect3, eps: i32, dir: i32, v: &Vect3, d: f64, h: f64) -> bool {
    let s2 = s.vect2();
    let v2 = v.vect2();
    let p2 = p.vect2();
    let vp = v2.dot(&p2);
    if vp == 0.0 {
        return false;
    }
    let t = (sq(d) - s2.dot(&p2)) / vp;
    let eps_f = f64::from(eps);
    sign(vp) == dir
        && t >= 0.0
        && eps_f * (s.z + t * v.z) >= h
        && ((s.z.abs() >= h && dir == eps * sign(s.z)) || (s.z.abs() < h && dir == ENTRY))
}

pub fn vertical_criterion(epsv: i32, s: &Vect3, v: &Vect3, nv: &Vect3, d: f64, h: f64) -> bool {
    let dir = if s.z.abs() >= h {
        epsv * sign(s.z)
    } else {
        ENTRY
    };
    let eps_f = f64::from(epsv);
    if v.x == 0.0 && v.y == 0.0 && eps_f * nv.z >= 0.0 && eps_f * s.z >= h {
        return true;
    }
    let s2 = s.vect2();
    let v2 = v.vect2();
    if horizontal::delta(&s2, &v2, d) <= 0.0 {
        return false;
    }
    match horizontal::theta_d(&s2, &v2, dir, d) {
        Some(td) if td > 0.0 => {
            let p = lift(&(s2 + v2 * td), eps_f * h);
            closed_region_3d(s, &p, epsv, dir, nv, d, h)
        }
        _ => false,
    }
}

fn horizontal_criterion_0(sp: &Vect2, eps: i32, v: &Vect2, d: f64) -> bool {
    let v = if almost_equals_eps(v.norm(), 0.0, 1e-13) {
        Vect2::zeros()
    } else {
        *v
    };
    horizontal_criterion(sp, &v, d, eps)
}

/// Coordination criterion outside loss of separation.
pub fn criterion_3d(
    sp: &Vect3,
    v: &Vect3,
    eps_h: i32,
    eps_v: i32,
    nv: &Vect3,
    d: f64,
    h: f64,
) -> bool {
    let sp2 = sp.vect2();
    (horizontal::horizontal_sep(&sp2, d) && horizontal_criterion_0(&sp2, eps_h, &nv.vect2(), d))
        || (vertical_criterion(eps_v, sp, v, nv, d, h)
            && (sp2.sqv() < sq(d) || horizontal_criterion_0(&sp2, eps_h, &(nv - v).vect2(), d)))
}

/// New ownship velocity `nvo` moves away from the intruder horizontally.
pub fn horizontal_repulsive_criterion(
    s: &Vect2,
    vo: &Vect2,
    vi: &Vect2,
    nvo: &Vect2,
    eps: i32,
) -> bool {
    let v = vo - vi;
    let nv = nvo - vi;
    let e = f64::from(eps);
    !s.is_zero()
        && !nv.is_zero()
        && e * s.det(&v) <= 0.0
        && e * s.det(&nv) < 0.0
        && ((s.dot(&v) < 0.0 && e * nv.det(&v) < 0.0)
            || (s.dot(&v) >= 0.0
                && (!v.is_zero() || s.dot(&nv) >= 0.0)
                && (v.is_zero() || s.dot(&nv) > s.dot(&v))
                && e * nv.det(&v) <= 0.0))
}

/// New ownship velocity `nvo` moves away from the intruder vertically.
pub fn vertical_repulsive_criterion(vo: &Vect3, vi: &Vect3, nvo: &Vect3, eps: i32) -> bool {
    let v = vo - vi;
    let nv = nvo - vi;
    let v2 = v.vect2();
    let e = f64::from(eps);
    e * nv.z > e * v.z && -e * v.z * nv.vect2().dot(&v2) + e * nv.z * v2.sqv() >= 0.0
}

fn trk_changed(vo: &Vect3, nvo: &Vect3) -> bool {
    turn_delta(vo.trk(), nvo.trk()).abs() > 0.001 * DEG
}

fn gs_changed(vo: &Vect3, nvo: &Vect3) -> bool {
    (vo.gs() - nvo.gs()).abs() > 0.001 * KN
}

fn vs_changed(vo: &Vect3, nvo: &Vect3) -> bool {
    (vo.vs() - nvo.vs()).abs() > 0.001 * FPM
}

/// Combined coordination test for a candidate ownship velocity `nvo`.
#[allow(clippy::too_many_arguments)]
pub fn criteria(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    nvo: &Vect3,
    d: f64,
    h: f64,
    epsh: i32,
    epsv: i32,
) -> bool {
    if s.vect2().sqv() < sq(d) && s.z.abs() < h {
        let horiz_change = trk_changed(vo, nvo) || gs_changed(vo, nvo);
        let vert_change = vs_changed(vo, nvo);
        let vlc = vertical_repulsive_criterion(vo, vi, nvo, epsv);
        let hlc = horizontal_repulsive_criterion(
            &s.vect2(),
            &vo.vect2(),
            &vi.vect2(),
            &nvo.vect2(),
            epsh,
        );
        match (horiz_change, vert_change) {
            (true, true) => hlc && vlc,
            (true, false) => hlc,
            (false, true) => vlc,
            (false, false) => hlc || vlc,
        }
    } else {
        criterion_3d(s, &(vo - vi), epsh, epsv, &(nvo - vi), d, h)
    }
}

/// `vo` rotated clockwise by `dir*step` radians.
pub fn incr_trk_vect(vo: &Vect2, step: f64, dir: i32) -> Vect2 {
    let a = f64::from(dir) * step;
    vo * a.cos() + vo.perp_r() * a.sin()
}

pub fn losr_trk_iter_dir(s: &Vect2, vo: &Vect2, vi: &Vect2, step: f64, eps: i32) -> i32 {
    if horizontal_repulsive_criterion(s, vo, vi, &incr_trk_vect(vo, step, 1), eps) {
        1
    } else if horizontal_repulsive_criterion(s, vo, vi, &incr_trk_vect(vo, step, -1), eps) {
        -1
    } else {
        0
    }
}

pub fn trk_search_direction(s: &Vect3, vo: &Vect3, vi: &Vect3, eps: i32) -> i32 {
    losr_trk_iter_dir(&s.vect2(), &vo.vect2(), &vi.vect2(), DEG, eps)
}

/// `vo` with its norm changed by `dir*step`.
pub fn incr_gs_vect(vo: &Vect2, step: f64, dir: i32) -> Vect2 {
    let n = vo.norm();
    if n == 0.0 {
        return *vo;
    }
    vo * ((n + f64::from(dir) * step) / n)
}

pub fn losr_gs_iter_dir(
    s: &Vect2,
    vo: &Vect2,
    vi: &Vect2,
    mings: f64,
    maxgs: f64,
    step: f64,
    eps: i32,
) -> i32 {
    let n = vo.norm();
    if n + step <= maxgs
        && horizontal_repulsive_criterion(s, vo, vi, &incr_gs_vect(vo, step, 1), eps)
    {
        1
    } else if n - step >= mings
        && horizontal_repulsive_criterion(s, vo, vi, &incr_gs_vect(vo, step, -1), eps)
    {
        -1
    } else {
        0
    }
}

pub fn gs_search_direction(s: &Vect3, vo: &Vect3, vi: &Vect3, eps: i32) -> i32 {
    losr_gs_iter_dir(&s.vect2(), &vo.vect2(), &vi.vect2(), 0.0, f64::MAX, KN, eps)
}

pub fn vs_search_direction(epsv: i32) -> i32 {
    epsv
}

/// Vertical epsilon implied by an intruder's observed vertical-speed rate.
pub fn data_vs_rate_epsilon(epsv: i32, vs_rate: f64) -> i32 {
    let abs_dir = if vs_rate >= 0.0 { 1 } else { -1 };
    if abs_dir == vs_search_direction(epsv) {
        epsv
    } else {
        -epsv
    }
}

/// Horizontal epsilon implied by an intruder's observed turn rate.
pub fn data_turn_epsilon(s: &Vect3, vo: &Vect3, vi: &Vect3, epsh: i32, track_rate: f64) -> i32 {
    let traf_dir = trk_search_direction(&(-s), vi, vo, epsh);
    let abs_dir = if track_rate >= 0.0 { 1 } else { -1 };
    if abs_dir == traf_dir {
        epsh
    } else {
        -epsh
    }
}
