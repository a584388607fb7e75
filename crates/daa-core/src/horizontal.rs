//! Horizontal relative-motion algebra and horizontal resolution vectors.
//!
//! The relative position `s` moves along `s + t*v`. Circle crossings come
//! from `|s + t*v| = D`. A resolution vector is "undefined" when zero.

use serde::{Deserialize, Serialize};

use crate::tangent_line::TangentLine;
use crate::util::{almost_equals, root2b, sign, sq};
use crate::vect::{Vect2, Vect2Ext, Vect3, Vect3Ext};
use crate::vertical;

/// Entry direction for [`theta_d`] and [`vertical::theta_h`].
pub const ENTRY: i32 = -1;
/// Exit direction.
pub const EXIT: i32 = 1;

/// Horizontal resolution velocity; `k` carries the line parameter that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizontal {
    pub v: Vect2,
    pub k: f64,
}

impl Horizontal {
    pub fn new(v: Vect2) -> Self {
        Self { v, k: 1.0 }
    }

    fn with_k(k: f64, v: Vect2) -> Self {
        Self { v, k }
    }

    pub fn undefined() -> Self {
        Self {
            v: Vect2::zeros(),
            k: 0.0,
        }
    }

    pub fn undef(&self) -> bool {
        self.v.is_zero()
    }
}

/// The defined solution closer to `vo`.
pub fn best_horizontal(vo: &Vect2, v1: Horizontal, v2: Horizontal) -> Horizontal {
    if v1.undef() {
        v2
    } else if v2.undef() || v1.v.closer_to(&v2.v, vo) {
        v1
    } else {
        v2
    }
}

pub fn tcpa(s: &Vect2, v: &Vect2) -> f64 {
    if v.is_zero() {
        0.0
    } else {
        -s.dot(v) / v.sqv()
    }
}

pub fn dcpa(s: &Vect2, v: &Vect2) -> f64 {
    (s + v * tcpa(s, v)).norm()
}

/// Horizontal miss distance within `[0, T]`.
pub fn hmd(s: &Vect2, v: &Vect2, t_end: f64) -> f64 {
    let t = if s.dot(v) < 0.0 {
        tcpa(s, v).min(t_end)
    } else {
        0.0
    };
    (s + v * t).norm()
}

/// Time the relative position crosses the circle of radius `d`
/// (`eps = -1` entry, `+1` exit).
pub fn theta_d(s: &Vect2, v: &Vect2, eps: i32, d: f64) -> Option<f64> {
    root2b(v.sqv(), s.dot(v), s.sqv() - sq(d), eps)
}

/// Positive iff the relative line crosses the circle of radius `d`.
pub fn delta(s: &Vect2, v: &Vect2, d: f64) -> f64 {
    sq(d) * v.sqv() - sq(s.det(v))
}

pub fn almost_horizontal_los(s: &Vect2, d: f64) -> bool {
    let sqs = s.sqv();
    let sqd = sq(d);
    !almost_equals(sqs, sqd) && sqs < sqd
}

pub fn horizontal_sep(s: &Vect2, d: f64) -> bool {
    s.sqv() >= sq(d)
}

pub fn horizontal_dir(s: &Vect2, v: &Vect2, dir: i32) -> bool {
    f64::from(dir) * s.dot(v) >= 0.0
}

pub fn horizontal_dir_at(s: &Vect2, v: &Vect2, t: f64, dir: i32) -> bool {
    horizontal_dir(&(s + v * t), v, dir)
}

fn vdir(s: &Vect2, v: &Vect2) -> Vect2 {
    let ps = s.perp_r();
    ps * f64::from(sign(ps.dot(v)))
}

fn w0(s: &Vect2, j: f64) -> Vect2 {
    if s.is_zero() {
        Vect2::zeros()
    } else {
        s * (j / s.sqv())
    }
}

pub fn gs_only_line(nv: &Vect2, vo: &Vect2, vi: &Vect2) -> Horizontal {
    let det_vo_v = vo.det(nv);
    if det_vo_v != 0.0 {
        let l = (vi.det(nv) / det_vo_v).max(0.0);
        let k = vi.det(vo) / det_vo_v;
        Horizontal::with_k(k, vo * l)
    } else {
        Horizontal::undefined()
    }
}

pub fn gs_line(nv: &Vect2, vo: &Vect2, vi: &Vect2) -> Horizontal {
    let gso = gs_only_line(nv, vo, vi);
    if gso.k < 0.0 {
        Horizontal::with_k(gso.k, Vect2::zeros())
    } else {
        gso
    }
}

pub fn gs_only_dot(u: &Vect2, vo: &Vect2, vi: &Vect2, j: f64) -> Horizontal {
    gs_only_line(&vdir(u, &(vo - vi)), vo, &(vi + w0(u, j)))
}

fn gs_only_vertical(s: &Vect2, vo: &Vect2, vi: &Vect2, th: f64, dir: i32, d: f64) -> Horizontal {
    let v = vo - vi;
    if delta(s, &v, d) > 0.0 {
        if let Some(td) = theta_d(s, &v, dir, d).filter(|td| *td > 0.0) {
            let p = s + v * td;
            return gs_only_dot(&(p * th), vo, vi, sq(d) - s.dot(&p));
        }
    }
    Horizontal::undefined()
}

/// Shared guard of the `*_vertical` solvers: the vertical crossing time and
/// entry/exit direction, when the crossing agrees with `epsv`.
fn vertical_crossing(s: &Vect3, vo: &Vect3, vi: &Vect3, epsv: i32, h: f64) -> Option<(f64, i32)> {
    if almost_equals(vo.z, vi.z) {
        return None;
    }
    let vz = vo.z - vi.z;
    let dir = if s.z.abs() >= h {
        epsv * sign(s.z)
    } else {
        ENTRY
    };
    let t = vertical::theta_h(s.z, vz, -dir, h);
    (t > 0.0 && epsv == sign(s.z + t * vz)).then_some((t, dir))
}

fn accept_vertical(
    s2: &Vect2,
    vo2: &Vect2,
    l: &TangentLine,
    d: f64,
    nvo2: Horizontal,
) -> Horizontal {
    if almost_horizontal_los(s2, d) || l.horizontal_criterion(&(nvo2.v - vo2)) {
        nvo2
    } else {
        Horizontal::undefined()
    }
}

pub fn gs_vertical(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    l: &TangentLine,
    epsv: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    let Some((t, dir)) = vertical_crossing(s, vo, vi, epsv, h) else {
        return Horizontal::undefined();
    };
    let (s2, vo2) = (s.vect2(), vo.vect2());
    let nvo2 = gs_only_vertical(&s2, &vo2, &vi.vect2(), t, dir, d);
    accept_vertical(&s2, &vo2, l, d, nvo2)
}

/// Ground-speed-only resolution: best of the tangent-line and vertical solutions.
pub fn gs_only(
    nv: &TangentLine,
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    epsv: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    let vo2 = vo.vect2();
    best_horizontal(
        &vo2,
        gs_line(nv.vector(), &vo2, &vi.vect2()),
        gs_vertical(s, vo, vi, nv, epsv, d, h),
    )
}

/// Ownship ground speed that puts the relative position on the circle at `t`.
pub fn gs_only_circle(
    s: &Vect2,
    vo: &Vect2,
    vi: &Vect2,
    t: f64,
    dir: i32,
    irt: i32,
    d: f64,
) -> Horizontal {
    let w = s - vi * t;
    let a = sq(t) * vo.sqv();
    let b = t * w.dot(vo);
    let c = w.sqv() - sq(d);
    if let Some(l) = root2b(a, b, c, irt) {
        let nvo = vo * l.max(0.0);
        if horizontal_dir_at(s, &(nvo - vi), t, dir) {
            return Horizontal::new(nvo);
        }
    }
    Horizontal::undefined()
}

pub fn gs_circle(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    dir: i32,
    irt: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    if almost_equals(vo.z, vi.z) {
        return Horizontal::undefined();
    }
    let t = vertical::theta_h(s.z, vo.z - vi.z, -dir, h);
    gs_only_circle(&s.vect2(), &vo.vect2(), &vi.vect2(), t, dir, irt, d)
}

/// Track-only velocity (same speed as `vo`) on the line `vi + k*nv`.
pub fn trk_only_line_irt(nv: &Vect2, vo: &Vect2, vi: &Vect2, irt: i32) -> Horizontal {
    let a = nv.sqv();
    let b = nv.dot(vi);
    let c = vi.sqv() - vo.sqv();
    match root2b(a, b, c, irt) {
        Some(k) => Horizontal::with_k(k, vi + nv * k),
        None => Horizontal::undefined(),
    }
}

pub fn trk_only_line(nv: &Vect2, vo: &Vect2, vi: &Vect2) -> Horizontal {
    best_horizontal(
        vo,
        trk_only_line_irt(nv, vo, vi, 1),
        trk_only_line_irt(nv, vo, vi, -1),
    )
}

fn trk_line_irt(nv: &Vect2, vo: &Vect2, vi: &Vect2, irt: i32) -> Horizontal {
    let trko = trk_only_line_irt(nv, vo, vi, irt);
    if trko.k < 0.0 {
        Horizontal::with_k(trko.k, Vect2::zeros())
    } else {
        trko
    }
}

pub fn trk_line(nv: &Vect2, vo: &Vect2, vi: &Vect2) -> Horizontal {
    best_horizontal(vo, trk_line_irt(nv, vo, vi, 1), trk_line_irt(nv, vo, vi, -1))
}

pub fn trk_only_dot(u: &Vect2, vo: &Vect2, vi: &Vect2, j: f64, irt: i32) -> Horizontal {
    trk_only_line_irt(&vdir(u, &(vo - vi)), vo, &(vi + w0(u, j)), irt)
}

fn trk_only_vertical(
    s: &Vect2,
    vo: &Vect2,
    vi: &Vect2,
    th: f64,
    dir: i32,
    irt: i32,
    d: f64,
) -> Horizontal {
    let v = vo - vi;
    if delta(s, &v, d) > 0.0 {
        if let Some(td) = theta_d(s, &v, dir, d).filter(|td| *td > 0.0) {
            let p = s + v * td;
            return trk_only_dot(&(p * th), vo, vi, sq(d) - s.dot(&p), irt);
        }
    }
    Horizontal::undefined()
}

fn trk_vertical_irt(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    l: &TangentLine,
    epsv: i32,
    irt: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    let Some((t, dir)) = vertical_crossing(s, vo, vi, epsv, h) else {
        return Horizontal::undefined();
    };
    let (s2, vo2) = (s.vect2(), vo.vect2());
    let nvo2 = trk_only_vertical(&s2, &vo2, &vi.vect2(), t, dir, irt, d);
    accept_vertical(&s2, &vo2, l, d, nvo2)
}

pub fn trk_vertical(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    l: &TangentLine,
    epsv: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    best_horizontal(
        &vo.vect2(),
        trk_vertical_irt(s, vo, vi, l, epsv, 1, d, h),
        trk_vertical_irt(s, vo, vi, l, epsv, -1, d, h),
    )
}

/// Track-only resolution: best of the tangent-line and vertical solutions.
pub fn trk_only(
    nv: &TangentLine,
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    epsv: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    let vo2 = vo.vect2();
    best_horizontal(
        &vo2,
        trk_line(nv.vector(), &vo2, &vi.vect2()),
        trk_vertical(s, vo, vi, nv, epsv, d, h),
    )
}

/// Track at the ownship's speed that puts the relative position on the
/// circle at time `t`.
pub fn trk_only_circle(
    s: &Vect2,
    vo: &Vect2,
    vi: &Vect2,
    t: f64,
    dir: i32,
    irt: i32,
    d: f64,
) -> Horizontal {
    if t > 0.0 && !s.almost_eq(&(vi * t)) {
        let w = s - vi * t;
        let e = (sq(d) - s.sqv() - sq(t) * (vo.sqv() - vi.sqv())) / (2.0 * t);
        let nvo = trk_only_dot(&w, vo, vi, e, irt);
        if !nvo.undef() && horizontal_dir_at(s, &(nvo.v - vi), t, dir) {
            return nvo;
        }
    }
    Horizontal::undefined()
}

pub fn trk_circle(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    dir: i32,
    irt: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    if almost_equals(vo.z, vi.z) {
        return Horizontal::undefined();
    }
    let t = vertical::theta_h(s.z, vo.z - vi.z, -dir, h);
    trk_only_circle(&s.vect2(), &vo.vect2(), &vi.vect2(), t, dir, irt, d)
}

/// Closest velocity to `vo` whose relative velocity lies on `nv`.
pub fn opt_trk_gs_line(nv: &Vect2, vo: &Vect2, vi: &Vect2) -> Horizontal {
    if nv.is_zero() {
        return Horizontal::undefined();
    }
    let v = vo - vi;
    let k = nv.dot(&v) / nv.sqv();
    Horizontal::with_k(k, vi + nv * k)
}

pub fn opt_line(nv: &Vect2, vo: &Vect2, vi: &Vect2) -> Horizontal {
    let opt = opt_trk_gs_line(nv, vo, vi);
    if opt.k < 0.0 {
        Horizontal::with_k(opt.k, Vect2::zeros())
    } else {
        opt
    }
}

fn opt_trk_gs_dot(u: &Vect2, vo: &Vect2, vi: &Vect2, j: f64) -> Horizontal {
    opt_trk_gs_line(&vdir(u, &(vo - vi)), vo, &(vi + w0(u, j)))
}

fn opt_trk_gs_vertical(s: &Vect2, vo: &Vect2, vi: &Vect2, th: f64, dir: i32, d: f64) -> Horizontal {
    let v = vo - vi;
    if delta(s, &v, d) > 0.0 {
        if let Some(td) = theta_d(s, &v, dir, d).filter(|td| *td > 0.0) {
            let p = s + v * td;
            return opt_trk_gs_dot(&(p * th), vo, vi, sq(d) - s.dot(&p));
        }
    }
    Horizontal::undefined()
}

pub fn opt_vertical(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    l: &TangentLine,
    epsv: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    let Some((t, dir)) = vertical_crossing(s, vo, vi, epsv, h) else {
        return Horizontal::undefined();
    };
    let (s2, vo2) = (s.vect2(), vo.vect2());
    let nvo2 = opt_trk_gs_vertical(&s2, &vo2, &vi.vect2(), t, dir, d);
    accept_vertical(&s2, &vo2, l, d, nvo2)
}

/// Optimal track and ground speed resolution.
pub fn opt_trk_gs(
    nv: &TangentLine,
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    epsv: i32,
    d: f64,
    h: f64,
) -> Horizontal {
    let vo2 = vo.vect2();
    best_horizontal(
        &vo2,
        opt_trk_gs_line(nv.vector(), &vo2, &vi.vect2()),
        opt_vertical(s, vo, vi, nv, epsv, d, h),
    )
}

/// Track of the velocity that makes the relative velocity perpendicular to
/// `s`, when one exists at the ownship's speed.
pub fn epsilon_critical_point_track(s: &Vect2, vo: &Vect2, vi: &Vect2, irt: i32) -> Option<f64> {
    let nvo = trk_only_dot(&s.perp_r(), vo, vi, 0.0, irt);
    (!nvo.undef()).then(|| nvo.v.compass_angle())
}

/// Ground speed counterpart of [`epsilon_critical_point_track`].
pub fn epsilon_critical_point_gs(s: &Vect2, vo: &Vect2, vi: &Vect2) -> Option<f64> {
    let nvo = gs_only_dot(&s.perp_r(), vo, vi, 0.0);
    (!nvo.undef()).then(|| nvo.v.norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::vect2;

    #[test]
    fn test_theta_d_head_on() {
        let s = vect2(10000.0, 0.0);
        let v = vect2(-100.0, 0.0);
        let tin = theta_d(&s, &v, ENTRY, 9260.0).unwrap();
        let tout = theta_d(&s, &v, EXIT, 9260.0).unwrap();
        assert!((tin - 7.4).abs() < 1e-9);
        assert!((tout - 192.6).abs() < 1e-9);
        assert!(delta(&s, &v, 9260.0) > 0.0);
    }

    #[test]
    fn test_theta_d_miss() {
        let s = vect2(10000.0, 10000.0);
        let v = vect2(-100.0, 0.0);
        assert!(delta(&s, &v, 9260.0) < 0.0);
        assert!(theta_d(&s, &v, ENTRY, 9260.0).is_none());
        assert!((dcpa(&s, &v) - 10000.0).abs() < 1e-9);
        assert!((tcpa(&s, &v) - 100.0).abs() < 1e-9);
        assert!((hmd(&s, &v, 50.0) - (5000.0f64.powi(2) + 1e8).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_trk_only_line_keeps_speed() {
        let nv = vect2(1.0, 1.0);
        let vo = vect2(0.0, 100.0);
        let vi = vect2(0.0, -80.0);
        let sol = trk_only_line(&nv, &vo, &vi);
        assert!(!sol.undef());
        assert!((sol.v.norm() - 100.0).abs() < 1e-6);
        let rel = sol.v - vi;
        assert!(rel.det(&nv).abs() < 1e-6);
    }

    #[test]
    fn test_gs_only_line_keeps_track() {
        let nv = vect2(1.0, -1.0);
        let vo = vect2(0.0, 100.0);
        let vi = vect2(50.0, 0.0);
        let sol = gs_only_line(&nv, &vo, &vi);
        assert!(!sol.undef());
        assert!(sol.v.x.abs() < 1e-9);
        assert!((sol.v - vi).det(&nv).abs() < 1e-6);
    }

    #[test]
    fn test_best_horizontal_prefers_closer() {
        let vo = vect2(0.0, 100.0);
        let a = Horizontal::new(vect2(10.0, 100.0));
        let b = Horizontal::new(vect2(50.0, 100.0));
        assert_eq!(best_horizontal(&vo, a, b), a);
        assert_eq!(best_horizontal(&vo, Horizontal::undefined(), b), b);
    }
}
