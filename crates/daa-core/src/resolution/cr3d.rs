//! Conflict and loss-of-separation resolution solvers.

use super::crss::CrssConfig;
use super::ResolutionKind;
use crate::criteria::{
    horizontal_repulsive_criterion, incr_gs_vect, incr_trk_vect, losr_gs_iter_dir,
    losr_trk_iter_dir,
};
use crate::detection::cd3d;
use crate::horizontal::{self, Horizontal};
use crate::tangent_line::TangentLine;
use crate::units::{DEG, KN};
use crate::util::{almost_equals, sign};
use crate::vect::{Vect2, Vect2Ext, Vect3, Vect3Ext};
use crate::vertical;

/// Ground speed search limits relative to the current speed.
const GS_LOS_FACTOR: f64 = 2.0;
/// Vertical inflation of the collision volume in vertical LoS recovery.
const ALG_INNER_FACTOR: f64 = 2.0;

/// Resolution vectors of one encounter; undefined entries are zero vectors
/// or `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CR3D {
    pub trk: Horizontal,
    pub gs: Horizontal,
    pub opt: Horizontal,
    pub vs: Option<f64>,
    /// Ownship velocity scaled along its own direction.
    pub vel: Option<Vect3>,
}

impl Default for CR3D {
    fn default() -> Self {
        Self {
            trk: Horizontal::undefined(),
            gs: Horizontal::undefined(),
            opt: Horizontal::undefined(),
            vs: None,
            vel: None,
        }
    }
}

impl CR3D {
    pub fn new() -> Self {
        Self::default()
    }

    fn any_defined(&self) -> bool {
        !self.trk.undef() || !self.gs.undef() || !self.opt.undef() || self.vs.is_some()
    }

    /// Conflict resolutions against the `d`/`h` cylinder.
    #[allow(clippy::too_many_arguments)]
    pub fn cr(
        &mut self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        d: f64,
        h: f64,
        epsh: i32,
        epsv: i32,
        allow_speed_only: bool,
    ) -> bool {
        *self = Self::default();
        let nv = TangentLine::new(&s.vect2(), d, epsh);
        self.trk = horizontal::trk_only(&nv, s, vo, vi, epsv, d, h);
        self.gs = horizontal::gs_only(&nv, s, vo, vi, epsv, d, h);
        self.opt = horizontal::opt_trk_gs(&nv, s, vo, vi, epsv, d, h);
        self.vel = speed_only(&nv, vo, &vi.vect2());
        self.vs = vertical::vs_circle(s, vo, vi, epsv, d, h);
        self.any_defined() || (allow_speed_only && self.vel.is_some())
    }

    /// Repulsive recovery maneuvers from inside the protected volume.
    pub fn losr_repulsive(
        &mut self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        cfg: &CrssConfig,
        epsh: i32,
        epsv: i32,
    ) -> bool {
        *self = Self::default();
        if !s.vect2().is_zero() {
            self.trk = losr_trk_iter(
                s,
                vo,
                vi,
                cfg.min_horiz_exit_speed_los,
                std::f64::consts::FRAC_PI_2,
                DEG,
                epsh,
            );
            self.gs = losr_gs_iter(s, vo, vi, cfg, 10.0 * KN, epsh);
        }
        self.vs = Some(losr_vs_new(
            s,
            vo,
            vi,
            cfg.min_vert_exit_speed_los,
            cfg.max_vs,
            cfg.nmac_d,
            cfg.nmac_h,
            epsv,
        ));
        self.any_defined()
    }

    /// Conflict or loss-of-separation resolutions, depending on whether the
    /// pair is already inside the cylinder.
    #[allow(clippy::too_many_arguments)]
    pub fn cr3d_repulsive(
        &mut self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        d: f64,
        h: f64,
        cfg: &CrssConfig,
        epsh: i32,
        epsv: i32,
    ) -> ResolutionKind {
        *self = Self::default();
        let vo2 = vo.vect2();
        if vo2.is_zero() || vi.vect2().is_zero() {
            return ResolutionKind::None;
        }
        let ld = cd3d::detection(s, vo, vi, d, h, 0.0, f64::INFINITY);
        if !ld.conflict() {
            self.trk = Horizontal::new(vo2);
            self.gs = self.trk;
            self.opt = self.trk;
            self.vs = Some(vo.z);
            return ResolutionKind::Unnecessary;
        }
        if almost_equals(ld.time_in, 0.0) {
            self.cr3d_repulsive_los(s, vo, vi, cfg, epsh, epsv)
        } else if self.cr(s, vo, vi, d, h, epsh, epsv, cfg.allow_speed_only) {
            ResolutionKind::Conflict
        } else {
            ResolutionKind::None
        }
    }

    pub fn cr3d_repulsive_los(
        &mut self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        cfg: &CrssConfig,
        epsh: i32,
        epsv: i32,
    ) -> ResolutionKind {
        if !self.losr_repulsive(s, vo, vi, cfg, epsh, epsv) {
            return ResolutionKind::None;
        }
        if s.dot(&(vo - vi)) > 0.0 {
            ResolutionKind::LosDivergent
        } else {
            ResolutionKind::LosConvergent
        }
    }
}

/// Ownship velocity, scaled along its current direction, whose relative
/// velocity runs along the tangent `nv`.
pub fn speed_only(nv: &TangentLine, vo: &Vect3, vi: &Vect2) -> Option<Vect3> {
    if nv.undef() {
        return None;
    }
    let n = nv.vector();
    let den = n.det(&vo.vect2());
    if almost_equals(den, 0.0) {
        return None;
    }
    let k = n.det(vi) / den;
    (k > 0.0).then(|| vo * k)
}

/// Horizontal divergence with a relative speed above `min_rel_speed`.
pub fn divergent_horiz_gt(s: &Vect2, vo: &Vect2, vi: &Vect2, min_rel_speed: f64) -> bool {
    let v = vo - vi;
    s.dot(&v) > 0.0 && v.norm() > min_rel_speed
}

/// Time of closest 3-D approach; `f64::MAX` for parallel motion.
pub fn tau(s: &Vect3, vo: &Vect3, vi: &Vect3) -> f64 {
    let v = vo - vi;
    let nv = v.norm();
    if almost_equals(nv, 0.0) {
        f64::MAX
    } else {
        -s.dot(&v) / (nv * nv)
    }
}

/// Distance at [`tau`]; the current distance when `future_only` and tau is
/// in the past.
pub fn dist_at_tau(s: &Vect3, vo: &Vect3, vi: &Vect3, future_only: bool) -> f64 {
    let t = tau(s, vo, vi);
    if t < 0.0 && future_only {
        s.norm()
    } else {
        (s + (vo - vi) * t).norm()
    }
}

/// Turns in `step` increments while the turn stays repulsive, until the pair
/// diverges faster than `minrelgs` or `maxtrk` is reached.
pub fn losr_trk_iter(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    minrelgs: f64,
    maxtrk: f64,
    step: f64,
    epsh: i32,
) -> Horizontal {
    let s2 = s.vect2();
    let vo2 = vo.vect2();
    let vi2 = vi.vect2();
    let dir = losr_trk_iter_dir(&s2, &vo2, &vi2, step, epsh);
    if dir == 0 {
        return Horizontal::undefined();
    }
    let mut nvo = incr_trk_vect(&vo2, step, dir);
    if !horizontal_repulsive_criterion(&s2, &vo2, &vi2, &nvo, epsh) {
        return Horizontal::undefined();
    }
    let mut i = 1.0;
    loop {
        let nvop = incr_trk_vect(&nvo, step, dir);
        if i * step >= maxtrk || !horizontal_repulsive_criterion(&s2, &nvo, &vi2, &nvop, epsh) {
            return Horizontal::new(nvo);
        }
        if divergent_horiz_gt(&s2, &nvop, &vi2, minrelgs) {
            return Horizontal::new(nvop);
        }
        nvo = nvop;
        i += 1.0;
    }
}

#[allow(clippy::too_many_arguments)]
fn losr_gs_iter_aux(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    minrelgs: f64,
    mings: f64,
    maxgs: f64,
    step: f64,
    epsh: i32,
) -> Horizontal {
    let s2 = s.vect2();
    let vo2 = vo.vect2();
    let vi2 = vi.vect2();
    let dir = losr_gs_iter_dir(&s2, &vo2, &vi2, mings, maxgs, step, epsh);
    if dir == 0 {
        return Horizontal::undefined();
    }
    let mut nvo = incr_gs_vect(&vo2, step, dir);
    if !horizontal_repulsive_criterion(&s2, &vo2, &vi2, &nvo, epsh) {
        return Horizontal::undefined();
    }
    loop {
        let nvop = incr_gs_vect(&nvo, step, dir);
        let nnorm = nvo.norm() + f64::from(dir) * step;
        if nnorm > maxgs
            || nnorm < mings
            || !horizontal_repulsive_criterion(&s2, &nvo, &vi2, &nvop, epsh)
        {
            return Horizontal::new(nvo);
        }
        if divergent_horiz_gt(&s2, &nvop, &vi2, minrelgs) {
            return Horizontal::new(nvop);
        }
        nvo = nvop;
    }
}

/// Speed change in `step` increments, bounded to half and twice the current
/// speed. Rejected when the new closest approach is still nearer than
/// `gs_search_los_discard`.
pub fn losr_gs_iter(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    cfg: &CrssConfig,
    step: f64,
    epsh: i32,
) -> Horizontal {
    let min_gs = (vo.norm() / GS_LOS_FACTOR).max(cfg.min_gs);
    let max_gs = (GS_LOS_FACTOR * vo.norm()).min(cfg.max_gs);
    let nvo = losr_gs_iter_aux(s, vo, vi, cfg.min_horiz_exit_speed_los, min_gs, max_gs, step, epsh);
    if nvo.undef() {
        return nvo;
    }
    let nvo3 = Vect3::new(nvo.v.x, nvo.v.y, vo.z);
    if tau(s, &nvo3, vi) <= 0.0 || dist_at_tau(s, &nvo3, vi, true) > cfg.gs_search_los_discard {
        nvo
    } else {
        Horizontal::undefined()
    }
}

/// Vertical speed that leaves the loss volume at least `minrelvs` faster
/// than the intruder, capped at `maxvs`.
#[allow(clippy::too_many_arguments)]
pub fn losr_vs_new(
    s: &Vect3,
    vo: &Vect3,
    vi: &Vect3,
    minrelvs: f64,
    maxvs: f64,
    ca_d: f64,
    ca_h: f64,
    epsv: i32,
) -> f64 {
    let v = vo - vi;
    let eps = f64::from(epsv);
    let nvz = if eps * v.z <= 0.0 {
        eps * minrelvs
    } else {
        eps * minrelvs.max(v.z.abs())
    };
    let voz = nvz + vi.z;
    let voz = f64::from(sign(voz)) * voz.abs().min(maxvs);
    let inner_h = ALG_INNER_FACTOR * ca_h;
    if !cd3d::cd3d(s, vo, vi, ca_d, inner_h) {
        return voz;
    }
    if cd3d::los(s, ca_d, ca_h) {
        return eps * maxvs;
    }
    match vertical::vs_circle(s, vo, vi, epsv, ca_d, inner_h) {
        None => eps * maxvs,
        Some(z) if z.abs() > maxvs => f64::from(sign(z)) * maxvs,
        Some(z) if (z - vi.z).abs() <= minrelvs => voz,
        Some(z) => z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{FPM, FT, NMI};
    use crate::vect::vect3;

    #[test]
    fn test_speed_only_runs_along_tangent() {
        let s = vect3(0.0, -10.0 * NMI, 0.0);
        let vo = vect3(0.0, 100.0, 2.0);
        let vi = vect3(-100.0, 0.0, 0.0);
        let mut found = 0;
        for eps in [-1, 1] {
            let nv = TangentLine::new(&s.vect2(), 5.0 * NMI, eps);
            let Some(vel) = speed_only(&nv, &vo, &vi.vect2()) else {
                continue;
            };
            found += 1;
            let rel = vel.vect2() - vi.vect2();
            assert!(rel.det(nv.vector()).abs() < 1e-6 * rel.norm() * nv.vector().norm());
            // Direction and flight path angle are kept.
            assert!((vel.vect2().hat() - vo.vect2().hat()).norm() < 1e-12);
            assert!((vel.z / vel.y - vo.z / vo.y).abs() < 1e-12);
        }
        assert_eq!(found, 1);
    }

    #[test]
    fn test_tau_and_distance() {
        let s = vect3(1000.0, 0.0, 0.0);
        let vo = vect3(-10.0, 10.0, 0.0);
        let vi = Vect3::zeros();
        assert!((tau(&s, &vo, &vi) - 50.0).abs() < 1e-9);
        assert!((dist_at_tau(&s, &vo, &vi, true) - 500.0 * 2f64.sqrt()).abs() < 1e-6);
        assert_eq!(tau(&s, &vi, &vi), f64::MAX);
        // Past closest approach: current distance.
        assert_eq!(dist_at_tau(&s, &(-vo), &vi, true), 1000.0);
    }

    #[test]
    fn test_losr_vs_moves_apart() {
        // Intruder 50 ft below, both level.
        let s = vect3(300.0, 0.0, 50.0 * FT);
        let vo = vect3(-100.0, 0.0, 0.0);
        let vi = vect3(0.0, 50.0, 0.0);
        let up = losr_vs_new(&s, &vo, &vi, 1000.0 * FPM, 5000.0 * FPM, 500.0 * FT, 100.0 * FT, 1);
        assert!(up >= 1000.0 * FPM - 1e-9 && up <= 5000.0 * FPM + 1e-9);
        let down =
            losr_vs_new(&s, &vo, &vi, 1000.0 * FPM, 5000.0 * FPM, 500.0 * FT, 100.0 * FT, -1);
        assert!(down < 0.0);
    }

    #[test]
    fn test_losr_trk_iter_turns_away() {
        let s = vect3(1000.0, 0.0, 0.0);
        let vo = vect3(-100.0, 0.0, 0.0);
        let vi = vect3(0.0, 50.0, 0.0);
        let cfg = CrssConfig::default();
        for eps in [-1, 1] {
            let h = losr_trk_iter(
                &s,
                &vo,
                &vi,
                cfg.min_horiz_exit_speed_los,
                std::f64::consts::FRAC_PI_2,
                DEG,
                eps,
            );
            if h.undef() {
                continue;
            }
            assert!((h.v.norm() - 100.0).abs() < 1e-6);
            // Never turns much past the limit.
            assert!(h.v.dot(&vo.vect2()) >= -0.05 * 100.0 * 100.0);
        }
    }
}
