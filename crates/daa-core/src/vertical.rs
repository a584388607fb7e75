//! Vertical relative-motion helpers and vertical-speed resolutions.

use crate::horizontal::{self, ENTRY, EXIT};
use crate::util::{almost_equals, sign, sq};
use crate::vect::{Vect3, Vect3Ext};

/// Time `sz + t*vz` reaches `eps*sign(vz)*H` (`eps = -1` entry, `+1` exit).
/// Callers guarantee `vz != 0`.
pub fn theta_h(sz: f64, vz: f64, eps: i32, h: f64) -> f64 {
    (f64::from(eps * sign(vz)) * h - sz) / vz
}

/// Time of co-altitude, `-sz/vz`.
pub fn time_coalt(sz: f64, vz: f64) -> f64 {
    if vz == 0.0 {
        0.0
    } else {
        -sz / vz
    }
}

/// Vertical miss distance within `[0, T]`.
pub fn vmd(sz: f64, vz: f64, t_end: f64) -> f64 {
    if sz * vz < 0.0 {
        (sz + vz * time_coalt(sz, vz).min(t_end)).abs()
    } else {
        sz.abs()
    }
}

pub fn vertical_sep(sz: f64, h: f64) -> bool {
    sz.abs() >= h
}

/// Relative vertical speed that reaches `eps*H` at time `t`.
pub fn vs_only(sz: f64, t: f64, eps: i32, h: f64) -> Option<f64> {
    (t > 0.0).then(|| (f64::from(eps) * h - sz) / t)
}

/// Ownship vertical speed that keeps the relative position outside the
/// cylinder on the `eps` side while the horizontal path crosses it.
pub fn vs_circle(s: &Vect3, vo: &Vect3, vi: &Vect3, eps: i32, d: f64, h: f64) -> Option<f64> {
    let s2 = s.vect2();
    let v2 = vo.vect2() - vi.vect2();
    if almost_equals(v2.norm_squared(), 0.0) {
        return None;
    }
    let eps_sz = f64::from(eps) * s.z;
    let rel = if eps_sz < h
        && s2.norm_squared() > sq(d)
        && horizontal::delta(&s2, &v2, d) > 0.0
    {
        horizontal::theta_d(&s2, &v2, ENTRY, d).and_then(|t| vs_only(s.z, t, eps, h))
    } else if eps_sz >= h {
        horizontal::theta_d(&s2, &v2, EXIT, d).and_then(|t| vs_only(s.z, t, eps, h))
    } else {
        None
    };
    rel.map(|vz| vz + vi.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::vect3;

    #[test]
    fn test_theta_h_entry_exit() {
        // 1000 m below, closing at 10 m/s against a 300 m half-height.
        let tin = theta_h(-1000.0, 10.0, ENTRY, 300.0);
        let tout = theta_h(-1000.0, 10.0, EXIT, 300.0);
        assert!((tin - 70.0).abs() < 1e-9);
        assert!((tout - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_vmd() {
        assert!((vmd(-1000.0, 10.0, 50.0) - 500.0).abs() < 1e-9);
        assert!(vmd(-1000.0, 10.0, 500.0).abs() < 1e-9);
        assert!((vmd(1000.0, 10.0, 50.0) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_vs_circle_climbs_over() {
        let s = vect3(10000.0, 0.0, 0.0);
        let vo = vect3(-100.0, 0.0, 0.0);
        let vi = vect3(0.0, 0.0, 0.0);
        let vz = vs_circle(&s, &vo, &vi, 1, 9260.0, 304.8).unwrap();
        // Reaches +H at the horizontal entry time of 7.4 s.
        assert!((vz - 304.8 / 7.4).abs() < 1e-6);
        assert!(vs_circle(&vect3(0.0, 0.0, 0.0), &vo, &vi, 1, 9260.0, 304.8).is_none());
    }
}
