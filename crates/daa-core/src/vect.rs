//! Vector types and the aviation helpers layered on top of `nalgebra`.
//!
//! Axes are east (x), north (y) and up (z). Tracks are compass angles:
//! zero north, clockwise positive, in radians.

use nalgebra::{Vector2, Vector3};

use crate::util::{almost_equals, sq, to_2pi};

pub type Vect2 = Vector2<f64>;
pub type Vect3 = Vector3<f64>;

pub fn vect2(x: f64, y: f64) -> Vect2 {
    Vector2::new(x, y)
}

pub fn vect3(x: f64, y: f64, z: f64) -> Vect3 {
    Vector3::new(x, y, z)
}

/// Horizontal vector lifted to 3-D with the given vertical component.
pub fn lift(v: &Vect2, z: f64) -> Vect3 {
    Vector3::new(v.x, v.y, z)
}

/// Velocity from track (rad), ground speed (m/s) and vertical speed (m/s).
pub fn from_trk_gs_vs(trk: f64, gs: f64, vs: f64) -> Vect3 {
    Vector3::new(gs * trk.sin(), gs * trk.cos(), vs)
}

pub trait Vect2Ext {
    fn det(&self, other: &Vect2) -> f64;
    /// Rotated 90 degrees clockwise.
    fn perp_r(&self) -> Vect2;
    /// Rotated 90 degrees counterclockwise.
    fn perp_l(&self) -> Vect2;
    fn sqv(&self) -> f64;
    fn is_zero(&self) -> bool;
    fn almost_eq(&self, other: &Vect2) -> bool;
    /// Unit vector, or the zero vector when undefined.
    fn hat(&self) -> Vect2;
    fn compass_angle(&self) -> f64;
    /// True when `self` is at least as close to `vo` as `other`.
    fn closer_to(&self, other: &Vect2, vo: &Vect2) -> bool;
}

impl Vect2Ext for Vect2 {
    fn det(&self, other: &Vect2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    fn perp_r(&self) -> Vect2 {
        Vector2::new(self.y, -self.x)
    }

    fn perp_l(&self) -> Vect2 {
        Vector2::new(-self.y, self.x)
    }

    fn sqv(&self) -> f64 {
        self.norm_squared()
    }

    fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    fn almost_eq(&self, other: &Vect2) -> bool {
        almost_equals(self.x, other.x) && almost_equals(self.y, other.y)
    }

    fn hat(&self) -> Vect2 {
        let n = self.norm();
        if n == 0.0 {
            Vect2::zeros()
        } else {
            self / n
        }
    }

    fn compass_angle(&self) -> f64 {
        to_2pi(self.x.atan2(self.y))
    }

    fn closer_to(&self, other: &Vect2, vo: &Vect2) -> bool {
        (self - vo).norm_squared() <= (other - vo).norm_squared()
    }
}

pub trait Vect3Ext {
    fn vect2(&self) -> Vect2;
    fn sqv(&self) -> f64;
    fn is_zero(&self) -> bool;
    fn almost_eq(&self, other: &Vect3) -> bool;
    /// `max(|xy|/d, |z|/h)`: below one strictly inside the cylinder.
    fn cyl_norm(&self, d: f64, h: f64) -> f64;
    fn trk(&self) -> f64;
    fn gs(&self) -> f64;
    fn vs(&self) -> f64;
    fn mk_trk(&self, trk: f64) -> Vect3;
    fn mk_gs(&self, gs: f64) -> Vect3;
    fn mk_vs(&self, vs: f64) -> Vect3;
    fn linear(&self, v: &Vect3, t: f64) -> Vect3;
}

impl Vect3Ext for Vect3 {
    fn vect2(&self) -> Vect2 {
        Vector2::new(self.x, self.y)
    }

    fn sqv(&self) -> f64 {
        self.norm_squared()
    }

    fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    fn almost_eq(&self, other: &Vect3) -> bool {
        almost_equals(self.x, other.x)
            && almost_equals(self.y, other.y)
            && almost_equals(self.z, other.z)
    }

    fn cyl_norm(&self, d: f64, h: f64) -> f64 {
        let horiz = if d > 0.0 {
            (sq(self.x) + sq(self.y)).sqrt() / d
        } else {
            f64::INFINITY
        };
        let vert = if h > 0.0 {
            self.z.abs() / h
        } else {
            f64::INFINITY
        };
        horiz.max(vert)
    }

    fn trk(&self) -> f64 {
        self.vect2().compass_angle()
    }

    fn gs(&self) -> f64 {
        self.vect2().norm()
    }

    fn vs(&self) -> f64 {
        self.z
    }

    fn mk_trk(&self, trk: f64) -> Vect3 {
        from_trk_gs_vs(trk, self.gs(), self.z)
    }

    fn mk_gs(&self, gs: f64) -> Vect3 {
        from_trk_gs_vs(self.trk(), gs, self.z)
    }

    fn mk_vs(&self, vs: f64) -> Vect3 {
        Vector3::new(self.x, self.y, vs)
    }

    fn linear(&self, v: &Vect3, t: f64) -> Vect3 {
        self + v * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_track_conventions() {
        let east = vect3(10.0, 0.0, 0.0);
        assert!((east.trk() - PI / 2.0).abs() < 1e-12);
        let west = vect3(-10.0, 0.0, 0.0);
        assert!((west.trk() - 1.5 * PI).abs() < 1e-12);
        let v = from_trk_gs_vs(PI, 5.0, 1.0);
        assert!((v.y + 5.0).abs() < 1e-12);
        assert!((v.gs() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_perpendiculars_and_det() {
        let v = vect2(1.0, 0.0);
        assert_eq!(v.perp_r(), vect2(0.0, -1.0));
        assert_eq!(v.perp_l(), vect2(0.0, 1.0));
        assert!((v.det(&vect2(0.0, 1.0)) - 1.0).abs() < 1e-12);
        assert!(Vect2::zeros().hat().is_zero());
    }

    #[test]
    fn test_cyl_norm() {
        let s = vect3(3.0, 4.0, 50.0);
        assert!((s.cyl_norm(10.0, 100.0) - 0.5).abs() < 1e-12);
        assert!((s.cyl_norm(5.0, 100.0) - 1.0).abs() < 1e-12);
    }
}
