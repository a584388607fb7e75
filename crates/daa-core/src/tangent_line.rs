//! Tangent lines from the relative position to the protected circle.

use crate::criteria;
use crate::util::{almost_greater, sq};
use crate::vect::{Vect2, Vect2Ext};

/// Direction from `s` to the tangent point on the circle of radius `d`,
/// on the side selected by `eps`. Zero when `s` is not outside the circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentLine {
    nv: Vect2,
    s: Vect2,
    d: f64,
    eps: i32,
}

impl TangentLine {
    pub fn new(s: &Vect2, d: f64, eps: i32) -> Self {
        let nv = tangent_point(s, d, eps).map_or_else(Vect2::zeros, |q| q - s);
        Self { nv, s: *s, d, eps }
    }

    pub fn vector(&self) -> &Vect2 {
        &self.nv
    }

    pub fn eps(&self) -> i32 {
        self.eps
    }

    pub fn undef(&self) -> bool {
        self.nv.is_zero()
    }

    /// Whether relative velocity `v` lies on the `eps` side of this tangent.
    pub fn horizontal_criterion(&self, v: &Vect2) -> bool {
        criteria::horizontal_criterion(&self.s, v, self.d, self.eps)
    }
}

/// Tangent point on the circle of radius `d` seen from `s`.
pub fn tangent_point(s: &Vect2, d: f64, eps: i32) -> Option<Vect2> {
    let sq_s = s.sqv();
    let sq_d = sq(d);
    if !almost_greater(sq_s, sq_d) {
        return None;
    }
    let alpha = sq_d / sq_s;
    let beta = d * (sq_s - sq_d).sqrt() / sq_s;
    Some(s * alpha + s.perp_r() * (f64::from(eps) * beta))
}
