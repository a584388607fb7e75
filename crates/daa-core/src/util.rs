//! Tolerant float comparisons and small numeric helpers.
//!
//! Every near-zero or near-equal decision in the crate goes through the
//! predicates here so that the tolerance lives in one place.

use std::cmp::Ordering;
use std::f64::consts::PI;

/// Tolerance used by all `almost_*` predicates.
pub const EPSILON: f64 = 1e-10;

/// Equality up to [`EPSILON`], relative for large magnitudes.
pub fn almost_equals(a: f64, b: f64) -> bool {
    almost_equals_eps(a, b, EPSILON)
}

pub fn almost_equals_eps(a: f64, b: f64, eps: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= eps * a.abs().max(b.abs()).max(1.0)
}

pub fn almost_less(a: f64, b: f64) -> bool {
    a < b && !almost_equals(a, b)
}

pub fn almost_leq(a: f64, b: f64) -> bool {
    a < b || almost_equals(a, b)
}

pub fn almost_greater(a: f64, b: f64) -> bool {
    a > b && !almost_equals(a, b)
}

pub fn almost_geq(a: f64, b: f64) -> bool {
    a > b || almost_equals(a, b)
}

pub fn sq(x: f64) -> f64 {
    x * x
}

/// `1` for non-negative values, `-1` otherwise. Never zero.
pub fn sign(x: f64) -> i32 {
    if x >= 0.0 {
        1
    } else {
        -1
    }
}

/// Sign with a tolerant zero band.
pub fn sign_tol(x: f64) -> i32 {
    if almost_equals(x, 0.0) {
        0
    } else {
        sign(x)
    }
}

/// Root of `a*x^2 + b*x + c = 0` picked by `eps` (`-1` smaller, `+1` larger
/// when `a > 0`). `None` when the discriminant is negative or the equation
/// is degenerate.
pub fn root(a: f64, b: f64, c: f64, eps: i32) -> Option<f64> {
    if a == 0.0 && b == 0.0 {
        return None;
    }
    if a == 0.0 {
        return Some(-c / b);
    }
    let discr = sq(b) - 4.0 * a * c;
    if discr < 0.0 {
        return None;
    }
    Some((-b + f64::from(eps) * discr.sqrt()) / (2.0 * a))
}

/// Root of `a*x^2 + 2*b*x + c = 0`.
pub fn root2b(a: f64, b: f64, c: f64, eps: i32) -> Option<f64> {
    if a == 0.0 && b == 0.0 {
        return None;
    }
    if a == 0.0 {
        return Some(-c / (2.0 * b));
    }
    let discr = sq(b) - a * c;
    if discr < 0.0 {
        return None;
    }
    Some((-b + f64::from(eps) * discr.sqrt()) / a)
}

/// Euclidean modulo: result in `[0, y)` for positive `y`.
pub fn modulo(x: f64, y: f64) -> f64 {
    if y == 0.0 {
        return x;
    }
    let m = x % y;
    if m < 0.0 {
        m + y
    } else {
        m
    }
}

/// Angle normalized to `[0, 2*pi)`.
pub fn to_2pi(rad: f64) -> f64 {
    modulo(rad, 2.0 * PI)
}

/// Angle normalized to `(-pi, pi]`.
pub fn to_pi(rad: f64) -> f64 {
    let r = to_2pi(rad);
    if r > PI {
        r - 2.0 * PI
    } else {
        r
    }
}

/// Signed turn from `from` to `to` in `(-pi, pi]`, positive clockwise.
pub fn turn_delta(from: f64, to: f64) -> f64 {
    to_pi(to - from)
}

/// Rounds `nvoz` away from `voz` onto the grid `voz + k*unit`.
pub fn discretize_dir(voz: f64, nvoz: f64, unit: f64) -> f64 {
    if unit <= 0.0 {
        return nvoz;
    }
    let delta = nvoz - voz;
    f64::from(sign(delta)) * (delta.abs() / unit).ceil() * unit + voz
}

/// Total-order wrapper for sorting floats.
#[derive(Debug, Clone, Copy)]
pub struct FloatOrd(pub f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
