//! Polygon well-formedness.
//!
//! A nice polygon is simple, wound counterclockwise, and has no vertex
//! closer than [`BUFF`] to an edge it does not belong to.

use tracing::warn;

use super::Poly2D;
use crate::error::{DaaError, Result};
use crate::vect::{Vect2, Vect2Ext};

/// Minimum clearance between distinct polygon features, meters.
pub const BUFF: f64 = 0.1;

fn orient(p: &Vect2, q: &Vect2, r: &Vect2) -> f64 {
    (q - p).det(&(r - p))
}

fn on_segment(p: &Vect2, q: &Vect2, r: &Vect2) -> bool {
    let within = |a: f64, b: f64, v: f64| v >= a.min(b) - BUFF && v <= a.max(b) + BUFF;
    within(p.x, q.x, r.x) && within(p.y, q.y, r.y)
}

/// Closed segments `a1a2` and `b1b2` touch or cross.
pub fn segments_intersect(a1: &Vect2, a2: &Vect2, b1: &Vect2, b2: &Vect2) -> bool {
    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);
    // |orient| is the distance to the line times the segment length.
    let tol_a = BUFF * (a2 - a1).norm();
    let tol_b = BUFF * (b2 - b1).norm();

    if (o1.abs() <= tol_a && on_segment(a1, a2, b1))
        || (o2.abs() <= tol_a && on_segment(a1, a2, b2))
        || (o3.abs() <= tol_b && on_segment(b1, b2, a1))
        || (o4.abs() <= tol_b && on_segment(b1, b2, a2))
    {
        return true;
    }
    (o1 > 0.0) != (o2 > 0.0) && (o3 > 0.0) != (o4 > 0.0)
}

/// Distance from `p` to the closed segment `ab`.
pub fn segment_distance(p: &Vect2, a: &Vect2, b: &Vect2) -> f64 {
    let ab = b - a;
    let len2 = ab.sqv();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let r = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * r)).norm()
}

/// Reason the polygon is not nice, or `None`.
pub fn nice_violation(poly: &Poly2D) -> Option<String> {
    let n = poly.len();
    if n < 3 {
        return Some(format!("polygon has {n} vertices, at least 3 required"));
    }
    let v = &poly.vertices;
    for i in 0..n {
        for j in (i + 1)..n {
            if (v[i] - v[j]).norm() < BUFF {
                return Some(format!("vertices {i} and {j} coincide"));
            }
        }
    }
    for i in 0..n {
        let prev = v[(i + n - 1) % n];
        let next = v[(i + 1) % n];
        if segment_distance(&v[i], &prev, &next) < BUFF {
            return Some(format!("vertex {i} is collinear with its neighbours"));
        }
    }
    for i in 0..n {
        let (a1, a2) = (v[i], v[(i + 1) % n]);
        for k in 0..n {
            if k == i || k == (i + 1) % n {
                continue;
            }
            if segment_distance(&v[k], &a1, &a2) < BUFF {
                return Some(format!("vertex {k} lies on edge {i}"));
            }
        }
        // Edges sharing a vertex are covered by the vertex checks.
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_intersect(&a1, &a2, &v[j], &v[(j + 1) % n]) {
                return Some(format!("edges {i} and {j} intersect"));
            }
        }
    }
    if !poly.is_counterclockwise() {
        return Some("polygon is wound clockwise".to_string());
    }
    None
}

pub fn is_nice(poly: &Poly2D) -> bool {
    nice_violation(poly).is_none()
}

/// Nice version of `poly`, reversing the vertex order at most once.
pub fn check_nice(poly: &Poly2D) -> Result<Poly2D> {
    let Some(reason) = nice_violation(poly) else {
        return Ok(poly.clone());
    };
    let reversed = poly.reversed();
    if is_nice(&reversed) {
        return Ok(reversed);
    }
    warn!(vertices = poly.len(), %reason, "Rejecting polygon");
    Err(DaaError::BadPolygon(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::vect2;

    fn square() -> Poly2D {
        Poly2D::new(vec![vect2(0.0, 0.0), vect2(10.0, 0.0), vect2(10.0, 10.0), vect2(0.0, 10.0)])
    }

    #[test]
    fn test_square_is_nice() {
        assert!(is_nice(&square()));
        assert_eq!(check_nice(&square()).unwrap(), square());
    }

    #[test]
    fn test_clockwise_square_is_reversed() {
        let cw = square().reversed();
        assert!(!is_nice(&cw));
        let fixed = check_nice(&cw).unwrap();
        assert!(fixed.is_counterclockwise());
    }

    #[test]
    fn test_bow_tie_is_rejected() {
        let bow = Poly2D::new(
            vec![vect2(0.0, 0.0), vect2(10.0, 10.0), vect2(10.0, 0.0), vect2(0.0, 10.0)],
        );
        assert!(nice_violation(&bow).is_some_and(|r| r.contains("intersect")));
        assert!(matches!(check_nice(&bow), Err(DaaError::BadPolygon(_))));
    }

    #[test]
    fn test_degenerate_features() {
        let dup = Poly2D::new(
            vec![vect2(0.0, 0.0), vect2(10.0, 0.0), vect2(10.0, 0.01), vect2(0.0, 10.0)],
        );
        assert!(!is_nice(&dup));
        let flat =
            Poly2D::new(vec![vect2(0.0, 0.0), vect2(5.0, 0.0), vect2(10.0, 0.0), vect2(0.0, 10.0)]);
        assert!(!is_nice(&flat));
        assert!(!is_nice(&Poly2D::new(vec![vect2(0.0, 0.0), vect2(1.0, 1.0)])));
    }

    #[test]
    fn test_segment_helpers() {
        assert!(segments_intersect(
            &vect2(0.0, 0.0),
            &vect2(2.0, 2.0),
            &vect2(0.0, 2.0),
            &vect2(2.0, 0.0),
        ));
        assert!(!segments_intersect(
            &vect2(0.0, 0.0),
            &vect2(1.0, 0.0),
            &vect2(0.0, 1.0),
            &vect2(1.0, 1.0),
        ));
        let (a, b) = (vect2(0.0, 0.0), vect2(10.0, 0.0));
        assert!((segment_distance(&vect2(5.0, 3.0), &a, &b) - 3.0).abs() < 1e-12);
        assert!((segment_distance(&vect2(13.0, 4.0), &a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_touch_tolerance_is_a_distance() {
        // 5 cm off a 10 km edge touches it.
        let (a1, a2) = (vect2(0.0, 0.0), vect2(10000.0, 0.0));
        assert!(segments_intersect(&a1, &a2, &vect2(5000.0, 0.05), &vect2(5000.0, 100.0)));
        assert!(!segments_intersect(&a1, &a2, &vect2(5000.0, 0.5), &vect2(5000.0, 100.0)));
        // 15 cm off a 50 cm edge does not.
        let (a1, a2) = (vect2(0.0, 0.0), vect2(0.5, 0.0));
        assert!(!segments_intersect(&a1, &a2, &vect2(0.25, 0.15), &vect2(0.25, 5.0)));
    }
}
