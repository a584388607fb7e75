//! Point-versus-polygon conflict detection.
//!
//! Polygons are horizontal vertex lists extruded between a bottom and a top
//! altitude. A [`MovingPolygon3D`] moves each vertex linearly and the
//! altitude band at a constant vertical speed.

pub mod nice;
pub mod poly_iter;
pub mod polycarp;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DaaError, Result};
use crate::params::ParameterAcceptor;
use crate::util::almost_equals;
use crate::vect::{Vect2, Vect2Ext, Vect3, Vect3Ext};
use crate::vertical::theta_h;

pub use nice::{check_nice, is_nice};
pub use poly_iter::{CDPolyIter, CDPolyIter2D};
pub use polycarp::Polycarp3D;

/// Horizontal polygon, vertices in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poly2D {
    pub vertices: Vec<Vect2>,
}

impl Poly2D {
    pub fn new(vertices: Vec<Vect2>) -> Self {
        Self { vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Edges as `(start, end)` pairs, closing back to the first vertex.
    pub fn edges(&self) -> impl Iterator<Item = (Vect2, Vect2)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Ray casting; points on the boundary may fall on either side.
    pub fn contains(&self, p: &Vect2) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.vertices[i];
            let vj = self.vertices[j];
            if (vi.y > p.y) != (vj.y > p.y)
                && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Shoelace area, positive when counterclockwise.
    pub fn signed_area(&self) -> f64 {
        self.edges().map(|(a, b)| a.det(&b)).sum::<f64>() / 2.0
    }

    pub fn is_counterclockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Vertex average.
    pub fn centroid(&self) -> Vect2 {
        if self.vertices.is_empty() {
            return Vect2::zeros();
        }
        self.vertices.iter().sum::<Vect2>() / self.vertices.len() as f64
    }

    /// Circle around the vertex average enclosing every vertex.
    pub fn bounding_circle(&self) -> (Vect2, f64) {
        let c = self.centroid();
        let r = self.vertices.iter().map(|v| (v - c).norm()).fold(0.0, f64::max);
        (c, r)
    }

    pub fn reversed(&self) -> Self {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        Self { vertices }
    }
}

/// Polygon extruded between two altitudes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poly3D {
    pub poly: Poly2D,
    pub bottom: f64,
    pub top: f64,
}

impl Poly3D {
    pub fn new(poly: Poly2D, bottom: f64, top: f64) -> Self {
        Self { poly, bottom, top }
    }

    pub fn contains(&self, s: &Vect3) -> bool {
        self.bottom <= s.z && s.z <= self.top && self.poly.contains(&s.vect2())
    }

    pub fn centroid(&self) -> Vect3 {
        let c = self.poly.centroid();
        Vect3::new(c.x, c.y, (self.bottom + self.top) / 2.0)
    }
}

/// Polygon whose vertices move linearly and whose altitude band climbs at
/// `vspeed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingPolygon3D {
    pub start: Vec<Vect2>,
    pub velocities: Vec<Vect2>,
    pub vspeed: f64,
    pub bottom: f64,
    pub top: f64,
}

impl MovingPolygon3D {
    /// Every vertex moves with `v`; the band moves with `v.z`.
    pub fn translating(poly: &Poly3D, v: &Vect3) -> Self {
        Self {
            start: poly.poly.vertices.clone(),
            velocities: vec![v.vect2(); poly.poly.len()],
            vspeed: v.z,
            bottom: poly.bottom,
            top: poly.top,
        }
    }

    pub fn stationary(poly: &Poly3D) -> Self {
        Self::translating(poly, &Vect3::zeros())
    }

    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    pub fn horizontal_at(&self, t: f64) -> Poly2D {
        Poly2D::new(
            self.start
                .iter()
                .zip(&self.velocities)
                .map(|(p, v)| p + v * t)
                .collect(),
        )
    }

    pub fn position(&self, t: f64) -> Poly3D {
        Poly3D::new(
            self.horizontal_at(t),
            self.bottom + self.vspeed * t,
            self.top + self.vspeed * t,
        )
    }

    /// Same motion restarted `t` seconds later.
    pub fn advanced(&self, t: f64) -> Self {
        Self {
            start: self.horizontal_at(t).vertices,
            velocities: self.velocities.clone(),
            vspeed: self.vspeed,
            bottom: self.bottom + self.vspeed * t,
            top: self.top + self.vspeed * t,
        }
    }
}

/// One interval during which the point is inside the polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonConflict {
    pub time_in: f64,
    pub time_out: f64,
    /// Midpoint of the interval.
    pub time_crit: f64,
    /// Horizontal distance to the polygon centroid at `time_crit`.
    pub dist_crit: f64,
}

impl PolygonConflict {
    fn at(so: &Vect3, vo: &Vect3, mp: &MovingPolygon3D, time_in: f64, time_out: f64) -> Self {
        let time_crit = (time_in + time_out) / 2.0;
        let own = so.linear(vo, time_crit).vect2();
        let dist_crit = (mp.horizontal_at(time_crit).centroid() - own).norm();
        Self {
            time_in,
            time_out,
            time_crit,
            dist_crit,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.time_out - self.time_in).max(0.0)
    }
}

/// Detector of conflicts between an aircraft and a polygon.
pub trait DetectionPolygon: ParameterAcceptor + fmt::Debug + Send + Sync {
    fn canonical_class(&self) -> &'static str;

    fn identifier(&self) -> &str;

    fn set_identifier(&mut self, id: &str);

    /// The aircraft is inside the polygon now.
    fn violation(&self, so: &Vect3, vo: &Vect3, poly: &Poly3D) -> bool {
        let _ = vo;
        poly.contains(so)
    }

    fn conflict(&self, so: &Vect3, vo: &Vect3, mp: &MovingPolygon3D, b: f64, t: f64) -> bool {
        !self.conflict_detection(so, vo, mp, b, t).is_empty()
    }

    /// Every interval inside `[b, t]` during which the aircraft is inside the
    /// moving polygon, in time order. A negative `t` means unbounded.
    fn conflict_detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        mp: &MovingPolygon3D,
        b: f64,
        t: f64,
    ) -> Vec<PolygonConflict>;

    fn copy(&self) -> Box<dyn DetectionPolygon>;

    fn make(&self) -> Box<dyn DetectionPolygon>;
}

impl Clone for Box<dyn DetectionPolygon> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Polygon detector for a canonical class name.
pub fn polygon_detector(tag: &str) -> Result<Box<dyn DetectionPolygon>> {
    match tag {
        "Polycarp3D" => Ok(Box::new(Polycarp3D::default())),
        "CDPolyIter" => Ok(Box::new(CDPolyIter::default())),
        "CDPolyIter2D" => Ok(Box::new(CDPolyIter2D::default())),
        other => Err(DaaError::UnknownDetector(other.to_string())),
    }
}

/// Window of `[b, t]` where altitude `sz + vz*t` is inside the band
/// `[bottom, top] + vspeed*t`, or `None`.
pub fn altitude_window(
    b: f64,
    t: f64,
    vspeed: f64,
    bottom: f64,
    top: f64,
    sz: f64,
    vz: f64,
) -> Option<(f64, f64)> {
    if b > t || bottom >= top {
        return None;
    }
    let rvz = vz - vspeed;
    if almost_equals(rvz, 0.0) || almost_equals(b, t) {
        let z = sz + b * vz;
        return (bottom + b * vspeed <= z && z <= top + b * vspeed).then_some((b, t));
    }
    let mid = (bottom + top) / 2.0;
    let half = (top - bottom) / 2.0;
    let thin = theta_h(sz - mid, rvz, -1, half);
    let thout = theta_h(sz - mid, rvz, 1, half);
    if thout < b || thin > t {
        return None;
    }
    Some((thin.min(t).max(b), thout.min(t).max(b)))
}

/// Lookahead end: negative means ten hours.
pub(crate) fn horizon(t: f64) -> f64 {
    if t < 0.0 {
        36_000.0
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::{vect2, vect3};

    fn square(c: Vect2, half: f64) -> Poly2D {
        Poly2D::new(vec![
            vect2(c.x - half, c.y - half),
            vect2(c.x + half, c.y - half),
            vect2(c.x + half, c.y + half),
            vect2(c.x - half, c.y + half),
        ])
    }

    #[test]
    fn test_square_contains_and_winding() {
        let sq = square(vect2(0.0, 0.0), 100.0);
        assert!(sq.contains(&vect2(10.0, -50.0)));
        assert!(!sq.contains(&vect2(150.0, 0.0)));
        assert!(sq.is_counterclockwise());
        assert!(!sq.reversed().is_counterclockwise());
        assert!((sq.signed_area() - 40_000.0).abs() < 1e-9);
        let (c, r) = sq.bounding_circle();
        assert!(c.norm() < 1e-12);
        assert!((r - 100.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_moving_polygon_positions() {
        let p3 = Poly3D::new(square(vect2(0.0, 0.0), 100.0), 0.0, 300.0);
        let mp = MovingPolygon3D::translating(&p3, &vect3(10.0, 0.0, 1.0));
        let at = mp.position(10.0);
        assert!(at.contains(&vect3(150.0, 0.0, 305.0)));
        assert!(!at.contains(&vect3(150.0, 0.0, 5.0)));
        assert_eq!(mp.advanced(10.0).position(0.0), at);
    }

    #[test]
    fn test_altitude_window() {
        // Level flight at 150 inside a fixed band.
        assert_eq!(altitude_window(0.0, 100.0, 0.0, 0.0, 300.0, 150.0, 0.0), Some((0.0, 100.0)));
        // Level at 500 with the band rising toward it.
        let (tin, tout) = altitude_window(0.0, 100.0, 5.0, 0.0, 300.0, 500.0, 0.0).unwrap();
        assert!((tin - 40.0).abs() < 1e-9);
        assert_eq!(tout, 100.0);
        assert_eq!(altitude_window(0.0, 10.0, 0.0, 0.0, 300.0, 500.0, 0.0), None);
    }

    #[test]
    fn test_polygon_detector_tags() {
        for tag in ["Polycarp3D", "CDPolyIter", "CDPolyIter2D"] {
            let det = polygon_detector(tag).unwrap();
            assert_eq!(det.canonical_class(), tag);
            assert_eq!(det.clone().canonical_class(), tag);
        }
        assert!(matches!(polygon_detector("Nope"), Err(DaaError::UnknownDetector(_))));
    }
}
