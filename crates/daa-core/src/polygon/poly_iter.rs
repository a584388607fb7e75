//! Approximate point-versus-polygon detection by time stepping.
//!
//! A moving enclosing circle rules out most encounters cheaply. Otherwise
//! containment is sampled every `time_step` seconds, boundaries are refined
//! by bisection, and interior intervals shorter than one step are dropped.

use super::{altitude_window, horizon, DetectionPolygon, MovingPolygon3D, PolygonConflict};
use crate::horizontal::tcpa;
use crate::params::{ParameterAcceptor, ParameterData, UnitMemory};
use crate::vect::{Vect2, Vect3, Vect3Ext};

/// Bisection stops once the bracket is this narrow, seconds.
const MICRO_TOL: f64 = 1e-4;

const DEFAULT_TIME_STEP: f64 = 1.0;

fn valid_step(step: f64) -> bool {
    step.is_finite() && step > 0.0
}

fn point_at(so: &Vect3, vo: &Vect3, t: f64) -> Vect2 {
    so.linear(vo, t).vect2()
}

fn inside(so: &Vect3, vo: &Vect3, mp: &MovingPolygon3D, t: f64) -> bool {
    mp.horizontal_at(t).contains(&point_at(so, vo, t))
}

/// The point never comes within the polygon's enclosing circle in `[lo, hi]`.
fn clear_of_circle(so: &Vect3, vo: &Vect3, mp: &MovingPolygon3D, lo: f64, hi: f64) -> bool {
    let start = mp.horizontal_at(0.0);
    let c0 = start.centroid();
    let vc = if mp.is_empty() {
        Vect2::zeros()
    } else {
        mp.velocities.iter().sum::<Vect2>() / mp.len() as f64
    };
    // Vertex-to-centroid distances are convex in t, so the endpoints bound them.
    let r = mp.horizontal_at(lo).bounding_circle().1.max(mp.horizontal_at(hi).bounding_circle().1);
    let s = so.vect2() - c0;
    let v = vo.vect2() - vc;
    let t = tcpa(&s, &v).clamp(lo, hi);
    (s + v * t).norm() > r
}

/// Boundary between `t0` (state `was_in`) and `t1`.
fn poly2d_detection_micro(
    so: &Vect3,
    vo: &Vect3,
    mp: &MovingPolygon3D,
    mut t0: f64,
    mut t1: f64,
    was_in: bool,
) -> f64 {
    while t1 - t0 > MICRO_TOL {
        let mid = (t0 + t1) / 2.0;
        if inside(so, vo, mp, mid) == was_in {
            t0 = mid;
        } else {
            t1 = mid;
        }
    }
    (t0 + t1) / 2.0
}

/// Inside intervals within `[lo, hi]`, ignoring altitude.
fn poly2d_detection(
    so: &Vect3,
    vo: &Vect3,
    mp: &MovingPolygon3D,
    lo: f64,
    hi: f64,
    step: f64,
) -> Vec<(f64, f64)> {
    if !valid_step(step) || mp.len() < 3 || lo > hi || clear_of_circle(so, vo, mp, lo, hi) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut entered = inside(so, vo, mp, lo).then_some(lo);
    let mut prev = lo;
    while prev < hi {
        let t = (prev + step).min(hi);
        let now = inside(so, vo, mp, t);
        match (entered, now) {
            (None, true) => entered = Some(poly2d_detection_micro(so, vo, mp, prev, t, false)),
            (Some(tin), false) => {
                out.push((tin, poly2d_detection_micro(so, vo, mp, prev, t, true)));
                entered = None;
            }
            _ => {}
        }
        prev = t;
    }
    if let Some(tin) = entered {
        out.push((tin, hi));
    }
    out.retain(|&(tin, tout)| tin <= lo || tout >= hi || tout - tin >= step);
    out
}

fn to_conflicts(
    so: &Vect3,
    vo: &Vect3,
    mp: &MovingPolygon3D,
    intervals: Vec<(f64, f64)>,
) -> Vec<PolygonConflict> {
    intervals
        .into_iter()
        .map(|(tin, tout)| PolygonConflict::at(so, vo, mp, tin, tout))
        .collect()
}

/// Time-stepping detector honoring the polygon's altitude band.
#[derive(Debug, Clone, PartialEq)]
pub struct CDPolyIter {
    id: String,
    time_step: f64,
    units: UnitMemory,
}

impl Default for CDPolyIter {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEP)
    }
}

impl CDPolyIter {
    /// Non-positive steps fall back to one second.
    pub fn new(time_step: f64) -> Self {
        Self {
            id: String::new(),
            time_step: if valid_step(time_step) { time_step } else { DEFAULT_TIME_STEP },
            units: UnitMemory::default(),
        }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Non-positive steps are ignored.
    pub fn set_time_step(&mut self, step: f64) {
        if valid_step(step) {
            self.time_step = step;
        }
    }
}

/// Time-stepping detector on the horizontal footprint only.
#[derive(Debug, Clone, PartialEq)]
pub struct CDPolyIter2D {
    id: String,
    time_step: f64,
    units: UnitMemory,
}

impl Default for CDPolyIter2D {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEP)
    }
}

impl CDPolyIter2D {
    /// Non-positive steps fall back to one second.
    pub fn new(time_step: f64) -> Self {
        Self {
            id: String::new(),
            time_step: if valid_step(time_step) { time_step } else { DEFAULT_TIME_STEP },
            units: UnitMemory::default(),
        }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn set_time_step(&mut self, step: f64) {
        if valid_step(step) {
            self.time_step = step;
        }
    }
}

macro_rules! iter_parameters {
    ($ty:ty) => {
        impl ParameterAcceptor for $ty {
            fn parameters(&self) -> ParameterData {
                let mut p = ParameterData::new();
                p.set_internal("timeStep", self.time_step, self.units.unit("timeStep", "s"));
                if !self.id.is_empty() {
                    p.set_string("id", &self.id);
                }
                p
            }

            fn set_parameters(&mut self, p: &ParameterData) {
                self.units.remember(p, "timeStep");
                if let Some(step) = p.value("timeStep") {
                    self.set_time_step(step);
                }
                if let Some(id) = p.string("id") {
                    self.id = id.to_string();
                }
            }
        }
    };
}

iter_parameters!(CDPolyIter);
iter_parameters!(CDPolyIter2D);

impl DetectionPolygon for CDPolyIter {
    fn canonical_class(&self) -> &'static str {
        "CDPolyIter"
    }

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn conflict_detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        mp: &MovingPolygon3D,
        b: f64,
        t: f64,
    ) -> Vec<PolygonConflict> {
        let t = horizon(t);
        let Some((lo, hi)) = altitude_window(b, t, mp.vspeed, mp.bottom, mp.top, so.z, vo.z) else {
            return Vec::new();
        };
        to_conflicts(so, vo, mp, poly2d_detection(so, vo, mp, lo, hi, self.time_step))
    }

    fn copy(&self) -> Box<dyn DetectionPolygon> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn DetectionPolygon> {
        Box::new(Self::default())
    }
}

impl DetectionPolygon for CDPolyIter2D {
    fn canonical_class(&self) -> &'static str {
        "CDPolyIter2D"
    }

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn violation(&self, so: &Vect3, _vo: &Vect3, poly: &super::Poly3D) -> bool {
        poly.poly.contains(&so.vect2())
    }

    fn conflict_detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        mp: &MovingPolygon3D,
        b: f64,
        t: f64,
    ) -> Vec<PolygonConflict> {
        let t = horizon(t);
        to_conflicts(so, vo, mp, poly2d_detection(so, vo, mp, b, t, self.time_step))
    }

    fn copy(&self) -> Box<dyn DetectionPolygon> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn DetectionPolygon> {
        Box::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::{Poly2D, Poly3D, Polycarp3D};
    use crate::vect::{vect2, vect3};

    fn rect(x0: f64, x1: f64, y0: f64, y1: f64) -> Poly2D {
        Poly2D::new(vec![vect2(x0, y0), vect2(x1, y0), vect2(x1, y1), vect2(x0, y1)])
    }

    #[test]
    fn test_agrees_with_exact_detector_on_square() {
        let p3 = Poly3D::new(rect(-1000.0, 1000.0, -1000.0, 1000.0), 0.0, 1000.0);
        let mp = MovingPolygon3D::translating(&p3, &vect3(0.0, 20.0, 0.0));
        let so = vect3(-5000.0, 500.0, 500.0);
        let vo = vect3(100.0, 0.0, 0.0);
        let exact = Polycarp3D::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0);
        let approx = CDPolyIter::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0);
        assert_eq!(exact.len(), 1);
        assert_eq!(approx.len(), 1);
        assert!((exact[0].time_in - approx[0].time_in).abs() < 1e-3);
        assert!((exact[0].time_out - approx[0].time_out).abs() < 1e-3);
    }

    #[test]
    fn test_short_blip_is_dropped() {
        let mp = MovingPolygon3D::stationary(&Poly3D::new(
            rect(-20.0, 30.0, -1000.0, 1000.0),
            0.0,
            1000.0,
        ));
        let so = vect3(-5000.0, 0.0, 500.0);
        let vo = vect3(100.0, 0.0, 0.0);
        assert_eq!(Polycarp3D::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0).len(), 1);
        assert!(CDPolyIter::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0).is_empty());
        assert_eq!(CDPolyIter::new(0.1).conflict_detection(&so, &vo, &mp, 0.0, 100.0).len(), 1);
    }

    #[test]
    fn test_far_polygon_is_pruned() {
        let mp = MovingPolygon3D::stationary(&Poly3D::new(
            rect(-100.0, 100.0, 5000.0, 5200.0),
            0.0,
            1000.0,
        ));
        let so = vect3(-5000.0, 0.0, 500.0);
        let vo = vect3(100.0, 0.0, 0.0);
        assert!(clear_of_circle(&so, &vo, &mp, 0.0, 100.0));
        assert!(!CDPolyIter::default().conflict(&so, &vo, &mp, 0.0, 100.0));
    }

    #[test]
    fn test_2d_variant_ignores_altitude() {
        let mp = MovingPolygon3D::stationary(&Poly3D::new(
            rect(-1000.0, 1000.0, -1000.0, 1000.0),
            0.0,
            1000.0,
        ));
        let so = vect3(-5000.0, 0.0, 9000.0);
        let vo = vect3(100.0, 0.0, 0.0);
        assert!(!CDPolyIter::default().conflict(&so, &vo, &mp, 0.0, 100.0));
        let cs = CDPolyIter2D::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0);
        assert_eq!(cs.len(), 1);
        assert!((cs[0].time_in - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_time_step_parameter() {
        let mut det = CDPolyIter::default();
        let mut p = ParameterData::new();
        p.set_value("timeStep", 0.25, "s").unwrap();
        det.set_parameters(&p);
        assert_eq!(det.time_step(), 0.25);
        det.set_time_step(-1.0);
        assert_eq!(det.time_step(), 0.25);
        assert_eq!(det.parameters().value("timeStep"), Some(0.25));
    }

    #[test]
    fn test_degenerate_step_still_terminates() {
        assert_eq!(CDPolyIter::new(0.0).time_step(), DEFAULT_TIME_STEP);
        assert_eq!(CDPolyIter::new(-2.0).time_step(), DEFAULT_TIME_STEP);
        assert_eq!(CDPolyIter2D::new(f64::NAN).time_step(), DEFAULT_TIME_STEP);

        let mp = MovingPolygon3D::stationary(&Poly3D::new(
            rect(-1000.0, 1000.0, -1000.0, 1000.0),
            0.0,
            1000.0,
        ));
        let so = vect3(-5000.0, 0.0, 500.0);
        let vo = vect3(100.0, 0.0, 0.0);
        let cs = CDPolyIter::new(0.0).conflict_detection(&so, &vo, &mp, 0.0, 100.0);
        assert_eq!(cs.len(), 1);
        assert!((cs[0].time_in - 40.0).abs() < 1e-3);
        assert!(poly2d_detection(&so, &vo, &mp, 0.0, 100.0, 0.0).is_empty());
    }
}
