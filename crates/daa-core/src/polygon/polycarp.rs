//! Exact point-versus-moving-polygon detection.
//!
//! For every edge the point crosses the edge's supporting line when
//! `det(e(t), r(t)) = 0`, a quadratic in `t` because both the edge vector
//! and the point's offset from the edge start move linearly. The roots that
//! fall inside the segment split the window into pieces whose midpoints are
//! then classified by containment.

use super::nice::{check_nice, BUFF};
use super::{altitude_window, horizon, DetectionPolygon, MovingPolygon3D, PolygonConflict};
use crate::params::{ParameterAcceptor, ParameterData};
use crate::util::{almost_equals, root, EPSILON};
use crate::vect::{Vect2Ext, Vect3, Vect3Ext};

#[derive(Debug, Clone, PartialEq)]
pub struct Polycarp3D {
    id: String,
    /// Run the niceness check before detecting.
    check_nice: bool,
}

impl Default for Polycarp3D {
    fn default() -> Self {
        Self {
            id: String::new(),
            check_nice: true,
        }
    }
}

impl Polycarp3D {
    pub fn new(check_nice: bool) -> Self {
        Self {
            id: String::new(),
            check_nice,
        }
    }

    pub fn checks_niceness(&self) -> bool {
        self.check_nice
    }

    pub fn set_check_nice(&mut self, on: bool) {
        self.check_nice = on;
    }

    /// Times in `[lo, hi]` where the point crosses a polygon edge.
    fn crossing_times(p0: &Vect3, vp: &Vect3, mp: &MovingPolygon3D, lo: f64, hi: f64) -> Vec<f64> {
        let n = mp.len();
        let mut times = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            let e0 = mp.start[j] - mp.start[i];
            let e1 = mp.velocities[j] - mp.velocities[i];
            let r0 = p0.vect2() - mp.start[i];
            let r1 = vp.vect2() - mp.velocities[i];
            let a = e1.det(&r1);
            let b = e0.det(&r1) + e1.det(&r0);
            let c = e0.det(&r0);
            let a = if a.abs() < EPSILON { 0.0 } else { a };
            for eps in [-1, 1] {
                let Some(t) = root(a, b, c, eps) else {
                    continue;
                };
                if !t.is_finite() || t < lo || t > hi {
                    continue;
                }
                let e = e0 + e1 * t;
                let r = r0 + r1 * t;
                let len2 = e.sqv();
                if len2 == 0.0 {
                    continue;
                }
                let u = r.dot(&e) / len2;
                let slack = BUFF / len2.sqrt();
                if u >= -slack && u <= 1.0 + slack {
                    times.push(t);
                }
            }
        }
        times
    }

    fn inside(so: &Vect3, vo: &Vect3, mp: &MovingPolygon3D, t: f64) -> bool {
        mp.horizontal_at(t).contains(&so.linear(vo, t).vect2())
    }

    fn detect(
        so: &Vect3,
        vo: &Vect3,
        mp: &MovingPolygon3D,
        b: f64,
        t: f64,
    ) -> Vec<PolygonConflict> {
        let Some((lo, hi)) = altitude_window(b, t, mp.vspeed, mp.bottom, mp.top, so.z, vo.z) else {
            return Vec::new();
        };
        if almost_equals(lo, hi) {
            return if Self::inside(so, vo, mp, lo) {
                vec![PolygonConflict::at(so, vo, mp, lo, hi)]
            } else {
                Vec::new()
            };
        }

        let mut cuts = Self::crossing_times(so, vo, mp, lo, hi);
        cuts.push(lo);
        cuts.push(hi);
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|x, y| almost_equals(*x, *y));

        let mut out: Vec<PolygonConflict> = Vec::new();
        for w in cuts.windows(2) {
            let (t0, t1) = (w[0], w[1]);
            if !Self::inside(so, vo, mp, (t0 + t1) / 2.0) {
                continue;
            }
            match out.last_mut() {
                Some(last) if almost_equals(last.time_out, t0) => {
                    *last = PolygonConflict::at(so, vo, mp, last.time_in, t1);
                }
                _ => out.push(PolygonConflict::at(so, vo, mp, t0, t1)),
            }
        }
        out
    }
}

impl ParameterAcceptor for Polycarp3D {
    fn parameters(&self) -> ParameterData {
        let mut p = ParameterData::new();
        p.set_bool("checkNice", self.check_nice);
        if !self.id.is_empty() {
            p.set_string("id", &self.id);
        }
        p
    }

    fn set_parameters(&mut self, p: &ParameterData) {
        if let Some(on) = p.bool("checkNice") {
            self.check_nice = on;
        }
        if let Some(id) = p.string("id") {
            self.id = id.to_string();
        }
    }
}

impl DetectionPolygon for Polycarp3D {
    fn canonical_class(&self) -> &'static str {
        "Polycarp3D"
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
        if !self.check_nice {
            return Self::detect(so, vo, mp, b, t);
        }
        let start = mp.horizontal_at(0.0);
        match check_nice(&start) {
            Ok(nice) if nice == start => Self::detect(so, vo, mp, b, t),
            Ok(_) => {
                let mut rev = mp.clone();
                rev.start.reverse();
                rev.velocities.reverse();
                Self::detect(so, vo, &rev, b, t)
            }
            // Already logged by the check.
            Err(_) => Vec::new(),
        }
    }

    fn copy(&self) -> Box<dyn DetectionPolygon> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn DetectionPolygon> {
        Box::new(Self::default())
    }
}
