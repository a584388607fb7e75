//! Cylindrical protected volume: radius `D`, half-height `H`.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{effective_horizon, ConflictData, Detection3D, LossData};
use crate::horizontal::{self, ENTRY, EXIT};
use crate::params::{ParameterAcceptor, ParameterData, UnitMemory};
use crate::units::{FT, NMI};
use crate::util::{almost_equals, root2b, sq};
use crate::vect::{Vect3, Vect3Ext};
use crate::vertical;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CD3DTable {
    pub d: f64,
    pub h: f64,
}

impl Default for CD3DTable {
    fn default() -> Self {
        Self {
            d: 5.0 * NMI,
            h: 1000.0 * FT,
        }
    }
}

impl CD3DTable {
    /// # Arguments
    /// * `d` - Horizontal radius in meters
    /// * `h` - Vertical half-height in meters
    pub fn new(d: f64, h: f64) -> Self {
        Self {
            d: d.abs(),
            h: h.abs(),
        }
    }

    pub fn set_d(&mut self, d: f64) {
        self.d = d.abs();
    }

    pub fn set_h(&mut self, h: f64) {
        self.h = h.abs();
    }

    pub fn contains(&self, other: &CD3DTable) -> bool {
        self.d >= other.d && self.h >= other.h
    }
}

/// Strictly inside the cylinder.
pub fn los(s: &Vect3, d: f64, h: f64) -> bool {
    s.vect2().norm_squared() < sq(d) && s.z.abs() < h
}

/// Conflict at any future time.
pub fn cd3d(s: &Vect3, vo: &Vect3, vi: &Vect3, d: f64, h: f64) -> bool {
    detection(s, vo, vi, d, h, 0.0, f64::INFINITY).conflict()
}

/// Conflict inside `[B, T]`.
pub fn cd3d_window(s: &Vect3, vo: &Vect3, vi: &Vect3, d: f64, h: f64, b: f64, t: f64) -> bool {
    detection(s, vo, vi, d, h, b, t).conflict()
}

/// Loss interval inside `[B, T]`.
pub fn detection(s: &Vect3, vo: &Vect3, vi: &Vect3, d: f64, h: f64, b: f64, t: f64) -> LossData {
    let t = effective_horizon(t);
    let v = vo - vi;
    let s2 = s.vect2();
    let v2 = v.vect2();

    if vo.almost_eq(vi) {
        return if los(s, d, h) {
            LossData::new(b, t)
        } else {
            LossData::empty()
        };
    }

    if almost_equals(v2.norm_squared(), 0.0) {
        if s2.norm_squared() >= sq(d) {
            return LossData::empty();
        }
        let tin = vertical::theta_h(s.z, v.z, ENTRY, h);
        let tout = vertical::theta_h(s.z, v.z, EXIT, h);
        return LossData::new(tin.max(b), tout.min(t));
    }

    if horizontal::delta(&s2, &v2, d) <= 0.0 {
        return LossData::empty();
    }
    let (Some(td1), Some(td2)) = (
        horizontal::theta_d(&s2, &v2, ENTRY, d),
        horizontal::theta_d(&s2, &v2, EXIT, d),
    ) else {
        return LossData::empty();
    };

    if almost_equals(v.z, 0.0) {
        return if s.z.abs() < h {
            LossData::new(td1.max(b), td2.min(t))
        } else {
            LossData::empty()
        };
    }

    let tin = td1.max(vertical::theta_h(s.z, v.z, ENTRY, h));
    let tout = td2.min(vertical::theta_h(s.z, v.z, EXIT, h));
    LossData::new(tin.max(b), tout.min(t))
}

/// Time in `[B, T]` minimizing the cylindrical norm of the relative position.
pub fn tccpa(s: &Vect3, vo: &Vect3, vi: &Vect3, d: f64, h: f64, b: f64, t: f64) -> f64 {
    let t = effective_horizon(t);
    let v = vo - vi;
    let s2 = s.vect2();
    let v2 = v.vect2();
    let clamp = |x: f64| x.max(b).min(t);

    let mut candidates = vec![b, clamp(horizontal::tcpa(&s2, &v2))];
    if t.is_finite() {
        candidates.push(t);
    }
    if v.z != 0.0 {
        candidates.push(clamp(vertical::time_coalt(s.z, v.z)));
    }
    // Times where the horizontal and vertical ratios are equal.
    let a = sq(h) * v2.norm_squared() - sq(d) * sq(v.z);
    let bb = sq(h) * s2.dot(&v2) - sq(d) * s.z * v.z;
    let c = sq(h) * s2.norm_squared() - sq(d) * sq(s.z);
    for eps in [-1, 1] {
        if let Some(r) = root2b(a, bb, c, eps) {
            if r.is_finite() {
                candidates.push(clamp(r));
            }
        }
    }

    candidates
        .into_iter()
        .map(|tc| (tc, s.linear(&v, tc).cyl_norm(d, h)))
        .min_by(|x, y| x.1.total_cmp(&y.1))
        .map_or(b, |(tc, _)| tc)
}

/// Cylinder detector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CDCylinder {
    pub table: CD3DTable,
    id: String,
    #[serde(skip)]
    units: UnitMemory,
}

impl CDCylinder {
    pub fn new(table: CD3DTable) -> Self {
        Self {
            table,
            id: String::new(),
            units: UnitMemory::default(),
        }
    }

    /// # Arguments
    /// * `d` - Horizontal radius in meters
    /// * `h` - Vertical half-height in meters
    pub fn with_dimensions(d: f64, h: f64) -> Self {
        Self::new(CD3DTable::new(d, h))
    }

    pub fn d(&self) -> f64 {
        self.table.d
    }

    pub fn h(&self) -> f64 {
        self.table.h
    }
}

impl ParameterAcceptor for CDCylinder {
    fn parameters(&self) -> ParameterData {
        let mut p = ParameterData::new();
        p.set_internal("D", self.table.d, self.units.unit("D", "nmi"));
        p.set_internal("H", self.table.h, self.units.unit("H", "ft"));
        if !self.id.is_empty() {
            p.set_string("id", &self.id);
        }
        p
    }

    fn set_parameters(&mut self, p: &ParameterData) {
        self.units.remember(p, "D");
        self.units.remember(p, "H");
        if let Some(d) = p.value("D") {
            self.table.set_d(d);
        }
        if let Some(h) = p.value("H") {
            self.table.set_h(h);
        }
        if let Some(id) = p.string("id") {
            self.id = id.to_string();
        }
    }
}

impl Detection3D for CDCylinder {
    fn canonical_class(&self) -> &'static str {
        "CDCylinder"
    }

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn violation(&self, so: &Vect3, _vo: &Vect3, si: &Vect3, _vi: &Vect3) -> bool {
        los(&(so - si), self.table.d, self.table.h)
    }

    fn conflict(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3, b: f64, t: f64) -> bool {
        detection(&(so - si), vo, vi, self.table.d, self.table.h, b, t).conflict()
    }

    fn conflict_detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData {
        let s = so - si;
        let v = vo - vi;
        let CD3DTable { d, h } = self.table;
        let loss = detection(&s, vo, vi, d, h, b, t);
        let t_crit = tccpa(&s, vo, vi, d, h, b, t);
        let dist_crit = s.linear(&v, t_crit).cyl_norm(d, h);
        ConflictData::new(loss, t_crit, dist_crit, s, v)
    }

    fn contains(&self, other: &dyn Detection3D) -> bool {
        other
            .as_any()
            .downcast_ref::<CDCylinder>()
            .is_some_and(|o| self.table.contains(&o.table))
    }

    fn copy(&self) -> Box<dyn Detection3D> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn Detection3D> {
        Box::new(CDCylinder::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::vect3;

    #[test]
    fn test_head_on_crossing() {
        let cd = CDCylinder::default();
        let so = vect3(10000.0, 0.0, 0.0);
        let vo = vect3(-100.0, 0.0, 0.0);
        let zero = Vect3::zeros();
        assert!(!cd.violation(&so, &vo, &zero, &zero));
        let cdata = cd.conflict_detection(&so, &vo, &zero, &zero, 0.0, 200.0);
        assert!(cdata.conflict());
        assert!((cdata.time_in() - 7.4).abs() < 1e-6);
        assert!((cdata.time_out() - 192.6).abs() < 1e-6);
        assert!((cdata.time_crit - 100.0).abs() < 1e-6);
        assert!(cdata.dist_crit < 1.0);
    }

    #[test]
    fn test_equal_velocities() {
        let v = vect3(50.0, 20.0, 1.0);
        let inside = vect3(100.0, 0.0, 0.0);
        let outside = vect3(100000.0, 0.0, 0.0);
        let ld = detection(&inside, &v, &v, 9260.0, 304.8, 5.0, 60.0);
        assert_eq!(ld, LossData::new(5.0, 60.0));
        assert!(!detection(&outside, &v, &v, 9260.0, 304.8, 0.0, 60.0).conflict());
    }

    #[test]
    fn test_vertical_only_motion() {
        let s = vect3(100.0, 0.0, -1000.0);
        let vo = vect3(0.0, 0.0, 10.0);
        let ld = detection(&s, &vo, &Vect3::zeros(), 9260.0, 300.0, 0.0, 300.0);
        assert!((ld.time_in - 70.0).abs() < 1e-9);
        assert!((ld.time_out - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_but_vertically_separated() {
        let s = vect3(10000.0, 0.0, 500.0);
        let vo = vect3(-100.0, 0.0, 0.0);
        assert!(!cd3d(&s, &vo, &Vect3::zeros(), 9260.0, 304.8));
    }

    #[test]
    fn test_contains_and_parameters() {
        let big = CDCylinder::with_dimensions(10000.0, 400.0);
        let small = CDCylinder::with_dimensions(5000.0, 300.0);
        assert!(big.contains(&small));
        assert!(!small.contains(&big));

        let mut copy = CDCylinder::default();
        copy.set_parameters(&big.parameters());
        assert_eq!(copy.table, big.table);
        assert_eq!(big.parameters().unit("D"), Some("nmi"));
    }

    #[test]
    fn test_negative_horizon_is_unbounded() {
        let s = vect3(100000.0, 0.0, 0.0);
        let vo = vect3(-100.0, 0.0, 0.0);
        let ld = detection(&s, &vo, &Vect3::zeros(), 9260.0, 304.8, 0.0, -1.0);
        assert!(ld.conflict());
        assert!((ld.time_in - 907.4).abs() < 1e-6);
    }
}
