//! Horizontal-only circular protected zone.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{effective_horizon, ConflictData, Detection3D, LossData};
use crate::horizontal::{self, ENTRY, EXIT};
use crate::params::{ParameterAcceptor, ParameterData, UnitMemory};
use crate::units::NMI;
use crate::util::{almost_equals, sq};
use crate::vect::{Vect2, Vect3, Vect3Ext};

/// Time of closest horizontal approach for absolute velocities.
pub fn tcpa(s: &Vect2, vo: &Vect2, vi: &Vect2) -> f64 {
    horizontal::tcpa(s, &(vo - vi))
}

pub fn los(s: &Vect2, d: f64) -> bool {
    s.norm_squared() < sq(d)
}

/// Horizontal loss interval inside `[B, T]`.
pub fn detection(s: &Vect2, vo: &Vect2, vi: &Vect2, d: f64, b: f64, t: f64) -> LossData {
    let t = effective_horizon(t);
    let v = vo - vi;
    if almost_equals(v.norm_squared(), 0.0) {
        return if los(s, d) {
            LossData::new(b, t)
        } else {
            LossData::empty()
        };
    }
    if horizontal::delta(s, &v, d) <= 0.0 {
        return LossData::empty();
    }
    match (
        horizontal::theta_d(s, &v, ENTRY, d),
        horizontal::theta_d(s, &v, EXIT, d),
    ) {
        (Some(tin), Some(tout)) => LossData::new(tin.max(b), tout.min(t)),
        _ => LossData::empty(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CD2D {
    pub d: f64,
    id: String,
    #[serde(skip)]
    units: UnitMemory,
}

impl Default for CD2D {
    fn default() -> Self {
        Self::new(5.0 * NMI)
    }
}

impl CD2D {
    pub fn new(d: f64) -> Self {
        Self {
            d: d.abs(),
            id: String::new(),
            units: UnitMemory::default(),
        }
    }
}

impl ParameterAcceptor for CD2D {
    fn parameters(&self) -> ParameterData {
        let mut p = ParameterData::new();
        p.set_internal("D", self.d, self.units.unit("D", "nmi"));
        if !self.id.is_empty() {
            p.set_string("id", &self.id);
        }
        p
    }

    fn set_parameters(&mut self, p: &ParameterData) {
        self.units.remember(p, "D");
        if let Some(d) = p.value("D") {
            self.d = d.abs();
        }
        if let Some(id) = p.string("id") {
            self.id = id.to_string();
        }
    }
}

impl Detection3D for CD2D {
    fn canonical_class(&self) -> &'static str {
        "CD2D"
    }

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn violation(&self, so: &Vect3, _vo: &Vect3, si: &Vect3, _vi: &Vect3) -> bool {
        los(&(so - si).vect2(), self.d)
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
        let s2 = s.vect2();
        let loss = detection(&s2, &vo.vect2(), &vi.vect2(), self.d, b, t);
        let t_crit = horizontal::tcpa(&s2, &v.vect2()).max(b).min(effective_horizon(t));
        let dist_crit = (s2 + v.vect2() * t_crit).norm() / self.d;
        ConflictData::new(loss, t_crit, dist_crit, s, v)
    }

    fn contains(&self, other: &dyn Detection3D) -> bool {
        other
            .as_any()
            .downcast_ref::<CD2D>()
            .is_some_and(|o| self.d >= o.d)
    }

    fn copy(&self) -> Box<dyn Detection3D> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn Detection3D> {
        Box::new(CD2D::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::{vect2, vect3};

    #[test]
    fn test_ignores_altitude() {
        let cd = CD2D::default();
        let so = vect3(10000.0, 0.0, 5000.0);
        let vo = vect3(-100.0, 0.0, 0.0);
        let cdata = cd.conflict_detection(&so, &vo, &Vect3::zeros(), &Vect3::zeros(), 0.0, 200.0);
        assert!(cdata.conflict());
        assert!((cdata.time_in() - 7.4).abs() < 1e-6);
    }

    #[test]
    fn test_tangent_is_not_conflict() {
        let ld = detection(
            &vect2(-10000.0, 1000.0),
            &vect2(100.0, 0.0),
            &vect2(0.0, 0.0),
            1000.0,
            0.0,
            500.0,
        );
        assert!(!ld.conflict());
    }
}
