//! Safety buffers for degraded surveillance.
//!
//! A buffer is the growth of a protected distance that keeps a state-based
//! detector sound when both aircraft only know their positions and
//! velocities within the DO-242A accuracy categories. Buffers are computed
//! per encounter from the relative state and added to the detector's
//! horizontal and vertical thresholds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detection::{CD3DTable, CDCylinder, Detection3D, WcvTable, WCV};
use crate::units::{FT, NMI};
use crate::vect::{Vect2, Vect3, Vect3Ext};

const UNKNOWN: f64 = f64::INFINITY;

/// Horizontal containment radius by NIC, meters.
const NIC_HORIZONTAL: [f64; 12] = [
    UNKNOWN,
    20.0 * NMI,
    8.0 * NMI,
    4.0 * NMI,
    2.0 * NMI,
    1.0 * NMI,
    0.6 * NMI,
    0.2 * NMI,
    0.1 * NMI,
    75.0,
    25.0,
    7.5,
];

/// Vertical containment limit by NIC, meters.
const NIC_VERTICAL: [f64; 12] = [
    UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN,
    112.0, 37.5, 11.0,
];

/// Horizontal 95% position error by NACp, meters.
const NACP_HORIZONTAL: [f64; 12] = [
    UNKNOWN,
    10.0 * NMI,
    4.0 * NMI,
    2.0 * NMI,
    1.0 * NMI,
    0.5 * NMI,
    0.3 * NMI,
    0.1 * NMI,
    0.05 * NMI,
    30.0,
    10.0,
    3.0,
];

/// Vertical 95% position error by NACp, meters.
const NACP_VERTICAL: [f64; 12] = [
    UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN, UNKNOWN,
    45.0, 15.0, 4.0,
];

/// Horizontal 95% velocity error by NACv, m/s.
const NACV_HORIZONTAL: [f64; 5] = [UNKNOWN, 10.0, 3.0, 1.0, 0.3];

/// Vertical 95% velocity error by NACv, m/s.
const NACV_VERTICAL: [f64; 5] = [UNKNOWN, 50.0 * FT, 15.0 * FT, 5.0 * FT, 1.5 * FT];

fn bounded(table: &[f64], category: usize) -> Option<f64> {
    table.get(category).copied().filter(|v| v.is_finite())
}

/// Source of a position accuracy category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionCategory {
    /// Navigation integrity category, a containment bound
    Nic(usize),
    /// Navigation accuracy category for position, a 95% bound
    Nacp(usize),
}

impl PositionCategory {
    /// Horizontal position error bound, `None` when the category is unknown
    /// or gives no bound.
    pub fn horizontal(self) -> Option<f64> {
        match self {
            PositionCategory::Nic(c) => bounded(&NIC_HORIZONTAL, c),
            PositionCategory::Nacp(c) => bounded(&NACP_HORIZONTAL, c),
        }
    }

    pub fn vertical(self) -> Option<f64> {
        match self {
            PositionCategory::Nic(c) => bounded(&NIC_VERTICAL, c),
            PositionCategory::Nacp(c) => bounded(&NACP_VERTICAL, c),
        }
    }
}

pub fn nacv_horizontal(nacv: usize) -> Option<f64> {
    bounded(&NACV_HORIZONTAL, nacv)
}

pub fn nacv_vertical(nacv: usize) -> Option<f64> {
    bounded(&NACV_VERTICAL, nacv)
}

/// Surveillance quality reported by one aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accuracy {
    pub position: PositionCategory,
    pub nacv: usize,
}

impl Accuracy {
    pub fn new(position: PositionCategory, nacv: usize) -> Self {
        Self { position, nacv }
    }
}

/// Time after which closure at `rel_speed` reduced by the velocity errors
/// `b` can no longer consume the separation; infinite when it never stops.
fn closure_time(num: f64, rel_speed: f64, b: f64) -> f64 {
    let den = rel_speed - b;
    if den > 0.0 {
        num / den
    } else {
        f64::INFINITY
    }
}

/// Scalar buffer for a distance `rel_dist` closing at `rel_speed`.
///
/// `ao`/`ai` are the ownship and intruder position errors, `bo`/`bi` their
/// velocity errors, `lambda` the age of the surveillance data and `t` the
/// lookahead time. `None` when the inputs give no finite bound.
#[allow(clippy::too_many_arguments)]
pub fn psi(
    rel_dist: f64,
    rel_speed: f64,
    ao: f64,
    ai: f64,
    bo: f64,
    bi: f64,
    lambda: f64,
    t: f64,
) -> Option<f64> {
    let a = ao + ai;
    let b = bo + bi;
    let l = closure_time(rel_dist + a + lambda * (rel_speed + b), rel_speed, b);
    let buffer = a + (l.min(t) + lambda) * b;
    buffer.is_finite().then_some(buffer)
}

/// Horizontal buffer for the relative position `s` and velocity `v`, with
/// the same error terms as [`psi`].
#[allow(clippy::too_many_arguments)]
pub fn psi_horizontal(
    s: &Vect2,
    v: &Vect2,
    ao: f64,
    ai: f64,
    bo: f64,
    bi: f64,
    lambda: f64,
    t: f64,
) -> Option<f64> {
    let a = ao + ai;
    let b = bo + bi;
    let speed = v.norm();
    let den = speed - b;
    let l = if den > 0.0 {
        let closing = (-s.dot(v)).max(0.0);
        (closing + a * speed + (s.norm() + a) * b) / (den * den)
    } else {
        f64::INFINITY
    };
    let buffer = a + (l.min(t) + lambda) * b;
    buffer.is_finite().then_some(buffer)
}

/// Buffers for one ownship/intruder pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyBuffers {
    pub ownship: Accuracy,
    pub intruder: Accuracy,
    /// Age of the surveillance data, seconds
    pub latency: f64,
}

impl SafetyBuffers {
    pub fn new(ownship: Accuracy, intruder: Accuracy) -> Self {
        Self {
            ownship,
            intruder,
            latency: 0.0,
        }
    }

    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }

    /// Horizontal buffer for relative state `s`, `v` over `t` seconds.
    pub fn horizontal(&self, s: &Vect3, v: &Vect3, t: f64) -> Option<f64> {
        psi_horizontal(
            &s.vect2(),
            &v.vect2(),
            self.ownship.position.horizontal()?,
            self.intruder.position.horizontal()?,
            nacv_horizontal(self.ownship.nacv)?,
            nacv_horizontal(self.intruder.nacv)?,
            self.latency,
            t,
        )
    }

    pub fn vertical(&self, s: &Vect3, v: &Vect3, t: f64) -> Option<f64> {
        psi(
            s.z.abs(),
            v.z.abs(),
            self.ownship.position.vertical()?,
            self.intruder.position.vertical()?,
            nacv_vertical(self.ownship.nacv)?,
            nacv_vertical(self.intruder.nacv)?,
            self.latency,
            t,
        )
    }

    pub fn inflate_cylinder(
        &self,
        cd: &CDCylinder,
        s: &Vect3,
        v: &Vect3,
        t: f64,
    ) -> Option<CDCylinder> {
        let table =
            CD3DTable::new(cd.d() + self.horizontal(s, v, t)?, cd.h() + self.vertical(s, v, t)?);
        Some(CDCylinder::new(table))
    }

    pub fn inflate_wcv(&self, table: &WcvTable, s: &Vect3, v: &Vect3, t: f64) -> Option<WcvTable> {
        Some(WcvTable::new(
            table.dthr + self.horizontal(s, v, t)?,
            table.zthr + self.vertical(s, v, t)?,
            table.tthr,
            table.tcoa,
        ))
    }

    /// Copy of `detector` with thresholds grown for this encounter.
    ///
    /// Well-clear and cylinder detectors are inflated. Other families, and
    /// encounters whose categories give no bound, get an unchanged copy.
    pub fn buffered_detector(
        &self,
        detector: &dyn Detection3D,
        s: &Vect3,
        v: &Vect3,
        t: f64,
    ) -> Box<dyn Detection3D> {
        let any = detector.as_any();
        if let Some(wcv) = any.downcast_ref::<WCV>() {
            if let Some(table) = self.inflate_wcv(&wcv.table, s, v, t) {
                debug!(dthr = table.dthr, zthr = table.zthr, "Buffered well-clear volume");
                let mut buffered = WCV::new(wcv.kind, table);
                buffered.set_identifier(detector.identifier());
                return Box::new(buffered);
            }
        } else if let Some(cd) = any.downcast_ref::<CDCylinder>() {
            if let Some(mut buffered) = self.inflate_cylinder(cd, s, v, t) {
                debug!(d = buffered.d(), h = buffered.h(), "Buffered cylinder");
                buffered.set_identifier(detector.identifier());
                return Box::new(buffered);
            }
        }
        detector.copy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::{vect2, vect3};

    fn good() -> Accuracy {
        Accuracy::new(PositionCategory::Nacp(9), 3)
    }

    #[test]
    fn test_category_tables() {
        assert_eq!(PositionCategory::Nacp(11).horizontal(), Some(3.0));
        assert_eq!(PositionCategory::Nacp(6).horizontal(), Some(0.3 * NMI));
        assert_eq!(PositionCategory::Nic(7).horizontal(), Some(0.2 * NMI));
        assert_eq!(PositionCategory::Nic(0).horizontal(), None);
        assert_eq!(PositionCategory::Nacp(8).vertical(), None);
        assert_eq!(PositionCategory::Nic(12).horizontal(), None);
        assert_eq!(nacv_horizontal(4), Some(0.3));
        assert_eq!(nacv_vertical(5), None);
    }

    #[test]
    fn test_error_bounds_shrink_with_category() {
        for table in [&NIC_HORIZONTAL, &NACP_HORIZONTAL] {
            for pair in table.windows(2) {
                assert!(pair[1] < pair[0], "{pair:?}");
            }
        }
    }

    #[test]
    fn test_psi_without_errors_is_zero() {
        assert_eq!(psi(1000.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 60.0), Some(0.0));
        assert_eq!(
            psi_horizontal(&vect2(1000.0, 0.0), &vect2(-100.0, 0.0), 0.0, 0.0, 0.0, 0.0, 0.0, 60.0),
            Some(0.0)
        );
    }

    #[test]
    fn test_psi_closing() {
        // l = 1020 / 98
        let expected = 20.0 + 2.0 * 1020.0 / 98.0;
        let got = psi(1000.0, 100.0, 10.0, 10.0, 1.0, 1.0, 0.0, 60.0).unwrap();
        assert!((got - expected).abs() < 1e-9);
        // Speed errors swallow the closure rate: the whole lookahead counts.
        assert_eq!(psi(1000.0, 1.5, 10.0, 10.0, 1.0, 1.0, 0.0, 60.0), Some(140.0));
        // Latency adds its own drift.
        let late = psi(1000.0, 1.5, 10.0, 10.0, 1.0, 1.0, 5.0, 60.0).unwrap();
        assert!((late - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_psi_horizontal_head_on() {
        // Closing head-on: l = (10000 * 100 + 20 * 100 + 10020 * 2) / 98^2
        let s = vect2(10000.0, 0.0);
        let v = vect2(-100.0, 0.0);
        let l = (1.0e6 + 2000.0 + 20040.0) / (98.0 * 98.0);
        let got = psi_horizontal(&s, &v, 10.0, 10.0, 1.0, 1.0, 0.0, 180.0).unwrap();
        assert!((got - (20.0 + 2.0 * l)).abs() < 1e-9);
        // Diverging pairs only pay for the position and speed errors.
        let away = psi_horizontal(&s, &(-v), 10.0, 10.0, 1.0, 1.0, 0.0, 180.0).unwrap();
        assert!(away < got);
    }

    #[test]
    fn test_buffers_need_known_categories() {
        let s = vect3(5000.0, 0.0, 100.0);
        let v = vect3(-100.0, 0.0, -2.0);
        let unknown = Accuracy::new(PositionCategory::Nic(0), 3);
        assert!(SafetyBuffers::new(good(), unknown).horizontal(&s, &v, 60.0).is_none());
        let buffers = SafetyBuffers::new(good(), good());
        assert!(buffers.horizontal(&s, &v, 60.0).is_some_and(|h| h > 60.0));
        assert!(buffers.vertical(&s, &v, 60.0).is_some_and(|z| z > 90.0));
    }

    #[test]
    fn test_buffered_detector_grows_volume() {
        let s = vect3(5000.0, 0.0, 100.0);
        let v = vect3(-100.0, 0.0, -2.0);
        let buffers = SafetyBuffers::new(good(), good());

        let wcv = WCV::taumod();
        let grown = buffers.buffered_detector(&wcv, &s, &v, 60.0);
        assert!(grown.contains(&wcv));
        assert!(!wcv.contains(grown.as_ref()));

        let cd = CDCylinder::default();
        let grown = buffers.buffered_detector(&cd, &s, &v, 60.0);
        let grown = grown.as_any().downcast_ref::<CDCylinder>().unwrap();
        assert!(grown.d() > cd.d() && grown.h() > cd.h());

        // No vertical bound: the detector is returned as is.
        let coarse = SafetyBuffers::new(Accuracy::new(PositionCategory::Nacp(7), 3), good());
        let same = coarse.buffered_detector(&wcv, &s, &v, 60.0);
        assert!(same.contains(&wcv) && wcv.contains(same.as_ref()));
    }
}
