//! State-based conflict detection with a minimum-duration filter.
//!
//! [`CDSSCore`] wraps any pairwise detector and reports a conflict only
//! when the predicted loss lasts at least `filter` seconds. [`CDSSPolygon`]
//! does the same for polygon detectors, keeping every qualifying interval.

use serde::Serialize;

use crate::detection::{CDCylinder, Detection3D, LossData};
use crate::polygon::{DetectionPolygon, MovingPolygon3D, PolygonConflict, Polycarp3D};
use crate::vect::{Vect3, Vect3Ext};

/// Result of a filtered detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CdssOutcome {
    pub conflict: bool,
    pub loss: LossData,
    /// Time of closest approach.
    pub tca: f64,
    /// Relative position at `tca`.
    pub stca: Vect3,
    /// Detector distance at `tca`.
    pub dtca: f64,
}

impl CdssOutcome {
    /// Entry time, `+inf` without a conflict.
    pub fn time_in(&self) -> f64 {
        if self.conflict {
            self.loss.time_in
        } else {
            f64::INFINITY
        }
    }

    /// Exit time, `-inf` without a conflict.
    pub fn time_out(&self) -> f64 {
        if self.conflict {
            self.loss.time_out
        } else {
            f64::NEG_INFINITY
        }
    }

    pub fn conflict_duration(&self) -> f64 {
        if self.conflict {
            self.loss.time_out - self.loss.time_in
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct CDSSCore {
    detector: Box<dyn Detection3D>,
    filter: f64,
}

impl Default for CDSSCore {
    fn default() -> Self {
        Self::new(Box::new(CDCylinder::default()), 1.0)
    }
}

impl CDSSCore {
    pub fn new(detector: Box<dyn Detection3D>, filter: f64) -> Self {
        Self { detector, filter }
    }

    pub fn detector(&self) -> &dyn Detection3D {
        self.detector.as_ref()
    }

    pub fn set_detector(&mut self, detector: Box<dyn Detection3D>) {
        self.detector = detector;
    }

    pub fn filter_time(&self) -> f64 {
        self.filter
    }

    pub fn set_filter_time(&mut self, filter: f64) {
        self.filter = filter.max(0.0);
    }

    pub fn violation(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3) -> bool {
        self.detector.violation(so, vo, si, vi)
    }

    fn outcome(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> CdssOutcome {
        let cd = self.detector.conflict_detection(so, vo, si, vi, b, t);
        let s = so - si;
        let v = vo - vi;
        CdssOutcome {
            conflict: cd.loss.conflict_with_filter(self.filter),
            loss: cd.loss,
            tca: cd.time_crit,
            stca: s.linear(&v, cd.time_crit),
            dtca: cd.dist_crit,
        }
    }

    /// Filtered conflict anywhere in the future.
    pub fn detection_ever(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3) -> CdssOutcome {
        self.outcome(so, vo, si, vi, 0.0, -1.0)
    }

    /// Filtered conflict whose loss interval overlaps `[b, t]`. The loss
    /// interval itself is not clipped; `tca` is moved up to `b`.
    pub fn detection_between(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> CdssOutcome {
        let mut out = self.detection_ever(so, vo, si, vi);
        out.conflict = out.conflict && out.loss.time_in < t && out.loss.time_out >= b;
        if out.tca < b {
            out = self.relocate_tca(so, vo, si, vi, out, b);
        }
        out
    }

    /// Like [`Self::detection_between`] with `tca` kept inside `[b, t]`.
    pub fn detection_horizon(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> CdssOutcome {
        let out = self.detection_between(so, vo, si, vi, b, t);
        if out.tca > t {
            self.relocate_tca(so, vo, si, vi, out, t)
        } else {
            out
        }
    }

    pub fn conflict(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3, b: f64, t: f64) -> bool {
        self.detection_between(so, vo, si, vi, b, t).conflict
    }

    fn relocate_tca(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        mut out: CdssOutcome,
        tca: f64,
    ) -> CdssOutcome {
        let s = so - si;
        let v = vo - vi;
        out.tca = tca;
        out.stca = s.linear(&v, tca);
        // Distance at a fixed time: the detector's critical distance over a
        // zero-length window.
        out.dtca = self.detector.conflict_detection(so, vo, si, vi, tca, tca).dist_crit;
        out
    }
}

/// Polygon detection keeping every interval that lasts at least `filter`
/// seconds.
#[derive(Debug, Clone)]
pub struct CDSSPolygon {
    detector: Box<dyn DetectionPolygon>,
    filter: f64,
}

impl Default for CDSSPolygon {
    fn default() -> Self {
        Self::new(Box::new(Polycarp3D::default()), 1.0)
    }
}

impl CDSSPolygon {
    pub fn new(detector: Box<dyn DetectionPolygon>, filter: f64) -> Self {
        Self { detector, filter }
    }

    pub fn detector(&self) -> &dyn DetectionPolygon {
        self.detector.as_ref()
    }

    pub fn filter_time(&self) -> f64 {
        self.filter
    }

    pub fn set_filter_time(&mut self, filter: f64) {
        self.filter = filter.max(0.0);
    }

    pub fn detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        mp: &MovingPolygon3D,
        b: f64,
        t: f64,
    ) -> Vec<PolygonConflict> {
        let mut out = self.detector.conflict_detection(so, vo, mp, b, t);
        out.retain(|c| c.duration() >= self.filter);
        out
    }

    pub fn conflict(&self, so: &Vect3, vo: &Vect3, mp: &MovingPolygon3D, b: f64, t: f64) -> bool {
        !self.detection(so, vo, mp, b, t).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::{Poly2D, Poly3D};
    use crate::vect::{vect2, vect3};

    fn closing() -> (Vect3, Vect3, Vect3, Vect3) {
        (vect3(10000.0, 0.0, 0.0), vect3(-100.0, 0.0, 0.0), Vect3::zeros(), Vect3::zeros())
    }

    #[test]
    fn test_detection_ever_on_closing_line() {
        let (so, vo, si, vi) = closing();
        let out = CDSSCore::default().detection_ever(&so, &vo, &si, &vi);
        assert!(out.conflict);
        assert!((out.time_in() - 7.4).abs() < 1e-6);
        assert!((out.time_out() - 192.6).abs() < 1e-6);
        assert!((out.tca - 100.0).abs() < 1e-6);
        assert!(out.stca.norm() < 1e-6);
        assert!((out.conflict_duration() - 185.2).abs() < 1e-6);
    }

    #[test]
    fn test_detection_between_windows() {
        let (so, vo, si, vi) = closing();
        let cd = CDSSCore::default();
        assert!(cd.conflict(&so, &vo, &si, &vi, 0.0, 60.0));
        assert!(!cd.conflict(&so, &vo, &si, &vi, 0.0, 5.0));
        assert!(!cd.conflict(&so, &vo, &si, &vi, 200.0, 300.0));
        let late = cd.detection_between(&so, &vo, &si, &vi, 150.0, 300.0);
        assert!(late.conflict);
        assert_eq!(late.tca, 150.0);
        assert!((late.stca.x + 5000.0).abs() < 1e-6);
        let early = cd.detection_horizon(&so, &vo, &si, &vi, 0.0, 60.0);
        assert_eq!(early.tca, 60.0);
        assert!((early.stca.x - 4000.0).abs() < 1e-6);
    }

    #[test]
    fn test_filter_drops_short_conflicts() {
        let (so, vo, si, vi) = closing();
        let mut cd = CDSSCore::default();
        cd.set_filter_time(200.0);
        let out = cd.detection_ever(&so, &vo, &si, &vi);
        assert!(!out.conflict);
        assert_eq!(out.time_in(), f64::INFINITY);
        assert_eq!(out.conflict_duration(), 0.0);
    }

    #[test]
    fn test_polygon_filter_keeps_long_intervals() {
        let square = Poly2D::new(vec![
            vect2(-1000.0, -1000.0),
            vect2(1000.0, -1000.0),
            vect2(1000.0, 1000.0),
            vect2(-1000.0, 1000.0),
        ]);
        let mp = MovingPolygon3D::stationary(&Poly3D::new(square, 0.0, 1000.0));
        let so = vect3(-5000.0, 0.0, 500.0);
        let vo = vect3(100.0, 0.0, 0.0);
        let mut cd = CDSSPolygon::default();
        assert_eq!(cd.detection(&so, &vo, &mp, 0.0, 100.0).len(), 1);
        cd.set_filter_time(30.0);
        assert!(!cd.conflict(&so, &vo, &mp, 0.0, 100.0));
    }
}
