//! State-based pairwise conflict detection.
//!
//! Every detector reduces the straight-line relative motion `s + t*v` to an
//! interval of loss of separation inside a lookahead window `[B, T]`.

pub mod cd2d;
pub mod cd3d;
pub mod registry;
pub mod tcas;
pub mod wcv;

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::horizontal;
use crate::params::ParameterAcceptor;
use crate::util::almost_equals;
use crate::vect::{Vect3, Vect3Ext};
use crate::vertical;

pub use cd2d::CD2D;
pub use cd3d::{CD3DTable, CDCylinder};
pub use registry::DetectorRegistry;
pub use tcas::{TCAS3D, TCASTable};
pub use wcv::{WcvKind, WcvTable, WCV};

/// Interval of predicted loss of separation. `time_in > time_out` means no
/// conflict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossData {
    pub time_in: f64,
    pub time_out: f64,
}

impl Default for LossData {
    fn default() -> Self {
        Self::empty()
    }
}

impl LossData {
    pub fn new(time_in: f64, time_out: f64) -> Self {
        Self { time_in, time_out }
    }

    pub fn empty() -> Self {
        Self {
            time_in: f64::INFINITY,
            time_out: f64::NEG_INFINITY,
        }
    }

    pub fn conflict(&self) -> bool {
        self.time_in < self.time_out && !almost_equals(self.time_in, self.time_out)
    }

    /// Conflict lasting at least `thr` seconds.
    pub fn conflict_with_filter(&self, thr: f64) -> bool {
        self.conflict() && self.time_out - self.time_in >= thr
    }

    pub fn duration(&self) -> f64 {
        if self.conflict() {
            self.time_out - self.time_in
        } else {
            0.0
        }
    }
}

/// Loss interval plus the critical point of the encounter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflictData {
    #[serde(flatten)]
    pub loss: LossData,
    /// Time of closest (or most severe) approach within the window.
    pub time_crit: f64,
    /// Normalized distance at `time_crit`: below one inside the volume.
    pub dist_crit: f64,
    /// Relative position at query time.
    pub s: Vect3,
    /// Relative velocity at query time.
    pub v: Vect3,
}

impl ConflictData {
    pub fn new(loss: LossData, time_crit: f64, dist_crit: f64, s: Vect3, v: Vect3) -> Self {
        Self {
            loss,
            time_crit,
            dist_crit,
            s,
            v,
        }
    }

    pub fn conflict(&self) -> bool {
        self.loss.conflict()
    }

    pub fn time_in(&self) -> f64 {
        self.loss.time_in
    }

    pub fn time_out(&self) -> f64 {
        self.loss.time_out
    }

    /// Horizontal miss distance within `[0, T]`.
    pub fn hmd(&self, t_end: f64) -> f64 {
        horizontal::hmd(&self.s.vect2(), &self.v.vect2(), t_end)
    }

    /// Vertical miss distance within `[0, T]`.
    pub fn vmd(&self, t_end: f64) -> f64 {
        vertical::vmd(self.s.z, self.v.z, t_end)
    }

    pub fn relative_position_at(&self, t: f64) -> Vect3 {
        self.s.linear(&self.v, t)
    }
}

/// Pairwise detector over absolute ownship/intruder states.
///
/// The relative-state convenience methods place the intruder at the origin,
/// which is exact for every detector whose volume does not depend on the
/// ownship's absolute altitude.
pub trait Detection3D: ParameterAcceptor + fmt::Debug + Send + Sync {
    /// Registry tag of this detector family.
    fn canonical_class(&self) -> &'static str;

    fn identifier(&self) -> &str;

    fn set_identifier(&mut self, id: &str);

    fn violation(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3) -> bool;

    fn conflict(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3, b: f64, t: f64) -> bool {
        self.conflict_detection(so, vo, si, vi, b, t).conflict()
    }

    fn conflict_detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData;

    /// True when this volume is guaranteed to include `other`'s.
    fn contains(&self, other: &dyn Detection3D) -> bool;

    fn copy(&self) -> Box<dyn Detection3D>;

    /// Fresh detector of the same family with default thresholds.
    fn make(&self) -> Box<dyn Detection3D>;

    fn as_any(&self) -> &dyn Any;

    fn violation_relative(&self, s: &Vect3, vo: &Vect3, vi: &Vect3) -> bool {
        self.violation(s, vo, &Vect3::zeros(), vi)
    }

    fn conflict_relative(&self, s: &Vect3, vo: &Vect3, vi: &Vect3, b: f64, t: f64) -> bool {
        self.conflict(s, vo, &Vect3::zeros(), vi, b, t)
    }

    fn conflict_detection_relative(
        &self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData {
        self.conflict_detection(s, vo, &Vect3::zeros(), vi, b, t)
    }
}

impl Clone for Box<dyn Detection3D> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Lookahead end: negative means unbounded.
pub(crate) fn effective_horizon(t: f64) -> f64 {
    if t < 0.0 {
        f64::INFINITY
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_data_sentinel() {
        assert!(!LossData::empty().conflict());
        assert!(!LossData::new(200.0, 0.0).conflict());
        assert!(!LossData::new(5.0, 5.0).conflict());
        let ld = LossData::new(7.4, 192.6);
        assert!(ld.conflict());
        assert!(ld.conflict_with_filter(100.0));
        assert!(!ld.conflict_with_filter(200.0));
        assert!((ld.duration() - 185.2).abs() < 1e-9);
    }
}
