//! Kinematic maneuver bands.
//!
//! Each maneuver axis (track, ground speed, vertical speed, altitude) is
//! discretized into steps. The ownship is trajected along every step, and
//! the steps are colored by the most severe alert level they lead into.

pub mod alt;
pub mod core;
pub mod gs;
pub mod integer;
pub mod multi;
pub mod parameters;
pub mod real;
pub mod trk;
pub mod vs;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interval::Interval;

pub use self::core::KinematicBandsCore;
pub use multi::{AxisBands, AxisReport, BandsReport, KinematicMultiBands};
pub use parameters::KinematicBandsParameters;
pub use real::{AxisModel, AxisRange, KinematicRealBands};

/// Classification of a band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandsRegion {
    #[default]
    Unknown,
    None,
    Recovery,
    Near,
    Mid,
    Far,
}

impl BandsRegion {
    pub fn is_valid(self) -> bool {
        self != BandsRegion::Unknown
    }

    pub fn is_resolution_band(self) -> bool {
        matches!(self, BandsRegion::None | BandsRegion::Recovery)
    }

    pub fn is_conflict_band(self) -> bool {
        matches!(self, BandsRegion::Near | BandsRegion::Mid | BandsRegion::Far)
    }

    /// Severity rank: NONE and RECOVERY are 0, FAR 1, MID 2, NEAR 3.
    pub fn order(self) -> i32 {
        match self {
            BandsRegion::Unknown => -1,
            BandsRegion::None | BandsRegion::Recovery => 0,
            BandsRegion::Far => 1,
            BandsRegion::Mid => 2,
            BandsRegion::Near => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BandsRegion::Unknown => "UNKNOWN",
            BandsRegion::None => "NONE",
            BandsRegion::Recovery => "RECOVERY",
            BandsRegion::Near => "NEAR",
            BandsRegion::Mid => "MID",
            BandsRegion::Far => "FAR",
        }
    }
}

impl fmt::Display for BandsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A colored interval of one maneuver axis, in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandsRange {
    pub interval: Interval,
    pub region: BandsRegion,
}

impl BandsRange {
    pub fn new(interval: Interval, region: BandsRegion) -> Self {
        Self { interval, region }
    }
}

impl fmt::Display for BandsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.interval, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_order() {
        assert_eq!(BandsRegion::None.order(), BandsRegion::Recovery.order());
        assert!(BandsRegion::Recovery.order() < BandsRegion::Far.order());
        assert!(BandsRegion::Far.order() < BandsRegion::Mid.order());
        assert!(BandsRegion::Mid.order() < BandsRegion::Near.order());
        assert!(!BandsRegion::Unknown.is_valid());
        assert!(BandsRegion::Mid.is_conflict_band());
        assert!(BandsRegion::Recovery.is_resolution_band());
        assert!(!BandsRegion::Recovery.is_conflict_band());
    }

    #[test]
    fn test_region_serializes_upper_case() {
        let json = serde_json::to_string(&BandsRegion::Near).unwrap();
        assert_eq!(json, "\"NEAR\"");
    }
}
