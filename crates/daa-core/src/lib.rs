//! Detect-and-avoid kernel: pairwise conflict detection, alerting,
//! polygon detection, kinematic maneuver bands, resolution algebra and a
//! single-entry [`Daidalus`] facade.
//!
//! Internal computation is in SI units (meters, seconds, radians); see
//! [`units`] for conversion at the edges.

pub mod alerting;
pub mod bands;
pub mod buffers;
pub mod cdss;
pub mod criteria;
pub mod daidalus;
pub mod detection;
pub mod error;
pub mod horizontal;
pub mod interval;
pub mod kinematics;
pub mod params;
pub mod polygon;
pub mod resolution;
pub mod tangent_line;
pub mod traffic;
pub mod units;
pub mod urgency;
pub mod util;
pub mod vect;
pub mod vertical;

pub use alerting::{AlertLevels, AlertThresholds, AlertingMofN};
pub use bands::{
    BandsRange, BandsRegion, KinematicBandsCore, KinematicBandsParameters, KinematicMultiBands,
};
pub use buffers::{Accuracy, PositionCategory, SafetyBuffers};
pub use cdss::{CDSSCore, CDSSPolygon, CdssOutcome};
pub use daidalus::{Contour, Daidalus};
pub use detection::{
    CDCylinder, ConflictData, Detection3D, DetectorRegistry, LossData, TCAS3D, TCASTable, WcvKind,
    CD2D, WCV,
};
pub use error::{DaaError, Result};
pub use interval::{Integerval, Interval, IntervalSet};
pub use params::{ParameterAcceptor, ParameterData};
pub use polygon::{
    polygon_detector, CDPolyIter, CDPolyIter2D, DetectionPolygon, MovingPolygon3D, Poly2D, Poly3D,
    PolygonConflict, Polycarp3D,
};
pub use resolution::{CriticalVectors2D, CrssConfig, CrssResolution, ResolutionKind, CR3D, CRSS};
pub use traffic::{GeoPosition, Projection, TrafficState};
pub use urgency::{DcpaUrgency, FixedAircraftUrgency, NoUrgency, UrgencyStrategy};
pub use vect::{Vect2, Vect3};
