//! Explicit resolution velocities.
//!
//! [`cr3d`] holds the solvers, [`crss`] wraps them with configurable bounds
//! and unit-friendly outputs, and [`critical_vectors`] enumerates every
//! track-only and ground-speed-only vector tangent to the protected circle.

pub mod cr3d;
pub mod critical_vectors;
pub mod crss;

use serde::{Deserialize, Serialize};

pub use cr3d::CR3D;
pub use critical_vectors::CriticalVectors2D;
pub use crss::{CrssConfig, CrssResolution, CRSS};

/// Outcome class of a resolution computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// No resolution could be found.
    None,
    /// No conflict; the current velocity is kept.
    Unnecessary,
    /// Resolutions for a predicted conflict.
    Conflict,
    /// Loss of separation with converging aircraft.
    LosConvergent,
    /// Loss of separation with diverging aircraft.
    LosDivergent,
}

impl ResolutionKind {
    pub fn is_los(self) -> bool {
        matches!(self, Self::LosConvergent | Self::LosDivergent)
    }
}
