//! Configuration of the kinematic band engine.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::params::{ParameterAcceptor, ParameterData};
use crate::units::{DEG, FPM, FT, G, KN};

/// Ranges, steps and aircraft performance used by the band search.
///
/// All values are in internal units. A zero acceleration (or turn rate and
/// bank angle both zero for track) makes that axis instantaneous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicBandsParameters {
    /// Lookahead time in seconds
    pub lookahead_time: f64,
    /// Track band extent to the left of the current track, radians
    pub left_trk: f64,
    /// Track band extent to the right of the current track, radians
    pub right_trk: f64,
    /// Ground speed range in m/s
    pub min_gs: f64,
    pub max_gs: f64,
    /// Vertical speed range in m/s
    pub min_vs: f64,
    pub max_vs: f64,
    /// Altitude range in meters
    pub min_alt: f64,
    pub max_alt: f64,
    pub trk_step: f64,
    pub gs_step: f64,
    pub vs_step: f64,
    pub alt_step: f64,
    /// Ground speed acceleration in m/s^2
    pub horizontal_accel: f64,
    /// Vertical acceleration in m/s^2
    pub vertical_accel: f64,
    /// Track rate in rad/s; when zero the bank angle decides
    pub turn_rate: f64,
    /// Bank angle in radians
    pub bank_angle: f64,
    /// Climb/descent rate used by altitude maneuvers, m/s
    pub vertical_rate: f64,
    /// Near mid-air collision cylinder
    pub horizontal_nmac: f64,
    pub vertical_nmac: f64,
    /// Seconds a recovery maneuver must stay conflict-free
    pub recovery_stability_time: f64,
    /// Minimum recovery separation; zero means the TCAS RA thresholds at the
    /// ownship altitude
    pub min_horizontal_recovery: f64,
    pub min_vertical_recovery: f64,
    /// Apply repulsive criteria against the most urgent aircraft in conflict bands
    pub conflict_crit: bool,
    /// Apply repulsive criteria against the most urgent aircraft in recovery bands
    pub recovery_crit: bool,
    pub recovery_trk: bool,
    pub recovery_gs: bool,
    pub recovery_vs: bool,
    pub recovery_alt: bool,
    /// Shrink the recovery cylinder toward NMAC until recovery bands exist
    pub ca_bands: bool,
    /// Fraction removed at each collision-avoidance shrink
    pub ca_factor: f64,
    /// Angle left and right of the current track searched for horizontal
    /// contours beyond the conflict contour; zero keeps only the latter
    pub contour_thr: f64,
}

impl Default for KinematicBandsParameters {
    fn default() -> Self {
        Self {
            lookahead_time: 180.0,
            left_trk: PI,
            right_trk: PI,
            min_gs: 0.0,
            max_gs: 700.0 * KN,
            min_vs: -5000.0 * FPM,
            max_vs: 5000.0 * FPM,
            min_alt: 500.0 * FT,
            max_alt: 50000.0 * FT,
            trk_step: DEG,
            gs_step: KN,
            vs_step: 10.0 * FPM,
            alt_step: 100.0 * FT,
            horizontal_accel: 2.0,
            vertical_accel: 0.25 * G,
            turn_rate: 3.0 * DEG,
            bank_angle: 0.0,
            vertical_rate: 500.0 * FPM,
            horizontal_nmac: 500.0 * FT,
            vertical_nmac: 100.0 * FT,
            recovery_stability_time: 2.0,
            min_horizontal_recovery: 0.0,
            min_vertical_recovery: 0.0,
            conflict_crit: false,
            recovery_crit: false,
            recovery_trk: true,
            recovery_gs: true,
            recovery_vs: true,
            recovery_alt: true,
            ca_bands: false,
            ca_factor: 0.2,
            contour_thr: PI,
        }
    }
}

impl KinematicBandsParameters {
    /// Defaults with every axis switched to instantaneous maneuvers.
    pub fn instantaneous() -> Self {
        Self {
            horizontal_accel: 0.0,
            vertical_accel: 0.0,
            turn_rate: 0.0,
            bank_angle: 0.0,
            vertical_rate: 0.0,
            ..Self::default()
        }
    }
}

const NUMERIC_KEYS: &[(&str, &str)] = &[
    ("lookahead_time", "s"),
    ("left_trk", "deg"),
    ("right_trk", "deg"),
    ("min_gs", "knot"),
    ("max_gs", "knot"),
    ("min_vs", "fpm"),
    ("max_vs", "fpm"),
    ("min_alt", "ft"),
    ("max_alt", "ft"),
    ("trk_step", "deg"),
    ("gs_step", "knot"),
    ("vs_step", "fpm"),
    ("alt_step", "ft"),
    ("horizontal_accel", "m/s^2"),
    ("vertical_accel", "G"),
    ("turn_rate", "deg/s"),
    ("bank_angle", "deg"),
    ("vertical_rate", "fpm"),
    ("horizontal_nmac", "ft"),
    ("vertical_nmac", "ft"),
    ("recovery_stability_time", "s"),
    ("min_horizontal_recovery", "nmi"),
    ("min_vertical_recovery", "ft"),
    ("ca_factor", "unitless"),
    ("contour_thr", "deg"),
];

const BOOL_KEYS: &[&str] = &[
    "conflict_crit",
    "recovery_crit",
    "recovery_trk",
    "recovery_gs",
    "recovery_vs",
    "recovery_alt",
    "ca_bands",
];

impl KinematicBandsParameters {
    fn number_mut(&mut self, key: &str) -> Option<&mut f64> {
        let field = match key {
            "lookahead_time" => &mut self.lookahead_time,
            "left_trk" => &mut self.left_trk,
            "right_trk" => &mut self.right_trk,
            "min_gs" => &mut self.min_gs,
            "max_gs" => &mut self.max_gs,
            "min_vs" => &mut self.min_vs,
            "max_vs" => &mut self.max_vs,
            "min_alt" => &mut self.min_alt,
            "max_alt" => &mut self.max_alt,
            "trk_step" => &mut self.trk_step,
            "gs_step" => &mut self.gs_step,
            "vs_step" => &mut self.vs_step,
            "alt_step" => &mut self.alt_step,
            "horizontal_accel" => &mut self.horizontal_accel,
            "vertical_accel" => &mut self.vertical_accel,
            "turn_rate" => &mut self.turn_rate,
            "bank_angle" => &mut self.bank_angle,
            "vertical_rate" => &mut self.vertical_rate,
            "horizontal_nmac" => &mut self.horizontal_nmac,
            "vertical_nmac" => &mut self.vertical_nmac,
            "recovery_stability_time" => &mut self.recovery_stability_time,
            "min_horizontal_recovery" => &mut self.min_horizontal_recovery,
            "min_vertical_recovery" => &mut self.min_vertical_recovery,
            "ca_factor" => &mut self.ca_factor,
            "contour_thr" => &mut self.contour_thr,
            _ => return None,
        };
        Some(field)
    }

    fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
        let field = match key {
            "conflict_crit" => &mut self.conflict_crit,
            "recovery_crit" => &mut self.recovery_crit,
            "recovery_trk" => &mut self.recovery_trk,
            "recovery_gs" => &mut self.recovery_gs,
            "recovery_vs" => &mut self.recovery_vs,
            "recovery_alt" => &mut self.recovery_alt,
            "ca_bands" => &mut self.ca_bands,
            _ => return None,
        };
        Some(field)
    }

    fn accepts(key: &str, value: f64) -> bool {
        match key {
            "lookahead_time" | "trk_step" | "gs_step" | "vs_step" | "alt_step" => value > 0.0,
            "ca_factor" => value > 0.0 && value < 1.0,
            "left_trk" | "right_trk" | "contour_thr" => (0.0..=PI).contains(&value),
            _ => value.is_finite(),
        }
    }
}

impl ParameterAcceptor for KinematicBandsParameters {
    fn parameters(&self) -> ParameterData {
        let mut p = ParameterData::new();
        let mut copy = self.clone();
        for (key, unit) in NUMERIC_KEYS {
            if let Some(v) = copy.number_mut(key) {
                p.set_internal(key, *v, unit);
            }
        }
        for key in BOOL_KEYS {
            if let Some(b) = copy.flag_mut(key) {
                p.set_bool(key, *b);
            }
        }
        p
    }

    fn set_parameters(&mut self, p: &ParameterData) {
        for (key, _) in NUMERIC_KEYS {
            let Some(v) = p.value(key) else { continue };
            if !Self::accepts(key, v) {
                warn!(key, value = v, "Ignoring out-of-range band parameter");
                continue;
            }
            if let Some(field) = self.number_mut(key) {
                *field = v;
            }
        }
        for key in BOOL_KEYS {
            if let (Some(b), Some(field)) = (p.bool(key), self.flag_mut(key)) {
                *field = b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ranges() {
        let p = KinematicBandsParameters::default();
        assert_eq!(p.lookahead_time, 180.0);
        assert!((p.max_gs / KN - 700.0).abs() < 1e-9);
        assert!((p.min_vs / FPM + 5000.0).abs() < 1e-9);
        assert!(p.recovery_trk && !p.ca_bands);
    }

    #[test]
    fn test_parameter_round_trip() {
        let mut p = KinematicBandsParameters::default();
        p.lookahead_time = 90.0;
        p.ca_bands = true;
        let table = p.parameters();
        assert_eq!(table.unit("max_gs"), Some("knot"));
        let mut q = KinematicBandsParameters::instantaneous();
        q.set_parameters(&table);
        assert_eq!(p, q);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let table = ParameterData::parse_text(
            "lookahead_time = -5 [s]\nca_factor = 2\nmax_alt = 40000 [ft]\n",
        );
        let mut p = KinematicBandsParameters::default();
        p.set_parameters(&table);
        assert_eq!(p.lookahead_time, 180.0);
        assert_eq!(p.ca_factor, 0.2);
        assert!((p.max_alt - 40000.0 * FT).abs() < 1e-9);
    }
}
