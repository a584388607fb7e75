//! Bands for every maneuver axis over a shared core.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::alt::AltAxis;
use super::core::KinematicBandsCore;
use super::gs::GsAxis;
use super::parameters::KinematicBandsParameters;
use super::real::{AxisModel, AxisRange, KinematicRealBands};
use super::trk::TrkAxis;
use super::vs::VsAxis;
use super::{BandsRange, BandsRegion};
use crate::alerting::AlertLevels;
use crate::interval::Interval;
use crate::traffic::TrafficState;

/// Track, ground speed, vertical speed and altitude bands for one ownship.
///
/// Every setter marks all cached results stale; results are recomputed on
/// the next read.
#[derive(Debug, Clone)]
pub struct KinematicMultiBands {
    core: KinematicBandsCore,
    trk: KinematicRealBands<TrkAxis>,
    gs: KinematicRealBands<GsAxis>,
    vs: KinematicRealBands<VsAxis>,
    alt: KinematicRealBands<AltAxis>,
}

impl Default for KinematicMultiBands {
    fn default() -> Self {
        Self::new(KinematicBandsParameters::default(), AlertLevels::do_365())
    }
}

fn trk_range(p: &KinematicBandsParameters) -> AxisRange {
    AxisRange::relative(
        -p.left_trk,
        p.right_trk,
        2.0 * PI,
        p.trk_step,
    ).with_recovery(p.recovery_trk)
}

fn gs_range(p: &KinematicBandsParameters) -> AxisRange {
    AxisRange::absolute(p.min_gs, p.max_gs, p.gs_step, p.recovery_gs)
}

fn vs_range(p: &KinematicBandsParameters) -> AxisRange {
    AxisRange::absolute(p.min_vs, p.max_vs, p.vs_step, p.recovery_vs)
}

fn alt_range(p: &KinematicBandsParameters) -> AxisRange {
    AxisRange::absolute(p.min_alt, p.max_alt, p.alt_step, p.recovery_alt)
}

impl KinematicMultiBands {
    pub fn new(parameters: KinematicBandsParameters, alertor: AlertLevels) -> Self {
        alertor.warn_if_invalid();
        Self {
            trk: KinematicRealBands::new(TrkAxis, trk_range(&parameters)),
            gs: KinematicRealBands::new(GsAxis, gs_range(&parameters)),
            vs: KinematicRealBands::new(VsAxis, vs_range(&parameters)),
            alt: KinematicRealBands::new(AltAxis, alt_range(&parameters)),
            core: KinematicBandsCore::new(parameters, alertor),
        }
    }

    pub fn core(&self) -> &KinematicBandsCore {
        &self.core
    }

    /// Marks every cached result stale.
    pub fn reset(&mut self) {
        self.core.reset();
        self.trk.reset();
        self.gs.reset();
        self.vs.reset();
        self.alt.reset();
    }

    pub fn ownship(&self) -> Option<&TrafficState> {
        self.core.ownship()
    }

    pub fn set_ownship(&mut self, own: TrafficState) {
        self.core.set_ownship(own);
        self.reset();
    }

    pub fn traffic(&self) -> &[TrafficState] {
        self.core.traffic()
    }

    pub fn add_traffic(&mut self, ac: TrafficState) {
        self.core.add_traffic(ac);
        self.reset();
    }

    pub fn set_traffic(&mut self, traffic: impl IntoIterator<Item = TrafficState>) {
        self.core.clear_traffic();
        for ac in traffic {
            self.core.add_traffic(ac);
        }
        self.reset();
    }

    /// Removes ownship and traffic.
    pub fn clear(&mut self) {
        self.core = KinematicBandsCore::new(
            self.core.parameters().clone(),
            self.core.alertor().clone(),
        );
        self.reset();
    }

    pub fn parameters(&self) -> &KinematicBandsParameters {
        self.core.parameters()
    }

    pub fn set_parameters(&mut self, parameters: KinematicBandsParameters) {
        self.trk.set_range(trk_range(&parameters));
        self.gs.set_range(gs_range(&parameters));
        self.vs.set_range(vs_range(&parameters));
        self.alt.set_range(alt_range(&parameters));
        self.core.set_parameters(parameters);
        self.reset();
    }

    /// Applies `f` to a copy of the parameters and installs the result.
    pub fn update_parameters(&mut self, f: impl FnOnce(&mut KinematicBandsParameters)) {
        let mut p = self.parameters().clone();
        f(&mut p);
        self.set_parameters(p);
    }

    pub fn set_lookahead_time(&mut self, t: f64) {
        if t > 0.0 {
            self.update_parameters(|p| p.lookahead_time = t);
        }
    }

    /// Switches recovery bands on or off for every axis.
    pub fn set_recovery_bands(&mut self, flag: bool) {
        self.update_parameters(|p| {
            p.recovery_trk = flag;
            p.recovery_gs = flag;
            p.recovery_vs = flag;
            p.recovery_alt = flag;
        });
    }

    pub fn set_collision_avoidance_bands(&mut self, flag: bool) {
        self.update_parameters(|p| p.ca_bands = flag);
    }

    /// Switches the repulsive criteria on or off in conflict and recovery bands.
    pub fn set_repulsive_criteria(&mut self, flag: bool) {
        self.update_parameters(|p| {
            p.conflict_crit = flag;
            p.recovery_crit = flag;
        });
    }

    pub fn alertor(&self) -> &AlertLevels {
        self.core.alertor()
    }

    pub fn set_alertor(&mut self, alertor: AlertLevels) {
        alertor.warn_if_invalid();
        self.core.set_alertor(alertor);
        self.reset();
    }

    pub fn set_most_urgent_aircraft(&mut self, id: Option<&str>) {
        self.core.set_most_urgent_aircraft(id);
        self.reset();
    }

    pub fn most_urgent_aircraft(&self) -> Option<&TrafficState> {
        self.core.most_urgent_aircraft()
    }

    pub fn conflict_aircraft(&self, level: usize) -> &[TrafficState] {
        self.core.conflict_aircraft(level)
    }

    /// Projects ownship and traffic `offset` seconds along their velocities.
    pub fn linear_projection(&mut self, offset: f64) {
        if offset == 0.0 {
            return;
        }
        let own = self.core.ownship().map(|own| own.linear_projection(offset));
        let traffic: Vec<TrafficState> =
            self.core.traffic().iter().map(|ac| ac.linear_projection(offset)).collect();
        if let Some(own) = own {
            self.core.set_ownship(own);
        }
        self.set_traffic(traffic);
    }

    pub fn track(&self) -> AxisBands<'_, TrkAxis> {
        AxisBands::new(&self.core, &self.trk)
    }

    pub fn ground_speed(&self) -> AxisBands<'_, GsAxis> {
        AxisBands::new(&self.core, &self.gs)
    }

    pub fn vertical_speed(&self) -> AxisBands<'_, VsAxis> {
        AxisBands::new(&self.core, &self.vs)
    }

    pub fn altitude(&self) -> AxisBands<'_, AltAxis> {
        AxisBands::new(&self.core, &self.alt)
    }

    /// Highest alert level raised by the aircraft `id`, 0 when none.
    pub fn alerting(&self, id: &str) -> usize {
        self.alerting_with(id, 0, 0, 0)
    }

    /// Like [`Self::alerting`], narrowing the spreads to the ownship's
    /// current maneuver: negative is left, slower or descending, positive
    /// the opposite, zero makes no assumption.
    pub fn alerting_with(&self, id: &str, turning: i32, accelerating: i32, climbing: i32) -> usize {
        let Some(ac) = self.core.find_traffic(id) else {
            return 0;
        };
        let alertor = self.core.alertor();
        let level = (1..=alertor.most_severe_alert_level())
            .rev()
            .find(|&l| {
                alertor
                    .level(l)
                    .is_some_and(|thr| {
                        thr.alerting(&self.core, ac, turning, accelerating, climbing)
                    })
            })
            .unwrap_or(0);
        debug!(aircraft = id, level, "Alert level");
        level
    }

    /// Every axis, serialized for reporting.
    pub fn report(&self) -> BandsReport {
        let alerts = self
            .core
            .traffic()
            .iter()
            .map(|ac| AircraftAlert {
                id: ac.id.clone(),
                level: self.alerting(&ac.id),
            })
            .collect();
        BandsReport {
            most_urgent: self.most_urgent_aircraft().map(|ac| ac.id.clone()),
            alerts,
            track: self.track().report(),
            ground_speed: self.ground_speed().report(),
            vertical_speed: self.vertical_speed().report(),
            altitude: self.altitude().report(),
        }
    }
}

/// Read-only view of one axis of a [`KinematicMultiBands`].
#[derive(Debug, Clone, Copy)]
pub struct AxisBands<'a, A> {
    core: &'a KinematicBandsCore,
    bands: &'a KinematicRealBands<A>,
}

impl<'a, A: AxisModel> AxisBands<'a, A> {
    fn new(core: &'a KinematicBandsCore, bands: &'a KinematicRealBands<A>) -> Self {
        Self { core, bands }
    }

    pub fn ranges(&self) -> &'a [BandsRange] {
        self.bands.ranges(self.core)
    }

    pub fn len(&self) -> usize {
        self.bands.len(self.core)
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty(self.core)
    }

    pub fn interval(&self, i: usize) -> Interval {
        self.bands.interval(self.core, i)
    }

    pub fn region(&self, i: usize) -> BandsRegion {
        self.bands.region(self.core, i)
    }

    pub fn range_of(&self, val: f64) -> Option<usize> {
        self.bands.range_of(self.core, val)
    }

    pub fn region_of(&self, val: f64) -> BandsRegion {
        self.bands.region_of(self.core, val)
    }

    /// Resolution at the conflict level toward `dir` (false is down/left).
    pub fn resolution(&self, dir: bool) -> f64 {
        self.bands.compute_resolution(self.core, 0, dir)
    }

    pub fn preferred_direction(&self) -> bool {
        self.bands.preferred_direction(self.core, 0)
    }

    pub fn time_to_recovery(&self) -> f64 {
        self.bands.time_to_recovery(self.core)
    }

    pub fn last_time_to_maneuver(&self, ac: &TrafficState) -> f64 {
        self.bands.last_time_to_maneuver(self.core, ac)
    }

    pub fn peripheral_aircraft(&self, level: usize) -> &'a [TrafficState] {
        self.bands.peripheral_aircraft(self.core, level)
    }

    pub fn report(&self) -> AxisReport {
        AxisReport {
            ranges: self.ranges().to_vec(),
            resolution_down: self.resolution(false),
            resolution_up: self.resolution(true),
            preferred_up: self.preferred_direction(),
            time_to_recovery: self.time_to_recovery(),
        }
    }
}

/// Serializable snapshot of one axis. Non-finite values serialize as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisReport {
    pub ranges: Vec<BandsRange>,
    pub resolution_down: f64,
    pub resolution_up: f64,
    pub preferred_up: bool,
    pub time_to_recovery: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftAlert {
    pub id: String,
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandsReport {
    pub most_urgent: Option<String>,
    pub alerts: Vec<AircraftAlert>,
    pub track: AxisReport,
    pub ground_speed: AxisReport,
    pub vertical_speed: AxisReport,
    pub altitude: AxisReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{DEG, FT, KN};
    use crate::vect::vect3;

    fn crossing() -> KinematicMultiBands {
        let mut bands = KinematicMultiBands::default();
        bands.set_ownship(TrafficState::from_trk_gs_vs(
            "own",
            vect3(0.0, 0.0, 5000.0 * FT),
            0.0,
            200.0 * KN,
            0.0,
        ));
        // Converges from the east at a right angle, same altitude.
        bands.add_traffic(TrafficState::from_trk_gs_vs(
            "ac1",
            vect3(4000.0, 4000.0, 5000.0 * FT),
            270.0 * DEG,
            200.0 * KN,
            0.0,
        ));
        bands
    }

    #[test]
    fn test_crossing_alerts_at_most_severe_level() {
        let bands = crossing();
        assert_eq!(bands.alerting("ac1"), 3);
        assert_eq!(bands.alerting("nobody"), 0);
        assert_eq!(bands.most_urgent_aircraft().map(|ac| ac.id.as_str()), Some("ac1"));
    }

    #[test]
    fn test_every_axis_has_a_red_current_value() {
        let bands = crossing();
        let own = bands.ownship().cloned().unwrap();
        assert!(bands.track().region_of(0.0).is_conflict_band());
        assert!(bands.ground_speed().region_of(200.0 * KN).is_conflict_band());
        assert!(bands.vertical_speed().region_of(0.0).is_conflict_band());
        assert!(bands.altitude().region_of(own.s.z).is_conflict_band());
        assert!(!bands.track().is_empty());
    }

    #[test]
    fn test_setters_invalidate_results() {
        let mut bands = crossing();
        let before = bands.track().len();
        assert!(before > 1);
        bands.set_traffic(Vec::new());
        assert_eq!(bands.track().len(), 1);
        assert_eq!(bands.track().region(0), BandsRegion::None);
        assert!(bands.track().resolution(true).is_nan());
    }

    #[test]
    fn test_parameters_reshape_ranges() {
        let mut bands = crossing();
        bands.update_parameters(|p| {
            p.min_gs = 150.0 * KN;
            p.max_gs = 250.0 * KN;
        });
        let first = bands.ground_speed().interval(0);
        let ranges = bands.ground_speed().ranges();
        assert!((first.low - 150.0 * KN).abs() < 1e-9);
        assert!((ranges[ranges.len() - 1].interval.up - 250.0 * KN).abs() < 1e-9);
    }

    #[test]
    fn test_linear_projection_moves_everyone() {
        let mut bands = crossing();
        bands.linear_projection(10.0);
        let own = bands.ownship().cloned().unwrap();
        assert!((own.s.y - 10.0 * 200.0 * KN).abs() < 1e-6);
        assert_eq!(bands.traffic().len(), 1);
        assert!((bands.traffic()[0].s.x - (4000.0 - 10.0 * 200.0 * KN)).abs() < 1e-6);
    }

    #[test]
    fn test_report_serializes() {
        let report = crossing().report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["alerts"][0]["level"], 3);
        assert!(json["track"]["ranges"].as_array().is_some_and(|r| !r.is_empty()));
    }
}
