//! Shared state of the band computations: ownship, traffic, alert levels
//! and the values derived from them.

use std::cell::OnceCell;

use tracing::debug;

use super::parameters::KinematicBandsParameters;
use crate::alerting::AlertLevels;
use crate::criteria::{horizontal_coordination, vertical_coordination_los};
use crate::detection::tcas::{sensitivity_level, TCASTable};
use crate::interval::Interval;
use crate::traffic::{self, TrafficState};

/// Values derived from the inputs, recomputed on the first read after any
/// change.
#[derive(Debug, Clone, Default)]
struct Derived {
    /// Aircraft in conflict within the early alerting time, per alert level.
    conflict_acs: Vec<Vec<TrafficState>>,
    /// Union of the conflict intervals of `conflict_acs`, per alert level.
    tiov: Vec<Interval>,
    most_urgent: Option<TrafficState>,
    epsh: i32,
    epsv: i32,
}

#[derive(Debug, Clone)]
pub struct KinematicBandsCore {
    ownship: Option<TrafficState>,
    traffic: Vec<TrafficState>,
    parameters: KinematicBandsParameters,
    alertor: AlertLevels,
    /// Identifier of the aircraft used for coordination and criteria.
    most_urgent_id: Option<String>,
    /// Empty when stale.
    derived: OnceCell<Derived>,
}

impl Default for KinematicBandsCore {
    fn default() -> Self {
        Self::new(KinematicBandsParameters::default(), AlertLevels::do_365())
    }
}

impl KinematicBandsCore {
    pub fn new(parameters: KinematicBandsParameters, alertor: AlertLevels) -> Self {
        Self {
            ownship: None,
            traffic: Vec::new(),
            parameters,
            alertor,
            most_urgent_id: None,
            derived: OnceCell::new(),
        }
    }

    /// Marks every derived value stale.
    pub fn reset(&mut self) {
        self.derived.take();
    }

    /// True when derived values are cached.
    pub fn is_fresh(&self) -> bool {
        self.derived.get().is_some()
    }

    pub fn ownship(&self) -> Option<&TrafficState> {
        self.ownship.as_ref()
    }

    pub fn has_ownship(&self) -> bool {
        self.ownship.is_some()
    }

    /// Replaces the ownship; invalid states clear it.
    pub fn set_ownship(&mut self, own: TrafficState) {
        self.ownship = own.is_valid().then_some(own);
        self.reset();
    }

    pub fn traffic(&self) -> &[TrafficState] {
        &self.traffic
    }

    /// Adds an intruder, replacing any aircraft with the same identifier.
    pub fn add_traffic(&mut self, ac: TrafficState) {
        if !ac.is_valid() {
            return;
        }
        self.traffic.retain(|t| t.id != ac.id);
        self.traffic.push(ac);
        self.reset();
    }

    pub fn clear_traffic(&mut self) {
        self.traffic.clear();
        self.reset();
    }

    pub fn find_traffic(&self, id: &str) -> Option<&TrafficState> {
        traffic::find(&self.traffic, id)
    }

    pub fn parameters(&self) -> &KinematicBandsParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: KinematicBandsParameters) {
        self.parameters = parameters;
        self.reset();
    }

    pub fn alertor(&self) -> &AlertLevels {
        &self.alertor
    }

    pub fn set_alertor(&mut self, alertor: AlertLevels) {
        self.alertor = alertor;
        self.reset();
    }

    /// Pins the aircraft used for coordination; `None` lets the earliest
    /// conflict at the conflict level decide.
    pub fn set_most_urgent_aircraft(&mut self, id: Option<&str>) {
        self.most_urgent_id = id.map(str::to_string);
        self.reset();
    }

    fn derived(&self) -> &Derived {
        self.derived.get_or_init(|| self.compute())
    }

    fn compute(&self) -> Derived {
        let Some(own) = &self.ownship else {
            return Derived::default();
        };
        let mut d = Derived::default();
        for level in self.alertor.iter() {
            let det = level.detector();
            let t = level.early_alerting_time();
            let mut acs = Vec::new();
            let mut tiov = Interval::EMPTY;
            for ac in &self.traffic {
                let cd = det.conflict_detection(&own.s, &own.v, &ac.s, &ac.v, 0.0, t);
                if cd.conflict() {
                    tiov = if tiov.is_empty() {
                        Interval::new(cd.time_in(), cd.time_out())
                    } else {
                        Interval::new(tiov.low.min(cd.time_in()), tiov.up.max(cd.time_out()))
                    };
                    acs.push(ac.clone());
                }
            }
            d.conflict_acs.push(acs);
            d.tiov.push(tiov);
        }
        d.most_urgent = match &self.most_urgent_id {
            Some(id) => self.find_traffic(id).cloned(),
            None => self.earliest_conflict(own),
        };
        if let Some(ac) = &d.most_urgent {
            let s = own.s - ac.s;
            d.epsh = horizontal_coordination(&s, &(own.v - ac.v));
            d.epsv = vertical_coordination_los(
                &s,
                &own.v,
                &ac.v,
                self.parameters.horizontal_nmac,
                self.parameters.vertical_nmac,
                &own.id,
                &ac.id,
            );
        }
        debug!(
            traffic = self.traffic.len(),
            most_urgent = d.most_urgent.as_ref().map(|ac| ac.id.as_str()),
            epsh = d.epsh,
            epsv = d.epsv,
            "Recomputed band core"
        );
        d
    }

    fn earliest_conflict(&self, own: &TrafficState) -> Option<TrafficState> {
        let level = self.alertor.level(self.alertor.conflict_alert_level())?;
        let det = level.detector();
        self.traffic
            .iter()
            .filter_map(|ac| {
                let cd = det.conflict_detection(
                    &own.s,
                    &own.v,
                    &ac.s,
                    &ac.v,
                    0.0,
                    level.early_alerting_time(),
                );
                cd.conflict().then_some((cd.time_in(), cd.dist_crit, ac))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)))
            .map(|(_, _, ac)| ac.clone())
    }

    /// Aircraft in conflict at `level` (1-based) within its early alerting time.
    pub fn conflict_aircraft(&self, level: usize) -> &[TrafficState] {
        level
            .checked_sub(1)
            .and_then(|i| self.derived().conflict_acs.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Time interval of predicted loss with any conflict aircraft at `level`.
    pub fn time_interval_of_violation(&self, level: usize) -> Interval {
        level
            .checked_sub(1)
            .and_then(|i| self.derived().tiov.get(i).copied())
            .unwrap_or(Interval::EMPTY)
    }

    pub fn most_urgent_aircraft(&self) -> Option<&TrafficState> {
        self.derived().most_urgent.as_ref()
    }

    pub fn epsilon_h(&self) -> i32 {
        self.derived().epsh
    }

    pub fn epsilon_v(&self) -> i32 {
        self.derived().epsv
    }

    /// Aircraft checked by the repulsive criteria in conflict bands.
    pub fn criteria_ac(&self) -> Option<&TrafficState> {
        self.most_urgent_aircraft().filter(|_| self.parameters.conflict_crit)
    }

    /// Aircraft checked by the repulsive criteria in recovery bands.
    pub fn recovery_ac(&self) -> Option<&TrafficState> {
        self.most_urgent_aircraft().filter(|_| self.parameters.recovery_crit)
    }

    fn ownship_level(&self) -> usize {
        self.ownship
            .as_ref()
            .map_or(3, |own| sensitivity_level(own.s.z).max(3))
    }

    /// Horizontal recovery separation; defaults to the RA miss distance at
    /// the ownship altitude.
    pub fn min_horizontal_recovery(&self) -> f64 {
        if self.parameters.min_horizontal_recovery > 0.0 {
            return self.parameters.min_horizontal_recovery;
        }
        TCASTable::ra().hmd(self.ownship_level())
    }

    /// Vertical recovery separation; defaults to the RA altitude threshold
    /// at the ownship altitude.
    pub fn min_vertical_recovery(&self) -> f64 {
        if self.parameters.min_vertical_recovery > 0.0 {
            return self.parameters.min_vertical_recovery;
        }
        TCASTable::ra().zthr(self.ownship_level())
    }

    pub fn last_conflict_alert_level(&self) -> usize {
        self.alertor.last_conflict_alert_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{FT, KN};
    use crate::vect::vect3;

    fn head_on() -> KinematicBandsCore {
        let mut core = KinematicBandsCore::default();
        core.set_ownship(TrafficState::from_trk_gs_vs(
            "own",
            vect3(0.0, 0.0, 5000.0 * FT),
            0.0,
            200.0 * KN,
            0.0,
        ));
        core.add_traffic(TrafficState::from_trk_gs_vs(
            "ac1",
            vect3(0.0, 8000.0, 5000.0 * FT),
            std::f64::consts::PI,
            200.0 * KN,
            0.0,
        ));
        core
    }

    #[test]
    fn test_cache_goes_stale_on_mutation() {
        let mut core = head_on();
        assert!(!core.is_fresh());
        assert_eq!(core.conflict_aircraft(2).len(), 1);
        assert!(core.is_fresh());
        core.add_traffic(TrafficState::new("ac2", vect3(1e6, 0.0, 0.0), vect3(0.0, 0.0, 0.0)));
        assert!(!core.is_fresh());
        assert_eq!(core.conflict_aircraft(2).len(), 1);
        assert_eq!(core.traffic().len(), 2);
    }

    #[test]
    fn test_most_urgent_and_epsilons() {
        let core = head_on();
        assert_eq!(core.most_urgent_aircraft().map(|ac| ac.id.as_str()), Some("ac1"));
        let tiov = core.time_interval_of_violation(3);
        assert!(!tiov.is_empty() && tiov.low > 0.0);
        // Exactly head-on and level: vertical tie broken on identifiers.
        assert!(core.epsilon_v() == 1 || core.epsilon_v() == -1);
        assert!(core.criteria_ac().is_none());
        assert!(core.conflict_aircraft(0).is_empty());
    }

    #[test]
    fn test_recovery_defaults_follow_tcas() {
        let core = head_on();
        let sl = sensitivity_level(5000.0 * FT);
        assert_eq!(core.min_horizontal_recovery(), TCASTable::ra().hmd(sl));
        assert_eq!(core.min_vertical_recovery(), TCASTable::ra().zthr(sl));
        let mut p = KinematicBandsParameters::default();
        p.min_horizontal_recovery = 1000.0;
        let mut core = core;
        core.set_parameters(p);
        assert_eq!(core.min_horizontal_recovery(), 1000.0);
    }

    #[test]
    fn test_invalid_ownship_is_dropped() {
        let mut core = KinematicBandsCore::default();
        core.set_ownship(TrafficState::new("own", vect3(f64::NAN, 0.0, 0.0), vect3(0.0, 0.0, 0.0)));
        assert!(!core.has_ownship());
        assert!(core.conflict_aircraft(1).is_empty());
        assert_eq!(core.epsilon_h(), 0);
    }
}
