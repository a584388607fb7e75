//! Single-entry detect-and-avoid facade.
//!
//! [`Daidalus`] keeps the ownship and traffic at a common time together
//! with a wind field, the alerting configuration and the band parameters,
//! and answers alerting, detection, band and contour queries on top of
//! them. Index 0 is the ownship; traffic aircraft are numbered from 1 in
//! insertion order.
//!
//! States are given with ground velocities and stored with air velocities
//! (ground minus wind). Relative geometry, and therefore detection, does
//! not depend on the wind; maneuvers and contours are flown in the air
//! mass.

use std::collections::VecDeque;
use std::f64::consts::TAU;

use tracing::{debug, info};

use crate::alerting::{AlertLevels, AlertThresholds};
use crate::bands::{KinematicBandsParameters, KinematicMultiBands};
use crate::buffers::SafetyBuffers;
use crate::detection::{ConflictData, Detection3D};
use crate::error::{DaaError, Result};
use crate::traffic::TrafficState;
use crate::units::{DEG, FT, NMI};
use crate::urgency::{NoUrgency, UrgencyStrategy};
use crate::vect::{Vect3, Vect3Ext};

/// One closed region of the horizontal plane: entry points followed by
/// exit points, in order around the region.
pub type Contour = Vec<Vect3>;

#[derive(Debug, Clone)]
pub struct Daidalus {
    parameters: KinematicBandsParameters,
    alertor: AlertLevels,
    urgency: Box<dyn UrgencyStrategy>,
    buffers: Option<SafetyBuffers>,
    wind: Vect3,
    current_time: f64,
    /// Ownship first
    aircraft: Vec<TrafficState>,
}

impl Default for Daidalus {
    fn default() -> Self {
        Self::new()
    }
}

impl Daidalus {
    /// Facade configured for the instantaneous well-clear bands.
    pub fn new() -> Self {
        let mut daa = Self {
            parameters: KinematicBandsParameters::default(),
            alertor: AlertLevels::do_365(),
            urgency: Box::new(NoUrgency),
            buffers: None,
            wind: Vect3::zeros(),
            current_time: 0.0,
            aircraft: Vec::new(),
        };
        daa.set_wc_sc_228_mops();
        daa
    }

    /// Three-level well-clear alerting with instantaneous bands and no
    /// collision-avoidance bands. Replaces every band parameter.
    pub fn set_wc_sc_228_mops(&mut self) {
        self.alertor = AlertLevels::do_365();
        self.parameters = KinematicBandsParameters {
            ca_bands: false,
            min_horizontal_recovery: 0.66 * NMI,
            min_vertical_recovery: 450.0 * FT,
            ..KinematicBandsParameters::instantaneous()
        };
    }

    /// Buffered well-clear alerting with kinematic bands and
    /// collision-avoidance bands. `fast_turn` selects a 3 deg/s turn rate
    /// instead of 1.5 deg/s. Replaces every band parameter.
    pub fn set_buffered_wc_sc_228_mops(&mut self, fast_turn: bool) {
        self.alertor = AlertLevels::buffered_do_365();
        self.parameters = KinematicBandsParameters {
            turn_rate: if fast_turn { 3.0 * DEG } else { 1.5 * DEG },
            ca_bands: true,
            ca_factor: 0.2,
            min_horizontal_recovery: NMI,
            min_vertical_recovery: 450.0 * FT,
            ..KinematicBandsParameters::default()
        };
    }

    pub fn parameters(&self) -> &KinematicBandsParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: KinematicBandsParameters) {
        self.parameters = parameters;
    }

    pub fn update_parameters(&mut self, f: impl FnOnce(&mut KinematicBandsParameters)) {
        f(&mut self.parameters);
    }

    pub fn alertor(&self) -> &AlertLevels {
        &self.alertor
    }

    pub fn set_alertor(&mut self, alertor: AlertLevels) {
        alertor.warn_if_invalid();
        self.alertor = alertor;
    }

    pub fn urgency_strategy(&self) -> &dyn UrgencyStrategy {
        self.urgency.as_ref()
    }

    pub fn set_urgency_strategy(&mut self, strategy: Box<dyn UrgencyStrategy>) {
        self.urgency = strategy;
    }

    pub fn safety_buffers(&self) -> Option<&SafetyBuffers> {
        self.buffers.as_ref()
    }

    /// Surveillance accuracy used to grow the detection volumes; `None`
    /// detects with the nominal volumes.
    pub fn set_safety_buffers(&mut self, buffers: Option<SafetyBuffers>) {
        self.buffers = buffers;
    }

    /// Drops every aircraft and rewinds the clock. The wind is kept.
    pub fn reset(&mut self) {
        self.aircraft.clear();
        self.current_time = 0.0;
    }

    /// Ownship plus traffic.
    pub fn number_of_aircraft(&self) -> usize {
        self.aircraft.len()
    }

    /// Index of the last traffic aircraft, `None` without traffic.
    pub fn last_traffic_index(&self) -> Option<usize> {
        self.aircraft.len().checked_sub(1).filter(|&i| i > 0)
    }

    pub fn wind_field(&self) -> Vect3 {
        self.wind
    }

    /// Installs a new wind and re-derives every stored air velocity so
    /// that ground velocities are unchanged.
    pub fn set_wind_field(&mut self, wind: Vect3) {
        let delta = self.wind - wind;
        for ac in &mut self.aircraft {
            ac.v += delta;
        }
        self.wind = wind;
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Moves every aircraft along its ground velocity to `time`.
    pub fn set_current_time(&mut self, time: f64) {
        let dt = time - self.current_time;
        for ac in &mut self.aircraft {
            ac.s = ac.s.linear(&(ac.v + self.wind), dt);
        }
        self.current_time = time;
    }

    /// Advances the clock by `offset` seconds.
    pub fn linear_projection(&mut self, offset: f64) {
        self.set_current_time(self.current_time + offset);
    }

    /// Sets the ownship at `time`, which becomes the current time. Traffic
    /// from an earlier ownship is dropped.
    pub fn set_ownship_state(
        &mut self,
        id: &str,
        s: Vect3,
        ground_v: Vect3,
        time: f64,
    ) -> Result<()> {
        let own = TrafficState::new(id, s, ground_v - self.wind);
        if !own.is_valid() {
            return Err(DaaError::InvalidState(id.to_string()));
        }
        if self.aircraft.first().is_some_and(|o| o.id != id) {
            self.aircraft.clear();
        }
        match self.aircraft.first_mut() {
            Some(slot) => *slot = own,
            None => self.aircraft.push(own),
        }
        self.current_time = time;
        Ok(())
    }

    /// Adds or updates an aircraft observed at `time` and returns its index.
    ///
    /// The first aircraft becomes the ownship. Traffic observed at another
    /// time is projected to the current time along its ground velocity.
    pub fn add_traffic_state(
        &mut self,
        id: &str,
        s: Vect3,
        ground_v: Vect3,
        time: f64,
    ) -> Result<usize> {
        if self.aircraft.is_empty() {
            self.set_ownship_state(id, s, ground_v, time)?;
            return Ok(0);
        }
        let ac = TrafficState::new(
            id,
            s.linear(&ground_v, self.current_time - time),
            ground_v - self.wind,
        );
        if !ac.is_valid() {
            return Err(DaaError::InvalidState(id.to_string()));
        }
        let idx = match self.aircraft_index(id) {
            Some(0) => return Err(DaaError::InvalidState(id.to_string())),
            Some(idx) => {
                self.aircraft[idx] = ac;
                idx
            }
            None => {
                self.aircraft.push(ac);
                self.aircraft.len() - 1
            }
        };
        debug!(aircraft = id, idx, "Traffic state");
        Ok(idx)
    }

    /// Makes aircraft `idx` the ownship; the old ownship takes its index.
    pub fn reset_ownship(&mut self, idx: usize) -> Result<()> {
        if idx >= self.aircraft.len() {
            return Err(DaaError::AircraftIndex(idx));
        }
        self.aircraft.swap(0, idx);
        Ok(())
    }

    pub fn aircraft_index(&self, id: &str) -> Option<usize> {
        self.aircraft.iter().position(|ac| ac.id == id)
    }

    /// Stored state of aircraft `idx`, with its air velocity.
    pub fn aircraft_state(&self, idx: usize) -> Result<&TrafficState> {
        self.aircraft.get(idx).ok_or(DaaError::AircraftIndex(idx))
    }

    pub fn ownship_state(&self) -> Option<&TrafficState> {
        self.aircraft.first()
    }

    pub fn traffic(&self) -> &[TrafficState] {
        self.aircraft.get(1..).unwrap_or(&[])
    }

    fn ownship(&self) -> Result<&TrafficState> {
        self.ownship_state().ok_or(DaaError::AircraftIndex(0))
    }

    fn intruder(&self, idx: usize) -> Result<&TrafficState> {
        if idx == 0 {
            return Err(DaaError::AircraftIndex(idx));
        }
        self.aircraft_state(idx)
    }

    /// Thresholds of `level`; 0 is the conflict level.
    fn thresholds(&self, level: usize) -> Result<&AlertThresholds> {
        let level = if level == 0 {
            self.alertor.conflict_alert_level()
        } else {
            level
        };
        self.alertor
            .level(level)
            .ok_or_else(|| DaaError::InvalidConfig(format!("no alert level {level}")))
    }

    /// Detector of `level` for this encounter, grown by the safety buffers
    /// when they are set.
    fn detector(
        &self,
        level: usize,
        own: &TrafficState,
        ac: &TrafficState,
    ) -> Result<Box<dyn Detection3D>> {
        let det = self.thresholds(level)?.detector();
        Ok(match &self.buffers {
            Some(buffers) => {
                buffers.buffered_detector(
                    det,
                    &(own.s - ac.s),
                    &(own.v - ac.v),
                    self.parameters.lookahead_time,
                )
            }
            None => det.copy(),
        })
    }

    /// Bands for the current ownship and traffic, coordinated against the
    /// aircraft named by the urgency strategy. When it names none, the band
    /// engine picks the earliest conflict.
    pub fn kinematic_multi_bands(&self) -> Result<KinematicMultiBands> {
        let own = self.ownship()?;
        let mut bands = KinematicMultiBands::new(self.parameters.clone(), self.alertor.clone());
        bands.set_ownship(own.clone());
        bands.set_traffic(self.traffic().iter().cloned());
        let urgent = self.most_urgent_aircraft().map(|ac| ac.id.clone());
        bands.set_most_urgent_aircraft(urgent.as_deref());
        Ok(bands)
    }

    /// Most urgent traffic aircraft under the conflict-level detector.
    pub fn most_urgent_aircraft(&self) -> Option<&TrafficState> {
        let own = self.ownship_state()?;
        let det = self.thresholds(0).ok()?.detector();
        self.urgency
            .most_urgent_aircraft(det, own, self.traffic(), self.parameters.lookahead_time)
    }

    /// Alert level raised by traffic aircraft `idx`, 0 when none.
    pub fn alerting(&self, idx: usize) -> Result<usize> {
        self.alerting_with(idx, 0, 0, 0)
    }

    /// Alert level of aircraft `idx` given the ownship's current maneuver:
    /// negative is left, slower or descending, positive the opposite.
    pub fn alerting_with(
        &self,
        idx: usize,
        turning: i32,
        accelerating: i32,
        climbing: i32,
    ) -> Result<usize> {
        let ac = self.intruder(idx)?;
        let bands = self.kinematic_multi_bands()?;
        Ok(bands.alerting_with(&ac.id, turning, accelerating, climbing))
    }

    /// Detection of aircraft `idx` with the detector of `level` over the
    /// lookahead time; level 0 is the conflict level.
    pub fn detection(&self, idx: usize, level: usize) -> Result<ConflictData> {
        let own = self.ownship()?;
        let ac = self.intruder(idx)?;
        let det = self.detector(level, own, ac)?;
        Ok(det.conflict_detection(
            &own.s,
            &own.v,
            &ac.s,
            &ac.v,
            0.0,
            self.parameters.lookahead_time,
        ))
    }

    /// Seconds until aircraft `idx` violates the conflict-level volume,
    /// zero when already in violation and infinite when it never does
    /// within the lookahead time.
    pub fn time_to_violation(&self, idx: usize) -> Result<f64> {
        let cd = self.detection(idx, 0)?;
        Ok(if cd.conflict() { cd.time_in() } else { f64::INFINITY })
    }

    /// Horizontal regions the ownship would cross into the `level` volume
    /// of aircraft `idx`, sampled every `trk_step` of track.
    ///
    /// The region around the current track comes first. Other regions are
    /// searched up to `contour_thr` left and right of the current track.
    pub fn horizontal_contours(&self, idx: usize, level: usize) -> Result<Vec<Contour>> {
        let own = self.ownship()?;
        let ac = self.intruder(idx)?;
        let det = self.detector(level, own, ac)?;
        let step = self.parameters.trk_step;
        if !(step.is_finite() && step > 0.0) {
            return Err(DaaError::InvalidConfig(format!("track step {step} is not positive")));
        }
        let thr = self.parameters.contour_thr;
        let lookahead = self.parameters.lookahead_time;
        let trk = own.v.trk();
        let at = |angle: f64| {
            let vo = own.v.mk_trk(trk + angle);
            let cd = det.conflict_detection(&own.s, &vo, &ac.s, &ac.v, 0.0, lookahead);
            (vo, cd)
        };

        let mut contours = ContourBuilder::default();

        // Conflict contour, right of the current track then left.
        let mut right = 0.0;
        while right < TAU {
            let (vo, cd) = at(right);
            if !cd.conflict() {
                break;
            }
            if cd.time_in() != 0.0 {
                contours.inner.push_back(own.s.linear(&vo, cd.time_in()));
            }
            contours.outer.push_front(own.s.linear(&vo, cd.time_out()));
            right += step;
        }
        let mut left = 0.0;
        if right > 0.0 && right < TAU {
            left = step;
            while left < TAU {
                let (vo, cd) = at(-left);
                if !cd.conflict() {
                    break;
                }
                contours.inner.push_front(own.s.linear(&vo, cd.time_in()));
                contours.outer.push_back(own.s.linear(&vo, cd.time_out()));
                left += step;
            }
        }
        contours.close();

        // Other regions to the right.
        if right < thr {
            while right < TAU - left {
                let (vo, cd) = at(right);
                if cd.conflict() {
                    contours.inner.push_back(own.s.linear(&vo, cd.time_in()));
                    contours.outer.push_front(own.s.linear(&vo, cd.time_out()));
                } else {
                    contours.close();
                    if right >= thr {
                        break;
                    }
                }
                right += step;
            }
            contours.close();
        }

        // Other regions to the left.
        if left < thr {
            while left < TAU - right {
                let (vo, cd) = at(-left);
                if cd.conflict() {
                    contours.inner.push_front(own.s.linear(&vo, cd.time_in()));
                    contours.outer.push_back(own.s.linear(&vo, cd.time_out()));
                } else {
                    contours.close();
                    if left >= thr {
                        break;
                    }
                }
                left += step;
            }
            contours.close();
        }

        info!(aircraft = %ac.id, contours = contours.done.len(), "Horizontal contours");
        Ok(contours.done)
    }
}

#[derive(Default)]
struct ContourBuilder {
    inner: VecDeque<Vect3>,
    outer: VecDeque<Vect3>,
    done: Vec<Contour>,
}

impl ContourBuilder {
    /// Emits the pending points as one contour.
    fn close(&mut self) {
        if self.inner.is_empty() && self.outer.is_empty() {
            return;
        }
        let contour = self.inner.drain(..).chain(self.outer.drain(..)).collect();
        self.done.push(contour);
    }
}
