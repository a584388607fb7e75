//! Choice of the most urgent aircraft.
//!
//! The most urgent aircraft drives repulsive criteria and implicit
//! coordination in the band engine. Strategies are pluggable so that the
//! selection can follow the operational concept.

use std::fmt;

use tracing::debug;

use crate::detection::Detection3D;
use crate::traffic::{self, TrafficState};

pub trait UrgencyStrategy: fmt::Debug + Send + Sync {
    /// Most urgent aircraft in `traffic` under `detector` and `lookahead`,
    /// or `None` when no aircraft qualifies.
    fn most_urgent_aircraft<'a>(
        &self,
        detector: &dyn Detection3D,
        ownship: &TrafficState,
        traffic: &'a [TrafficState],
        lookahead: f64,
    ) -> Option<&'a TrafficState>;

    fn copy(&self) -> Box<dyn UrgencyStrategy>;
}

impl Clone for Box<dyn UrgencyStrategy> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Never names an aircraft.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUrgency;

impl UrgencyStrategy for NoUrgency {
    fn most_urgent_aircraft<'a>(
        &self,
        _detector: &dyn Detection3D,
        _ownship: &TrafficState,
        _traffic: &'a [TrafficState],
        _lookahead: f64,
    ) -> Option<&'a TrafficState> {
        None
    }

    fn copy(&self) -> Box<dyn UrgencyStrategy> {
        Box::new(*self)
    }
}

/// Always the aircraft with a given identifier, when present.
#[derive(Debug, Clone)]
pub struct FixedAircraftUrgency {
    id: String,
}

impl FixedAircraftUrgency {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl UrgencyStrategy for FixedAircraftUrgency {
    fn most_urgent_aircraft<'a>(
        &self,
        _detector: &dyn Detection3D,
        _ownship: &TrafficState,
        traffic: &'a [TrafficState],
        _lookahead: f64,
    ) -> Option<&'a TrafficState> {
        traffic::find(traffic, &self.id)
    }

    fn copy(&self) -> Box<dyn UrgencyStrategy> {
        Box::new(self.clone())
    }
}

/// Among the aircraft in conflict, the one with the smallest distance at
/// closest approach; ties go to the earliest loss of separation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcpaUrgency;

impl UrgencyStrategy for DcpaUrgency {
    fn most_urgent_aircraft<'a>(
        &self,
        detector: &dyn Detection3D,
        ownship: &TrafficState,
        traffic: &'a [TrafficState],
        lookahead: f64,
    ) -> Option<&'a TrafficState> {
        let chosen = traffic
            .iter()
            .filter_map(|ac| {
                let cd = detector.conflict_detection(
                    &ownship.s,
                    &ownship.v,
                    &ac.s,
                    &ac.v,
                    0.0,
                    lookahead,
                );
                cd.conflict().then_some((ac, cd.dist_crit, cd.time_in()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)))
            .map(|(ac, _, _)| ac);
        debug!(aircraft = chosen.map(|ac| ac.id.as_str()), "Most urgent by DCPA");
        chosen
    }

    fn copy(&self) -> Box<dyn UrgencyStrategy> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::WCV;
    use crate::units::{DEG, FT, KN};
    use crate::vect::vect3;

    fn scene() -> (TrafficState, Vec<TrafficState>) {
        let own =
            TrafficState::from_trk_gs_vs("own", vect3(0.0, 0.0, 5000.0 * FT), 0.0, 200.0 * KN, 0.0);
        let traffic = vec![
            // Loses separation first, passing 600 m abeam.
            TrafficState::from_trk_gs_vs(
                "wide",
                vect3(600.0, 8000.0, 5000.0 * FT),
                180.0 * DEG,
                200.0 * KN,
                0.0,
            ),
            // Dead ahead, but further out.
            TrafficState::from_trk_gs_vs(
                "ahead",
                vect3(0.0, 16000.0, 5000.0 * FT),
                180.0 * DEG,
                200.0 * KN,
                0.0,
            ),
            // Flying away behind.
            TrafficState::from_trk_gs_vs(
                "behind",
                vect3(0.0, -20000.0, 5000.0 * FT),
                180.0 * DEG,
                200.0 * KN,
                0.0,
            ),
        ];
        (own, traffic)
    }

    #[test]
    fn test_dcpa_prefers_smallest_miss_distance() {
        let (own, traffic) = scene();
        let wcv = WCV::taumod();
        let ac = DcpaUrgency.most_urgent_aircraft(&wcv, &own, &traffic, 180.0);
        assert_eq!(ac.map(|ac| ac.id.as_str()), Some("ahead"));
        assert!(DcpaUrgency.most_urgent_aircraft(&wcv, &own, &traffic[2..], 180.0).is_none());
    }

    #[test]
    fn test_fixed_and_none() {
        let (own, traffic) = scene();
        let wcv = WCV::taumod();
        let fixed: Box<dyn UrgencyStrategy> = Box::new(FixedAircraftUrgency::new("behind"));
        let ac = fixed.clone().most_urgent_aircraft(&wcv, &own, &traffic, 180.0);
        assert_eq!(ac.map(|ac| ac.id.as_str()), Some("behind"));
        let missing = FixedAircraftUrgency::new("ghost");
        assert!(missing.most_urgent_aircraft(&wcv, &own, &traffic, 180.0).is_none());
        assert!(NoUrgency.most_urgent_aircraft(&wcv, &own, &traffic, 180.0).is_none());
    }
}
