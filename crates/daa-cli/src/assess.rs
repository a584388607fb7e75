//! Whole-picture assessment through the [`Daidalus`] facade: alert level,
//! time to violation and horizontal contours for every intruder, under an
//! optional wind and degraded surveillance.

use std::str::FromStr;

use anyhow::{bail, Result};
use daa_core::buffers::{Accuracy, PositionCategory, SafetyBuffers};
use daa_core::daidalus::{Contour, Daidalus};
use daa_core::detection::ConflictData;
use daa_core::traffic::TrafficState;
use daa_core::units::{DEG, KN};
use daa_core::urgency::{DcpaUrgency, FixedAircraftUrgency, NoUrgency, UrgencyStrategy};
use daa_core::vect::{from_trk_gs_vs, Vect3};
use serde::Serialize;
use tracing::info;

/// `none`, `dcpa`, or the identifier of a fixed aircraft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UrgencyChoice {
    #[default]
    None,
    Dcpa,
    Fixed(String),
}

impl UrgencyChoice {
    pub fn strategy(&self) -> Box<dyn UrgencyStrategy> {
        match self {
            UrgencyChoice::None => Box::new(NoUrgency),
            UrgencyChoice::Dcpa => Box::new(DcpaUrgency),
            UrgencyChoice::Fixed(id) => Box::new(FixedAircraftUrgency::new(id.clone())),
        }
    }
}

impl FromStr for UrgencyChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "" => bail!("empty urgency strategy"),
            "none" => UrgencyChoice::None,
            "dcpa" => UrgencyChoice::Dcpa,
            id => UrgencyChoice::Fixed(id.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssessOptions {
    /// Direction the wind blows toward, deg
    pub wind_trk_deg: f64,
    pub wind_kn: f64,
    pub urgency: UrgencyChoice,
    /// NACp and NACv shared by every aircraft; `None` uses nominal volumes
    pub accuracy: Option<(usize, usize)>,
    pub contours: bool,
    /// Buffered alerting with kinematic bands instead of the instantaneous
    /// defaults
    pub buffered: bool,
}

#[derive(Debug, Serialize)]
pub struct IntruderAssessment {
    pub id: String,
    pub alert_level: usize,
    /// `None` when no violation is predicted within the lookahead time
    pub time_to_violation_s: Option<f64>,
    pub detection: ConflictData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contours: Vec<Contour>,
}

#[derive(Debug, Serialize)]
pub struct Assessment {
    pub wind: Vect3,
    pub most_urgent: Option<String>,
    pub intruders: Vec<IntruderAssessment>,
}

/// Loads the encounter into a fresh facade and queries every intruder.
/// Velocities in `own` and `intruders` are ground velocities.
pub fn assess(
    own: &TrafficState,
    intruders: &[TrafficState],
    lookahead: f64,
    opts: &AssessOptions,
) -> Result<Assessment> {
    let mut daa = Daidalus::new();
    if opts.buffered {
        daa.set_buffered_wc_sc_228_mops(true);
    }
    daa.update_parameters(|p| p.lookahead_time = lookahead);
    daa.set_wind_field(from_trk_gs_vs(opts.wind_trk_deg * DEG, opts.wind_kn * KN, 0.0));
    daa.set_urgency_strategy(opts.urgency.strategy());
    if let Some((nacp, nacv)) = opts.accuracy {
        let accuracy = Accuracy::new(PositionCategory::Nacp(nacp), nacv);
        daa.set_safety_buffers(Some(SafetyBuffers::new(accuracy, accuracy)));
    }

    daa.set_ownship_state(&own.id, own.s, own.v, 0.0)?;
    for ac in intruders {
        daa.add_traffic_state(&ac.id, ac.s, ac.v, 0.0)?;
    }

    let mut out = Vec::with_capacity(intruders.len());
    for idx in 1..daa.number_of_aircraft() {
        let ttv = daa.time_to_violation(idx)?;
        out.push(IntruderAssessment {
            id: daa.aircraft_state(idx)?.id.clone(),
            alert_level: daa.alerting(idx)?,
            time_to_violation_s: ttv.is_finite().then_some(ttv),
            detection: daa.detection(idx, 0)?,
            contours: if opts.contours {
                daa.horizontal_contours(idx, 0)?
            } else {
                Vec::new()
            },
        });
    }
    let most_urgent = daa.most_urgent_aircraft().map(|ac| ac.id.clone());
    info!(traffic = out.len(), most_urgent = most_urgent.as_deref(), "Assessment done");
    Ok(Assessment {
        wind: daa.wind_field(),
        most_urgent,
        intruders: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use daa_core::units::FT;
    use daa_core::vect::vect3;

    fn encounter() -> (TrafficState, Vec<TrafficState>) {
        let own =
            TrafficState::from_trk_gs_vs("own", vect3(0.0, 0.0, 5000.0 * FT), 0.0, 200.0 * KN, 0.0);
        let traffic = vec![
            TrafficState::from_trk_gs_vs(
                "ac1",
                vect3(0.0, 16000.0, 5000.0 * FT),
                180.0 * DEG,
                200.0 * KN,
                0.0,
            ),
            TrafficState::from_trk_gs_vs(
                "ac2",
                vect3(0.0, -20000.0, 5000.0 * FT),
                180.0 * DEG,
                200.0 * KN,
                0.0,
            ),
        ];
        (own, traffic)
    }

    #[test]
    fn test_urgency_choice_parses() {
        assert_eq!("none".parse::<UrgencyChoice>().unwrap(), UrgencyChoice::None);
        assert_eq!(" dcpa ".parse::<UrgencyChoice>().unwrap(), UrgencyChoice::Dcpa);
        assert_eq!(
            "ac7".parse::<UrgencyChoice>().unwrap(),
            UrgencyChoice::Fixed("ac7".to_string()),
        );
        assert!("".parse::<UrgencyChoice>().is_err());
    }

    #[test]
    fn test_assess_head_on() {
        let (own, traffic) = encounter();
        let opts = AssessOptions {
            urgency: UrgencyChoice::Dcpa,
            ..AssessOptions::default()
        };
        let report = assess(&own, &traffic, 180.0, &opts).unwrap();
        assert_eq!(report.intruders.len(), 2);
        assert_eq!(report.most_urgent.as_deref(), Some("ac1"));
        let ac1 = &report.intruders[0];
        assert!(ac1.alert_level >= 2);
        assert!(ac1.time_to_violation_s.is_some_and(|t| t > 0.0));
        assert!(ac1.contours.is_empty());
        let ac2 = &report.intruders[1];
        assert_eq!(ac2.alert_level, 0);
        assert_eq!(ac2.time_to_violation_s, None);
    }

    #[test]
    fn test_wind_and_contours() {
        let (own, traffic) = encounter();
        let calm = assess(&own, &traffic, 180.0, &AssessOptions::default()).unwrap();
        let opts = AssessOptions {
            wind_trk_deg: 90.0,
            wind_kn: 30.0,
            contours: true,
            ..AssessOptions::default()
        };
        let windy = assess(&own, &traffic, 180.0, &opts).unwrap();
        assert!((windy.wind.x - 30.0 * KN).abs() < 1e-9);
        let (a, b) =
            (calm.intruders[0].time_to_violation_s, windy.intruders[0].time_to_violation_s);
        assert!(a.zip(b).is_some_and(|(a, b)| (a - b).abs() < 1e-9));
        assert!(!windy.intruders[0].contours.is_empty());
        let json = serde_json::to_value(&windy).unwrap();
        assert!(json["intruders"][1].get("contours").is_none());
    }

    #[test]
    fn test_accuracy_buffers_shorten_time_to_violation() {
        let (own, traffic) = encounter();
        let nominal = assess(&own, &traffic, 180.0, &AssessOptions::default()).unwrap();
        let opts = AssessOptions {
            accuracy: Some((9, 2)),
            ..AssessOptions::default()
        };
        let buffered = assess(&own, &traffic, 180.0, &opts).unwrap();
        let (a, b) =
            (nominal.intruders[0].time_to_violation_s, buffered.intruders[0].time_to_violation_s);
        assert!(a.zip(b).is_some_and(|(a, b)| b < a));
    }
}
