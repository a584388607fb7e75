//! Track bands: coordinated turns at a constant track rate.

use super::parameters::KinematicBandsParameters;
use super::real::AxisModel;
use crate::kinematics::{turn_omega, turn_rate, State};
use crate::traffic::TrafficState;
use crate::vect::Vect3Ext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrkAxis;

impl TrkAxis {
    /// Track rate of the ownship; the bank angle decides when no rate is set.
    pub fn omega(own: &TrafficState, p: &KinematicBandsParameters) -> f64 {
        if p.turn_rate > 0.0 {
            p.turn_rate
        } else {
            turn_rate(own.v.gs(), p.bank_angle)
        }
    }
}

impl AxisModel for TrkAxis {
    fn name(&self) -> &'static str {
        "track"
    }

    fn own_val(&self, own: &TrafficState) -> f64 {
        own.v.trk()
    }

    fn time_step(&self, own: &TrafficState, p: &KinematicBandsParameters, step: f64) -> f64 {
        let omega = Self::omega(own, p);
        if omega > 0.0 {
            step / omega
        } else {
            0.0
        }
    }

    fn trajectory(
        &self,
        own: &TrafficState,
        p: &KinematicBandsParameters,
        t: f64,
        dir: bool,
    ) -> State {
        let omega = Self::omega(own, p);
        turn_omega(&own.s, &own.v, t, if dir { omega } else { -omega })
    }

    fn jump(&self, own: &TrafficState, val: f64) -> State {
        (own.s, own.v.mk_trk(val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::real::{AxisRange, KinematicRealBands};
    use crate::bands::{BandsRegion, KinematicBandsCore};
    use crate::units::{DEG, FT, KN};
    use crate::vect::vect3;
    use std::f64::consts::PI;

    fn head_on(range: f64) -> KinematicBandsCore {
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
            vect3(0.0, range, 5000.0 * FT),
            PI,
            200.0 * KN,
            0.0,
        ));
        core
    }

    fn track_bands(core: &KinematicBandsCore, recovery: bool) -> KinematicRealBands<TrkAxis> {
        let p = core.parameters();
        let range = AxisRange::relative(
            -p.left_trk,
            p.right_trk,
            2.0 * PI,
            p.trk_step,
        ).with_recovery(recovery);
        KinematicRealBands::new(TrkAxis, range)
    }

    #[test]
    fn test_time_step_follows_turn_rate() {
        let own = TrafficState::from_trk_gs_vs("own", vect3(0.0, 0.0, 0.0), 0.0, 200.0 * KN, 0.0);
        let p = KinematicBandsParameters::default();
        assert!((TrkAxis.time_step(&own, &p, DEG) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(TrkAxis.time_step(&own, &KinematicBandsParameters::instantaneous(), DEG), 0.0);

        let (_, v) = TrkAxis.trajectory(&own, &p, 30.0, true);
        assert!((v.trk() - PI / 2.0).abs() < 1e-9);
        let (_, v) = TrkAxis.trajectory(&own, &p, 30.0, false);
        assert!((v.trk() - 3.0 * PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_head_on_bands_tile_the_circle() {
        let core = head_on(16000.0);
        let bands = track_bands(&core, false);
        let ranges = bands.ranges(&core);
        assert!(ranges.len() >= 3);
        assert_eq!(ranges[0].interval.low, 0.0);
        assert_eq!(ranges[ranges.len() - 1].interval.up, 2.0 * PI);
        for w in ranges.windows(2) {
            assert!((w[0].interval.up - w[1].interval.low).abs() < 1e-9);
            assert_ne!(w[0].region, w[1].region);
        }
        assert!(bands.region_of(&core, 0.0).is_conflict_band());
        assert_eq!(bands.region_of(&core, PI / 2.0), BandsRegion::None);
        assert_eq!(bands.region_of(&core, 3.0 * PI / 2.0), BandsRegion::None);
        assert!(bands.time_to_recovery(&core).is_nan());
    }

    #[test]
    fn test_head_on_resolutions_bracket_current_track() {
        let core = head_on(16000.0);
        let bands = track_bands(&core, false);
        let up = bands.compute_resolution(&core, 0, true);
        let down = bands.compute_resolution(&core, 0, false);
        assert!(up > 0.0 && up < PI / 2.0);
        assert!(down > 3.0 * PI / 2.0 && down < 2.0 * PI);
        let ac = core.find_traffic("ac1").cloned().unwrap();
        let ltm = bands.last_time_to_maneuver(&core, &ac);
        assert!(ltm > 0.0 && ltm < 60.0);
    }

    #[test]
    fn test_close_head_on_saturates_without_recovery() {
        let core = head_on(8000.0);
        let bands = track_bands(&core, false);
        let ranges = bands.ranges(&core);
        assert!(ranges.iter().all(|r| r.region.is_conflict_band()));
        assert!(bands.time_to_recovery(&core).is_nan());
        assert!(!bands.compute_resolution(&core, 0, true).is_finite());
    }

    #[test]
    fn test_close_head_on_recovery_bands() {
        let core = head_on(8000.0);
        let bands = track_bands(&core, true);
        let ranges = bands.ranges(&core);
        let recovery = bands.time_to_recovery(&core);
        assert!(recovery.is_finite());
        assert!(recovery >= 0.0);
        let alertor = core.alertor();
        let early = alertor.level(alertor.conflict_alert_level()).unwrap().early_alerting_time();
        assert!(recovery <= early);
        assert!(ranges.iter().any(|r| r.region == BandsRegion::Recovery));
        assert_ne!(bands.region_of(&core, 0.0), BandsRegion::Recovery);
        let right = bands.region_of(&core, PI / 2.0);
        let left = bands.region_of(&core, 3.0 * PI / 2.0);
        assert!(right == BandsRegion::Recovery || left == BandsRegion::Recovery);
    }
}
