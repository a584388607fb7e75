//! Ground speed bands: constant horizontal acceleration.

use super::parameters::KinematicBandsParameters;
use super::real::AxisModel;
use crate::kinematics::{gs_accel, State};
use crate::traffic::TrafficState;
use crate::vect::Vect3Ext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GsAxis;

impl AxisModel for GsAxis {
    fn name(&self) -> &'static str {
        "ground speed"
    }

    fn own_val(&self, own: &TrafficState) -> f64 {
        own.v.gs()
    }

    fn time_step(&self, _own: &TrafficState, p: &KinematicBandsParameters, step: f64) -> f64 {
        if p.horizontal_accel > 0.0 {
            step / p.horizontal_accel
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
        let a = if dir { p.horizontal_accel } else { -p.horizontal_accel };
        gs_accel(&own.s, &own.v, t, a)
    }

    fn jump(&self, own: &TrafficState, val: f64) -> State {
        (own.s, own.v.mk_gs(val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::real::{AxisRange, KinematicRealBands};
    use crate::bands::{BandsRegion, KinematicBandsCore};
    use crate::units::{FT, KN};
    use crate::vect::vect3;
    use std::f64::consts::PI;

    #[test]
    fn test_acceleration_steps() {
        let own = TrafficState::from_trk_gs_vs("own", vect3(0.0, 0.0, 0.0), PI / 2.0, 100.0, 0.0);
        let p = KinematicBandsParameters::default();
        assert_eq!(GsAxis.time_step(&own, &p, 1.0), 0.5);
        let (s, v) = GsAxis.trajectory(&own, &p, 5.0, true);
        assert!((v.gs() - 110.0).abs() < 1e-9);
        assert!((s.x - 525.0).abs() < 1e-9);
        let (_, v) = GsAxis.trajectory(&own, &p, 5.0, false);
        assert!((v.gs() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_head_on_has_no_speed_escape() {
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
            PI,
            200.0 * KN,
            0.0,
        ));
        let p = core.parameters().clone();
        let bands = KinematicRealBands::new(
            GsAxis,
            AxisRange::absolute(p.min_gs, p.max_gs, p.gs_step, p.recovery_gs),
        );
        // Not even the NMAC cylinder can be avoided along the same line.
        assert_eq!(bands.time_to_recovery(&core), f64::NEG_INFINITY);
        assert_eq!(bands.len(&core), 1);
        assert_eq!(bands.region(&core, 0), BandsRegion::Near);
        assert_eq!(bands.interval(&core, 0).low, p.min_gs);
        assert_eq!(bands.compute_resolution(&core, 0, true), f64::INFINITY);
    }
}
