//! Vertical speed bands: constant vertical acceleration.

use super::parameters::KinematicBandsParameters;
use super::real::AxisModel;
use crate::kinematics::{vs_accel, State};
use crate::traffic::TrafficState;
use crate::vect::Vect3Ext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VsAxis;

impl AxisModel for VsAxis {
    fn name(&self) -> &'static str {
        "vertical speed"
    }

    fn own_val(&self, own: &TrafficState) -> f64 {
        own.v.vs()
    }

    fn time_step(&self, _own: &TrafficState, p: &KinematicBandsParameters, step: f64) -> f64 {
        if p.vertical_accel > 0.0 {
            step / p.vertical_accel
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
        let a = if dir { p.vertical_accel } else { -p.vertical_accel };
        vs_accel(&own.s, &own.v, t, a)
    }

    fn jump(&self, own: &TrafficState, val: f64) -> State {
        (own.s, own.v.mk_vs(val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::real::{AxisRange, KinematicRealBands};
    use crate::bands::{BandsRegion, KinematicBandsCore, KinematicBandsParameters};
    use crate::units::{FPM, FT, KN};
    use crate::vect::vect3;
    use std::f64::consts::PI;

    fn distant_head_on(p: KinematicBandsParameters) -> KinematicBandsCore {
        let mut core = KinematicBandsCore::default();
        core.set_parameters(p);
        core.set_ownship(TrafficState::from_trk_gs_vs(
            "own",
            vect3(0.0, 0.0, 5000.0 * FT),
            0.0,
            200.0 * KN,
            0.0,
        ));
        core.add_traffic(TrafficState::from_trk_gs_vs(
            "ac1",
            vect3(0.0, 16000.0, 5000.0 * FT),
            PI,
            200.0 * KN,
            0.0,
        ));
        core
    }

    fn vs_bands(core: &KinematicBandsCore) -> KinematicRealBands<VsAxis> {
        let p = core.parameters();
        KinematicRealBands::new(
            VsAxis,
            AxisRange::absolute(p.min_vs, p.max_vs, p.vs_step, p.recovery_vs),
        )
    }

    #[test]
    fn test_level_flight_is_red_and_extremes_are_clear() {
        let core = distant_head_on(KinematicBandsParameters::default());
        let bands = vs_bands(&core);
        assert_eq!(bands.region_of(&core, 0.0), BandsRegion::Near);
        assert_eq!(bands.region_of(&core, 5000.0 * FPM), BandsRegion::None);
        assert_eq!(bands.region_of(&core, -5000.0 * FPM), BandsRegion::None);
    }

    #[test]
    fn test_instantaneous_resolution_is_closer() {
        let kinematic = distant_head_on(KinematicBandsParameters::default());
        let instant = distant_head_on(KinematicBandsParameters::instantaneous());
        let up_k = vs_bands(&kinematic).compute_resolution(&kinematic, 0, true);
        let up_i = vs_bands(&instant).compute_resolution(&instant, 0, true);
        assert!(up_k.is_finite() && up_i.is_finite());
        assert!(up_i <= up_k + 1e-9);
    }
}
