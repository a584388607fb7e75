//! Resolution service with configurable speed bounds.

use serde::{Deserialize, Serialize};

use super::cr3d::CR3D;
use super::ResolutionKind;
use crate::criteria::{horizontal_coordination, vertical_coordination};
use crate::units::{FPM, FT, KN, NMI};
use crate::util::discretize_dir;
use crate::vect::{Vect2Ext, Vect3, Vect3Ext};

/// Bounds and tuning of [`CRSS`]. All values in internal units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrssConfig {
    /// Ground speed limits for resolutions, m/s. `min_gs` must be positive.
    pub min_gs: f64,
    pub max_gs: f64,
    /// Vertical speed magnitude limit, m/s
    pub max_vs: f64,
    /// Relative horizontal speed that counts as exiting a loss, m/s
    pub min_horiz_exit_speed_los: f64,
    /// Relative vertical speed that counts as exiting a loss, m/s
    pub min_vert_exit_speed_los: f64,
    /// Vertical speed output grid, m/s
    pub vs_discretization: f64,
    /// Ground-speed LoS resolutions closing nearer than this are dropped, m
    pub gs_search_los_discard: f64,
    /// Near mid-air collision cylinder
    pub nmac_d: f64,
    pub nmac_h: f64,
    /// Count speed-only resolutions as a success
    pub allow_speed_only: bool,
}

impl Default for CrssConfig {
    fn default() -> Self {
        Self {
            min_gs: 150.0 * KN,
            max_gs: 700.0 * KN,
            max_vs: 5000.0 * FPM,
            min_horiz_exit_speed_los: 100.0 * KN,
            min_vert_exit_speed_los: 1000.0 * FPM,
            vs_discretization: 100.0 * FPM,
            gs_search_los_discard: 0.5 * NMI,
            nmac_d: 500.0 * FT,
            nmac_h: 100.0 * FT,
            allow_speed_only: false,
        }
    }
}

/// Resolutions in display-ready form: tracks in radians, speeds in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrssResolution {
    pub kind: ResolutionKind,
    pub trk_only: Option<f64>,
    pub gs_only: Option<f64>,
    /// Track and ground speed of the optimal horizontal resolution.
    pub opt_trk_gs: Option<(f64, f64)>,
    /// Vertical speed rounded away from the current one onto the grid.
    pub vs_only: Option<f64>,
    /// Ground speed and vertical speed of the speed-only resolution.
    pub speed_only: Option<(f64, f64)>,
}

/// Conflict resolution against a `d`/`h` cylinder.
#[derive(Debug, Clone, PartialEq)]
pub struct CRSS {
    d: f64,
    h: f64,
    config: CrssConfig,
}

impl Default for CRSS {
    fn default() -> Self {
        Self::new(5.0 * NMI, 1000.0 * FT)
    }
}

impl CRSS {
    pub fn new(d: f64, h: f64) -> Self {
        Self::with_config(d, h, CrssConfig::default())
    }

    pub fn with_config(d: f64, h: f64, config: CrssConfig) -> Self {
        Self { d, h, config }
    }

    pub fn distance(&self) -> f64 {
        self.d
    }

    pub fn height(&self) -> f64 {
        self.h
    }

    pub fn set_distance(&mut self, d: f64) {
        self.d = d;
    }

    pub fn set_height(&mut self, h: f64) {
        self.h = h;
    }

    pub fn config(&self) -> &CrssConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CrssConfig {
        &mut self.config
    }

    /// Resolutions for relative position `s` with explicit coordination
    /// epsilons.
    pub fn resolution(
        &self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        epsh: i32,
        epsv: i32,
    ) -> CrssResolution {
        let mut cr = CR3D::new();
        let kind = cr.cr3d_repulsive(s, vo, vi, self.d, self.h, &self.config, epsh, epsv);
        CrssResolution {
            kind,
            trk_only: (!cr.trk.undef()).then(|| cr.trk.v.compass_angle()),
            gs_only: (!cr.gs.undef()).then(|| cr.gs.v.norm()),
            opt_trk_gs: (!cr.opt.undef()).then(|| (cr.opt.v.compass_angle(), cr.opt.v.norm())),
            vs_only: cr.vs.map(|vz| discretize_dir(vo.z, vz, self.config.vs_discretization)),
            speed_only: cr.vel.map(|v| (v.gs(), v.z)),
        }
    }

    /// Resolutions with the epsilons both aircraft derive independently from
    /// the shared state and their identifiers.
    pub fn resolution_coordinated(
        &self,
        s: &Vect3,
        vo: &Vect3,
        vi: &Vect3,
        ownship: &str,
        traffic: &str,
    ) -> CrssResolution {
        let epsh = horizontal_coordination(s, &(vo - vi));
        let epsv = vertical_coordination(
            s,
            vo,
            vi,
            self.d,
            self.h,
            self.config.nmac_d,
            self.config.nmac_h,
            ownship,
            traffic,
        );
        self.resolution(s, vo, vi, epsh, epsv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::cd3d;
    use crate::util::to_pi;
    use crate::vect::{from_trk_gs_vs, vect3};
    use std::f64::consts::PI;

    #[test]
    fn test_no_conflict_keeps_current_velocity() {
        let crss = CRSS::default();
        let s = vect3(0.0, -20.0 * NMI, 0.0);
        let vo = from_trk_gs_vs(PI, 200.0 * KN, 0.0);
        let vi = from_trk_gs_vs(0.0, 200.0 * KN, 0.0);
        let res = crss.resolution(&s, &vo, &vi, 1, 1);
        assert_eq!(res.kind, ResolutionKind::Unnecessary);
        assert!((res.trk_only.unwrap() - PI).abs() < 1e-9);
        assert!((res.gs_only.unwrap() - 200.0 * KN).abs() < 1e-9);
        assert_eq!(res.vs_only, Some(0.0));
    }

    #[test]
    fn test_head_on_conflict_resolutions_clear_the_cylinder() {
        let crss = CRSS::default();
        let s = vect3(0.0, -10.0 * NMI, 0.0);
        let vo = from_trk_gs_vs(0.0, 200.0 * KN, 0.0);
        let vi = from_trk_gs_vs(PI, 200.0 * KN, 0.0);
        let res = crss.resolution_coordinated(&s, &vo, &vi, "own", "ac1");
        assert_eq!(res.kind, ResolutionKind::Conflict);

        let trk = res.trk_only.unwrap();
        assert!(to_pi(trk).abs() > 0.0);
        let nvo = from_trk_gs_vs(trk, 200.0 * KN, 0.0);
        assert!(!cd3d::cd3d(&s, &nvo, &vi, 0.99 * crss.distance(), crss.height()));

        let vs = res.vs_only.unwrap();
        assert!(vs != 0.0);
        // Grid multiple of 100 fpm.
        assert!(((vs / (100.0 * FPM)).round() - vs / (100.0 * FPM)).abs() < 1e-9);
        let nvo = vect3(vo.x, vo.y, vs);
        assert!(!cd3d::cd3d(&s, &nvo, &vi, crss.distance(), 0.99 * crss.height()));
    }

    #[test]
    fn test_loss_of_separation_is_classified() {
        let crss = CRSS::default();
        let s = vect3(1000.0, 0.0, 0.0);
        let vi = vect3(0.0, 50.0, 0.0);
        let conv = crss.resolution(&s, &vect3(-100.0, 0.0, 0.0), &vi, 1, 1);
        assert_eq!(conv.kind, ResolutionKind::LosConvergent);
        assert!(conv.vs_only.is_some_and(|vs| vs > 0.0));
        let divg = crss.resolution(&s, &vect3(100.0, 0.0, 0.0), &vi, 1, -1);
        assert_eq!(divg.kind, ResolutionKind::LosDivergent);
        assert!(divg.kind.is_los());
        assert!(divg.vs_only.is_some_and(|vs| vs < 0.0));
    }

    #[test]
    fn test_stationary_aircraft_get_no_resolution() {
        let crss = CRSS::default();
        let res = crss.resolution(
            &vect3(1000.0, 0.0, 0.0),
            &vect3(0.0, 0.0, 5.0),
            &vect3(0.0, 50.0, 0.0),
            1,
            1,
        );
        assert_eq!(res.kind, ResolutionKind::None);
        assert_eq!(res.trk_only, None);
    }

    #[test]
    fn test_config_deserializes_partial() {
        let cfg: CrssConfig = serde_json::from_str(r#"{"max_vs": 10.0}"#).unwrap();
        assert_eq!(cfg.max_vs, 10.0);
        assert_eq!(cfg.min_gs, CrssConfig::default().min_gs);
    }
}
