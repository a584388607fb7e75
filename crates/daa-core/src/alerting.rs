//! Alert levels and temporal hysteresis.
//!
//! An [`AlertThresholds`] pairs a detector with the time windows and band
//! color of one alert level. [`AlertLevels`] orders them from least (level 1)
//! to most severe. [`AlertingMofN`] debounces a stream of raw alert levels.

use std::collections::VecDeque;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bands::alt::AltAxis;
use crate::bands::gs::GsAxis;
use crate::bands::real::{AxisModel, AxisRange, KinematicRealBands};
use crate::bands::trk::TrkAxis;
use crate::bands::vs::VsAxis;
use crate::bands::{BandsRegion, KinematicBandsCore};
use crate::detection::{Detection3D, WcvKind, WcvTable, WCV};
use crate::error::{DaaError, Result};
use crate::interval::Interval;
use crate::traffic::TrafficState;
use crate::units::{FT, NMI};

/// Detector, time windows, band region and kinematic spreads of one level.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    detector: Box<dyn Detection3D>,
    alerting_time: f64,
    early_alerting_time: f64,
    region: BandsRegion,
    spread_trk: Interval,
    spread_gs: Interval,
    spread_vs: Interval,
    spread_alt: Interval,
}

fn spread(below: f64, above: f64) -> Interval {
    Interval::new(-below.abs(), above.abs())
}

fn no_spread() -> Interval {
    Interval::new(0.0, 0.0)
}

impl AlertThresholds {
    /// Takes a copy of `detector`. Alerting times are clamped so that
    /// `early_alerting_time >= alerting_time >= 0`.
    pub fn new(
        detector: &dyn Detection3D,
        alerting_time: f64,
        early_alerting_time: f64,
        region: BandsRegion,
    ) -> Self {
        let alerting_time = alerting_time.max(0.0);
        Self {
            detector: detector.copy(),
            alerting_time,
            early_alerting_time: early_alerting_time.max(alerting_time),
            region,
            spread_trk: no_spread(),
            spread_gs: no_spread(),
            spread_vs: no_spread(),
            spread_alt: no_spread(),
        }
    }

    pub fn detector(&self) -> &dyn Detection3D {
        self.detector.as_ref()
    }

    pub fn set_detector(&mut self, detector: &dyn Detection3D) {
        self.detector = detector.copy();
    }

    pub fn alerting_time(&self) -> f64 {
        self.alerting_time
    }

    pub fn early_alerting_time(&self) -> f64 {
        self.early_alerting_time
    }

    pub fn region(&self) -> BandsRegion {
        self.region
    }

    pub fn set_region(&mut self, region: BandsRegion) {
        self.region = region;
    }

    /// Track spread, radians to the left and right of the current track.
    pub fn set_track_spread(&mut self, left: f64, right: f64) {
        self.spread_trk = spread(left.min(PI), right.min(PI));
    }

    pub fn set_gs_spread(&mut self, below: f64, above: f64) {
        self.spread_gs = spread(below, above);
    }

    pub fn set_vs_spread(&mut self, below: f64, above: f64) {
        self.spread_vs = spread(below, above);
    }

    pub fn set_alt_spread(&mut self, below: f64, above: f64) {
        self.spread_alt = spread(below, above);
    }

    pub fn track_spread(&self) -> Interval {
        self.spread_trk
    }

    pub fn gs_spread(&self) -> Interval {
        self.spread_gs
    }

    pub fn vs_spread(&self) -> Interval {
        self.spread_vs
    }

    pub fn alt_spread(&self) -> Interval {
        self.spread_alt
    }

    /// Whether this level alerts for `ac`. Beyond a straight-line conflict
    /// within `alerting_time`, any maneuver inside the configured spreads
    /// that leads into conflict also alerts. `turning`, `accelerating` and
    /// `climbing` (-1, 0 or 1) restrict each spread to the side the ownship
    /// is already maneuvering toward.
    pub fn alerting(
        &self,
        core: &KinematicBandsCore,
        ac: &TrafficState,
        turning: i32,
        accelerating: i32,
        climbing: i32,
    ) -> bool {
        let Some(own) = core.ownship() else {
            return false;
        };
        let det = self.detector.as_ref();
        if det.violation(&own.s, &own.v, &ac.s, &ac.v)
            || det.conflict(&own.s, &own.v, &ac.s, &ac.v, 0.0, self.alerting_time)
        {
            return true;
        }
        let p = core.parameters();
        self.spread_conflict(core, ac, TrkAxis, self.spread_trk, turning, 2.0 * PI, p.trk_step)
            || self.spread_conflict(core, ac, GsAxis, self.spread_gs, accelerating, 0.0, p.gs_step)
            || self.spread_conflict(core, ac, VsAxis, self.spread_vs, climbing, 0.0, p.vs_step)
            || self.spread_conflict(core, ac, AltAxis, self.spread_alt, climbing, 0.0, p.alt_step)
    }

    #[allow(clippy::too_many_arguments)]
    fn spread_conflict<A: AxisModel>(
        &self,
        core: &KinematicBandsCore,
        ac: &TrafficState,
        axis: A,
        spread: Interval,
        side: i32,
        modulo: f64,
        step: f64,
    ) -> bool {
        if spread.low == 0.0 && spread.up == 0.0 {
            return false;
        }
        let min = if side <= 0 { spread.low } else { 0.0 };
        let max = if side >= 0 { spread.up } else { 0.0 };
        let bands = KinematicRealBands::new(axis, AxisRange::relative(min, max, modulo, step));
        bands.kinematic_conflict(core, ac, self.detector.as_ref(), self.alerting_time)
    }
}

/// Alert levels ordered by increasing severity; level `i` is at index `i-1`.
#[derive(Debug, Clone, Default)]
pub struct AlertLevels {
    levels: Vec<AlertThresholds>,
    /// Explicit conflict level, 0 when derived from the regions.
    conflict_level: usize,
}

impl AlertLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// One NEAR level using `detector`.
    pub fn single(
        detector: &dyn Detection3D,
        alerting_time: f64,
        early_alerting_time: f64,
    ) -> Self {
        let mut levels = Self::new();
        levels.add(AlertThresholds::new(
            detector,
            alerting_time,
            early_alerting_time,
            BandsRegion::Near,
        ));
        levels
    }

    /// Three well-clear levels: preventive (no bands), corrective and warning.
    pub fn do_365() -> Self {
        let preventive =
            WCV::new(WcvKind::TauMod, WcvTable::new(0.66 * NMI, 700.0 * FT, 35.0, 0.0));
        let corrective =
            WCV::new(WcvKind::TauMod, WcvTable::new(0.66 * NMI, 450.0 * FT, 35.0, 0.0));
        let mut levels = Self::new();
        levels.add(AlertThresholds::new(&preventive, 55.0, 75.0, BandsRegion::None));
        levels.add(AlertThresholds::new(&corrective, 55.0, 75.0, BandsRegion::Mid));
        levels.add(AlertThresholds::new(&corrective, 25.0, 55.0, BandsRegion::Near));
        levels
    }

    /// Well-clear levels with larger buffered volumes and a 20 s
    /// time to co-altitude.
    pub fn buffered_do_365() -> Self {
        let preventive = WCV::new(WcvKind::TauMod, WcvTable::new(NMI, 750.0 * FT, 35.0, 20.0));
        let corrective = WCV::new(WcvKind::TauMod, WcvTable::new(NMI, 450.0 * FT, 35.0, 20.0));
        let mut levels = Self::new();
        levels.add(AlertThresholds::new(&preventive, 60.0, 75.0, BandsRegion::None));
        levels.add(AlertThresholds::new(&corrective, 60.0, 75.0, BandsRegion::Mid));
        levels.add(AlertThresholds::new(&corrective, 30.0, 55.0, BandsRegion::Near));
        levels
    }

    /// Appends a level and returns its number.
    pub fn add(&mut self, thresholds: AlertThresholds) -> usize {
        self.levels.push(thresholds);
        self.levels.len()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.conflict_level = 0;
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn most_severe_alert_level(&self) -> usize {
        self.levels.len()
    }

    /// Thresholds of `level`, 1-based.
    pub fn level(&self, level: usize) -> Option<&AlertThresholds> {
        level.checked_sub(1).and_then(|i| self.levels.get(i))
    }

    pub fn level_mut(&mut self, level: usize) -> Option<&mut AlertThresholds> {
        level.checked_sub(1).and_then(|i| self.levels.get_mut(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertThresholds> {
        self.levels.iter()
    }

    /// Pins the conflict level; 0 returns to the derived one.
    pub fn set_conflict_alert_level(&mut self, level: usize) {
        self.conflict_level = level;
    }

    /// Configured conflict level, else the first level with a conflict
    /// region, else 0.
    pub fn conflict_alert_level(&self) -> usize {
        if self.conflict_level >= 1 && self.conflict_level <= self.levels.len() {
            return self.conflict_level;
        }
        self.levels
            .iter()
            .position(|l| l.region.is_conflict_band())
            .map_or(0, |i| i + 1)
    }

    /// Most severe level with a conflict region, or 0.
    pub fn last_conflict_alert_level(&self) -> usize {
        self.levels
            .iter()
            .rposition(|l| l.region.is_conflict_band())
            .map_or(0, |i| i + 1)
    }

    /// Checks that severity is monotone: a more severe level never looks
    /// further ahead, and its protected volume fits inside the previous
    /// level's whenever both detectors are of the same family.
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(DaaError::InvalidConfig("no alert levels".to_string()));
        }
        if self.conflict_level > self.levels.len() {
            return Err(DaaError::InvalidConfig(format!(
                "conflict level {} exceeds {} alert levels",
                self.conflict_level,
                self.levels.len()
            )));
        }
        for (i, pair) in self.levels.windows(2).enumerate() {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.alerting_time > lower.alerting_time {
                return Err(DaaError::InvalidConfig(format!(
                    "alert level {} alerts earlier than level {}",
                    i + 2,
                    i + 1
                )));
            }
            let same_family = lower.detector.canonical_class() == upper.detector.canonical_class();
            if same_family && !lower.detector.contains(upper.detector.as_ref()) {
                return Err(DaaError::InvalidConfig(format!(
                    "detector of alert level {} is not contained in level {}",
                    i + 2,
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// Logs a warning when [`validate`](Self::validate) fails.
    pub fn warn_if_invalid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Alert levels are not monotone");
                false
            }
        }
    }
}

/// M-of-N filter over raw alert levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertingMofN {
    m: usize,
    n: usize,
    window: VecDeque<usize>,
}

impl AlertingMofN {
    /// Requires `1 <= m <= n`.
    pub fn new(m: usize, n: usize) -> Result<Self> {
        if m == 0 || m > n {
            return Err(
                DaaError::InvalidConfig(format!("M-of-N needs 1 <= m <= n, got m={m}, n={n}")),
            );
        }
        let mut f = Self {
            m,
            n,
            window: VecDeque::with_capacity(n),
        };
        f.reset();
        Ok(f)
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Fills the window with zeros.
    pub fn reset(&mut self) {
        self.window.clear();
        self.window.resize(self.n, 0);
    }

    /// Pushes a raw level and returns the highest level reached by at least
    /// `m` of the last `n` samples.
    pub fn push(&mut self, level: usize) -> usize {
        self.window.pop_front();
        self.window.push_back(level);
        self.filtered()
    }

    fn filtered(&self) -> usize {
        let max = self.window.iter().copied().max().unwrap_or(0);
        (1..=max)
            .rev()
            .find(|&l| self.window.iter().filter(|&&x| x >= l).count() >= self.m)
            .unwrap_or(0)
    }

    pub fn window(&self) -> impl Iterator<Item = &usize> {
        self.window.iter()
    }
}
