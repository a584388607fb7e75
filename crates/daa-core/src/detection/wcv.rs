//! Well-clear volumes.
//!
//! A pair is well clear unless both the vertical test (co-altitude within
//! `ZTHR` or time to co-altitude within `TCOA`) and the horizontal test
//! (inside `DTHR`, or miss distance within `DTHR` with a time variable
//! within `TTHR`) hold. The variants only differ in the horizontal time
//! variable, so each supplies a [`HorizontalStrategy`] to a shared interval
//! skeleton.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{effective_horizon, ConflictData, Detection3D, LossData};
use crate::horizontal::{self, ENTRY, EXIT};
use crate::params::{ParameterAcceptor, ParameterData, UnitMemory};
use crate::units::FT;
use crate::util::{almost_equals, sq};
use crate::vect::{Vect2, Vect3, Vect3Ext};
use crate::vertical;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WcvTable {
    pub dthr: f64,
    pub zthr: f64,
    pub tthr: f64,
    pub tcoa: f64,
}

impl Default for WcvTable {
    fn default() -> Self {
        Self {
            dthr: 4000.0 * FT,
            zthr: 450.0 * FT,
            tthr: 35.0,
            tcoa: 0.0,
        }
    }
}

impl WcvTable {
    /// # Arguments
    /// * `dthr` - Horizontal distance threshold in meters
    /// * `zthr` - Vertical distance threshold in meters
    /// * `tthr` - Horizontal time threshold in seconds
    /// * `tcoa` - Time to co-altitude threshold in seconds
    pub fn new(dthr: f64, zthr: f64, tthr: f64, tcoa: f64) -> Self {
        Self {
            dthr: dthr.abs(),
            zthr: zthr.abs(),
            tthr: tthr.abs(),
            tcoa: tcoa.abs(),
        }
    }

    pub fn contains(&self, other: &WcvTable) -> bool {
        self.dthr >= other.dthr
            && self.zthr >= other.zthr
            && self.tthr >= other.tthr
            && self.tcoa >= other.tcoa
    }

    fn write(&self, p: &mut ParameterData, units: &UnitMemory) {
        p.set_internal("WCV_DTHR", self.dthr, units.unit("WCV_DTHR", "ft"));
        p.set_internal("WCV_ZTHR", self.zthr, units.unit("WCV_ZTHR", "ft"));
        p.set_internal("WCV_TTHR", self.tthr, units.unit("WCV_TTHR", "s"));
        p.set_internal("WCV_TCOA", self.tcoa, units.unit("WCV_TCOA", "s"));
    }

    fn read(&mut self, p: &ParameterData, units: &mut UnitMemory) {
        for key in ["WCV_DTHR", "WCV_ZTHR", "WCV_TTHR", "WCV_TCOA"] {
            units.remember(p, key);
        }
        if let Some(v) = p.value("WCV_DTHR") {
            self.dthr = v.abs();
        }
        if let Some(v) = p.value("WCV_ZTHR") {
            self.zthr = v.abs();
        }
        if let Some(v) = p.value("WCV_TTHR") {
            self.tthr = v.abs();
        }
        if let Some(v) = p.value("WCV_TCOA") {
            self.tcoa = v.abs();
        }
    }
}

/// Vertical well-clear test on relative altitude and vertical speed.
pub fn vertical_wcv(zthr: f64, tcoa: f64, sz: f64, vz: f64) -> bool {
    let t = if sz * vz < 0.0 { -sz / vz } else { -1.0 };
    sz.abs() <= zthr || (0.0 <= t && t <= tcoa)
}

/// Interval of vertical violation inside `[B, T]`.
pub fn vertical_wcv_interval(zthr: f64, tcoa: f64, b: f64, t: f64, sz: f64, vz: f64) -> LossData {
    if almost_equals(vz, 0.0) {
        return if sz.abs() <= zthr {
            LossData::new(b, t)
        } else {
            LossData::empty()
        };
    }
    let act_h = zthr.max(vz.abs() * tcoa);
    let tentry = vertical::theta_h(sz, vz, ENTRY, act_h);
    let texit = vertical::theta_h(sz, vz, EXIT, zthr);
    if t < tentry || texit < b {
        return LossData::empty();
    }
    LossData::new(tentry.max(b), texit.min(t))
}

/// Horizontal half of a well-clear variant.
#[derive(Clone, Copy)]
pub struct HorizontalStrategy {
    /// Time variable, negative when undefined.
    pub tvar: fn(&WcvTable, &Vect2, &Vect2) -> f64,
    /// Violation interval inside `[0, T]` for the relative state.
    pub interval: fn(&WcvTable, f64, &Vect2, &Vect2) -> LossData,
    /// Whether the miss-distance filter applies.
    pub hmd_filter: bool,
}

fn horizontal_wcv(table: &WcvTable, strategy: &HorizontalStrategy, s: &Vect2, v: &Vect2) -> bool {
    if s.norm() <= table.dthr {
        return true;
    }
    if strategy.hmd_filter && horizontal::dcpa(s, v) > table.dthr {
        return false;
    }
    let tvar = (strategy.tvar)(table, s, v);
    0.0 <= tvar && tvar <= table.tthr
}

/// Shared skeleton: vertical interval first, then the horizontal interval
/// over the vertical window, shifted back to absolute time.
fn wcv_interval(
    table: &WcvTable,
    strategy: &HorizontalStrategy,
    s: &Vect3,
    v: &Vect3,
    b: f64,
    t: f64,
) -> LossData {
    let ii = vertical_wcv_interval(table.zthr, table.tcoa, b, t, s.z, v.z);
    if ii.time_in > ii.time_out {
        return LossData::empty();
    }
    let v2 = v.vect2();
    let step = s.vect2() + v2 * ii.time_in;
    if almost_equals(ii.time_in, ii.time_out) {
        return if horizontal_wcv(table, strategy, &step, &v2) {
            ii
        } else {
            LossData::empty()
        };
    }
    let ld = (strategy.interval)(table, ii.time_out - ii.time_in, &step, &v2);
    if ld.time_in > ld.time_out {
        return LossData::empty();
    }
    LossData::new(ld.time_in + ii.time_in, ld.time_out + ii.time_in)
}

/// Entry and exit of the `DTHR` circle, when the line crosses it.
fn circle_crossing(table: &WcvTable, s: &Vect2, v: &Vect2) -> Option<(f64, f64)> {
    if horizontal::delta(s, v, table.dthr) < 0.0 {
        return None;
    }
    Some((
        horizontal::theta_d(s, v, ENTRY, table.dthr)?,
        horizontal::theta_d(s, v, EXIT, table.dthr)?,
    ))
}

/// Answer for the stationary and already-inside cases, if either applies.
fn trivial_interval(table: &WcvTable, t: f64, s: &Vect2, v: &Vect2) -> Option<LossData> {
    let inside = s.norm_squared() <= sq(table.dthr);
    if almost_equals(v.norm_squared(), 0.0) {
        return Some(if inside {
            LossData::new(0.0, t)
        } else {
            LossData::empty()
        });
    }
    if inside {
        let exit = horizontal::theta_d(s, v, EXIT, table.dthr).unwrap_or(t);
        return Some(LossData::new(0.0, t.min(exit)));
    }
    None
}

fn taumod_tvar(table: &WcvTable, s: &Vect2, v: &Vect2) -> f64 {
    let sdotv = s.dot(v);
    if sdotv < 0.0 {
        (sq(table.dthr) - s.norm_squared()) / sdotv
    } else {
        -1.0
    }
}

/// Region where modified tau is within `tau` or the range within `d`.
/// With `hmd_filter` the region is further limited to lines whose miss
/// distance is within `d`.
pub(crate) fn taumod_region(
    d: f64,
    tau: f64,
    t: f64,
    s: &Vect2,
    v: &Vect2,
    hmd_filter: bool,
) -> LossData {
    let table = WcvTable::new(d, 0.0, tau, 0.0);
    if let Some(ld) = trivial_interval(&table, t, s, v) {
        return ld;
    }
    let sdotv = s.dot(v);
    if sdotv >= 0.0 {
        return LossData::empty();
    }
    let a = v.norm_squared();
    let b = 2.0 * sdotv + tau * a;
    let c = s.norm_squared() + tau * sdotv - sq(d);
    let discr = sq(b) - 4.0 * a * c;
    if discr < 0.0 {
        return LossData::empty();
    }
    let tin = (-b - discr.sqrt()) / (2.0 * a);
    let tout = match circle_crossing(&table, s, v) {
        Some((_, exit)) => exit,
        None if hmd_filter => return LossData::empty(),
        None => (-b + discr.sqrt()) / (2.0 * a),
    };
    LossData::new(tin.max(0.0), t.min(tout))
}

fn taumod_interval(table: &WcvTable, t: f64, s: &Vect2, v: &Vect2) -> LossData {
    taumod_region(table.dthr, table.tthr, t, s, v, true)
}

fn hz_interval(table: &WcvTable, t: f64, s: &Vect2, v: &Vect2) -> LossData {
    taumod_region(table.dthr, table.tthr, t, s, v, false)
}

fn tcpa_tvar(_table: &WcvTable, s: &Vect2, v: &Vect2) -> f64 {
    horizontal::tcpa(s, v)
}

fn tcpa_interval(table: &WcvTable, t: f64, s: &Vect2, v: &Vect2) -> LossData {
    if let Some(ld) = trivial_interval(table, t, s, v) {
        return ld;
    }
    if s.dot(v) > 0.0 {
        return LossData::empty();
    }
    let Some((entry, exit)) = circle_crossing(table, s, v) else {
        return LossData::empty();
    };
    let tcpa = horizontal::tcpa(s, v);
    LossData::new(0.0f64.max(entry.min(tcpa - table.tthr)), t.min(exit))
}

fn tep_tvar(table: &WcvTable, s: &Vect2, v: &Vect2) -> f64 {
    if s.dot(v) >= 0.0 {
        return -1.0;
    }
    match circle_crossing(table, s, v) {
        Some((entry, _)) => entry,
        None => -1.0,
    }
}

fn tep_interval(table: &WcvTable, t: f64, s: &Vect2, v: &Vect2) -> LossData {
    if let Some(ld) = trivial_interval(table, t, s, v) {
        return ld;
    }
    let Some((entry, exit)) = circle_crossing(table, s, v) else {
        return LossData::empty();
    };
    LossData::new(0.0f64.max(entry - table.tthr), t.min(exit))
}

/// Horizontal time variable of a well-clear variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WcvKind {
    /// Modified tau, `(DTHR^2 - s^2) / (s . v)`.
    TauMod,
    /// Time to closest point of approach.
    Tcpa,
    /// Time to entry of the `DTHR` circle.
    Tep,
    /// Modified tau without the miss-distance filter.
    Hz,
}

impl WcvKind {
    pub fn strategy(self) -> HorizontalStrategy {
        match self {
            WcvKind::TauMod => HorizontalStrategy {
                tvar: taumod_tvar,
                interval: taumod_interval,
                hmd_filter: true,
            },
            WcvKind::Tcpa => HorizontalStrategy {
                tvar: tcpa_tvar,
                interval: tcpa_interval,
                hmd_filter: true,
            },
            WcvKind::Tep => HorizontalStrategy {
                tvar: tep_tvar,
                interval: tep_interval,
                hmd_filter: true,
            },
            WcvKind::Hz => HorizontalStrategy {
                tvar: taumod_tvar,
                interval: hz_interval,
                hmd_filter: false,
            },
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            WcvKind::TauMod => "WCV_TAUMOD",
            WcvKind::Tcpa => "WCV_TCPA",
            WcvKind::Tep => "WCV_TEP",
            WcvKind::Hz => "WCV_HZ",
        }
    }

    /// Volume of `self` includes the volume of `other` for equal tables.
    fn includes(self, other: WcvKind) -> bool {
        use WcvKind::*;
        matches!(
            (self, other),
            (TauMod, TauMod | Tcpa) | (Tcpa, Tcpa) | (Tep, Tep) | (Hz, Hz | TauMod | Tcpa)
        )
    }
}

/// Well-clear detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WCV {
    pub kind: WcvKind,
    pub table: WcvTable,
    id: String,
    #[serde(skip)]
    units: UnitMemory,
}

impl WCV {
    pub fn new(kind: WcvKind, table: WcvTable) -> Self {
        Self {
            kind,
            table,
            id: String::new(),
            units: UnitMemory::default(),
        }
    }

    pub fn taumod() -> Self {
        Self::new(WcvKind::TauMod, WcvTable::default())
    }

    pub fn tcpa() -> Self {
        Self::new(WcvKind::Tcpa, WcvTable::default())
    }

    pub fn tep() -> Self {
        Self::new(WcvKind::Tep, WcvTable::default())
    }

    pub fn hz() -> Self {
        Self::new(WcvKind::Hz, WcvTable::default())
    }

    /// Horizontal time variable for a relative state.
    pub fn horizontal_tvar(&self, s: &Vect2, v: &Vect2) -> f64 {
        (self.kind.strategy().tvar)(&self.table, s, v)
    }

    pub fn horizontal_wcv(&self, s: &Vect2, v: &Vect2) -> bool {
        horizontal_wcv(&self.table, &self.kind.strategy(), s, v)
    }

    /// Violation interval inside `[B, T]` for a relative state.
    pub fn wcv_interval(&self, s: &Vect3, v: &Vect3, b: f64, t: f64) -> LossData {
        wcv_interval(&self.table, &self.kind.strategy(), s, v, b, effective_horizon(t))
    }
}

impl ParameterAcceptor for WCV {
    fn parameters(&self) -> ParameterData {
        let mut p = ParameterData::new();
        self.table.write(&mut p, &self.units);
        if !self.id.is_empty() {
            p.set_string("id", &self.id);
        }
        p
    }

    fn set_parameters(&mut self, p: &ParameterData) {
        self.table.read(p, &mut self.units);
        if let Some(id) = p.string("id") {
            self.id = id.to_string();
        }
    }
}

impl Detection3D for WCV {
    fn canonical_class(&self) -> &'static str {
        self.kind.tag()
    }

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn violation(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3) -> bool {
        let s = so - si;
        let v = vo - vi;
        self.horizontal_wcv(&s.vect2(), &v.vect2())
            && vertical_wcv(self.table.zthr, self.table.tcoa, s.z, v.z)
    }

    fn conflict_detection(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData {
        let s = so - si;
        let v = vo - vi;
        let loss = self.wcv_interval(&s, &v, b, t);
        let t_crit = if loss.conflict() {
            (loss.time_in + loss.time_out) / 2.0
        } else {
            horizontal::tcpa(&s.vect2(), &v.vect2())
                .max(b)
                .min(effective_horizon(t))
        };
        let dist_crit = s.linear(&v, t_crit).cyl_norm(self.table.dthr, self.table.zthr);
        ConflictData::new(loss, t_crit, dist_crit, s, v)
    }

    fn contains(&self, other: &dyn Detection3D) -> bool {
        other
            .as_any()
            .downcast_ref::<WCV>()
            .is_some_and(|o| self.kind.includes(o.kind) && self.table.contains(&o.table))
    }

    fn copy(&self) -> Box<dyn Detection3D> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn Detection3D> {
        Box::new(WCV::new(self.kind, WcvTable::default()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::{vect2, vect3};

    fn head_on() -> (Vect3, Vect3) {
        // 4 nmi apart, closing at 200 m/s, co-altitude.
        (vect3(7408.0, 0.0, 0.0), vect3(-200.0, 0.0, 0.0))
    }

    #[test]
    fn test_taumod_head_on_interval() {
        let wcv = WCV::taumod();
        let (s, v) = head_on();
        let ld = wcv.wcv_interval(&s, &v, 0.0, 120.0);
        assert!(ld.conflict());
        // Modified tau reaches TTHR when r^2 - D^2 = 35 * 200 * r.
        let d = wcv.table.dthr;
        let r = (7000.0 + (7000.0f64.powi(2) + 4.0 * d * d).sqrt()) / 2.0;
        assert!((ld.time_in - (7408.0 - r) / 200.0).abs() < 1e-6);
        assert!((ld.time_out - (7408.0 + d) / 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_tcpa_and_tep_head_on() {
        let (s, v) = head_on();
        let d = WcvTable::default().dthr;
        let tcpa = WCV::tcpa().wcv_interval(&s, &v, 0.0, 120.0);
        // Entry is late; the time to CPA drops under TTHR first.
        assert!((tcpa.time_in - (7408.0 / 200.0 - 35.0)).abs() < 1e-6);
        assert!((tcpa.time_out - (7408.0 + d) / 200.0).abs() < 1e-6);
        let tep = WCV::tep().wcv_interval(&s, &v, 0.0, 120.0);
        assert!((tep.time_in - 0.0f64.max((7408.0 - d) / 200.0 - 35.0)).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_blocks() {
        let wcv = WCV::taumod();
        let s = vect3(7408.0, 0.0, 1000.0);
        let v = vect3(-200.0, 0.0, 0.0);
        assert!(!wcv.wcv_interval(&s, &v, 0.0, 120.0).conflict());
        assert!(!vertical_wcv(137.16, 0.0, 1000.0, 0.0));
        assert!(vertical_wcv(137.16, 20.0, 1000.0, -60.0));
    }

    #[test]
    fn test_hz_keeps_large_miss_distance() {
        let table = WcvTable::new(1000.0, 300.0, 60.0, 0.0);
        let s = vect2(-6000.0, 1500.0);
        let v = vect2(200.0, 0.0);
        let taumod = WCV::new(WcvKind::TauMod, table);
        let hz = WCV::new(WcvKind::Hz, table);
        assert!(!taumod.horizontal_wcv(&s, &v));
        assert!(hz.horizontal_wcv(&s, &v));
        let ld = hz.wcv_interval(&vect3(s.x, s.y, 0.0), &vect3(v.x, v.y, 0.0), 0.0, 100.0);
        assert!(ld.conflict());
        assert!(ld.time_out < horizontal::tcpa(&s, &v) + 1e-9);
    }

    #[test]
    fn test_contains_chain() {
        let t = WcvTable::default();
        let hz = WCV::new(WcvKind::Hz, t);
        let taumod = WCV::new(WcvKind::TauMod, t);
        let tcpa = WCV::new(WcvKind::Tcpa, t);
        assert!(hz.contains(&taumod));
        assert!(taumod.contains(&tcpa));
        assert!(hz.contains(&tcpa));
        assert!(!tcpa.contains(&taumod));
        assert!(!WCV::tep().contains(&taumod));
    }

    #[test]
    fn test_parameters_round_trip() {
        let mut a = WCV::tcpa();
        let mut p = ParameterData::new();
        p.set_value("WCV_DTHR", 0.66, "nmi").unwrap();
        p.set_value("WCV_TTHR", 20.0, "s").unwrap();
        a.set_parameters(&p);
        assert!((a.table.dthr - 0.66 * 1852.0).abs() < 1e-9);
        let back = a.parameters();
        assert_eq!(back.unit("WCV_DTHR"), Some("nmi"));
        assert_eq!(back.unit("WCV_ZTHR"), Some("ft"));
        assert!((back.value("WCV_TTHR").unwrap() - 20.0).abs() < 1e-12);
    }
}
