//! TCAS II style resolution advisory logic.
//!
//! Thresholds depend on the sensitivity level picked from the ownship
//! altitude. A level whose thresholds are negative issues no advisory.

use std::any::Any;

use serde::{Deserialize, Serialize};

use super::wcv::taumod_region;
use super::{effective_horizon, ConflictData, Detection3D, LossData};
use crate::horizontal::{self, ENTRY, EXIT};
use crate::params::{ParameterAcceptor, ParameterData, UnitMemory};
use crate::units::{FT, NMI};
use crate::util::{almost_equals, sq};
use crate::vect::{Vect2, Vect3, Vect3Ext};
use crate::vertical;

/// Upper altitude bounds (ft) of sensitivity levels 2 through 7.
const LEVEL_CEILINGS_FT: [f64; 6] = [1000.0, 2350.0, 5000.0, 10000.0, 20000.0, 42000.0];

pub const MIN_LEVEL: usize = 2;
pub const MAX_LEVEL: usize = 8;

/// Sensitivity level for an altitude in meters.
pub fn sensitivity_level(alt: f64) -> usize {
    LEVEL_CEILINGS_FT
        .iter()
        .position(|ceiling| alt <= ceiling * FT)
        .map_or(MAX_LEVEL, |i| i + MIN_LEVEL)
}

fn scaled(values: [f64; 7], unit: f64) -> [f64; 7] {
    values.map(|v| if v < 0.0 { -1.0 } else { v * unit })
}

/// Per-level thresholds, indexed by sensitivity level 2..=8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TCASTable {
    tau: [f64; 7],
    tcoa: [f64; 7],
    dmod: [f64; 7],
    zthr: [f64; 7],
    hmd: [f64; 7],
    pub hmd_filter: bool,
}

impl Default for TCASTable {
    fn default() -> Self {
        Self::ra()
    }
}

impl TCASTable {
    /// Resolution advisory thresholds.
    pub fn ra() -> Self {
        let tau = [-1.0, 15.0, 20.0, 25.0, 30.0, 35.0, 35.0];
        Self {
            tau,
            tcoa: tau,
            dmod: scaled([-1.0, 0.2, 0.35, 0.55, 0.8, 1.1, 1.1], NMI),
            zthr: scaled([-1.0, 600.0, 600.0, 600.0, 600.0, 700.0, 800.0], FT),
            hmd: scaled([-1.0, 1215.0, 2126.0, 3342.0, 4861.0, 6683.0, 6683.0], FT),
            hmd_filter: true,
        }
    }

    /// Traffic advisory thresholds.
    pub fn ta() -> Self {
        let tau = [20.0, 25.0, 30.0, 40.0, 45.0, 48.0, 48.0];
        let dmod = scaled([0.30, 0.33, 0.48, 0.75, 1.0, 1.3, 1.3], NMI);
        Self {
            tau,
            tcoa: tau,
            dmod,
            zthr: scaled([850.0, 850.0, 850.0, 850.0, 850.0, 850.0, 1200.0], FT),
            hmd: dmod,
            hmd_filter: false,
        }
    }

    fn idx(sl: usize) -> usize {
        sl.clamp(MIN_LEVEL, MAX_LEVEL) - MIN_LEVEL
    }

    pub fn tau(&self, sl: usize) -> f64 {
        self.tau[Self::idx(sl)]
    }

    pub fn tcoa(&self, sl: usize) -> f64 {
        self.tcoa[Self::idx(sl)]
    }

    pub fn dmod(&self, sl: usize) -> f64 {
        self.dmod[Self::idx(sl)]
    }

    pub fn zthr(&self, sl: usize) -> f64 {
        self.zthr[Self::idx(sl)]
    }

    pub fn hmd(&self, sl: usize) -> f64 {
        self.hmd[Self::idx(sl)]
    }

    pub fn set_tau(&mut self, sl: usize, v: f64) {
        self.tau[Self::idx(sl)] = v;
    }

    pub fn set_tcoa(&mut self, sl: usize, v: f64) {
        self.tcoa[Self::idx(sl)] = v;
    }

    pub fn set_dmod(&mut self, sl: usize, v: f64) {
        self.dmod[Self::idx(sl)] = v;
    }

    pub fn set_zthr(&mut self, sl: usize, v: f64) {
        self.zthr[Self::idx(sl)] = v;
    }

    pub fn set_hmd(&mut self, sl: usize, v: f64) {
        self.hmd[Self::idx(sl)] = v;
    }

    /// Whether level `sl` can issue an advisory at all.
    pub fn is_active(&self, sl: usize) -> bool {
        self.tau(sl) >= 0.0 && self.dmod(sl) >= 0.0 && self.zthr(sl) >= 0.0
    }

    pub fn contains(&self, other: &TCASTable) -> bool {
        let ge = |a: &[f64; 7], b: &[f64; 7]| a.iter().zip(b).all(|(x, y)| x >= y);
        ge(&self.tau, &other.tau)
            && ge(&self.tcoa, &other.tcoa)
            && ge(&self.dmod, &other.dmod)
            && ge(&self.zthr, &other.zthr)
            && ge(&self.hmd, &other.hmd)
            && (!self.hmd_filter || other.hmd_filter)
    }

    const KEYS: [(&'static str, &'static str); 5] = [
        ("TCAS_TAU", "s"),
        ("TCAS_TCOA", "s"),
        ("TCAS_DMOD", "nmi"),
        ("TCAS_ZTHR", "ft"),
        ("TCAS_HMD", "ft"),
    ];

    fn column(&mut self, i: usize) -> &mut [f64; 7] {
        match i {
            0 => &mut self.tau,
            1 => &mut self.tcoa,
            2 => &mut self.dmod,
            3 => &mut self.zthr,
            _ => &mut self.hmd,
        }
    }

    fn write(&self, p: &mut ParameterData, units: &UnitMemory) {
        let columns = [&self.tau, &self.tcoa, &self.dmod, &self.zthr, &self.hmd];
        for ((prefix, unit), col) in Self::KEYS.iter().zip(columns) {
            for sl in MIN_LEVEL..=MAX_LEVEL {
                let key = format!("{prefix}_{sl}");
                let unit = units.unit(&key, unit);
                p.set_internal(&key, col[Self::idx(sl)], unit);
            }
        }
        p.set_bool("TCAS_HMDFilter", self.hmd_filter);
    }

    fn read(&mut self, p: &ParameterData, units: &mut UnitMemory) {
        for (i, (prefix, _)) in Self::KEYS.iter().enumerate() {
            for sl in MIN_LEVEL..=MAX_LEVEL {
                let key = format!("{prefix}_{sl}");
                units.remember(p, &key);
                if let Some(v) = p.value(&key) {
                    self.column(i)[Self::idx(sl)] = if v < 0.0 { -1.0 } else { v };
                }
            }
        }
        if let Some(b) = p.bool("TCAS_HMDFilter") {
            self.hmd_filter = b;
        }
    }
}

/// Horizontal RA test: inside DMOD, or closing with modified tau within TAU.
pub fn horizontal_ra(dmod: f64, tau: f64, s: &Vect2, v: &Vect2) -> bool {
    if s.norm_squared() <= sq(dmod) {
        return true;
    }
    let sdotv = s.dot(v);
    sdotv < 0.0 && (sq(dmod) - s.norm_squared()) / sdotv <= tau
}

/// Vertical RA test: within ZTHR, or closing with time to co-altitude within TCOA.
pub fn vertical_ra(sz: f64, vz: f64, zthr: f64, tcoa: f64) -> bool {
    if sz.abs() <= zthr {
        return true;
    }
    if almost_equals(vz, 0.0) {
        return false;
    }
    sz * vz < 0.0 && vertical::time_coalt(sz, vz) <= tcoa
}

/// Miss distance within `hmd` at or after time `t`.
pub fn cd2d_after(hmd: f64, s: &Vect2, vo: &Vect2, vi: &Vect2, t: f64) -> bool {
    let v = vo - vi;
    (almost_equals((vo - vi).norm_squared(), 0.0) && s.norm_squared() <= sq(hmd))
        || (v.norm_squared() > 0.0
            && horizontal::delta(s, &v, hmd) >= 0.0
            && horizontal::theta_d(s, &v, EXIT, hmd).is_some_and(|x| x >= t))
}

/// Time in `[B, T]` where modified tau is smallest.
pub fn time_of_min_tau(dmod: f64, b: f64, t: f64, s: &Vect2, v: &Vect2) -> f64 {
    let clamp = |x: f64| x.max(b).min(t);
    if s.dot(v) >= 0.0 {
        return b;
    }
    match horizontal::theta_d(s, v, ENTRY, dmod) {
        Some(entry) if horizontal::delta(s, v, dmod) >= 0.0 => clamp(entry),
        _ => clamp(horizontal::tcpa(s, v)),
    }
}

/// Horizontal RA interval inside `[B, T]`.
pub fn ra2d_interval(dmod: f64, tau: f64, b: f64, t: f64, s: &Vect2, v: &Vect2) -> LossData {
    let step = s + v * b;
    let ld = taumod_region(dmod, tau, t - b, &step, v, false);
    if ld.time_in > ld.time_out {
        return LossData::empty();
    }
    LossData::new(ld.time_in + b, ld.time_out + b)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TCAS3D {
    pub table: TCASTable,
    id: String,
    #[serde(skip)]
    units: UnitMemory,
}

impl TCAS3D {
    pub fn new(table: TCASTable) -> Self {
        Self {
            table,
            id: String::new(),
            units: UnitMemory::default(),
        }
    }

    pub fn ta() -> Self {
        Self::new(TCASTable::ta())
    }

    pub fn ra() -> Self {
        Self::new(TCASTable::ra())
    }

    fn crit(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        dmod: f64,
        b: f64,
        t: f64,
    ) -> (f64, f64) {
        let s2 = (so - si).vect2();
        let v2 = (vo - vi).vect2();
        let tm = time_of_min_tau(dmod, b, t, &s2, &v2);
        let rel = so.linear(vo, tm) - si.linear(vi, tm);
        let dist = rel.cyl_norm(self.table.dmod(MAX_LEVEL), self.table.zthr(MAX_LEVEL));
        (tm, dist)
    }

    /// RA interval inside `[B, T]` with the time of minimum tau.
    pub fn ra3d_interval(
        &self,
        so: &Vect3,
        vo: &Vect3,
        si: &Vect3,
        vi: &Vect3,
        b: f64,
        t: f64,
    ) -> ConflictData {
        let t = effective_horizon(t);
        let s = so - si;
        let v = vo - vi;
        let s2 = s.vect2();
        let vo2 = vo.vect2();
        let vi2 = vi.vect2();
        let v2 = v.vect2();
        let sl = sensitivity_level(so.z);
        let table = &self.table;
        let (tau, tcoa, dmod, hmd, zthr) =
            (table.tau(sl), table.tcoa(sl), table.dmod(sl), table.hmd(sl), table.zthr(sl));
        let none = |dmod_for_crit: f64| {
            let (tm, dist) = self.crit(so, vo, si, vi, dmod_for_crit.max(0.0), b, t);
            ConflictData::new(LossData::empty(), tm, dist, s, v)
        };

        if !table.is_active(sl) {
            return none(dmod);
        }
        let usehmdf = table.hmd_filter;
        if usehmdf && !cd2d_after(hmd, &s2, &vo2, &vi2, b) {
            return none(dmod);
        }
        let sz = s.z;
        if almost_equals(vo.z, vi.z) && sz.abs() > zthr {
            return none(dmod);
        }
        let vz = v.z;
        let (tentry, texit) = if almost_equals(vo.z, vi.z) {
            (b, t)
        } else {
            let act_h = zthr.max(vz.abs() * tcoa);
            (
                vertical::theta_h(sz, vz, ENTRY, act_h),
                vertical::theta_h(sz, vz, EXIT, zthr),
            )
        };
        let ventry = s2 + v2 * tentry;
        let exit_at_centry = ventry.dot(&v2) >= 0.0;
        let los_at_centry = ventry.norm_squared() <= sq(hmd);
        if texit < b || t < tentry {
            return none(dmod);
        }
        let tin = b.max(tentry);
        let tout = t.min(texit);
        let ra = ra2d_interval(dmod, tau, tin, tout, &s2, &v2);
        let (ra_in, ra_out) = (ra.time_in, ra.time_out);
        let ra_in_la = tin.max(tout.min(ra_in));
        let ra_out_la = tin.max(tout.min(ra_out));
        if ra_in > ra_out
            || ra_out < tin
            || ra_in > tout
            || (usehmdf && hmd < dmod && exit_at_centry && !los_at_centry)
        {
            return none(dmod);
        }
        let (time_in, time_out) = if usehmdf && hmd < dmod {
            let exit_theta = if v2.norm_squared() > 0.0 {
                horizontal::theta_d(&s2, &v2, EXIT, hmd).map_or(t, |x| b.max(x.min(t)))
            } else {
                t
            };
            (ra_in_la, ra_out_la.min(exit_theta))
        } else {
            (ra_in_la, ra_out_la)
        };
        let loss = LossData::new(time_in, time_out);
        let (tm, dist) = if time_in <= time_out {
            self.crit(so, vo, si, vi, dmod, time_in, time_out)
        } else {
            self.crit(so, vo, si, vi, dmod, b, t)
        };
        ConflictData::new(loss, tm, dist, s, v)
    }
}

impl ParameterAcceptor for TCAS3D {
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

impl Detection3D for TCAS3D {
    fn canonical_class(&self) -> &'static str {
        "TCAS3D"
    }

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn violation(&self, so: &Vect3, vo: &Vect3, si: &Vect3, vi: &Vect3) -> bool {
        let sl = sensitivity_level(so.z);
        if !self.table.is_active(sl) {
            return false;
        }
        let s = so - si;
        let v = vo - vi;
        let s2 = s.vect2();
        (!self.table.hmd_filter
            || cd2d_after(self.table.hmd(sl), &s2, &vo.vect2(), &vi.vect2(), 0.0))
            && horizontal_ra(self.table.dmod(sl), self.table.tau(sl), &s2, &v.vect2())
            && vertical_ra(s.z, v.z, self.table.zthr(sl), self.table.tcoa(sl))
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
        self.ra3d_interval(so, vo, si, vi, b, t)
    }

    fn contains(&self, other: &dyn Detection3D) -> bool {
        other
            .as_any()
            .downcast_ref::<TCAS3D>()
            .is_some_and(|o| self.table.contains(&o.table))
    }

    fn copy(&self) -> Box<dyn Detection3D> {
        Box::new(self.clone())
    }

    fn make(&self) -> Box<dyn Detection3D> {
        Box::new(TCAS3D::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
