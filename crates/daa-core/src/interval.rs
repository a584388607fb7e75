//! Closed real intervals, sorted interval sets and integer ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::{almost_equals, almost_leq};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: f64,
    pub up: f64,
}

impl Interval {
    pub const EMPTY: Interval = Interval { low: 1.0, up: 0.0 };

    pub fn new(low: f64, up: f64) -> Self {
        Self { low, up }
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.up
    }

    pub fn is_single(&self) -> bool {
        self.low == self.up
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.up - self.low
        }
    }

    pub fn in_cc(&self, x: f64) -> bool {
        self.low <= x && x <= self.up
    }

    /// Membership with configurable closedness at each end.
    pub fn contains(&self, x: f64, lb_close: bool, ub_close: bool) -> bool {
        let lo = if lb_close { self.low <= x } else { self.low < x };
        let hi = if ub_close { x <= self.up } else { x < self.up };
        lo && hi
    }

    pub fn almost_in(&self, x: f64) -> bool {
        almost_leq(self.low, x) && almost_leq(x, self.up)
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        let r = Interval::new(self.low.max(other.low), self.up.min(other.up));
        if r.is_empty() {
            Interval::EMPTY
        } else {
            r
        }
    }

    pub fn mid(&self) -> f64 {
        (self.low + self.up) / 2.0
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.up)
    }
}

/// Disjoint intervals kept sorted by lower bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_interval(i: Interval) -> Self {
        let mut s = Self::new();
        s.union(i);
        s
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Interval> {
        self.intervals.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn in_cc(&self, x: f64) -> bool {
        self.intervals.iter().any(|i| i.in_cc(x))
    }

    /// Adds an interval, merging with anything overlapping or touching.
    pub fn union(&mut self, i: Interval) {
        self.merge(i, |a, b| a <= b);
    }

    /// Like [`union`](Self::union) but bounds within tolerance count as touching.
    pub fn almost_union(&mut self, i: Interval) {
        self.merge(i, almost_leq);
    }

    fn merge(&mut self, i: Interval, leq: impl Fn(f64, f64) -> bool) {
        if i.is_empty() {
            return;
        }
        let mut merged = i;
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        for cur in self.intervals.drain(..) {
            if leq(cur.low, merged.up) && leq(merged.low, cur.up) {
                merged = Interval::new(cur.low.min(merged.low), cur.up.max(merged.up));
            } else {
                out.push(cur);
            }
        }
        out.push(merged);
        out.sort_by(|a, b| a.low.total_cmp(&b.low));
        self.intervals = out;
    }

    pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = IntervalSet::new();
        for a in &self.intervals {
            for b in &other.intervals {
                let c = a.intersect(b);
                if !c.is_empty() {
                    out.union(c);
                }
            }
        }
        out
    }

    /// Removes `[low, up]` from the set (boundaries stay).
    pub fn diff(&mut self, cut: Interval) {
        if cut.is_empty() {
            return;
        }
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        for cur in self.intervals.drain(..) {
            if cur.up <= cut.low || cur.low >= cut.up {
                out.push(cur);
                continue;
            }
            if cur.low < cut.low {
                out.push(Interval::new(cur.low, cut.low));
            }
            if cur.up > cut.up {
                out.push(Interval::new(cut.up, cur.up));
            }
        }
        self.intervals = out;
    }

    /// Drops intervals narrower than `width`.
    pub fn sweep_narrow(&mut self, width: f64) {
        self.intervals
            .retain(|i| i.width() >= width || almost_equals(i.width(), width));
    }
}

/// Inclusive integer range of band steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integerval {
    pub lb: i32,
    pub ub: i32,
}

impl Integerval {
    pub fn new(lb: i32, ub: i32) -> Self {
        Self { lb, ub }
    }
}

impl fmt::Display for Integerval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lb, self.ub)
    }
}
