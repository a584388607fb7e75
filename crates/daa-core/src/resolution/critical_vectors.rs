//! Critical horizontal vectors: every track-only or ground-speed-only
//! ownship velocity whose relative motion just touches the protected circle,
//! either tangentially or exactly at the lookahead time.

use crate::horizontal::{gs_line, gs_only_circle, trk_only_circle, trk_only_line_irt, ENTRY, EXIT};
use crate::tangent_line::TangentLine;
use crate::vect::{Vect2, Vect2Ext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriticalVectors2D;

impl CriticalVectors2D {
    /// Track-only critical vectors, all with the speed of `vo`.
    pub fn tracks_only(s: &Vect2, t: f64, vo: &Vect2, vi: &Vect2, d: f64) -> Vec<Vect2> {
        let mut out = Vec::new();
        for eps in [-1, 1] {
            let nv = TangentLine::new(s, d, eps);
            if nv.undef() {
                continue;
            }
            for irt in [-1, 1] {
                let h = trk_only_line_irt(nv.vector(), vo, vi, irt);
                // Negative line parameters run the tangent backwards; a zero
                // one matches the intruder's velocity.
                if !h.undef() && h.k >= 0.0 && (h.v - vi).norm() > 1e-6 * vo.norm() {
                    push_unique(&mut out, h.v);
                }
            }
        }
        if t > 0.0 && t.is_finite() {
            for dir in [ENTRY, EXIT] {
                for irt in [-1, 1] {
                    let h = trk_only_circle(s, vo, vi, t, dir, irt, d);
                    if !h.undef() {
                        push_unique(&mut out, h.v);
                    }
                }
            }
        }
        out
    }

    /// Ground-speed-only critical vectors, all along the direction of `vo`.
    pub fn gs_only(s: &Vect2, t: f64, vo: &Vect2, vi: &Vect2, d: f64) -> Vec<Vect2> {
        let mut out = Vec::new();
        for eps in [-1, 1] {
            let nv = TangentLine::new(s, d, eps);
            if nv.undef() {
                continue;
            }
            let h = gs_line(nv.vector(), vo, vi);
            if !h.undef() {
                push_unique(&mut out, h.v);
            }
        }
        if t > 0.0 && t.is_finite() {
            for dir in [ENTRY, EXIT] {
                for irt in [-1, 1] {
                    let h = gs_only_circle(s, vo, vi, t, dir, irt, d);
                    if !h.undef() {
                        push_unique(&mut out, h.v);
                    }
                }
            }
        }
        out
    }
}

fn push_unique(out: &mut Vec<Vect2>, v: Vect2) {
    if !out.iter().any(|w| w.almost_eq(&v)) {
        out.push(v);
    }
}
