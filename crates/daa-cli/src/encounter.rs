//! Aircraft states given on the command line in display units.

use std::str::FromStr;

use anyhow::{bail, Context};
use daa_core::traffic::TrafficState;
use daa_core::units::{DEG, FPM, FT, KN, NMI};
use daa_core::vect::vect3;
use serde::Serialize;

/// `x,y,alt,trk,gs,vs` in nmi, nmi, ft, deg, kn and fpm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AircraftSpec {
    pub x_nmi: f64,
    pub y_nmi: f64,
    pub alt_ft: f64,
    pub trk_deg: f64,
    pub gs_kn: f64,
    pub vs_fpm: f64,
}

impl AircraftSpec {
    pub fn to_state(&self, id: &str) -> TrafficState {
        TrafficState::from_trk_gs_vs(
            id,
            vect3(self.x_nmi * NMI, self.y_nmi * NMI, self.alt_ft * FT),
            self.trk_deg * DEG,
            self.gs_kn * KN,
            self.vs_fpm * FPM,
        )
    }
}

impl FromStr for AircraftSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s
            .split(',')
            .map(|f| f.trim().parse::<f64>().with_context(|| format!("bad number '{}'", f.trim())))
            .collect::<anyhow::Result<Vec<f64>>>()?;
        let [x_nmi, y_nmi, alt_ft, trk_deg, gs_kn, vs_fpm] = fields[..] else {
            bail!("expected x,y,alt,trk,gs,vs but got {} fields", fields.len());
        };
        if fields.iter().any(|v| !v.is_finite()) {
            bail!("aircraft fields must be finite");
        }
        Ok(Self {
            x_nmi,
            y_nmi,
            alt_ft,
            trk_deg,
            gs_kn,
            vs_fpm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daa_core::vect::Vect3Ext;

    #[test]
    fn test_parse_and_convert() {
        let spec: AircraftSpec = "1, -2, 5000, 90, 200, -500".parse().unwrap();
        assert_eq!(spec.trk_deg, 90.0);
        let st = spec.to_state("own");
        assert_eq!(st.id, "own");
        assert!((st.s.x - NMI).abs() < 1e-9);
        assert!((st.s.z - 1524.0).abs() < 1e-9);
        assert!((st.v.gs() - 200.0 * KN).abs() < 1e-9);
        assert!((st.v.x - 200.0 * KN).abs() < 1e-9);
        assert!((st.v.z + 500.0 * FPM).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("1,2,3".parse::<AircraftSpec>().is_err());
        assert!("1,2,3,4,5,x".parse::<AircraftSpec>().is_err());
        assert!("1,2,3,4,5,6,7".parse::<AircraftSpec>().is_err());
        assert!("1,2,3,4,5,inf".parse::<AircraftSpec>().is_err());
    }
}
