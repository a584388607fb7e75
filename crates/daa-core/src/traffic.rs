//! Aircraft state snapshots in a shared local Euclidean frame.
//!
//! Geodetic states are projected onto an east-north-up plane anchored at the
//! ownship, using latitude-dependent meters-per-degree scaling.

use serde::{Deserialize, Serialize};

use crate::vect::{from_trk_gs_vs, Vect3, Vect3Ext};

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
}

impl GeoPosition {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self { lat_deg, lon_deg, alt_m }
    }
}

/// Local east-north-up projection anchored at a reference position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    origin: GeoPosition,
}

impl Projection {
    pub fn new(origin: GeoPosition) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> &GeoPosition {
        &self.origin
    }

    pub fn project(&self, p: &GeoPosition) -> Vect3 {
        let east = (p.lon_deg - self.origin.lon_deg) * meters_per_deg_lon(self.origin.lat_deg);
        let north = (p.lat_deg - self.origin.lat_deg) * meters_per_deg_lat(self.origin.lat_deg);
        Vect3::new(east, north, p.alt_m)
    }

    pub fn inverse(&self, s: &Vect3) -> GeoPosition {
        let lat = self.origin.lat_deg + s.y / meters_per_deg_lat(self.origin.lat_deg).max(1e-9);
        let lon = self.origin.lon_deg + s.x / meters_per_deg_lon(self.origin.lat_deg).max(1e-9);
        GeoPosition::new(lat, lon, s.z)
    }
}

/// Immutable position/velocity snapshot of one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficState {
    pub id: String,
    /// Position in meters, z is altitude.
    pub s: Vect3,
    /// Velocity in m/s.
    pub v: Vect3,
}

impl TrafficState {
    pub fn new(id: impl Into<String>, s: Vect3, v: Vect3) -> Self {
        Self { id: id.into(), s, v }
    }

    /// State from track (rad), ground speed (m/s) and vertical speed (m/s).
    pub fn from_trk_gs_vs(id: impl Into<String>, s: Vect3, trk: f64, gs: f64, vs: f64) -> Self {
        Self::new(id, s, from_trk_gs_vs(trk, gs, vs))
    }

    /// Projects a geodetic state into `proj`'s frame.
    pub fn from_geo(id: impl Into<String>, p: &GeoPosition, v: Vect3, proj: &Projection) -> Self {
        Self::new(id, proj.project(p), v)
    }

    /// State placed `t` seconds ahead along its velocity.
    pub fn linear_projection(&self, t: f64) -> Self {
        Self::new(self.id.clone(), self.s.linear(&self.v, t), self.v)
    }

    pub fn is_valid(&self) -> bool {
        self.s.iter().chain(self.v.iter()).all(|x| x.is_finite())
    }
}

/// Finds an aircraft by identifier.
pub fn find<'a>(traffic: &'a [TrafficState], id: &str) -> Option<&'a TrafficState> {
    traffic.iter().find(|ac| ac.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vect::vect3;

    #[test]
    fn test_projection_round_trip() {
        let proj = Projection::new(GeoPosition::new(33.68, -117.82, 0.0));
        let p = GeoPosition::new(33.70, -117.80, 1200.0);
        let s = proj.project(&p);
        assert!(s.x > 0.0 && s.y > 0.0);
        assert!((s.z - 1200.0).abs() < 1e-12);
        let back = proj.inverse(&s);
        assert!((back.lat_deg - p.lat_deg).abs() < 1e-9);
        assert!((back.lon_deg - p.lon_deg).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_latitude_near_equator() {
        let proj = Projection::new(GeoPosition::new(0.0, 0.0, 0.0));
        let s = proj.project(&GeoPosition::new(1.0, 0.0, 0.0));
        assert!((s.y - 110_574.0).abs() < 5.0);
    }

    #[test]
    fn test_linear_projection_and_lookup() {
        let ac = TrafficState::new("AC1", vect3(0.0, 0.0, 100.0), vect3(10.0, 0.0, 1.0));
        let later = ac.linear_projection(5.0);
        assert_eq!(later.s, vect3(50.0, 0.0, 105.0));
        assert!(later.is_valid());
        let traffic = vec![ac.clone()];
        assert!(find(&traffic, "AC1").is_some());
        assert!(find(&traffic, "AC2").is_none());
        let bad = TrafficState::new("X", vect3(f64::NAN, 0.0, 0.0), Vect3::zeros());
        assert!(!bad.is_valid());
    }
}
