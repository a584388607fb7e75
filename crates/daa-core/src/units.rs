//! Conversion between display units and the internal SI units.

use crate::error::{DaaError, Result};

pub const FT: f64 = 0.3048;
pub const NMI: f64 = 1852.0;
pub const KN: f64 = NMI / 3600.0;
pub const FPM: f64 = FT / 60.0;
pub const DEG: f64 = std::f64::consts::PI / 180.0;
pub const G: f64 = 9.80665;

/// Scale factor to SI for a unit symbol, plus its dimension tag.
fn lookup(unit: &str) -> Option<(f64, &'static str)> {
    let entry = match unit.trim() {
        "m" => (1.0, "length"),
        "ft" => (FT, "length"),
        "nmi" | "NM" => (NMI, "length"),
        "km" => (1000.0, "length"),
        "s" => (1.0, "time"),
        "min" => (60.0, "time"),
        "h" | "hr" => (3600.0, "time"),
        "m/s" => (1.0, "speed"),
        "kn" | "knot" | "kts" => (KN, "speed"),
        "fpm" | "ft/min" => (FPM, "speed"),
        "km/h" => (1000.0 / 3600.0, "speed"),
        "rad" => (1.0, "angle"),
        "deg" => (DEG, "angle"),
        "rad/s" => (1.0, "rate"),
        "deg/s" => (DEG, "rate"),
        "m/s^2" => (1.0, "accel"),
        "G" => (G, "accel"),
        "unitless" | "" => (1.0, "unitless"),
        _ => return None,
    };
    Some(entry)
}

/// Converts `value` expressed in `unit` to SI.
pub fn from(unit: &str, value: f64) -> Result<f64> {
    lookup(unit)
        .map(|(k, _)| value * k)
        .ok_or_else(|| DaaError::UnknownUnit(unit.to_string()))
}

/// Converts an SI `value` to `unit`.
pub fn to(unit: &str, value: f64) -> Result<f64> {
    lookup(unit)
        .map(|(k, _)| value / k)
        .ok_or_else(|| DaaError::UnknownUnit(unit.to_string()))
}

pub fn is_known(unit: &str) -> bool {
    lookup(unit).is_some()
}

/// Both units exist and measure the same dimension.
pub fn is_compatible(a: &str, b: &str) -> bool {
    matches!((lookup(a), lookup(b)), (Some((_, da)), Some((_, db))) if da == db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_units() {
        let m = from("nmi", 5.0).unwrap();
        assert!((m - 9260.0).abs() < 1e-9);
        assert!((to("ft", from("ft", 1000.0).unwrap()).unwrap() - 1000.0).abs() < 1e-9);
        assert!((from("fpm", 60.0).unwrap() - FT).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_unit() {
        assert!(matches!(from("furlong", 1.0), Err(DaaError::UnknownUnit(_))));
        assert!(is_compatible("kn", "fpm"));
        assert!(!is_compatible("kn", "ft"));
    }
}
