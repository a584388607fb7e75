//! CLI defaults from environment.

use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Lookahead time in seconds.
    pub lookahead_s: f64,
    /// Registry tag of the default detector.
    pub detector: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookahead_s: 180.0,
            detector: "WCV_TAUMOD".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `DAA_LOOKAHEAD_S` and `DAA_DETECTOR` through `lookup`, keeping
    /// defaults for missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            lookahead_s: lookup("DAA_LOOKAHEAD_S")
                .and_then(|s| s.parse().ok())
                .filter(|t: &f64| t.is_finite() && *t > 0.0)
                .unwrap_or(defaults.lookahead_s),
            detector: lookup("DAA_DETECTOR")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.detector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_reads_overrides() {
        let cfg = Config::from_lookup(
            lookup(&[("DAA_LOOKAHEAD_S", "90"), ("DAA_DETECTOR", "CDCylinder")]),
        );
        assert_eq!(cfg.lookahead_s, 90.0);
        assert_eq!(cfg.detector, "CDCylinder");
    }

    #[test]
    fn test_ignores_bad_lookahead() {
        let cfg =
            Config::from_lookup(lookup(&[("DAA_LOOKAHEAD_S", "soon"), ("DAA_DETECTOR", " ")]));
        assert_eq!(cfg, Config::default());
        let cfg = Config::from_lookup(lookup(&[("DAA_LOOKAHEAD_S", "-5")]));
        assert_eq!(cfg.lookahead_s, 180.0);
    }
}
