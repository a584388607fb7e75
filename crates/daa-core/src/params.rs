//! Flat key/value parameter tables with per-key units.
//!
//! Values are stored in SI together with the unit they were given in, so a
//! set/get round trip preserves both. The text form is one `key = value [unit]`
//! entry per line.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DaaError, Result};
use crate::units;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// SI value and the unit used for display.
    Number { value: f64, unit: String },
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterData {
    entries: BTreeMap<String, ParamValue>,
}

/// Display units last used for each key, so a detector hands back values
/// in the units it was configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitMemory(BTreeMap<String, String>);

impl UnitMemory {
    pub fn unit<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).map_or(default, String::as_str)
    }

    /// Records the unit of `key` in `p`, if present.
    pub fn remember(&mut self, p: &ParameterData, key: &str) {
        if let Some(u) = p.unit(key) {
            self.0.insert(key.to_string(), u.to_string());
        }
    }
}

/// Anything configurable through a [`ParameterData`] table.
pub trait ParameterAcceptor {
    fn parameters(&self) -> ParameterData;

    /// Applies the recognized keys; unknown keys are ignored.
    fn set_parameters(&mut self, p: &ParameterData);
}

impl ParameterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Stores an SI value tagged with its display unit.
    pub fn set_internal(&mut self, key: &str, si_value: f64, unit: &str) {
        self.entries.insert(
            key.to_string(),
            ParamValue::Number {
                value: si_value,
                unit: unit.to_string(),
            },
        );
    }

    /// Stores a value given in `unit`, converting it to SI.
    pub fn set_value(&mut self, key: &str, value: f64, unit: &str) -> Result<()> {
        let si = units::from(unit, value)?;
        self.set_internal(key, si, unit);
        Ok(())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.entries
            .insert(key.to_string(), ParamValue::Bool(value));
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.entries
            .insert(key.to_string(), ParamValue::Text(value.to_string()));
    }

    /// SI value of a numeric entry.
    pub fn value(&self, key: &str) -> Option<f64> {
        match self.entries.get(key)? {
            ParamValue::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn unit(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            ParamValue::Number { unit, .. } => Some(unit.as_str()),
            _ => None,
        }
    }

    /// Numeric entry converted to `unit`.
    pub fn value_in(&self, key: &str, unit: &str) -> Option<f64> {
        self.value(key).and_then(|v| units::to(unit, v).ok())
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Text(t) => t.parse().ok(),
            ParamValue::Number { .. } => None,
        }
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            ParamValue::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Copies every entry of `other`; existing keys are replaced only when
    /// `overwrite` is set.
    pub fn copy_from(&mut self, other: &ParameterData, overwrite: bool) {
        for (k, v) in &other.entries {
            if overwrite || !self.entries.contains_key(k) {
                self.entries.insert(k.clone(), v.clone());
            }
        }
    }

    /// Entries whose key starts with `prefix`, with the prefix removed.
    pub fn extract_prefix(&self, prefix: &str) -> ParameterData {
        let entries = self
            .entries
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|s| (s.to_string(), v.clone())))
            .collect();
        ParameterData { entries }
    }

    /// Parses one `key = value [unit]` line into the table.
    pub fn parse_line(&mut self, line: &str) -> Result<()> {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(());
        }
        let Some((key, raw)) = line.split_once('=') else {
            return Err(DaaError::MalformedParameter {
                key: line.to_string(),
                reason: "missing '='".to_string(),
            });
        };
        let key = key.trim();
        let raw = raw.trim();
        let (num, unit) = match raw.find('[') {
            Some(i) => {
                let unit = raw[i + 1..].trim_end_matches(']').trim();
                (raw[..i].trim(), Some(unit))
            }
            None => (raw, None),
        };
        if let Ok(v) = num.parse::<f64>() {
            let unit = unit.unwrap_or("unitless");
            return self.set_value(key, v, unit).map_err(|e| DaaError::MalformedParameter {
                key: key.to_string(),
                reason: e.to_string(),
            });
        }
        match num {
            "true" | "false" => self.set_bool(key, num == "true"),
            _ => self.set_string(key, num),
        }
        Ok(())
    }

    /// Parses a multi-line text table, skipping malformed lines with a warning.
    pub fn parse_text(text: &str) -> ParameterData {
        let mut p = ParameterData::new();
        for line in text.lines() {
            if let Err(e) = p.parse_line(line) {
                warn!(error = %e, "Ignoring parameter line");
            }
        }
        p
    }
}

impl fmt::Display for ParameterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            match v {
                ParamValue::Number { value, unit } => {
                    let shown = units::to(unit, *value).unwrap_or(*value);
                    writeln!(f, "{k} = {shown} [{unit}]")?;
                }
                ParamValue::Bool(b) => writeln!(f, "{k} = {b}")?,
                ParamValue::Text(t) => writeln!(f, "{k} = {t}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip_keeps_units() {
        let text = "D = 5 [nmi]\nH = 1000 [ft]\nid = alpha\nTCAS_HMDFilter = true\n";
        let p = ParameterData::parse_text(text);
        assert!((p.value("D").unwrap() - 9260.0).abs() < 1e-9);
        assert_eq!(p.unit("H"), Some("ft"));
        assert_eq!(p.string("id"), Some("alpha"));
        assert_eq!(p.bool("TCAS_HMDFilter"), Some(true));

        let again = ParameterData::parse_text(&p.to_string());
        assert_eq!(again.unit("D"), Some("nmi"));
        assert!((again.value("D").unwrap() - 9260.0).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_line() {
        let mut p = ParameterData::new();
        assert!(p.parse_line("no equals sign").is_err());
        assert!(p.parse_line("D = 5 [parsecs]").is_err());
        assert!(p.parse_line("# only a comment").is_ok());
        assert!(p.is_empty());
    }

    #[test]
    fn test_copy_from_respects_overwrite() {
        let mut a = ParameterData::new();
        a.set_internal("D", 1.0, "m");
        let mut b = ParameterData::new();
        b.set_internal("D", 2.0, "m");
        b.set_internal("H", 3.0, "m");
        a.copy_from(&b, false);
        assert_eq!(a.value("D"), Some(1.0));
        assert_eq!(a.value("H"), Some(3.0));
        a.copy_from(&b, true);
        assert_eq!(a.value("D"), Some(2.0));
    }

    #[test]
    fn test_json_round_trip() {
        let mut p = ParameterData::new();
        p.set_value("WCV_DTHR", 4000.0, "ft").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: ParameterData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
