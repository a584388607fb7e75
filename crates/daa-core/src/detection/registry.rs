//! Tag-keyed factory for detectors.

use std::collections::BTreeMap;

use tracing::debug;

use super::{CDCylinder, Detection3D, TCAS3D, WCV, CD2D};
use crate::error::{DaaError, Result};
use crate::params::ParameterData;

type Constructor = fn() -> Box<dyn Detection3D>;

/// Maps stable string tags to detector constructors.
#[derive(Debug, Clone)]
pub struct DetectorRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DetectorRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry holding every detector family of this crate.
    pub fn with_defaults() -> Self {
        let mut r = Self::empty();
        r.register("CDCylinder", || Box::new(CDCylinder::default()));
        r.register("CD3D", || Box::new(CDCylinder::default()));
        r.register("CD2D", || Box::new(CD2D::default()));
        r.register("WCV_TAUMOD", || Box::new(WCV::taumod()));
        r.register("WCV_TCPA", || Box::new(WCV::tcpa()));
        r.register("WCV_TEP", || Box::new(WCV::tep()));
        r.register("WCV_HZ", || Box::new(WCV::hz()));
        r.register("TCAS3D", || Box::new(TCAS3D::default()));
        r
    }

    /// Adds or replaces a constructor.
    pub fn register(&mut self, tag: &str, ctor: Constructor) {
        self.constructors.insert(tag.to_string(), ctor);
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Builds the detector for `tag` and applies `params` to it.
    pub fn make(&self, tag: &str, params: &ParameterData) -> Result<Box<dyn Detection3D>> {
        let ctor = self
            .constructors
            .get(tag)
            .ok_or_else(|| DaaError::UnknownDetector(tag.to_string()))?;
        let mut det = ctor();
        det.set_parameters(params);
        debug!(tag, id = det.identifier(), "Built detector");
        Ok(det)
    }

    /// Builds a detector from a table holding its tag under `key`, for
    /// example `alert_1_detector = WCV_TAUMOD` with prefixed thresholds.
    pub fn make_from(&self, p: &ParameterData, key: &str) -> Result<Box<dyn Detection3D>> {
        let tag = p.string(key).ok_or_else(|| DaaError::MalformedParameter {
            key: key.to_string(),
            reason: "missing detector tag".to_string(),
        })?;
        let prefix = format!("{key}_");
        self.make(tag, &p.extract_prefix(&prefix))
    }
}
