//! Errors raised by the configuration surfaces of the kernel.
//!
//! Numeric routines never fail: "no conflict" and "no solution" are encoded
//! as data (see [`crate::detection::LossData`] and [`crate::vect`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaaError {
    #[error("unknown detector tag `{0}`")]
    UnknownDetector(String),

    #[error("unknown unit `{0}`")]
    UnknownUnit(String),

    #[error("malformed parameter `{key}`: {reason}")]
    MalformedParameter { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("polygon rejected: {0}")]
    BadPolygon(String),

    #[error("aircraft index {0} is out of range")]
    AircraftIndex(usize),

    #[error("invalid state for aircraft `{0}`")]
    InvalidState(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DaaError>;
