//! DAA CLI - command line driver for the detect-and-avoid kernel.
//!
//! The `daa` binary wires these modules to subcommands:
//! - assess: facade queries with wind, urgency and accuracy buffers
//! - config: defaults from environment
//! - encounter: aircraft states in display units
//! - report: JSON output envelope
//! - sweep: seeded random encounter sweep

pub mod assess;
pub mod config;
pub mod encounter;
pub mod report;
pub mod sweep;

pub use assess::{assess, AssessOptions, UrgencyChoice};
pub use config::Config;
pub use encounter::AircraftSpec;
pub use report::Report;
