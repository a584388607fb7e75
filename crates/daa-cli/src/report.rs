//! JSON report envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Report<T> {
    pub command: &'static str,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Report<T> {
    pub fn new(command: &'static str, body: T) -> Self {
        Self {
            command,
            generated_at: Utc::now(),
            body,
        }
    }

    /// Pretty JSON; non-finite numbers come out as `null`.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
