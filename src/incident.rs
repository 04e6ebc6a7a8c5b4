//! Incident records and the per-incident analysis data stored with them.

use std::borrow::Borrow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scenario::Scenario;

/// Severity levels for simulated incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Sev2,
    Sev3,
}

/// Incident identity of the form `INC-<n>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(String);

impl IncidentId {
    const PREFIX: &'static str = "INC-";

    pub fn from_number(n: u64) -> Self {
        Self(format!("{}{}", Self::PREFIX, n))
    }

    /// Numeric suffix, if the id is well formed (`INC-` followed by digits only).
    pub fn number(&self) -> Option<u64> {
        Self::parse_number(&self.0)
    }

    /// Numeric suffix of a raw id string, under the same rules as [`Self::number`].
    pub fn parse_number(raw: &str) -> Option<u64> {
        let digits = raw.strip_prefix(Self::PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IncidentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for IncidentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// One simulated alert and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: IncidentId,
    pub service: String,
    pub severity: Severity,
    pub status: String,
    pub scenario: Scenario,
    pub engine: String,
    pub created_at: DateTime<Utc>,
}

/// A single point of an incident's error trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub ts: String,
    /// Kept as the worker's exact JSON number so integer counts stay integers.
    pub errors: serde_json::Number,
}

/// A probable-cause bucket produced by the analysis worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub sample: String,
}
