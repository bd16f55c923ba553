//! Core domain types for airport status tracking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SkywatchError;

// ---------------------------------------------------------------------------
// Icao
// ---------------------------------------------------------------------------

/// A validated four-letter ICAO airport code (e.g. `UUWW`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Icao(String);

impl Icao {
    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Icao {
    type Error = SkywatchError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.len() == 4 && value.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(value))
        } else {
            Err(SkywatchError::validation(format!(
                "'{value}' is not a valid ICAO code (expected four uppercase letters)"
            )))
        }
    }
}

impl From<Icao> for String {
    fn from(icao: Icao) -> Self {
        icao.0
    }
}

impl std::str::FromStr for Icao {
    type Err = SkywatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl std::fmt::Display for Icao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Operational status of an airport as announced by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Restrictions lifted, arrivals/departures resumed.
    Open,
    /// Temporary restrictions introduced.
    Closed,
}

impl Status {
    /// Stable lowercase string form, matching the `status.json` vocabulary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = SkywatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(SkywatchError::validation(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusEvent
// ---------------------------------------------------------------------------

/// A single status announcement applied to an airport's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Publish time of the announcement, UTC.
    pub ts: DateTime<Utc>,
    /// Announced status.
    pub status: Status,
    /// Feed entry the event was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
}

// ---------------------------------------------------------------------------
// AirportRecord
// ---------------------------------------------------------------------------

/// Per-airport state: display name, current status, and full event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportRecord {
    /// ICAO code.
    pub icao: Icao,
    /// Display name as learned from the channel (e.g. «Внуково»).
    pub name: String,
    /// Status of the latest event, if any event has been recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Status>,
    /// Events in ascending publish order.
    #[serde(default)]
    pub events: Vec<StatusEvent>,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// The full tracked state, keyed by ICAO code — the `status.json` shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSnapshot {
    /// Airports keyed by ICAO code.
    pub airports: BTreeMap<Icao, AirportRecord>,
}

impl StatusSnapshot {
    /// Whether any airport has been recorded.
    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Number of tracked airports.
    pub fn len(&self) -> usize {
        self.airports.len()
    }

    /// Records ordered by display name (site rendering order).
    pub fn sorted_by_name(&self) -> Vec<&AirportRecord> {
        let mut records: Vec<&AirportRecord> = self.airports.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.icao.cmp(&b.icao)));
        records
    }
}
