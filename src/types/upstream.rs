//! Rows returned by the upstream telemetry API
//!
//! Every field is optional: the upstream feed occasionally emits incomplete
//! rows and the decision to drop them belongs to the ingestion transform,
//! not to payload decoding.

use serde::{Deserialize, Serialize};

/// One raw car-data row, kept verbatim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub throttle: Option<f64>,
    #[serde(default)]
    pub brake: Option<f64>,
    #[serde(default)]
    pub n_gear: Option<i64>,
    /// RFC 3339 instant as sent by the upstream
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub driver_number: Option<u32>,
    #[serde(default)]
    pub rpm: Option<f64>,
    #[serde(default)]
    pub drs: Option<i64>,
    #[serde(default)]
    pub session_key: Option<u32>,
    #[serde(default)]
    pub meeting_key: Option<u32>,
}

/// Driver row from the upstream drivers endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamDriver {
    #[serde(default)]
    pub driver_number: Option<u32>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Session row from the upstream sessions endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamSession {
    #[serde(default)]
    pub session_key: Option<u32>,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}
