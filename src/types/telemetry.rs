//! Telemetry sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DriverId, RaceId};

/// Gear value reported while the car is in reverse
pub const GEAR_REVERSE: i8 = -1;

/// Highest forward gear accepted from the upstream feed
pub const GEAR_MAX: i8 = 8;

/// A persisted point-in-time car reading
///
/// Samples are written once by bulk insert and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Store-assigned identity
    pub id: u64,
    /// km/h, non-negative
    pub speed: f64,
    /// Percentage, 0 to 100
    pub throttle: f64,
    /// Percentage, 0 to 100
    pub brake: f64,
    pub gear: i8,
    /// Instant the upstream source recorded the reading
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "driverId")]
    pub driver_id: DriverId,
    #[serde(rename = "raceId")]
    pub race_id: RaceId,
}

impl TelemetrySample {
    /// Key under which this sample is cached
    pub fn subject(&self) -> SubjectKey {
        SubjectKey(self.driver_id)
    }
}

/// A transformed sample that has not been assigned an identity yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub speed: f64,
    pub throttle: f64,
    pub brake: f64,
    pub gear: i8,
    pub timestamp: DateTime<Utc>,
    pub driver_id: DriverId,
    pub race_id: RaceId,
}

impl NewSample {
    /// Attach the identity assigned by the store
    pub fn into_sample(self, id: u64) -> TelemetrySample {
        TelemetrySample {
            id,
            speed: self.speed,
            throttle: self.throttle,
            brake: self.brake,
            gear: self.gear,
            timestamp: self.timestamp,
            driver_id: self.driver_id,
            race_id: self.race_id,
        }
    }
}

/// Identity of a tracked subject (a stored driver)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(pub DriverId);

impl std::fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "driver:{}", self.0)
    }
}

/// Cached latest sample for a subject
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: SubjectKey,
    pub sample: TelemetrySample,
    /// `None` means the entry never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}
