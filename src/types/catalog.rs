//! Driver and race catalog types
//!
//! Catalog rows are created once by seeding and are read-only to the
//! ingestion path, which only references them by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DriverId, RaceId};

/// A tracked subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    /// Unique car number, used to map upstream rows to this driver
    #[serde(rename = "driverNumber")]
    pub driver_number: u32,
    #[serde(rename = "teamName")]
    pub team_name: String,
    #[serde(rename = "countryCode", default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// Driver fields supplied by seeding, before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewDriver {
    pub name: String,
    pub driver_number: u32,
    pub team_name: String,
    pub country_code: Option<String>,
}

impl NewDriver {
    pub fn into_driver(self, id: DriverId) -> Driver {
        Driver {
            id,
            name: self.name,
            driver_number: self.driver_number,
            team_name: self.team_name,
            country_code: self.country_code,
        }
    }
}

/// A race session that telemetry is attributed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    pub location: String,
    /// Session start instant
    pub date: DateTime<Utc>,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRace {
    pub name: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub is_active: bool,
}

impl NewRace {
    pub fn into_race(self, id: RaceId) -> Race {
        Race {
            id,
            name: self.name,
            location: self.location,
            date: self.date,
            is_active: self.is_active,
        }
    }
}

/// Outcome of an existence-check-then-insert
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert<T> {
    Inserted(T),
    Existing(T),
}

impl<T> Upsert<T> {
    pub fn was_inserted(&self) -> bool {
        matches!(self, Upsert::Inserted(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Upsert::Inserted(v) | Upsert::Existing(v) => v,
        }
    }
}
