//! Data types for the telemetry replay service
//!
//! This module contains all the core data structures used throughout the application.

mod catalog;
mod telemetry;
mod upstream;
mod window;

pub use catalog::{Driver, NewDriver, NewRace, Race, Upsert};
pub use telemetry::{CacheEntry, NewSample, SubjectKey, TelemetrySample, GEAR_MAX, GEAR_REVERSE};
pub use upstream::{RawRecord, UpstreamDriver, UpstreamSession};
pub use window::{ReplayPlan, ReplayWindow, Windows};

/// Store-assigned driver identity
pub type DriverId = u64;

/// Store-assigned race identity
pub type RaceId = u64;
