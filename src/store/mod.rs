//! Record Store
//!
//! Durable storage for telemetry samples and the driver/race catalog they
//! reference. The store is the source of truth; the latest-value cache is
//! only an optimization in front of it.
//!
//! ```text
//! Write Path:
//! ┌──────────┐    ┌────────────────┐    ┌──────────────────┐
//! │ pipeline │───►│ insert_samples │───►│ one append+fsync │
//! │  batch   │    │  (bulk, FK ok) │    │ telemetry.jsonl  │
//! └──────────┘    └────────────────┘    └──────────────────┘
//! ```

mod jsonl;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Driver, DriverId, NewDriver, NewRace, NewSample, Race, TelemetrySample, Upsert};

pub use jsonl::{JsonlRecordStore, StoreConfig};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A sample referenced a driver or race that is not in the catalog
    #[error("sample references unknown {entity} {id}")]
    MissingReference { entity: &'static str, id: u64 },
}

/// Durable store for telemetry and its catalog
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a whole batch in one write, assigning identities in order
    ///
    /// The batch is rejected as a unit if any sample references an
    /// unknown driver or race.
    async fn insert_samples(&self, samples: Vec<NewSample>) -> StoreResult<Vec<TelemetrySample>>;

    /// Most recent persisted sample for a driver (cache-miss fallback)
    async fn latest_for_driver(&self, driver_id: DriverId) -> StoreResult<Option<TelemetrySample>>;

    async fn sample_count(&self) -> StoreResult<usize>;

    /// Insert unless a driver with the same number exists
    async fn insert_driver_if_absent(&self, driver: NewDriver) -> StoreResult<Upsert<Driver>>;

    /// Insert unless a race with the same name exists
    async fn insert_race_if_absent(&self, race: NewRace) -> StoreResult<Upsert<Race>>;

    async fn drivers(&self) -> StoreResult<Vec<Driver>>;

    async fn races(&self) -> StoreResult<Vec<Race>>;

    async fn find_driver_by_number(&self, driver_number: u32) -> StoreResult<Option<Driver>>;
}
