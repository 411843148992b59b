//! Mapping from upstream identities to stored catalog identities

use std::collections::HashMap;

use crate::store::{RecordStore, StoreResult};
use crate::types::{DriverId, RaceId};

/// Resolves upstream driver numbers to stored driver ids for one race
#[derive(Debug, Clone, Default)]
pub struct SubjectResolver {
    race_id: RaceId,
    drivers: HashMap<u32, DriverId>,
}

impl SubjectResolver {
    pub fn new(race_id: RaceId) -> Self {
        Self {
            race_id,
            drivers: HashMap::new(),
        }
    }

    /// Add a mapping (builder style)
    pub fn with_driver(mut self, driver_number: u32, driver_id: DriverId) -> Self {
        self.drivers.insert(driver_number, driver_id);
        self
    }

    /// Build the mapping from every driver in the store's catalog
    pub async fn from_store(store: &dyn RecordStore, race_id: RaceId) -> StoreResult<Self> {
        let drivers = store
            .drivers()
            .await?
            .into_iter()
            .map(|d| (d.driver_number, d.id))
            .collect();
        Ok(Self { race_id, drivers })
    }

    pub fn driver_id(&self, driver_number: u32) -> Option<DriverId> {
        self.drivers.get(&driver_number).copied()
    }

    pub fn race_id(&self) -> RaceId {
        self.race_id
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }
}
