//! Catalog seeding
//!
//! One-shot, idempotent population of the driver and race catalog from the
//! upstream API. Running it twice leaves the catalog unchanged: drivers are
//! unique by car number and races by name.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::fetcher::{CatalogSource, UpstreamError};
use crate::store::{RecordStore, StoreError};
use crate::types::{NewDriver, NewRace, Race, RaceId, Upsert};
use crate::utils::parse_instant;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("upstream has no session for the configured key")]
    SessionNotFound,

    #[error("session is missing a valid {0}")]
    InvalidSession(&'static str),
}

/// Counters from a driver seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverSeedReport {
    pub inserted: usize,
    pub existing: usize,
    /// Upstream rows without a number or a full name
    pub ignored: usize,
}

/// Insert every upstream driver whose number is not yet in the catalog
pub async fn seed_drivers(
    source: &dyn CatalogSource,
    store: &dyn RecordStore,
) -> Result<DriverSeedReport, SeedError> {
    info!("Starting driver seeding");
    let rows = source.drivers().await?;
    let mut report = DriverSeedReport::default();

    for row in rows {
        let (Some(driver_number), Some(name)) = (row.driver_number, row.full_name) else {
            report.ignored += 1;
            continue;
        };
        if name.trim().is_empty() {
            report.ignored += 1;
            continue;
        }

        let outcome = store
            .insert_driver_if_absent(NewDriver {
                name,
                driver_number,
                team_name: row.team_name.unwrap_or_default(),
                country_code: row.country_code,
            })
            .await?;

        match outcome {
            Upsert::Inserted(driver) => {
                info!(driver_number, name = %driver.name, "Saved driver");
                report.inserted += 1;
            }
            Upsert::Existing(_) => {
                debug!(driver_number, "Driver already exists");
                report.existing += 1;
            }
        }
    }

    info!(
        inserted = report.inserted,
        existing = report.existing,
        ignored = report.ignored,
        "Driver seeding complete"
    );
    Ok(report)
}

/// Insert the configured session as an active race named `race_name`
pub async fn seed_race(
    source: &dyn CatalogSource,
    store: &dyn RecordStore,
    race_name: &str,
) -> Result<Upsert<Race>, SeedError> {
    info!(race = race_name, "Starting race seeding");
    let session = source.session().await?.ok_or(SeedError::SessionNotFound)?;

    let date = session
        .date_start
        .as_deref()
        .and_then(parse_instant)
        .ok_or(SeedError::InvalidSession("date_start"))?;
    let location = session
        .location
        .or(session.country_name)
        .ok_or(SeedError::InvalidSession("location"))?;

    let outcome = store
        .insert_race_if_absent(NewRace {
            name: race_name.to_string(),
            location,
            date,
            is_active: true,
        })
        .await?;

    match &outcome {
        Upsert::Inserted(race) => info!(race = %race.name, location = %race.location, "Saved race"),
        Upsert::Existing(race) => info!(race = %race.name, "Race already exists"),
    }
    Ok(outcome)
}

/// Seed drivers and the race, logging failures instead of returning them
///
/// Returns the id of the race samples should be attributed to: the seeded
/// race, or a previously stored race with the same name when the upstream
/// session could not be fetched. `None` if neither exists.
pub async fn seed_catalog(
    source: &dyn CatalogSource,
    store: &dyn RecordStore,
    race_name: &str,
) -> Option<RaceId> {
    if let Err(e) = seed_drivers(source, store).await {
        error!(error = %e, "Error seeding drivers");
    }

    match seed_race(source, store, race_name).await {
        Ok(race) => Some(race.into_inner().id),
        Err(e) => {
            error!(error = %e, "Error seeding race");
            match store.races().await {
                Ok(races) => {
                    let found = races.into_iter().find(|r| r.name == race_name).map(|r| r.id);
                    if found.is_some() {
                        warn!(race = race_name, "Using previously stored race");
                    }
                    found
                }
                Err(e) => {
                    error!(error = %e, "Failed to read stored races");
                    None
                }
            }
        }
    }
}
