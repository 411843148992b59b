//! Telemetry endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{debug, error};

use super::{ApiError, ApiResponse, ReadSource, ReadState};
use crate::types::{SubjectKey, TelemetrySample};

/// GET /api/telemetry/latest/:driver_number - Latest sample for a car
///
/// Served from the cache when possible. On a miss the store is consulted
/// and the cache repopulated with what it returns.
pub async fn latest_for_driver(
    State(state): State<Arc<ReadState>>,
    Path(driver_number): Path<u32>,
) -> impl IntoResponse {
    let driver = match state.store.find_driver_by_number(driver_number).await {
        Ok(Some(driver)) => driver,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiError::not_found(format!("Driver #{} not found", driver_number))),
            )
                .into_response();
        }
        Err(e) => {
            error!(driver_number, error = %e, "Driver lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal(e.to_string())),
            )
                .into_response();
        }
    };

    let key = SubjectKey(driver.id);
    if let Some(sample) = state.cache.get(key) {
        debug!(subject = %key, "Cache hit");
        return Json(ApiResponse::from_source(sample, ReadSource::Cache)).into_response();
    }

    match state.store.latest_for_driver(driver.id).await {
        Ok(Some(sample)) => {
            repopulate(&state, key, &sample);
            Json(ApiResponse::from_source(sample, ReadSource::Store)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!(
                "No telemetry recorded for driver #{}",
                driver_number
            ))),
        )
            .into_response(),
        Err(e) => {
            error!(driver_number, error = %e, "Store fallback failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Write a store read back into the cache unless ingestion got there first
fn repopulate(state: &ReadState, key: SubjectKey, sample: &TelemetrySample) {
    if state.cache.set_if_newer(key, sample.clone(), state.cache_ttl) {
        debug!(subject = %key, "Repopulated cache from store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryLatestCache, LatestCache};
    use crate::store::{JsonlRecordStore, StoreConfig};
    use crate::types::NewSample;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample(id: u64, second: u32) -> TelemetrySample {
        NewSample {
            speed: 280.0,
            throttle: 100.0,
            brake: 0.0,
            gear: 8,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, second).unwrap(),
            driver_id: 1,
            race_id: 1,
        }
        .into_sample(id)
    }

    async fn read_state(dir: &TempDir) -> (ReadState, Arc<InMemoryLatestCache>) {
        let store = Arc::new(JsonlRecordStore::open(StoreConfig::new(dir.path())).await.unwrap());
        let cache = Arc::new(InMemoryLatestCache::new());
        (ReadState::new(store, cache.clone(), None), cache)
    }

    #[tokio::test]
    async fn test_stale_store_read_does_not_rewind_cache() {
        let dir = TempDir::new().unwrap();
        let (state, cache) = read_state(&dir).await;

        // Ingestion lands a newer sample between the store read and the write-back
        let from_store = sample(1, 4);
        cache.set(SubjectKey(1), sample(2, 9), None);
        repopulate(&state, SubjectKey(1), &from_store);

        assert_eq!(cache.get(SubjectKey(1)).unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_store_read_fills_empty_cache() {
        let dir = TempDir::new().unwrap();
        let (state, cache) = read_state(&dir).await;

        repopulate(&state, SubjectKey(1), &sample(1, 4));

        assert_eq!(cache.get(SubjectKey(1)).unwrap().id, 1);
    }
}
