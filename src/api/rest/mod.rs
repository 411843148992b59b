//! REST API module for HTTP endpoints
//!
//! Read side of the service:
//! - `GET /api/telemetry/latest/:driver_number` - Latest sample, cache-aside
//! - `GET /api/drivers` - Seeded driver catalog

pub mod drivers;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::LatestCache;
use crate::store::RecordStore;

/// Shared state for read handlers
pub struct ReadState {
    pub store: Arc<dyn RecordStore>,
    pub cache: Arc<dyn LatestCache>,
    /// Lifetime of entries repopulated after a cache miss
    pub cache_ttl: Option<Duration>,
}

impl ReadState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn LatestCache>,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            cache,
            cache_ttl,
        }
    }
}

/// Where a response value was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    Cache,
    Store,
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ReadSource>,
    /// Total count (for list responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn from_source(data: T, source: ReadSource) -> Self {
        Self {
            data,
            source: Some(source),
            total: None,
        }
    }

    pub fn with_total(data: T, total: usize) -> Self {
        Self {
            data,
            source: None,
            total: Some(total),
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "NOT_FOUND".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}
