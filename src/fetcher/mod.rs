//! Window Fetcher
//!
//! Retrieves every upstream row whose timestamp falls inside a replay
//! window. The fetcher issues exactly one query per window and never
//! retries; retry policy (there is none) belongs to the scheduler.

mod openf1;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{RawRecord, ReplayWindow, UpstreamDriver, UpstreamSession};

pub use openf1::OpenF1Fetcher;

/// Why a call to the upstream API failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("request timed out")]
    Timeout,
}

/// A failed window fetch, carrying the window it was for
#[derive(Debug, Clone, PartialEq, Error)]
#[error("fetch of window {window} failed: {cause}")]
pub struct FetchError {
    pub window: ReplayWindow,
    #[source]
    pub cause: UpstreamError,
}

impl FetchError {
    pub fn new(window: ReplayWindow, cause: UpstreamError) -> Self {
        Self { window, cause }
    }
}

/// Time-range query over the upstream telemetry source
#[async_trait]
pub trait WindowFetcher: Send + Sync {
    /// Raw rows with timestamps in `[window.start, window.end)`, verbatim
    ///
    /// An empty vector is a valid result (quiet periods upstream).
    async fn fetch(&self, window: ReplayWindow) -> Result<Vec<RawRecord>, FetchError>;
}

/// Catalog queries used by the one-shot seeding step
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn drivers(&self) -> Result<Vec<UpstreamDriver>, UpstreamError>;

    /// The configured session, if the upstream knows it
    async fn session(&self) -> Result<Option<UpstreamSession>, UpstreamError>;
}
