//! Ingestion pipeline: transform, persist, cache, broadcast
//!
//! One batch moves through four steps in a fixed order. Persistence must
//! succeed before anything becomes visible: a failed write leaves the cache
//! and the live feed untouched for that batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::transform::{transform_batch, TransformSkip};
use super::SubjectResolver;
use crate::api::websocket::LiveBroadcaster;
use crate::cache::LatestCache;
use crate::store::{RecordStore, StoreError};
use crate::types::{RawRecord, ReplayWindow, SubjectKey, TelemetrySample};

/// Errors that abort a batch
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// What happened to one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Raw rows handed to the pipeline
    pub received: usize,
    /// Samples durably written
    pub persisted: usize,
    /// Rows dropped by the transform
    pub skipped: usize,
    /// Subjects whose cache entry was refreshed
    pub cached_subjects: usize,
    /// Subscribers the batch was queued for
    pub subscribers: usize,
}

/// Consumer of fetched windows, as seen by the scheduler
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn ingest_window(
        &self,
        window: ReplayWindow,
        records: Vec<RawRecord>,
    ) -> Result<IngestReport, IngestError>;
}

/// Drives store, cache and broadcaster for each batch
pub struct IngestionPipeline {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn LatestCache>,
    broadcaster: Arc<LiveBroadcaster>,
    resolver: SubjectResolver,
    cache_ttl: Option<Duration>,
    /// Serializes persist → cache → broadcast across concurrent callers
    write_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn LatestCache>,
        broadcaster: Arc<LiveBroadcaster>,
        resolver: SubjectResolver,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            cache,
            broadcaster,
            resolver,
            cache_ttl,
            write_lock: Mutex::new(()),
        }
    }

    /// Ingest rows without checking them against a window
    pub async fn ingest(&self, records: Vec<RawRecord>) -> Result<IngestReport, IngestError> {
        self.run(None, records).await
    }

    async fn run(
        &self,
        window: Option<ReplayWindow>,
        records: Vec<RawRecord>,
    ) -> Result<IngestReport, IngestError> {
        let batch = transform_batch(&records, window.as_ref(), &self.resolver);
        let mut report = IngestReport {
            received: records.len(),
            skipped: batch.skipped.len(),
            ..Default::default()
        };

        if !batch.skipped.is_empty() {
            log_skips(&batch.skipped);
        }
        if batch.samples.is_empty() {
            return Ok(report);
        }

        let _guard = self.write_lock.lock().await;

        let stored = self.store.insert_samples(batch.samples).await?;
        report.persisted = stored.len();

        report.cached_subjects = self.refresh_cache(&stored);
        report.subscribers = self.broadcaster.broadcast(&stored);

        info!(
            persisted = report.persisted,
            skipped = report.skipped,
            subscribers = report.subscribers,
            "Saved telemetry batch"
        );
        Ok(report)
    }

    /// Write the newest sample per subject, never replacing a newer cached one
    fn refresh_cache(&self, stored: &[TelemetrySample]) -> usize {
        let latest = latest_per_subject(stored);
        let mut refreshed = 0;

        for (key, sample) in latest {
            if self.cache.set_if_newer(key, sample.clone(), self.cache_ttl) {
                refreshed += 1;
            }
        }

        refreshed
    }
}

#[async_trait]
impl BatchSink for IngestionPipeline {
    async fn ingest_window(
        &self,
        window: ReplayWindow,
        records: Vec<RawRecord>,
    ) -> Result<IngestReport, IngestError> {
        self.run(Some(window), records).await
    }
}

/// Newest sample per subject; ties go to the later identity
fn latest_per_subject(samples: &[TelemetrySample]) -> HashMap<SubjectKey, &TelemetrySample> {
    let mut latest: HashMap<SubjectKey, &TelemetrySample> = HashMap::new();
    for sample in samples {
        latest
            .entry(sample.subject())
            .and_modify(|current| {
                if (sample.timestamp, sample.id) > (current.timestamp, current.id) {
                    *current = sample;
                }
            })
            .or_insert(sample);
    }
    latest
}

fn log_skips(skipped: &[TransformSkip]) {
    let mut reasons: HashMap<String, usize> = HashMap::new();
    for skip in skipped {
        *reasons.entry(skip.to_string()).or_default() += 1;
    }
    debug!(skipped = skipped.len(), ?reasons, "Dropped incomplete rows");
}
