//! Telemetry Replay Server
//!
//! Replays a historical range of car telemetry from an upstream HTTP API as
//! if it were happening now. Each tick of the scheduler fetches one window
//! of simulated time, and the ingestion pipeline persists it, refreshes the
//! latest-value cache and pushes it to live websocket subscribers.
//!
//! # Modules
//!
//! - `types`: Core data structures (TelemetrySample, RawRecord, ReplayWindow)
//! - `fetcher`: Window Fetcher for the upstream API
//! - `scheduler`: Replay Scheduler driving fetch → ingest per tick
//! - `ingest`: Ingestion Pipeline (transform, persist, cache, broadcast)
//! - `store`: Durable Record Store (JSON Lines)
//! - `cache`: Latest-value cache with optional expiry
//! - `api`: Live Broadcaster websocket feed and read endpoints
//! - `seed`: Driver/race catalog seeding
//! - `config`, `logging`, `utils`: Ambient plumbing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetry_replay::{
//!     IngestionPipeline, InMemoryLatestCache, JsonlRecordStore, LiveBroadcaster, OpenF1Fetcher,
//!     ReplayConfig, ReplayScheduler, StoreConfig, SubjectResolver,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ReplayConfig::default();
//! let store = Arc::new(JsonlRecordStore::open(StoreConfig::new("data")).await?);
//! let resolver = SubjectResolver::from_store(store.as_ref(), 1).await?;
//! let pipeline = IngestionPipeline::new(
//!     store,
//!     Arc::new(InMemoryLatestCache::new()),
//!     Arc::new(LiveBroadcaster::new(256)),
//!     resolver,
//!     config.cache_ttl,
//! );
//! let fetcher = OpenF1Fetcher::new(&config.upstream_base_url, config.session_key, config.request_timeout)?;
//! let plan = config.plan().ok_or_else(|| anyhow::anyhow!("empty replay range"))?;
//!
//! let summary = ReplayScheduler::new(plan, Arc::new(fetcher), Arc::new(pipeline))
//!     .spawn(config.tick_interval)
//!     .join()
//!     .await?;
//! println!("persisted {} samples", summary.records_persisted);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod ingest;
pub mod logging;
pub mod scheduler;
pub mod seed;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use api::{LiveBroadcaster, ReadState};
pub use cache::{InMemoryLatestCache, LatestCache};
pub use config::{Cli, ConfigError, ReplayConfig};
pub use fetcher::{FetchError, OpenF1Fetcher, UpstreamError, WindowFetcher};
pub use ingest::{BatchSink, IngestError, IngestReport, IngestionPipeline, SubjectResolver};
pub use scheduler::{ReplayScheduler, ReplaySummary, SchedulerHandle, SchedulerState};
pub use store::{JsonlRecordStore, RecordStore, StoreConfig, StoreError};
pub use types::{RawRecord, ReplayPlan, ReplayWindow, SubjectKey, TelemetrySample};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
