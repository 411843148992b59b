//! Telemetry Replay Server - Binary Entry Point
//!
//! Seeds the catalog, starts the live feed and read API listeners, then
//! replays the configured range until it completes or Ctrl-C is pressed.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use telemetry_replay::api::{api_router, live_router, LiveBroadcaster, ReadState};
use telemetry_replay::cache::InMemoryLatestCache;
use telemetry_replay::config::{Cli, ReplayConfig};
use telemetry_replay::fetcher::OpenF1Fetcher;
use telemetry_replay::ingest::{IngestionPipeline, SubjectResolver};
use telemetry_replay::logging::init_tracing;
use telemetry_replay::scheduler::ReplayScheduler;
use telemetry_replay::seed::seed_catalog;
use telemetry_replay::store::JsonlRecordStore;
use telemetry_replay::utils::shutdown_requested;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ReplayConfig::load(&cli).context("Invalid configuration")?;

    init_tracing(&config.log_level);
    info!(
        version = telemetry_replay::VERSION,
        upstream = %config.upstream_base_url,
        session_key = config.session_key,
        data_dir = ?config.data_dir,
        "Starting telemetry replay server"
    );

    let store = Arc::new(
        JsonlRecordStore::open(config.store_config())
            .await
            .context("Failed to open record store")?,
    );
    let fetcher = Arc::new(
        OpenF1Fetcher::new(
            config.upstream_base_url.as_str(),
            config.session_key,
            config.request_timeout,
        )
        .context("Failed to build upstream client")?,
    );

    let race_id = seed_catalog(fetcher.as_ref(), store.as_ref(), &config.race_name)
        .await
        .ok_or_else(|| anyhow!("No race named {:?} is available to attribute telemetry to", config.race_name))?;
    let resolver = SubjectResolver::from_store(store.as_ref(), race_id)
        .await
        .context("Failed to load driver catalog")?;
    if resolver.driver_count() == 0 {
        warn!("Driver catalog is empty; every upstream row will be skipped");
    }

    let cache = Arc::new(InMemoryLatestCache::new());
    let broadcaster = Arc::new(LiveBroadcaster::new(config.broadcast_capacity));
    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        cache.clone(),
        broadcaster.clone(),
        resolver,
        config.cache_ttl,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let live_server = serve(
        "Live feed",
        config.live_addr,
        live_router(broadcaster),
        shutdown_rx.clone(),
    )
    .await?;
    let read_state = Arc::new(ReadState::new(store, cache, config.cache_ttl));
    let api_server = serve("Read API", config.api_addr, api_router(read_state), shutdown_rx).await?;

    let plan = config
        .plan()
        .ok_or_else(|| anyhow!("Replay range is empty"))?;
    let mut replay = ReplayScheduler::new(plan, fetcher, pipeline).spawn(config.tick_interval);

    let summary = tokio::select! {
        summary = replay.wait() => summary,
        _ = shutdown_requested(tokio::signal::ctrl_c()) => {
            info!("Shutdown requested, waiting for the current window to finish");
            replay.stop();
            replay.wait().await
        }
    };

    match summary {
        Ok(summary) => info!(
            windows = summary.windows,
            empty_windows = summary.empty_windows,
            fetch_failures = summary.fetch_failures,
            persist_failures = summary.persist_failures,
            records_persisted = summary.records_persisted,
            records_skipped = summary.records_skipped,
            "Replay finished"
        ),
        Err(e) => error!(error = %e, "Replay task failed"),
    }

    let _ = shutdown_tx.send(true);
    let (live, api) = tokio::join!(live_server, api_server);
    if let Err(e) = live.and(api) {
        error!(error = %e, "Server task failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Bind `addr` and serve `router` until `shutdown` flips to true
async fn serve(
    name: &'static str,
    addr: SocketAddr,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {} on {}", name, addr))?;
    info!(%addr, "{} listening", name);

    Ok(tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = result {
            error!(server = name, error = %e, "Server error");
        }
    }))
}
