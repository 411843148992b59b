//! End-to-end replay tests: a local stand-in for the upstream API feeds the
//! real fetcher, pipeline, store, cache and broadcaster.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use telemetry_replay::api::{api_router, LiveBroadcaster, ReadState};
use telemetry_replay::api::websocket::LiveEvent;
use telemetry_replay::cache::{InMemoryLatestCache, LatestCache};
use telemetry_replay::fetcher::OpenF1Fetcher;
use telemetry_replay::ingest::{IngestionPipeline, SubjectResolver};
use telemetry_replay::scheduler::{ReplayScheduler, ReplaySummary};
use telemetry_replay::seed::seed_catalog;
use telemetry_replay::store::{JsonlRecordStore, RecordStore, StoreConfig};
use telemetry_replay::types::{ReplayPlan, SubjectKey};
use telemetry_replay::utils::parse_instant;

const RACE: &str = "Bahrain Grand Prix";

fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap() + chrono::Duration::seconds(second as i64)
}

/// Upstream stand-in answering car data by the requested date range
struct Upstream {
    rows: Vec<Value>,
    fail_window_start: Option<DateTime<Utc>>,
    requests: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl Upstream {
    fn new(fail_window_start: Option<DateTime<Utc>>) -> Self {
        let mut rows = Vec::new();
        for second in 0..12 {
            for (driver_number, speed) in [(1, 280.0), (44, 275.0)] {
                rows.push(json!({
                    "speed": speed + second as f64,
                    "throttle": 98,
                    "brake": 0,
                    "n_gear": 7,
                    "rpm": 11000,
                    "drs": 0,
                    "date": format!("2024-03-02T15:00:{:02}.250000+00:00", second),
                    "driver_number": driver_number,
                    "session_key": 9472,
                }));
            }
        }
        // Missing gear
        rows.push(json!({
            "speed": 290, "throttle": 100, "brake": 0,
            "date": "2024-03-02T15:00:03.500000+00:00", "driver_number": 1,
        }));
        // Not in the catalog
        rows.push(json!({
            "speed": 250, "throttle": 50, "brake": 0, "n_gear": 5,
            "date": "2024-03-02T15:00:04.000000+00:00", "driver_number": 99,
        }));

        Self {
            rows,
            fail_window_start,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.requests.lock().clone()
    }
}

fn bounds(query: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let decoded = urlencoding::decode(query).ok()?;
    let mut start = None;
    let mut end = None;
    for part in decoded.split('&') {
        if let Some(value) = part.strip_prefix("date>=") {
            start = parse_instant(value);
        } else if let Some(value) = part.strip_prefix("date<") {
            end = parse_instant(value);
        }
    }
    Some((start?, end?))
}

async fn car_data(State(upstream): State<Arc<Upstream>>, RawQuery(query): RawQuery) -> Response {
    let Some((start, end)) = query.as_deref().and_then(bounds) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    upstream.requests.lock().push((start, end));

    if upstream.fail_window_start == Some(start) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }

    let rows: Vec<Value> = upstream
        .rows
        .iter()
        .filter(|row| {
            row["date"]
                .as_str()
                .and_then(parse_instant)
                .is_some_and(|date| date >= start && date < end)
        })
        .cloned()
        .collect();
    Json(rows).into_response()
}

async fn drivers() -> Json<Value> {
    Json(json!([
        {"driver_number": 1, "full_name": "Max VERSTAPPEN", "team_name": "Red Bull Racing", "country_code": "NED"},
        {"driver_number": 44, "full_name": "Lewis HAMILTON", "team_name": "Mercedes", "country_code": "GBR"},
        {"driver_number": 2, "full_name": null, "team_name": "Williams"},
    ]))
}

async fn sessions() -> Json<Value> {
    Json(json!([{
        "session_key": 9472,
        "session_name": "Race",
        "location": "Sakhir",
        "country_name": "Bahrain",
        "date_start": "2024-03-02T15:00:00+00:00",
        "year": 2024,
    }]))
}

async fn serve_upstream(upstream: Arc<Upstream>) -> String {
    let router = Router::new()
        .route("/v1/car_data", get(car_data))
        .route("/v1/drivers", get(drivers))
        .route("/v1/sessions", get(sessions))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

struct Harness {
    _dir: TempDir,
    upstream: Arc<Upstream>,
    store: Arc<JsonlRecordStore>,
    cache: Arc<InMemoryLatestCache>,
    broadcaster: Arc<LiveBroadcaster>,
    scheduler: ReplayScheduler,
}

async fn harness(fail_window_start: Option<DateTime<Utc>>) -> Harness {
    let upstream = Arc::new(Upstream::new(fail_window_start));
    let base_url = serve_upstream(upstream.clone()).await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlRecordStore::open(StoreConfig::new(dir.path())).await.unwrap());
    let fetcher = Arc::new(OpenF1Fetcher::new(base_url, 9472, Duration::from_secs(5)).unwrap());

    let race_id = seed_catalog(fetcher.as_ref(), store.as_ref(), RACE)
        .await
        .expect("race seeded");
    let resolver = SubjectResolver::from_store(store.as_ref(), race_id).await.unwrap();

    let cache = Arc::new(InMemoryLatestCache::new());
    let broadcaster = Arc::new(LiveBroadcaster::new(16));
    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        cache.clone(),
        broadcaster.clone(),
        resolver,
        None,
    ));

    let plan = ReplayPlan::new(at(0), at(12), chrono::Duration::seconds(5)).unwrap();
    Harness {
        _dir: dir,
        upstream,
        store,
        cache,
        broadcaster,
        scheduler: ReplayScheduler::new(plan, fetcher, pipeline),
    }
}

async fn run(scheduler: ReplayScheduler) -> ReplaySummary {
    tokio::time::timeout(
        Duration::from_secs(10),
        scheduler.spawn(Duration::from_millis(10)).join(),
    )
    .await
    .expect("replay finished in time")
    .unwrap()
}

#[tokio::test]
async fn test_replay_persists_caches_and_broadcasts() {
    let h = harness(None).await;
    let (_client_id, mut rx) = h.broadcaster.on_subscriber_join();

    let summary = run(h.scheduler).await;

    assert_eq!(summary.windows, 3);
    assert_eq!(summary.records_persisted, 24);
    assert_eq!(summary.records_skipped, 2);
    assert_eq!(summary.fetch_failures, 0);
    assert_eq!(summary.final_position, Some(at(12)));
    assert_eq!(
        h.upstream.requested(),
        vec![(at(0), at(5)), (at(5), at(10)), (at(10), at(12))]
    );

    assert_eq!(h.store.sample_count().await.unwrap(), 24);

    let mut batch_sizes = Vec::new();
    let mut sequence_ids = Vec::new();
    while let Ok(message) = rx.try_recv() {
        sequence_ids.push(message.sequence_id);
        let LiveEvent::LiveUpdate { samples } = message.event;
        batch_sizes.push(samples.len());
    }
    assert_eq!(batch_sizes, vec![10, 10, 4]);
    assert_eq!(sequence_ids, vec![0, 1, 2]);

    let drivers = h.store.drivers().await.unwrap();
    let hamilton = drivers.iter().find(|d| d.driver_number == 44).unwrap();
    let latest = h.cache.get(SubjectKey(hamilton.id)).unwrap();
    assert_eq!(latest.timestamp, at(11) + chrono::Duration::milliseconds(250));
    assert_eq!(latest.speed, 286.0);
}

#[tokio::test]
async fn test_failed_window_is_skipped_not_retried() {
    let h = harness(Some(at(5))).await;

    let summary = run(h.scheduler).await;

    assert_eq!(summary.windows, 3);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(summary.records_persisted, 14);
    assert_eq!(h.upstream.requested().len(), 3);
    assert_eq!(h.store.sample_count().await.unwrap(), 14);
}

#[tokio::test]
async fn test_replayed_data_survives_restart_and_serves_reads() {
    let h = harness(None).await;
    let data_dir = h._dir.path().to_path_buf();
    run(h.scheduler).await;

    let reopened = Arc::new(JsonlRecordStore::open(StoreConfig::new(&data_dir)).await.unwrap());
    assert_eq!(reopened.sample_count().await.unwrap(), 24);
    assert_eq!(reopened.drivers().await.unwrap().len(), 2);
    assert_eq!(reopened.races().await.unwrap().len(), 1);

    // Fresh process: empty cache, reads fall back to the store
    let cache = Arc::new(InMemoryLatestCache::new());
    let app = api_router(Arc::new(ReadState::new(reopened, cache.clone(), None)));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/telemetry/latest/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["source"], "store");
    assert_eq!(body["data"]["speed"], 291.0);
    assert_eq!(cache.len(), 1);
}
