//! JSONL-backed record store
//!
//! Telemetry is kept in an append-only `telemetry.jsonl`; the catalog lives in
//! `drivers.jsonl` and `races.jsonl`. A bulk insert serializes the whole batch
//! into one buffer and issues a single append + fsync, so a batch costs one
//! round-trip to disk regardless of its size.
//!
//! Opening a store first cuts any torn tail (bytes after the last newline left
//! by an interrupted append) so the next batch starts on a fresh line. The
//! telemetry file is then streamed once to recover the id watermark and the
//! latest sample per driver; later reads are served from that index.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{RecordStore, StoreError, StoreResult};
use crate::types::{
    Driver, DriverId, NewDriver, NewRace, NewSample, Race, TelemetrySample, Upsert,
};

/// Configuration for the JSONL store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StoreConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to telemetry.jsonl
    pub fn telemetry_path(&self) -> PathBuf {
        self.data_dir.join("telemetry.jsonl")
    }

    /// Get path to drivers.jsonl
    pub fn drivers_path(&self) -> PathBuf {
        self.data_dir.join("drivers.jsonl")
    }

    /// Get path to races.jsonl
    pub fn races_path(&self) -> PathBuf {
        self.data_dir.join("races.jsonl")
    }
}

struct StoreState {
    next_sample_id: u64,
    sample_count: usize,
    drivers: Vec<Driver>,
    races: Vec<Race>,
    latest: HashMap<DriverId, TelemetrySample>,
}

impl StoreState {
    /// Keep `sample` if it is the newest seen for its driver, ties going to the higher id
    fn record_latest(&mut self, sample: &TelemetrySample) {
        let newer = self.latest.get(&sample.driver_id).map_or(true, |current| {
            (sample.timestamp, sample.id) > (current.timestamp, current.id)
        });
        if newer {
            self.latest.insert(sample.driver_id, sample.clone());
        }
    }

    fn next_driver_id(&self) -> DriverId {
        self.drivers.iter().map(|d| d.id).max().unwrap_or(0) + 1
    }

    fn next_race_id(&self) -> u64 {
        self.races.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }
}

/// Record store persisting to JSON lines files
pub struct JsonlRecordStore {
    config: StoreConfig,
    state: Mutex<StoreState>,
}

impl JsonlRecordStore {
    /// Open the store, loading the catalog, the telemetry id watermark and
    /// the latest sample per driver
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(config.data_dir()).await?;

        for path in [
            config.drivers_path(),
            config.races_path(),
            config.telemetry_path(),
        ] {
            repair_torn_tail(&path).await?;
        }

        let drivers: Vec<Driver> = load_lines(&config.drivers_path()).await?;
        let races: Vec<Race> = load_lines(&config.races_path()).await?;

        let mut state = StoreState {
            next_sample_id: 1,
            sample_count: 0,
            drivers,
            races,
            latest: HashMap::new(),
        };
        scan_lines(&config.telemetry_path(), |sample: TelemetrySample| {
            state.sample_count += 1;
            state.next_sample_id = state.next_sample_id.max(sample.id + 1);
            state.record_latest(&sample);
        })
        .await?;

        info!(
            data_dir = %config.data_dir().display(),
            drivers = state.drivers.len(),
            races = state.races.len(),
            samples = state.sample_count,
            "Opened record store"
        );

        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl RecordStore for JsonlRecordStore {
    async fn insert_samples(&self, samples: Vec<NewSample>) -> StoreResult<Vec<TelemetrySample>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock().await;

        for sample in &samples {
            if !state.drivers.iter().any(|d| d.id == sample.driver_id) {
                return Err(StoreError::MissingReference {
                    entity: "driver",
                    id: sample.driver_id,
                });
            }
            if !state.races.iter().any(|r| r.id == sample.race_id) {
                return Err(StoreError::MissingReference {
                    entity: "race",
                    id: sample.race_id,
                });
            }
        }

        let first_id = state.next_sample_id;
        let stored: Vec<TelemetrySample> = samples
            .into_iter()
            .enumerate()
            .map(|(offset, s)| s.into_sample(first_id + offset as u64))
            .collect();

        append_lines(&self.config.telemetry_path(), &stored).await?;

        state.next_sample_id = first_id + stored.len() as u64;
        state.sample_count += stored.len();
        for sample in &stored {
            state.record_latest(sample);
        }

        debug!(count = stored.len(), first_id, "Appended telemetry batch");
        Ok(stored)
    }

    async fn latest_for_driver(&self, driver_id: DriverId) -> StoreResult<Option<TelemetrySample>> {
        Ok(self.state.lock().await.latest.get(&driver_id).cloned())
    }

    async fn sample_count(&self) -> StoreResult<usize> {
        Ok(self.state.lock().await.sample_count)
    }

    async fn insert_driver_if_absent(&self, driver: NewDriver) -> StoreResult<Upsert<Driver>> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .drivers
            .iter()
            .find(|d| d.driver_number == driver.driver_number)
        {
            return Ok(Upsert::Existing(existing.clone()));
        }

        let driver = driver.into_driver(state.next_driver_id());
        append_lines(&self.config.drivers_path(), std::slice::from_ref(&driver)).await?;
        state.drivers.push(driver.clone());

        Ok(Upsert::Inserted(driver))
    }

    async fn insert_race_if_absent(&self, race: NewRace) -> StoreResult<Upsert<Race>> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.races.iter().find(|r| r.name == race.name) {
            return Ok(Upsert::Existing(existing.clone()));
        }

        let race = race.into_race(state.next_race_id());
        append_lines(&self.config.races_path(), std::slice::from_ref(&race)).await?;
        state.races.push(race.clone());

        Ok(Upsert::Inserted(race))
    }

    async fn drivers(&self) -> StoreResult<Vec<Driver>> {
        Ok(self.state.lock().await.drivers.clone())
    }

    async fn races(&self) -> StoreResult<Vec<Race>> {
        Ok(self.state.lock().await.races.clone())
    }

    async fn find_driver_by_number(&self, driver_number: u32) -> StoreResult<Option<Driver>> {
        Ok(self
            .state
            .lock()
            .await
            .drivers
            .iter()
            .find(|d| d.driver_number == driver_number)
            .cloned())
    }
}

/// Serialize `rows` into one buffer and append it with a single fsync
async fn append_lines<T: Serialize>(path: &Path, rows: &[T]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut buffer = String::new();
    for row in rows {
        buffer.push_str(&serde_json::to_string(row)?);
        buffer.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(buffer.as_bytes()).await?;
    file.sync_all().await?;

    Ok(())
}

/// Cut everything after the last newline of `path`
///
/// An append interrupted mid-write leaves a partial row with no line
/// terminator; the next append would otherwise be glued onto it and both
/// rows would be lost to the parser.
async fn repair_torn_tail(path: &Path) -> StoreResult<()> {
    const CHUNK: u64 = 4096;

    if !fs::try_exists(path).await? {
        return Ok(());
    }

    let mut file = OpenOptions::new().read(true).write(true).open(path).await?;
    let len = file.metadata().await?.len();
    let mut buf = vec![0u8; CHUNK as usize];
    let mut end = len;

    let keep = loop {
        if end == 0 {
            break 0;
        }
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            break start + pos as u64 + 1;
        }
        end = start;
    };

    if keep < len {
        warn!(
            path = %path.display(),
            dropped_bytes = len - keep,
            "Truncating torn row at end of file"
        );
        file.set_len(keep).await?;
        file.sync_all().await?;
    }

    Ok(())
}

/// Load every parsable row of a JSONL file; unparsable lines are skipped
async fn load_lines<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    let mut rows = Vec::new();
    scan_lines(path, |row| rows.push(row)).await?;
    Ok(rows)
}

/// Stream the parsable rows of a JSONL file into `visit`, one at a time
async fn scan_lines<T, F>(path: &Path, mut visit: F) -> StoreResult<()>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    if !fs::try_exists(path).await? {
        return Ok(());
    }

    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut line_num = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_num += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(row) => visit(row),
            Err(e) => {
                warn!(path = %path.display(), line = line_num, error = %e, "Skipping unparsable row");
            }
        }
    }

    Ok(())
}
