//! Scripted collaborators for scheduler tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::fetcher::{FetchError, WindowFetcher};
use crate::ingest::{BatchSink, IngestError, IngestReport};
use crate::store::StoreError;
use crate::types::{RawRecord, ReplayWindow};

type Script = Box<dyn Fn(usize, ReplayWindow) -> Result<Vec<RawRecord>, FetchError> + Send + Sync>;

pub fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap() + chrono::Duration::seconds(second as i64)
}

pub fn raw_at(instant: DateTime<Utc>) -> RawRecord {
    RawRecord {
        speed: Some(200.0),
        throttle: Some(90.0),
        brake: Some(0.0),
        n_gear: Some(6),
        date: Some(instant.to_rfc3339()),
        driver_number: Some(1),
        ..Default::default()
    }
}

/// Fetcher answering from a closure and recording every window asked for
pub struct ScriptedFetcher {
    script: Script,
    windows: Mutex<Vec<ReplayWindow>>,
    delay: Option<std::time::Duration>,
    in_flight: Mutex<(usize, usize)>,
}

impl ScriptedFetcher {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(usize, ReplayWindow) -> Result<Vec<RawRecord>, FetchError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            windows: Mutex::new(Vec::new()),
            delay: None,
            in_flight: Mutex::new((0, 0)),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_, _| Ok(Vec::new()))
    }

    /// Make every fetch take `delay` of (tokio) time
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn windows(&self) -> Vec<ReplayWindow> {
        self.windows.lock().clone()
    }

    /// Highest number of fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.lock().1
    }
}

#[async_trait]
impl WindowFetcher for ScriptedFetcher {
    async fn fetch(&self, window: ReplayWindow) -> Result<Vec<RawRecord>, FetchError> {
        let index = {
            let mut windows = self.windows.lock();
            windows.push(window);
            windows.len() - 1
        };
        {
            let mut flight = self.in_flight.lock();
            flight.0 += 1;
            flight.1 = flight.1.max(flight.0);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.lock().0 -= 1;
        (self.script)(index, window)
    }
}

/// Sink recording each window it was handed
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(ReplayWindow, usize)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(ReplayWindow, usize)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn ingest_window(
        &self,
        window: ReplayWindow,
        records: Vec<RawRecord>,
    ) -> Result<IngestReport, IngestError> {
        self.calls.lock().push((window, records.len()));
        if self.fail {
            return Err(IngestError::Persistence(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store unavailable",
            ))));
        }
        Ok(IngestReport {
            received: records.len(),
            persisted: records.len(),
            ..Default::default()
        })
    }
}
