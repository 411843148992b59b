//! HTTP client for the OpenF1 API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{CatalogSource, FetchError, UpstreamError, WindowFetcher};
use crate::types::{RawRecord, ReplayWindow, UpstreamDriver, UpstreamSession};
use crate::utils::format_instant;

/// Fetcher bound to one upstream session
pub struct OpenF1Fetcher {
    client: Client,
    base_url: String,
    session_key: u32,
}

impl OpenF1Fetcher {
    /// Create a fetcher; `timeout` bounds each request end to end
    pub fn new(
        base_url: impl Into<String>,
        session_key: u32,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_key,
        })
    }

    pub fn session_key(&self) -> u32 {
        self.session_key
    }

    /// URL of the car-data query for `window`
    pub fn car_data_url(&self, window: &ReplayWindow) -> String {
        format!(
            "{}/car_data?session_key={}&date>={}&date<{}",
            self.base_url,
            self.session_key,
            urlencoding::encode(&format_instant(window.start())),
            urlencoding::encode(&format_instant(window.end())),
        )
    }

    fn drivers_url(&self) -> String {
        format!("{}/drivers?session_key={}", self.base_url, self.session_key)
    }

    fn sessions_url(&self) -> String {
        format!("{}/sessions?session_key={}", self.base_url, self.session_key)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        debug!(url, "Fetching upstream");

        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else if err.is_decode() {
        UpstreamError::Decode(err.to_string())
    } else {
        UpstreamError::Network(err.to_string())
    }
}

#[async_trait]
impl WindowFetcher for OpenF1Fetcher {
    async fn fetch(&self, window: ReplayWindow) -> Result<Vec<RawRecord>, FetchError> {
        self.get_json(&self.car_data_url(&window))
            .await
            .map_err(|cause| FetchError::new(window, cause))
    }
}

#[async_trait]
impl CatalogSource for OpenF1Fetcher {
    async fn drivers(&self) -> Result<Vec<UpstreamDriver>, UpstreamError> {
        self.get_json(&self.drivers_url()).await
    }

    async fn session(&self) -> Result<Option<UpstreamSession>, UpstreamError> {
        let sessions: Vec<UpstreamSession> = self.get_json(&self.sessions_url()).await?;
        Ok(sessions.into_iter().next())
    }
}
