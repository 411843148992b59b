//! Configuration for the replay server.
//!
//! Values are layered, lowest precedence first: built-in defaults, an
//! optional TOML file (`--config`), `REPLAY_*` environment variables and
//! finally command-line flags. Clap resolves the last two, so a flag always
//! beats its environment variable.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::store::StoreConfig;
use crate::types::ReplayPlan;
use crate::utils::parse_instant;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openf1.org/v1";
pub const DEFAULT_SESSION_KEY: u32 = 9472;
pub const DEFAULT_RACE_NAME: &str = "Bahrain Grand Prix";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} is not an RFC 3339 instant: {value}")]
    InvalidInstant { field: &'static str, value: String },

    #[error("{field} is not a socket address: {value}")]
    InvalidAddr { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} is too large")]
    TooLarge(&'static str),

    #[error("{0} must be a whole number of milliseconds")]
    SubMillisecond(&'static str),

    #[error("replay start {start} must be before replay end {end}")]
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub upstream_base_url: String,
    pub session_key: u32,
    pub replay_start: DateTime<Utc>,
    pub replay_end: DateTime<Utc>,
    /// Simulated time covered by one window
    pub window_size: Duration,
    /// Real time between windows
    pub tick_interval: Duration,
    /// Latest-value cache lifetime; `None` keeps entries until overwritten
    pub cache_ttl: Option<Duration>,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub api_addr: SocketAddr,
    pub live_addr: SocketAddr,
    pub broadcast_capacity: usize,
    pub log_level: String,
    pub race_name: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        // Bahrain 2024 race, first two hours
        let start = Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).single().unwrap_or_default();
        Self {
            upstream_base_url: DEFAULT_UPSTREAM_URL.to_string(),
            session_key: DEFAULT_SESSION_KEY,
            replay_start: start,
            replay_end: start + chrono::Duration::hours(2),
            window_size: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            cache_ttl: Some(Duration::from_secs(60)),
            request_timeout: Duration::from_secs(10),
            data_dir: PathBuf::from("data"),
            api_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            live_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            broadcast_capacity: 256,
            log_level: "info".to_string(),
            race_name: DEFAULT_RACE_NAME.to_string(),
        }
    }
}

impl ReplayConfig {
    /// Resolve the configuration for a parsed command line
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file over the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();
        config.apply_file(file)?;
        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig) -> Result<(), ConfigError> {
        let TomlConfig {
            general,
            upstream,
            replay,
            cache,
            server,
            storage,
        } = file;

        if let Some(level) = general.log_level {
            self.log_level = level;
        }
        if let Some(name) = general.race_name {
            self.race_name = name;
        }

        if let Some(url) = upstream.base_url {
            self.upstream_base_url = url;
        }
        if let Some(key) = upstream.session_key {
            self.session_key = key;
        }
        if let Some(ms) = upstream.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }

        if let Some(start) = replay.start {
            self.replay_start = instant("replay.start", &start)?;
        }
        if let Some(end) = replay.end {
            self.replay_end = instant("replay.end", &end)?;
        }
        if let Some(ms) = replay.window_ms {
            self.window_size = Duration::from_millis(ms);
        }
        if let Some(ms) = replay.tick_ms {
            self.tick_interval = Duration::from_millis(ms);
        }

        if cache.disabled_expiry {
            self.cache_ttl = None;
        } else if let Some(ms) = cache.ttl_ms {
            self.cache_ttl = Some(Duration::from_millis(ms));
        }

        if let Some(addr) = server.api_addr {
            self.api_addr = socket_addr("server.api_addr", &addr)?;
        }
        if let Some(addr) = server.live_addr {
            self.live_addr = socket_addr("server.live_addr", &addr)?;
        }
        if let Some(capacity) = server.broadcast_capacity {
            self.broadcast_capacity = capacity;
        }

        if let Some(dir) = storage.data_dir {
            self.data_dir = dir;
        }
        Ok(())
    }

    /// Apply flags and `REPLAY_*` variables, both surfaced through [`Cli`]
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(url) = &cli.upstream_url {
            self.upstream_base_url = url.clone();
        }
        if let Some(key) = cli.session_key {
            self.session_key = key;
        }
        if let Some(start) = &cli.start {
            self.replay_start = instant("start", start)?;
        }
        if let Some(end) = &cli.end {
            self.replay_end = instant("end", end)?;
        }
        if let Some(ms) = cli.window_ms {
            self.window_size = Duration::from_millis(ms);
        }
        if let Some(ms) = cli.tick_ms {
            self.tick_interval = Duration::from_millis(ms);
        }
        if cli.no_cache_expiry {
            self.cache_ttl = None;
        } else if let Some(ms) = cli.cache_ttl_ms {
            self.cache_ttl = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = cli.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(dir) = &cli.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(addr) = &cli.api_addr {
            self.api_addr = socket_addr("api_addr", addr)?;
        }
        if let Some(addr) = &cli.live_addr {
            self.live_addr = socket_addr("live_addr", addr)?;
        }
        if let Some(capacity) = cli.broadcast_capacity {
            self.broadcast_capacity = capacity;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if let Some(name) = &cli.race_name {
            self.race_name = name.clone();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size.is_zero() {
            return Err(ConfigError::Zero("window_size"));
        }
        if chrono::Duration::from_std(self.window_size).is_err() {
            return Err(ConfigError::TooLarge("window_size"));
        }
        if self.window_size.subsec_nanos() % NANOS_PER_MILLI != 0 {
            return Err(ConfigError::SubMillisecond("window_size"));
        }
        for (field, instant) in [
            ("replay.start", self.replay_start),
            ("replay.end", self.replay_end),
        ] {
            if instant.timestamp_subsec_nanos() % NANOS_PER_MILLI != 0 {
                return Err(ConfigError::SubMillisecond(field));
            }
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero("tick_interval"));
        }
        if self.cache_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(ConfigError::Zero("cache_ttl"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request_timeout"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Zero("broadcast_capacity"));
        }
        if self.replay_start >= self.replay_end {
            return Err(ConfigError::EmptyRange {
                start: self.replay_start,
                end: self.replay_end,
            });
        }
        Ok(())
    }

    /// Window plan for the configured range
    pub fn plan(&self) -> Option<ReplayPlan> {
        let window = chrono::Duration::from_std(self.window_size).ok()?;
        ReplayPlan::new(self.replay_start, self.replay_end, window)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir)
    }
}

/// Upstream range filters carry millisecond precision
const NANOS_PER_MILLI: u32 = 1_000_000;

fn instant(field: &'static str, value: &str) -> Result<DateTime<Utc>, ConfigError> {
    let instant = parse_instant(value).ok_or_else(|| ConfigError::InvalidInstant {
        field,
        value: value.to_string(),
    })?;
    if instant.timestamp_subsec_nanos() % NANOS_PER_MILLI != 0 {
        return Err(ConfigError::SubMillisecond(field));
    }
    Ok(instant)
}

fn socket_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddr {
        field,
        value: value.to_string(),
    })
}

/// Command-line flags; every value can also come from a `REPLAY_*` variable
#[derive(Parser, Debug, Default)]
#[command(name = "replay-server")]
#[command(about = "Replays historical car telemetry as a live feed")]
#[command(version)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long, env = "REPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Upstream API base URL
    #[arg(long, env = "REPLAY_UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    #[arg(long, env = "REPLAY_SESSION_KEY")]
    pub session_key: Option<u32>,

    /// Replay range start (RFC 3339)
    #[arg(long, env = "REPLAY_START")]
    pub start: Option<String>,

    /// Replay range end (RFC 3339, exclusive)
    #[arg(long, env = "REPLAY_END")]
    pub end: Option<String>,

    /// Simulated milliseconds per window
    #[arg(long, env = "REPLAY_WINDOW_MS")]
    pub window_ms: Option<u64>,

    /// Real milliseconds between windows
    #[arg(long, env = "REPLAY_TICK_MS")]
    pub tick_ms: Option<u64>,

    #[arg(long, env = "REPLAY_CACHE_TTL_MS")]
    pub cache_ttl_ms: Option<u64>,

    /// Keep cached values until overwritten
    #[arg(long, env = "REPLAY_NO_CACHE_EXPIRY")]
    pub no_cache_expiry: bool,

    #[arg(long, env = "REPLAY_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    #[arg(long, env = "REPLAY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Read endpoint listen address
    #[arg(long, env = "REPLAY_API_ADDR")]
    pub api_addr: Option<String>,

    /// Live feed listen address
    #[arg(long, env = "REPLAY_LIVE_ADDR")]
    pub live_addr: Option<String>,

    #[arg(long, env = "REPLAY_BROADCAST_CAPACITY")]
    pub broadcast_capacity: Option<usize>,

    #[arg(long, env = "REPLAY_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, env = "REPLAY_RACE_NAME")]
    pub race_name: Option<String>,
}

/// TOML file structure for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlConfig {
    general: GeneralToml,
    upstream: UpstreamToml,
    replay: ReplayToml,
    cache: CacheToml,
    server: ServerToml,
    storage: StorageToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneralToml {
    log_level: Option<String>,
    race_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamToml {
    base_url: Option<String>,
    session_key: Option<u32>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplayToml {
    start: Option<String>,
    end: Option<String>,
    window_ms: Option<u64>,
    tick_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheToml {
    ttl_ms: Option<u64>,
    disabled_expiry: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerToml {
    api_addr: Option<String>,
    live_addr: Option<String>,
    broadcast_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageToml {
    data_dir: Option<PathBuf>,
}
