//! Configuration for the media cache

use crate::error::{MediaError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// What to do when an admission cannot be made to fit the byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionMode {
    /// Evict oldest entries as far as possible, then admit anyway
    #[default]
    BestEffort,
    /// Refuse resources larger than the whole budget with a capacity error
    Strict,
}

impl FromStr for EvictionMode {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(EvictionMode::BestEffort),
            "strict" => Ok(EvictionMode::Strict),
            other => Err(MediaError::Config(format!("unknown eviction mode: {}", other))),
        }
    }
}

/// Configuration for the media cache manager
///
/// Sizes are estimates: media loaders rarely know the byte size of what
/// they prepared, so the ledger is fed from a duration × bitrate heuristic
/// whenever no exact size is reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCacheConfig {
    /// Byte budget for all cached resources
    pub max_bytes: u64,

    /// Hard ceiling for a single fetch; a loader still pending after this
    /// is force-failed with a timeout
    pub load_timeout: Duration,

    /// Buffered fraction (0.0 - 1.0) after which per-key progress stops
    pub ready_threshold: f64,

    /// Bitrate constant used by the size heuristic
    pub bytes_per_second: u64,

    /// Duration assumed when a loader reports neither size nor duration
    pub fallback_duration: Duration,

    /// Behaviour when an admission exceeds the budget
    pub eviction_mode: EvictionMode,

    /// Buffer size of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for MediaCacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 2 * GIB,
            load_timeout: Duration::from_secs(30),
            ready_threshold: 0.90,
            // ~1 MB per second of video
            bytes_per_second: MIB,
            fallback_duration: Duration::from_secs(60),
            eviction_mode: EvictionMode::BestEffort,
            event_capacity: 256,
        }
    }
}

impl MediaCacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> MediaCacheConfigBuilder {
        MediaCacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(MediaError::Config(
                "max_bytes must be greater than 0".to_string(),
            ));
        }

        if self.load_timeout.is_zero() {
            return Err(MediaError::Config(
                "load_timeout must be greater than 0".to_string(),
            ));
        }

        if !(self.ready_threshold > 0.0 && self.ready_threshold <= 1.0) {
            return Err(MediaError::Config(
                "ready_threshold must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.bytes_per_second == 0 {
            return Err(MediaError::Config(
                "bytes_per_second must be greater than 0".to_string(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(MediaError::Config(
                "event_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Defaults overlaid with `ADREEL_*` environment variables
    ///
    /// Recognized variables: `ADREEL_MAX_CACHE_BYTES`, `ADREEL_LOAD_TIMEOUT_SECS`,
    /// `ADREEL_READY_THRESHOLD`, `ADREEL_BYTES_PER_SECOND`, `ADREEL_EVICTION_MODE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("ADREEL_MAX_CACHE_BYTES") {
            config.max_bytes = parse_var("ADREEL_MAX_CACHE_BYTES", &v)?;
        }
        if let Some(v) = lookup("ADREEL_LOAD_TIMEOUT_SECS") {
            config.load_timeout = Duration::from_secs(parse_var("ADREEL_LOAD_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("ADREEL_READY_THRESHOLD") {
            config.ready_threshold = parse_var("ADREEL_READY_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("ADREEL_BYTES_PER_SECOND") {
            config.bytes_per_second = parse_var("ADREEL_BYTES_PER_SECOND", &v)?;
        }
        if let Some(v) = lookup("ADREEL_EVICTION_MODE") {
            config.eviction_mode = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MediaError::Config(format!("invalid value for {}: {:?}", name, value)))
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct MediaCacheConfigBuilder {
    max_bytes: Option<u64>,
    load_timeout: Option<Duration>,
    ready_threshold: Option<f64>,
    bytes_per_second: Option<u64>,
    fallback_duration: Option<Duration>,
    eviction_mode: Option<EvictionMode>,
    event_capacity: Option<usize>,
}

impl MediaCacheConfigBuilder {
    /// Set the byte budget
    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = Some(bytes);
        self
    }

    /// Set the per-fetch timeout ceiling
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Set the readiness threshold (0.0 - 1.0]
    pub fn ready_threshold(mut self, threshold: f64) -> Self {
        self.ready_threshold = Some(threshold);
        self
    }

    /// Set the bitrate constant for size estimation
    pub fn bytes_per_second(mut self, rate: u64) -> Self {
        self.bytes_per_second = Some(rate);
        self
    }

    pub fn fallback_duration(mut self, duration: Duration) -> Self {
        self.fallback_duration = Some(duration);
        self
    }

    pub fn eviction_mode(mut self, mode: EvictionMode) -> Self {
        self.eviction_mode = Some(mode);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> MediaCacheConfig {
        let defaults = MediaCacheConfig::default();

        MediaCacheConfig {
            max_bytes: self.max_bytes.unwrap_or(defaults.max_bytes),
            load_timeout: self.load_timeout.unwrap_or(defaults.load_timeout),
            ready_threshold: self.ready_threshold.unwrap_or(defaults.ready_threshold),
            bytes_per_second: self.bytes_per_second.unwrap_or(defaults.bytes_per_second),
            fallback_duration: self
                .fallback_duration
                .unwrap_or(defaults.fallback_duration),
            eviction_mode: self.eviction_mode.unwrap_or(defaults.eviction_mode),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        }
    }
}

/// Preset configurations for common deployments
impl MediaCacheConfig {
    /// Kiosk or low-memory player
    pub fn small() -> Self {
        Self {
            max_bytes: 256 * MIB,
            load_timeout: Duration::from_secs(15),
            ..Default::default()
        }
    }

    /// Long playlists on a well-provisioned host
    pub fn large() -> Self {
        Self {
            max_bytes: 8 * GIB,
            load_timeout: Duration::from_secs(60),
            ..Default::default()
        }
    }
}
