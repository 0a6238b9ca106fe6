//! Core type definitions for the media cache

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Resource key - the canonical URL of a media asset, used verbatim
pub type ResourceKey = String;

/// What a loader knows about the size of a prepared resource
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SizeHint {
    /// Authoritative byte size, when the loader actually holds the bytes
    pub exact_bytes: Option<u64>,

    /// Media duration, when only playback metadata is known
    pub duration: Option<Duration>,
}

impl SizeHint {
    pub fn exact(bytes: u64) -> Self {
        Self {
            exact_bytes: Some(bytes),
            duration: None,
        }
    }

    pub fn duration(duration: Duration) -> Self {
        Self {
            exact_bytes: None,
            duration: Some(duration),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Snapshot of the cache ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaCacheStats {
    /// Number of cached resources
    pub count: usize,

    /// Sum of recorded size estimates
    pub total_bytes: u64,

    /// Byte budget
    pub max_bytes: u64,

    /// `total_bytes / max_bytes` as a percentage (approximate)
    pub usage_percent: f64,

    pub formatted_total: String,
    pub formatted_max: String,

    /// Fetches currently pending
    pub in_flight: usize,

    /// Entries evicted under size pressure since construction
    pub evictions: u64,
}

impl fmt::Display for MediaCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MediaCacheStats {{ count: {}, used: {} / {} ({:.1}%), in_flight: {}, evictions: {} }}",
            self.count,
            self.formatted_total,
            self.formatted_max,
            self.usage_percent,
            self.in_flight,
            self.evictions
        )
    }
}
