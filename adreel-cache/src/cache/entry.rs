//! Cache entry for a prepared media resource

use crate::cache::types::ResourceKey;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A prepared resource held by the store
///
/// `inserted_at_seq` orders eviction; the wall-clock timestamp is kept for
/// diagnostics only.
#[derive(Debug, Clone)]
pub struct CacheEntry<H> {
    /// The resource key
    pub key: ResourceKey,

    /// Opaque playable handle produced by the loader
    pub handle: H,

    /// Recorded size estimate; the ledger is decremented by exactly this
    pub size_estimate_bytes: u64,

    /// Monotonic admission counter
    pub inserted_at_seq: u64,

    /// When the entry was admitted
    pub inserted_at: DateTime<Utc>,
}

impl<H> CacheEntry<H> {
    pub fn new(key: ResourceKey, handle: H, size_estimate_bytes: u64, inserted_at_seq: u64) -> Self {
        Self {
            key,
            handle,
            size_estimate_bytes,
            inserted_at_seq,
            inserted_at: Utc::now(),
        }
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.inserted_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}
