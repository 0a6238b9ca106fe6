//! Byte-budgeted media store with FIFO eviction
//!
//! The store is a plain synchronous structure. It never releases handles
//! itself: every entry that leaves through eviction, removal or `clear` is
//! handed back to the caller, which owns the release step.

use crate::cache::{
    config::{EvictionMode, MediaCacheConfig},
    entry::CacheEntry,
    size::{format_bytes, usage_percent},
    types::{MediaCacheStats, ResourceKey},
};
use crate::error::{MediaError, Result};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Outcome of [`MediaStore::admit`]
#[derive(Debug)]
pub enum Admission<H> {
    /// Key was already present; nothing changed
    AlreadyCached,

    /// Entry was inserted after evicting `evicted` (oldest first)
    Admitted { evicted: Vec<CacheEntry<H>> },
}

impl<H> Admission<H> {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Mapping from resource key to prepared handle plus the size ledger
pub struct MediaStore<H> {
    /// Main storage: key -> entry
    entries: HashMap<ResourceKey, CacheEntry<H>>,

    /// Admission order; the front is always the smallest sequence number
    fifo: VecDeque<ResourceKey>,

    /// Next admission sequence number
    next_seq: u64,

    /// Sum of recorded estimates over live entries
    total_bytes: u64,

    max_bytes: u64,
    eviction_mode: EvictionMode,
    evictions: u64,
}

impl<H> MediaStore<H> {
    pub fn new(max_bytes: u64, eviction_mode: EvictionMode) -> Self {
        Self {
            entries: HashMap::new(),
            fifo: VecDeque::new(),
            next_seq: 0,
            total_bytes: 0,
            max_bytes,
            eviction_mode,
            evictions: 0,
        }
    }

    pub fn from_config(config: &MediaCacheConfig) -> Self {
        Self::new(config.max_bytes, config.eviction_mode)
    }

    /// Admit a prepared resource, evicting the oldest entries if the budget
    /// would be exceeded
    ///
    /// Admitting a key that is already present is a no-op. In best-effort
    /// mode an entry that still does not fit after the store is emptied is
    /// admitted anyway.
    pub fn admit(&mut self, key: ResourceKey, handle: H, size_bytes: u64) -> Result<Admission<H>> {
        if self.entries.contains_key(&key) {
            debug!("Already cached, ignoring admission: {}", key);
            return Ok(Admission::AlreadyCached);
        }

        if self.eviction_mode == EvictionMode::Strict && size_bytes > self.max_bytes {
            return Err(MediaError::Capacity {
                required_bytes: size_bytes,
                max_bytes: self.max_bytes,
            });
        }

        let evicted = if self.total_bytes.saturating_add(size_bytes) > self.max_bytes {
            self.evict_to_fit(size_bytes)
        } else {
            Vec::new()
        };

        if self.total_bytes.saturating_add(size_bytes) > self.max_bytes {
            warn!(
                "Admitting {} over budget ({} + {} > {})",
                key,
                format_bytes(self.total_bytes),
                format_bytes(size_bytes),
                format_bytes(self.max_bytes)
            );
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        debug!("Caching {} ({}, seq {})", key, format_bytes(size_bytes), seq);
        self.fifo.push_back(key.clone());
        self.entries
            .insert(key.clone(), CacheEntry::new(key, handle, size_bytes, seq));
        self.total_bytes = self.total_bytes.saturating_add(size_bytes);

        Ok(Admission::Admitted { evicted })
    }

    /// Remove entries in admission order until `required_bytes` fit in the
    /// budget or the store is empty
    pub fn evict_to_fit(&mut self, required_bytes: u64) -> Vec<CacheEntry<H>> {
        let mut evicted = Vec::new();

        while self.max_bytes.saturating_sub(self.total_bytes) < required_bytes {
            let Some(key) = self.fifo.pop_front() else {
                break;
            };
            if let Some(entry) = self.take_entry(&key) {
                debug!("Evicting cached media: {}", key);
                self.evictions += 1;
                evicted.push(entry);
            }
        }

        evicted
    }

    /// Check if a key is cached
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Get a cached entry
    pub fn get(&self, key: &str) -> Option<&CacheEntry<H>> {
        self.entries.get(key)
    }

    /// Remove a specific entry
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<H>> {
        let entry = self.take_entry(key)?;
        self.fifo.retain(|k| k != key);
        Some(entry)
    }

    /// Drop every entry, returning them oldest first
    pub fn clear(&mut self) -> Vec<CacheEntry<H>> {
        let mut cleared = Vec::with_capacity(self.entries.len());
        while let Some(key) = self.fifo.pop_front() {
            if let Some(entry) = self.entries.remove(&key) {
                cleared.push(entry);
            }
        }
        self.entries.clear();
        self.total_bytes = 0;
        cleared
    }

    /// Change the budget; takes effect at the next admission
    pub fn set_max_bytes(&mut self, max_bytes: u64) {
        self.max_bytes = max_bytes;
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in admission order, oldest first
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.fifo.iter()
    }

    /// Ledger snapshot; `in_flight` is left at zero for the caller to fill
    pub fn stats(&self) -> MediaCacheStats {
        MediaCacheStats {
            count: self.entries.len(),
            total_bytes: self.total_bytes,
            max_bytes: self.max_bytes,
            usage_percent: usage_percent(self.total_bytes, self.max_bytes),
            formatted_total: format_bytes(self.total_bytes),
            formatted_max: format_bytes(self.max_bytes),
            in_flight: 0,
            evictions: self.evictions,
        }
    }

    fn take_entry(&mut self, key: &str) -> Option<CacheEntry<H>> {
        let entry = self.entries.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size_estimate_bytes);
        Some(entry)
    }
}
