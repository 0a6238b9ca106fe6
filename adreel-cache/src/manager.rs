//! Media cache manager: deduplicated fetches, admission and batch preloads
//!
//! All shared state lives behind one lock. The cache check and the
//! registration of a new in-flight fetch happen under the same guard, so a
//! second caller can never slip in between "not cached" and "fetch started".

use crate::batch::{BatchGuard, BatchOutcome, BatchReport};
use crate::cache::{
    config::MediaCacheConfig,
    entry::CacheEntry,
    size::estimate_size_bytes,
    store::{Admission, MediaStore},
    types::{MediaCacheStats, ResourceKey},
};
use crate::error::{MediaError, Result};
use crate::events::{Emitter, MediaEvent};
use crate::loader::{MediaLoader, Prepared, ProgressSink};
use crate::pipeline;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

type SharedFetch<H> = Shared<BoxFuture<'static, Result<H>>>;

/// A pending fetch; exactly one per key
struct InFlight<H> {
    id: u64,
    fetch: SharedFetch<H>,
    abort: AbortHandle,
}

struct State<H> {
    store: MediaStore<H>,
    in_flight: HashMap<ResourceKey, InFlight<H>>,
}

struct Inner<L: MediaLoader> {
    config: MediaCacheConfig,
    loader: L,
    state: RwLock<State<L::Handle>>,
    emitter: Emitter,
    batch_running: AtomicBool,
    next_fetch_id: AtomicU64,
}

/// Bounded pool of prepared media resources keyed by URL
///
/// Cloning is cheap and every clone drives the same cache.
pub struct MediaCacheManager<L: MediaLoader> {
    inner: Arc<Inner<L>>,
}

impl<L: MediaLoader> Clone for MediaCacheManager<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: MediaLoader> MediaCacheManager<L> {
    /// Create a manager with a validated configuration
    pub fn new(config: MediaCacheConfig, loader: L) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing media cache (budget {} bytes, load timeout {:?})",
            config.max_bytes, config.load_timeout
        );

        let state = State {
            store: MediaStore::from_config(&config),
            in_flight: HashMap::new(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                emitter: Emitter::new(config.event_capacity),
                config,
                loader,
                state: RwLock::new(state),
                batch_running: AtomicBool::new(false),
                next_fetch_id: AtomicU64::new(0),
            }),
        })
    }

    /// Resolve one resource, from cache if possible
    pub async fn request_one(&self, key: &str) -> Result<L::Handle> {
        self.request_indexed(key, 0, 1).await
    }

    /// Preload every key concurrently; a no-op while another batch runs
    pub async fn preload_all(&self, keys: &[ResourceKey]) -> BatchOutcome {
        let Some(_guard) = BatchGuard::acquire(&self.inner.batch_running) else {
            info!("Preload already in progress, ignoring new batch");
            return BatchOutcome::AlreadyRunning;
        };

        let total = keys.len();
        let mut report = BatchReport::new(total);
        info!(batch = %report.id, "Starting media preload for {} resources", total);

        let results = join_all(keys.iter().enumerate().map(|(index, key)| async move {
            (key, self.request_indexed(key, index, total).await)
        }))
        .await;

        for (key, result) in results {
            match result {
                Ok(_) => report.succeeded.push(key.clone()),
                Err(e) => report.failed.push((key.clone(), e)),
            }
        }

        match report.first_error().cloned() {
            None => {
                info!(batch = %report.id, "All {} resources preloaded", total);
                self.inner.emitter.emit(MediaEvent::Complete);
            }
            Some(cause) => {
                warn!(
                    batch = %report.id,
                    "Preload finished with {} of {} failures",
                    report.failed.len(),
                    total
                );
                self.inner.emitter.emit(MediaEvent::BatchFailed {
                    cause,
                    failed: report.failed.len(),
                });
            }
        }

        BatchOutcome::Finished(report)
    }

    async fn request_indexed(&self, key: &str, index: usize, total: usize) -> Result<L::Handle> {
        let (fetch, joined) = {
            let mut state = self.inner.state.write().await;

            if let Some(entry) = state.store.get(key) {
                debug!("Media already cached: {}", key);
                let handle = entry.handle.clone();
                drop(state);
                self.report_done(key, index, total);
                self.inner.emitter.emit(MediaEvent::Ready {
                    index,
                    total,
                    key: key.to_string(),
                });
                return Ok(handle);
            }

            if let Some(flight) = state.in_flight.get(key) {
                debug!("Media already loading: {}", key);
                (flight.fetch.clone(), true)
            } else {
                let flight = self.start_fetch(key.to_string(), index, total);
                let fetch = flight.fetch.clone();
                state.in_flight.insert(key.to_string(), flight);
                (fetch, false)
            }
        };

        let result = fetch.await;
        // the fetch owner reports progress under its own index only
        if joined && result.is_ok() {
            self.report_done(key, index, total);
        }
        result
    }

    fn report_done(&self, key: &str, index: usize, total: usize) {
        self.inner.emitter.emit(MediaEvent::Progress {
            index,
            total,
            key: key.to_string(),
            fraction: 1.0,
        });
    }

    fn start_fetch(&self, key: ResourceKey, index: usize, total: usize) -> InFlight<L::Handle> {
        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(Arc::clone(&self.inner).fetch(id, key.clone(), index, total));
        let abort = task.abort_handle();

        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(MediaError::aborted(key)),
                Err(e) => Err(MediaError::Other(format!("fetch task for {} failed: {}", key, e))),
            }
        }
        .boxed()
        .shared();

        InFlight { id, fetch, abort }
    }

    /// Whether `key` has a live cache entry
    pub async fn is_cached(&self, key: &str) -> bool {
        self.inner.state.read().await.store.has(key)
    }

    /// Whether a fetch for `key` is pending
    pub async fn is_loading(&self, key: &str) -> bool {
        self.inner.state.read().await.in_flight.contains_key(key)
    }

    /// Cached handle for `key`, without triggering a fetch
    pub async fn get_cached(&self, key: &str) -> Option<L::Handle> {
        let state = self.inner.state.read().await;
        state.store.get(key).map(|entry| entry.handle.clone())
    }

    /// Get cache statistics
    pub async fn stats(&self) -> MediaCacheStats {
        let state = self.inner.state.read().await;
        let mut stats = state.store.stats();
        stats.in_flight = state.in_flight.len();
        stats
    }

    /// Release every cached entry; pending fetches keep running
    pub async fn clear(&self) -> usize {
        let cleared = self.inner.state.write().await.store.clear();
        let count = cleared.len();
        self.inner.release_all(cleared, false);
        info!("Cleared {} media entries", count);
        count
    }

    /// Release one cached entry
    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.inner.state.write().await.store.remove(key);
        match removed {
            Some(entry) => {
                self.inner.release_all(vec![entry], false);
                true
            }
            None => false,
        }
    }

    /// Change the byte budget; takes effect at the next admission
    pub async fn set_max_bytes(&self, max_bytes: u64) {
        self.inner.state.write().await.store.set_max_bytes(max_bytes);
        debug!("Media cache budget set to {} bytes", max_bytes);
    }

    /// Abort pending fetches, release every entry and drop callbacks
    pub async fn dispose(&self) {
        let cleared = {
            let mut state = self.inner.state.write().await;
            for (_, flight) in state.in_flight.drain() {
                flight.abort.abort();
            }
            state.store.clear()
        };
        self.inner.release_all(cleared, false);
        self.inner.emitter.callbacks().clear();
        info!("Media cache disposed");
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.inner.emitter.bus().subscribe()
    }

    /// Register the progress callback `(index, total, fraction)`
    pub fn on_progress<F>(&self, f: F)
    where
        F: Fn(usize, usize, f64) + Send + Sync + 'static,
    {
        self.inner.emitter.callbacks().set_on_progress(f);
    }

    /// Register the callback for a batch where every key succeeded
    pub fn on_complete<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.emitter.callbacks().set_on_complete(f);
    }

    /// Register the error callback; the key is `None` for the batch-level error
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&MediaError, Option<&str>) + Send + Sync + 'static,
    {
        self.inner.emitter.callbacks().set_on_error(f);
    }

    pub fn is_batch_running(&self) -> bool {
        self.inner.batch_running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &MediaCacheConfig {
        &self.inner.config
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }
}

impl<L: MediaLoader> Inner<L> {
    async fn fetch(self: Arc<Self>, id: u64, key: ResourceKey, index: usize, total: usize) -> Result<L::Handle> {
        info!("Preloading media {}/{}: {}", index + 1, total, key);
        self.emitter.emit(MediaEvent::Started {
            index,
            total,
            key: key.clone(),
        });

        let sink = ProgressSink::new(
            key.clone(),
            index,
            total,
            self.config.ready_threshold,
            self.emitter.clone(),
        );
        let outcome = AssertUnwindSafe(pipeline::prepare(
            &self.loader,
            &key,
            sink,
            self.config.load_timeout,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(MediaError::Other(format!(
                "loader panicked while preparing {}: {}",
                key,
                panic_message(panic.as_ref())
            )))
        });

        self.settle(id, key, index, total, outcome).await
    }

    /// Single settlement point of a fetch: drop the in-flight entry, then
    /// admit on success or report on failure
    async fn settle(
        &self,
        id: u64,
        key: ResourceKey,
        index: usize,
        total: usize,
        outcome: Result<Prepared<L::Handle>>,
    ) -> Result<L::Handle> {
        let mut state = self.state.write().await;

        let current = state.in_flight.get(&key).is_some_and(|flight| flight.id == id);
        if current {
            state.in_flight.remove(&key);
        }

        let prepared = match outcome {
            Ok(prepared) => prepared,
            Err(e) => {
                drop(state);
                warn!("Failed to preload media {}/{}: {}", index + 1, total, e);
                self.emitter.emit(MediaEvent::Error { key, cause: e.clone() });
                return Err(e);
            }
        };

        if !current {
            // the fetch was discarded while pending; keep nothing
            drop(state);
            self.loader.release(&key, &prepared.handle);
            return Ok(prepared.handle);
        }

        let size = estimate_size_bytes(&prepared.size_hint, &self.config);
        let handle = prepared.handle.clone();

        match state.store.admit(key.clone(), prepared.handle, size) {
            Ok(Admission::Admitted { evicted }) => {
                drop(state);
                self.release_all(evicted, true);
                info!("Media {}/{} ready: {}", index + 1, total, key);
                self.emitter.emit(MediaEvent::Ready {
                    index,
                    total,
                    key: key.clone(),
                });
                self.emitter.emit(MediaEvent::Cached { key, size_bytes: size });
                Ok(handle)
            }
            Ok(Admission::AlreadyCached) => {
                let existing = state.store.get(&key).map(|entry| entry.handle.clone());
                drop(state);
                self.loader.release(&key, &handle);
                Ok(existing.unwrap_or(handle))
            }
            Err(e) => {
                drop(state);
                self.loader.release(&key, &handle);
                warn!("Refused to cache media {}: {}", key, e);
                self.emitter.emit(MediaEvent::Error { key, cause: e.clone() });
                Err(e)
            }
        }
    }

    fn release_all(&self, entries: Vec<CacheEntry<L::Handle>>, evicted: bool) {
        for entry in entries {
            self.loader.release(&entry.key, &entry.handle);
            if evicted {
                self.emitter.emit(MediaEvent::Evicted {
                    key: entry.key,
                    size_bytes: entry.size_estimate_bytes,
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
