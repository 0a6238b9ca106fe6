//! Pluggable prepare strategies
//!
//! A [`MediaLoader`] turns a resource key into a playable handle. The cache
//! never looks inside the handle; it only owns its lifecycle and hands it
//! back to [`MediaLoader::release`] when the entry leaves the store.

pub mod http;

use crate::cache::types::{ResourceKey, SizeHint};
use crate::error::Result;
use crate::events::{Emitter, MediaEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

pub use http::{DownloadedMedia, HttpLoader};

/// A prepared resource and what the loader knows about its size
#[derive(Debug, Clone)]
pub struct Prepared<H> {
    pub handle: H,
    pub size_hint: SizeHint,
}

impl<H> Prepared<H> {
    pub fn new(handle: H, size_hint: SizeHint) -> Self {
        Self { handle, size_hint }
    }
}

/// Opaque async resource loader
///
/// `load` resolves once the resource is playable without further stalls,
/// which may be before every byte has arrived. Failures should be reported
/// as `Load` (unreachable or malformed) or `Aborted` (cancelled by the
/// environment); timeouts are imposed by the cache, not the loader.
#[async_trait]
pub trait MediaLoader: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    async fn load(&self, key: &ResourceKey, progress: ProgressSink) -> Result<Prepared<Self::Handle>>;

    /// Called once for every handle leaving the store
    fn release(&self, _key: &ResourceKey, _handle: &Self::Handle) {}
}

#[derive(Default)]
struct SinkState {
    last: Option<f64>,
    ready: bool,
}

struct SinkInner {
    key: ResourceKey,
    index: usize,
    total: usize,
    ready_threshold: f64,
    emitter: Option<Emitter>,
    state: Mutex<SinkState>,
}

/// Per-fetch progress reporter handed to loaders
///
/// Reports are clamped to `0.0..=1.0`, non-increasing values are dropped,
/// and nothing is emitted once the readiness threshold has been crossed.
#[derive(Clone)]
pub struct ProgressSink {
    inner: Arc<SinkInner>,
}

impl ProgressSink {
    pub(crate) fn new(
        key: ResourceKey,
        index: usize,
        total: usize,
        ready_threshold: f64,
        emitter: Emitter,
    ) -> Self {
        Self::build(key, index, total, ready_threshold, Some(emitter))
    }

    /// A sink that only tracks state, for driving a loader outside a cache
    pub fn detached(key: impl Into<ResourceKey>, ready_threshold: f64) -> Self {
        Self::build(key.into(), 0, 1, ready_threshold, None)
    }

    fn build(
        key: ResourceKey,
        index: usize,
        total: usize,
        ready_threshold: f64,
        emitter: Option<Emitter>,
    ) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                key,
                index,
                total,
                ready_threshold,
                emitter,
                state: Mutex::new(SinkState::default()),
            }),
        }
    }

    /// Report the loaded fraction
    pub fn report(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        {
            let mut state = self.inner.state.lock();
            if state.ready || state.last.is_some_and(|last| fraction <= last) {
                return;
            }
            state.last = Some(fraction);
            if fraction >= self.inner.ready_threshold {
                state.ready = true;
            }
        }

        self.emit(fraction);
    }

    /// Report progress as bytes received out of an optional total
    pub fn report_bytes(&self, received: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|t| *t > 0) {
            self.report(received as f64 / total as f64);
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Whether the readiness threshold has been crossed
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().ready
    }

    pub fn last_fraction(&self) -> Option<f64> {
        self.inner.state.lock().last
    }

    /// Mark the fetch as fully usable, emitting a final 1.0 if readiness had
    /// not been reported yet
    pub(crate) fn finish(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.ready {
                return;
            }
            state.ready = true;
            state.last = Some(1.0);
        }
        self.emit(1.0);
    }

    fn emit(&self, fraction: f64) {
        if let Some(emitter) = &self.inner.emitter {
            emitter.emit(MediaEvent::Progress {
                index: self.inner.index,
                total: self.inner.total,
                key: self.inner.key.clone(),
                fraction,
            });
        }
    }
}
