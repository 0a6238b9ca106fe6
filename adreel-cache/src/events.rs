//! Progress, completion and error notifications
//!
//! Events are delivered two ways: a broadcast [`EventBus`] for any number of
//! subscribers, and three optional [`Callbacks`] slots for the common
//! "one UI component listens" case.

use crate::cache::types::ResourceKey;
use crate::error::MediaError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything the cache reports while it works
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// A fetch for `key` has started
    Started {
        index: usize,
        total: usize,
        key: ResourceKey,
    },

    /// Loaded fraction (0.0 - 1.0), non-decreasing per key
    Progress {
        index: usize,
        total: usize,
        key: ResourceKey,
        fraction: f64,
    },

    /// The loader declared the resource playable
    Ready {
        index: usize,
        total: usize,
        key: ResourceKey,
    },

    /// Resource admitted into the store
    Cached { key: ResourceKey, size_bytes: u64 },

    /// Resource evicted under size pressure
    Evicted { key: ResourceKey, size_bytes: u64 },

    /// A single key failed; siblings are unaffected
    Error { key: ResourceKey, cause: MediaError },

    /// Terminal batch event: every key succeeded
    Complete,

    /// Terminal batch event: at least one key failed
    BatchFailed { cause: MediaError, failed: usize },
}

impl MediaEvent {
    /// Whether this event ends a batch
    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaEvent::Complete | MediaEvent::BatchFailed { .. })
    }
}

/// Broadcast channel for [`MediaEvent`]s
///
/// `publish()` is sync. If there are no subscribers, events are silently dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<MediaEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: MediaEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events.
    ///
    /// Slow subscribers receive `RecvError::Lagged(n)` instead of blocking producers.
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.tx.subscribe()
    }
}

pub type ProgressCallback = Arc<dyn Fn(usize, usize, f64) + Send + Sync>;
pub type CompleteCallback = Arc<dyn Fn() + Send + Sync>;
/// Receives the error and the failing key, or `None` for the batch-level error
pub type ErrorCallback = Arc<dyn Fn(&MediaError, Option<&str>) + Send + Sync>;

#[derive(Default)]
struct Slots {
    progress: Option<ProgressCallback>,
    complete: Option<CompleteCallback>,
    error: Option<ErrorCallback>,
}

/// Callback slots; each setter replaces the previous registration
#[derive(Default)]
pub struct Callbacks {
    slots: Mutex<Slots>,
}

impl Callbacks {
    pub fn set_on_progress<F>(&self, f: F)
    where
        F: Fn(usize, usize, f64) + Send + Sync + 'static,
    {
        self.slots.lock().progress = Some(Arc::new(f));
    }

    pub fn set_on_complete<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.slots.lock().complete = Some(Arc::new(f));
    }

    pub fn set_on_error<F>(&self, f: F)
    where
        F: Fn(&MediaError, Option<&str>) + Send + Sync + 'static,
    {
        self.slots.lock().error = Some(Arc::new(f));
    }

    /// Drop every registration
    pub fn clear(&self) {
        *self.slots.lock() = Slots::default();
    }

    /// Invoke the slot matching `event`, if any
    ///
    /// The slot is cloned out before the call so a callback may re-register.
    pub fn dispatch(&self, event: &MediaEvent) {
        match event {
            MediaEvent::Progress {
                index,
                total,
                fraction,
                ..
            } => {
                let cb = self.slots.lock().progress.clone();
                if let Some(cb) = cb {
                    cb(*index, *total, *fraction);
                }
            }
            MediaEvent::Complete => {
                let cb = self.slots.lock().complete.clone();
                if let Some(cb) = cb {
                    cb();
                }
            }
            MediaEvent::Error { key, cause } => {
                let cb = self.slots.lock().error.clone();
                if let Some(cb) = cb {
                    cb(cause, Some(key));
                }
            }
            MediaEvent::BatchFailed { cause, .. } => {
                let cb = self.slots.lock().error.clone();
                if let Some(cb) = cb {
                    cb(cause, None);
                }
            }
            _ => {}
        }
    }
}

/// Bus and callbacks behind one `emit`
#[derive(Clone)]
pub struct Emitter {
    bus: EventBus,
    callbacks: Arc<Callbacks>,
}

impl Emitter {
    pub fn new(capacity: usize) -> Self {
        Self {
            bus: EventBus::new(capacity),
            callbacks: Arc::new(Callbacks::default()),
        }
    }

    pub fn emit(&self, event: MediaEvent) {
        self.callbacks.dispatch(&event);
        self.bus.publish(event);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }
}
