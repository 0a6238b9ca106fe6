//! Batch preload bookkeeping

use crate::cache::types::ResourceKey;
use crate::error::MediaError;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Per-key outcome of one `preload_all` call
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Identifier used in logs for this batch
    pub id: Uuid,

    /// Number of submitted keys
    pub total: usize,

    /// Keys that resolved to a playable handle, in submission order
    pub succeeded: Vec<ResourceKey>,

    /// Keys that failed with their error, in submission order
    pub failed: Vec<(ResourceKey, MediaError)>,
}

impl BatchReport {
    pub fn new(total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            total,
            succeeded: Vec::with_capacity(total),
            failed: Vec::new(),
        }
    }

    /// True only if every key succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// First failure in submission order
    pub fn first_error(&self) -> Option<&MediaError> {
        self.failed.first().map(|(_, e)| e)
    }

    /// Success rate as a percentage; an empty batch counts as 100%
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.succeeded.len() as f64 / self.total as f64 * 100.0
        }
    }
}

/// Result of `preload_all`
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// Another batch was in progress; nothing was started
    AlreadyRunning,

    /// Every key settled
    Finished(BatchReport),
}

impl BatchOutcome {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::Finished(report) => Some(report),
            BatchOutcome::AlreadyRunning => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.report().is_some_and(BatchReport::is_complete)
    }
}

/// Holds the single-batch flag; released on drop even if the batch future is
/// cancelled midway
pub(crate) struct BatchGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BatchGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
