//! Fetch/prepare step: one loader call under a hard timeout ceiling

use crate::cache::types::ResourceKey;
use crate::error::{MediaError, Result};
use crate::loader::{MediaLoader, Prepared, ProgressSink};
use std::time::Duration;
use tracing::warn;

/// Run `loader` for `key`, force-failing it with `Timeout` after `timeout`
///
/// On success the sink is finished, so a resource that became ready
/// without crossing the threshold still reports a final 1.0.
pub async fn prepare<L: MediaLoader>(
    loader: &L,
    key: &ResourceKey,
    progress: ProgressSink,
    timeout: Duration,
) -> Result<Prepared<L::Handle>> {
    match tokio::time::timeout(timeout, loader.load(key, progress.clone())).await {
        Ok(Ok(prepared)) => {
            progress.finish();
            Ok(prepared)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!("Loader for {} still pending after {:?}, giving up", key, timeout);
            Err(MediaError::Timeout {
                key: key.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
