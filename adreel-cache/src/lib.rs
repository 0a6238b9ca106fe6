//! # adreel-cache
//!
//! Client-side media preloading for ad playback: a bounded pool of prepared
//! video resources keyed by URL.
//!
//! ## Features
//!
//! - At most one fetch per URL at any time; concurrent callers share its result
//! - Byte budget with strict FIFO eviction, best-effort by default
//! - Hard timeout ceiling per fetch, so no request stays pending forever
//! - Batch preloads with per-key failure isolation and a single terminal event
//! - Progress, completion and error reporting via broadcast events or callbacks
//! - Pluggable prepare strategy through the [`MediaLoader`] trait
//!
//! ## Example
//!
//! ```no_run
//! use adreel_cache::{BatchOutcome, HttpLoader, MediaCacheConfig, MediaCacheManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = MediaCacheManager::new(MediaCacheConfig::default(), HttpLoader::new())?;
//!
//!     cache.on_progress(|index, total, fraction| {
//!         println!("{}/{}: {:.0}%", index + 1, total, fraction * 100.0);
//!     });
//!
//!     let urls = vec![
//!         "https://cdn.example.com/ads/spring.mp4".to_string(),
//!         "https://cdn.example.com/ads/summer.mp4".to_string(),
//!     ];
//!     if let BatchOutcome::Finished(report) = cache.preload_all(&urls).await {
//!         println!("{} of {} ready", report.succeeded.len(), report.total);
//!     }
//!
//!     // resolves instantly now
//!     let media = cache.request_one(&urls[0]).await?;
//!     println!("{} bytes", media.bytes.len());
//!     println!("{}", cache.stats().await);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod error;
pub mod events;
pub mod loader;
pub mod manager;
pub mod pipeline;

// Re-export main types for convenience
pub use batch::{BatchOutcome, BatchReport};
pub use cache::{
    estimate_size_bytes, format_bytes, Admission, CacheEntry, EvictionMode, MediaCacheConfig,
    MediaCacheConfigBuilder, MediaCacheStats, MediaStore, ResourceKey, SizeHint,
};
pub use error::{MediaError, MediaErrorKind, Result};
pub use events::{Callbacks, EventBus, MediaEvent};
pub use loader::{DownloadedMedia, HttpLoader, MediaLoader, Prepared, ProgressSink};
pub use manager::MediaCacheManager;
