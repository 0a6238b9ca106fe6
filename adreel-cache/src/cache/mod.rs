//! # Media Cache Store
//!
//! Byte-budgeted storage for prepared media resources.
//!
//! ## Features
//!
//! - **Byte Budget**: a size ledger checked on every admission
//! - **FIFO Eviction**: oldest admission goes first, independent of access recency
//! - **Best-Effort Floor**: eviction never blocks forward progress unless strict mode is chosen
//! - **Estimated Sizes**: duration × bitrate heuristic when the loader has no exact size
//!
//! ## Example
//!
//! ```rust
//! use adreel_cache::cache::{EvictionMode, MediaStore};
//!
//! let mut store = MediaStore::new(300, EvictionMode::BestEffort);
//! store.admit("https://cdn.example/a.mp4".to_string(), "a", 200).unwrap();
//! store.admit("https://cdn.example/b.mp4".to_string(), "b", 200).unwrap();
//!
//! // the oldest entry made room for the newest
//! assert!(!store.has("https://cdn.example/a.mp4"));
//! assert_eq!(store.stats().count, 1);
//! ```

pub mod config;
pub mod entry;
pub mod size;
pub mod store;
pub mod types;

pub use config::{EvictionMode, MediaCacheConfig, MediaCacheConfigBuilder};
pub use entry::CacheEntry;
pub use size::{estimate_size_bytes, format_bytes, usage_percent};
pub use store::{Admission, MediaStore};
pub use types::{MediaCacheStats, ResourceKey, SizeHint};
