//! Preload Demo Application
//!
//! Preloads a list of clips over HTTP and prints progress, events and stats.
//!
//! Usage:
//!   cargo run --example preload_demo -- <URL>...
//!
//! Environment variables:
//!   ADREEL_MAX_CACHE_BYTES   - byte budget (default: 2 GiB)
//!   ADREEL_LOAD_TIMEOUT_SECS - per-fetch timeout (default: 30)

use adreel_cache::{BatchOutcome, HttpLoader, MediaCacheConfig, MediaCacheManager, MediaEvent};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("=== Media Preload Demo ===");

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        info!("No URLs given, nothing to preload");
        return Ok(());
    }

    let config = MediaCacheConfig::from_env()?;
    let cache = MediaCacheManager::new(config, HttpLoader::new())?;

    cache.on_progress(|index, total, fraction| {
        info!("  [{}/{}] {:.0}%", index + 1, total, fraction * 100.0);
    });

    let mut events = cache.subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                MediaEvent::Cached { key, size_bytes } => {
                    info!("✓ Cached {} ({} bytes)", key, size_bytes)
                }
                MediaEvent::Evicted { key, .. } => info!("  Evicted {}", key),
                MediaEvent::Error { key, cause } => info!("✗ {}: {}", key, cause),
                event if event.is_terminal() => break,
                _ => {}
            }
        }
    });

    match cache.preload_all(&urls).await {
        BatchOutcome::Finished(report) => {
            info!(
                "\n--- Batch {} finished: {:.0}% succeeded ---",
                report.id,
                report.success_rate()
            );
        }
        BatchOutcome::AlreadyRunning => info!("A batch is already running"),
    }
    let _ = listener.await;

    // A second request for the first clip is served from the cache
    let media = cache.request_one(&urls[0]).await;
    match media {
        Ok(media) => info!(
            "{}: {} bytes ({})",
            media.url,
            media.bytes.len(),
            media.content_type.as_deref().unwrap_or("unknown type")
        ),
        Err(e) => info!("{}", e),
    }

    info!("{}", cache.stats().await);
    cache.dispose().await;

    info!("\n=== Demo Complete ===");
    Ok(())
}
