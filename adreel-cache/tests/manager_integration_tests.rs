//! Integration tests for the media cache manager
//!
//! These tests drive the public API with a scripted in-memory loader and verify:
//! - Deduplication of concurrent fetches
//! - Batch preloads with partial failures
//! - The single-batch guard
//! - Timeout, abort and retry behaviour
//! - FIFO eviction and handle release

use adreel_cache::{
    BatchOutcome, EvictionMode, MediaCacheConfig, MediaCacheManager, MediaError, MediaErrorKind,
    MediaEvent, MediaLoader, Prepared, ProgressSink, ResourceKey, SizeHint,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone, PartialEq)]
struct Clip {
    url: String,
    serial: usize,
}

#[derive(Debug, Clone)]
enum Behavior {
    Ready { delay: Duration, size: SizeHint },
    Fail,
    Abort,
    Hang,
    FailFirst,
    PanicFirst,
}

#[derive(Default)]
struct ScriptedLoader {
    scripts: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, usize>>,
    released: Mutex<Vec<String>>,
    serial: AtomicUsize,
}

impl ScriptedLoader {
    fn new() -> Self {
        Self::default()
    }

    fn script(mut self, key: &str, behavior: Behavior) -> Self {
        self.scripts.insert(key.to_string(), behavior);
        self
    }

    fn ready(self, key: &str, delay_ms: u64, bytes: u64) -> Self {
        self.script(
            key,
            Behavior::Ready {
                delay: Duration::from_millis(delay_ms),
                size: SizeHint::exact(bytes),
            },
        )
    }

    fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaLoader for ScriptedLoader {
    type Handle = Clip;

    async fn load(&self, key: &ResourceKey, progress: ProgressSink) -> adreel_cache::Result<Prepared<Clip>> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let behavior = self.scripts.get(key).cloned().unwrap_or(Behavior::Ready {
            delay: Duration::from_millis(10),
            size: SizeHint::exact(100),
        });

        progress.report(0.0);
        match behavior {
            Behavior::Ready { delay, size } => {
                progress.report(0.5);
                tokio::time::sleep(delay).await;
                Ok(Prepared::new(self.clip(key), size))
            }
            Behavior::Fail => Err(MediaError::load(key.as_str(), "unsupported codec")),
            Behavior::Abort => Err(MediaError::aborted(key.as_str())),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::FailFirst if attempt == 1 => {
                Err(MediaError::load(key.as_str(), "connection reset"))
            }
            Behavior::PanicFirst if attempt == 1 => panic!("decoder crashed on {}", key),
            Behavior::FailFirst | Behavior::PanicFirst => {
                Ok(Prepared::new(self.clip(key), SizeHint::exact(100)))
            }
        }
    }

    fn release(&self, key: &ResourceKey, _handle: &Clip) {
        self.released.lock().unwrap().push(key.clone());
    }
}

impl ScriptedLoader {
    fn clip(&self, key: &str) -> Clip {
        Clip {
            url: key.to_string(),
            serial: self.serial.fetch_add(1, Ordering::SeqCst),
        }
    }
}

fn manager(config: MediaCacheConfig, loader: ScriptedLoader) -> MediaCacheManager<ScriptedLoader> {
    MediaCacheManager::new(config, loader).unwrap()
}

fn drain(rx: &mut broadcast::Receiver<MediaEvent>) -> Vec<MediaEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn keys(names: &[&str]) -> Vec<ResourceKey> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().ready("ad.mp4", 50, 100),
    );

    let (first, second) = tokio::join!(cache.request_one("ad.mp4"), cache.request_one("ad.mp4"));

    let first = assert_ok!(first);
    let second = assert_ok!(second);
    assert_eq!(first, second);
    assert_eq!(cache.loader().calls("ad.mp4"), 1);
    assert_eq!(cache.stats().await.count, 1);
}

#[tokio::test]
async fn test_second_caller_observes_in_flight_fetch() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().ready("ad.mp4", 80, 100),
    );

    let background = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request_one("ad.mp4").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(cache.is_loading("ad.mp4").await);
    assert_eq!(cache.stats().await.in_flight, 1);

    let late = assert_ok!(cache.request_one("ad.mp4").await);
    let early = assert_ok!(background.await.unwrap());
    assert_eq!(late, early);
    assert_eq!(cache.loader().calls("ad.mp4"), 1);
    assert!(!cache.is_loading("ad.mp4").await);
}

#[tokio::test]
async fn test_cached_request_skips_loader() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());

    let first = assert_ok!(cache.request_one("a.mp4").await);
    let again = assert_ok!(cache.request_one("a.mp4").await);

    assert_eq!(first, again);
    assert_eq!(cache.loader().calls("a.mp4"), 1);
    assert!(cache.is_cached("a.mp4").await);
    assert_eq!(cache.get_cached("a.mp4").await, Some(first));
    assert_eq!(cache.get_cached("other.mp4").await, None);
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new()
            .ready("good1", 20, 100)
            .script("bad", Behavior::Fail)
            .ready("good2", 40, 100),
    );

    let completed = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    {
        let completed = completed.clone();
        cache.on_complete(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        });
        let errors = errors.clone();
        cache.on_error(move |_, key| errors.lock().unwrap().push(key.map(str::to_string)));
    }

    let mut rx = cache.subscribe();
    let outcome = cache.preload_all(&keys(&["good1", "bad", "good2"])).await;

    let report = outcome.report().expect("batch should have run").clone();
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, keys(&["good1", "good2"]));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "bad");
    assert_eq!(report.failed[0].1.kind(), MediaErrorKind::Load);
    assert!(!outcome.is_complete());

    assert!(cache.is_cached("good1").await);
    assert!(cache.is_cached("good2").await);
    assert!(!cache.is_cached("bad").await);

    let events = drain(&mut rx);
    let key_errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            MediaEvent::Error { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(key_errors, vec!["bad"]);

    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert!(matches!(terminal[0], MediaEvent::BatchFailed { failed: 1, .. }));

    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(
        *errors.lock().unwrap(),
        vec![Some("bad".to_string()), None]
    );
}

#[tokio::test]
async fn test_successful_batch_signals_complete() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());
    let progress = Arc::new(Mutex::new(Vec::new()));
    {
        let progress = progress.clone();
        cache.on_progress(move |index, total, fraction| {
            progress.lock().unwrap().push((index, total, fraction));
        });
    }
    let mut rx = cache.subscribe();

    let outcome = cache.preload_all(&keys(&["a", "b", "c"])).await;
    assert!(outcome.is_complete());

    let events = drain(&mut rx);
    assert_eq!(events.last(), Some(&MediaEvent::Complete));
    let ready = events
        .iter()
        .filter(|e| matches!(e, MediaEvent::Ready { .. }))
        .count();
    assert_eq!(ready, 3);

    // progress for every index ends at 1.0 and never goes backwards
    let progress = progress.lock().unwrap();
    for index in 0..3 {
        let fractions: Vec<f64> = progress
            .iter()
            .filter(|(i, total, _)| *i == index && *total == 3)
            .map(|(_, _, f)| *f)
            .collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{:?}", fractions);
        assert_eq!(fractions.last(), Some(&1.0));
    }
}

#[tokio::test]
async fn test_empty_batch_completes() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());
    let outcome = cache.preload_all(&[]).await;
    assert!(outcome.is_complete());
    assert_eq!(cache.loader().total_calls(), 0);
}

#[tokio::test]
async fn test_reentrant_batch_is_a_noop() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().ready("a", 100, 100).ready("b", 100, 100),
    );

    let first = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.preload_all(&keys(&["a", "b"])).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.is_batch_running());

    let started = Instant::now();
    let second = cache.preload_all(&keys(&["a", "b", "c"])).await;
    assert!(matches!(second, BatchOutcome::AlreadyRunning));
    assert!(started.elapsed() < Duration::from_millis(50));

    let first = first.await.unwrap();
    assert!(first.is_complete());
    assert_eq!(cache.loader().calls("a"), 1);
    assert_eq!(cache.loader().calls("b"), 1);
    assert_eq!(cache.loader().calls("c"), 0);

    // once settled, a new batch may run and hits the cache
    assert!(!cache.is_batch_running());
    let third = cache.preload_all(&keys(&["a", "b"])).await;
    assert!(third.is_complete());
    assert_eq!(cache.loader().calls("a"), 1);
}

#[tokio::test]
async fn test_single_requests_are_unaffected_by_running_batch() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().ready("slow", 100, 100),
    );

    let batch = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.preload_all(&keys(&["slow"])).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_ok!(cache.request_one("independent").await);
    assert!(cache.is_batch_running());
    assert!(batch.await.unwrap().is_complete());
}

#[tokio::test]
async fn test_stuck_loader_times_out() {
    let config = MediaCacheConfig::builder()
        .load_timeout(Duration::from_millis(50))
        .build();
    let cache = manager(config, ScriptedLoader::new().script("stuck", Behavior::Hang));

    let started = Instant::now();
    let err = assert_err!(cache.request_one("stuck").await);

    assert_eq!(err.kind(), MediaErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!cache.is_loading("stuck").await);
    assert!(!cache.is_cached("stuck").await);
}

#[tokio::test]
async fn test_abort_is_surfaced_distinctly() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().script("cut", Behavior::Abort),
    );

    let err = assert_err!(cache.request_one("cut").await);
    assert_eq!(err.kind(), MediaErrorKind::Aborted);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().script("flaky", Behavior::FailFirst),
    );

    assert_err!(cache.request_one("flaky").await);
    assert!(!cache.is_cached("flaky").await);
    assert!(!cache.is_loading("flaky").await);

    assert_ok!(cache.request_one("flaky").await);
    assert!(cache.is_cached("flaky").await);
    assert_eq!(cache.loader().calls("flaky"), 2);
}

#[tokio::test]
async fn test_panicking_loader_does_not_wedge_the_key() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().script("crashy", Behavior::PanicFirst),
    );
    let mut rx = cache.subscribe();

    let err = assert_err!(cache.request_one("crashy").await);
    assert_eq!(err.kind(), MediaErrorKind::Other);
    assert!(err.to_string().contains("decoder crashed"));
    assert!(!cache.is_loading("crashy").await);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, MediaEvent::Error { key, .. } if key == "crashy")));

    assert_ok!(cache.request_one("crashy").await);
    assert!(cache.is_cached("crashy").await);
    assert_eq!(cache.loader().calls("crashy"), 2);
}

#[tokio::test]
async fn test_batch_progress_reaches_one_for_cached_and_joined_keys() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().ready("slow", 80, 100),
    );
    assert_ok!(cache.request_one("warm").await);

    let single = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request_one("slow").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let progress = Arc::new(Mutex::new(Vec::new()));
    {
        let progress = progress.clone();
        cache.on_progress(move |index, total, fraction| {
            progress.lock().unwrap().push((index, total, fraction));
        });
    }

    let outcome = cache.preload_all(&keys(&["warm", "slow"])).await;
    assert!(outcome.is_complete());
    assert_ok!(single.await.unwrap());
    assert_eq!(cache.loader().calls("slow"), 1);

    let progress = progress.lock().unwrap();
    assert!(progress.contains(&(0, 2, 1.0)));
    assert!(progress.contains(&(1, 2, 1.0)));
}

#[tokio::test]
async fn test_fifo_eviction_releases_oldest_first() {
    let config = MediaCacheConfig::builder().max_bytes(300).build();
    let cache = manager(
        config,
        ScriptedLoader::new()
            .ready("a", 1, 100)
            .ready("b", 1, 100)
            .ready("c", 1, 100)
            .ready("d", 1, 150),
    );
    let mut rx = cache.subscribe();

    for key in ["a", "b", "c"] {
        assert_ok!(cache.request_one(key).await);
    }
    // touching A does not protect it: eviction is by insertion order
    assert_ok!(cache.request_one("a").await);
    assert_ok!(cache.request_one("d").await);

    assert_eq!(cache.loader().released(), vec!["a", "b"]);
    let evicted: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            MediaEvent::Evicted { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(evicted, vec!["a", "b"]);

    let stats = cache.stats().await;
    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_bytes, 250);
    assert_eq!(stats.evictions, 2);
    assert!(cache.is_cached("c").await);
    assert!(cache.is_cached("d").await);
}

#[tokio::test]
async fn test_oversized_resource_is_admitted_best_effort() {
    let config = MediaCacheConfig::builder().max_bytes(100).build();
    let cache = manager(config, ScriptedLoader::new().ready("huge", 1, 500));

    assert_ok!(cache.request_one("huge").await);

    let stats = cache.stats().await;
    assert_eq!(stats.count, 1);
    assert!(stats.usage_percent > 100.0);
}

#[tokio::test]
async fn test_strict_mode_rejects_oversized_resource() {
    let config = MediaCacheConfig::builder()
        .max_bytes(100)
        .eviction_mode(EvictionMode::Strict)
        .build();
    let cache = manager(config, ScriptedLoader::new().ready("huge", 1, 500));
    let mut rx = cache.subscribe();

    let err = assert_err!(cache.request_one("huge").await);
    assert_eq!(err.kind(), MediaErrorKind::Capacity);
    assert!(!cache.is_cached("huge").await);
    assert_eq!(cache.loader().released(), vec!["huge"]);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, MediaEvent::Error { key, .. } if key == "huge")));
}

#[tokio::test]
async fn test_duration_estimate_feeds_the_ledger() {
    let config = MediaCacheConfig::builder().bytes_per_second(1000).build();
    let cache = manager(
        config,
        ScriptedLoader::new().script(
            "clip",
            Behavior::Ready {
                delay: Duration::from_millis(1),
                size: SizeHint::duration(Duration::from_secs(30)),
            },
        ),
    );

    assert_ok!(cache.request_one("clip").await);

    let stats = cache.stats().await;
    let expected = 30_000.0;
    assert!((stats.total_bytes as f64 - expected).abs() / expected < 0.01);
}

#[tokio::test]
async fn test_clear_releases_everything() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());
    for key in ["a", "b"] {
        assert_ok!(cache.request_one(key).await);
    }

    assert_eq!(cache.clear().await, 2);

    let stats = cache.stats().await;
    assert_eq!(stats.count, 0);
    assert_eq!(stats.total_bytes, 0);
    assert_eq!(cache.loader().released(), vec!["a", "b"]);

    // cleared keys are fetched again on demand
    assert_ok!(cache.request_one("a").await);
    assert_eq!(cache.loader().calls("a"), 2);
}

#[tokio::test]
async fn test_remove_single_entry() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());
    assert_ok!(cache.request_one("a").await);

    assert!(cache.remove("a").await);
    assert!(!cache.remove("a").await);
    assert!(!cache.is_cached("a").await);
    assert_eq!(cache.loader().released(), vec!["a"]);
}

#[tokio::test]
async fn test_shrinking_budget_applies_on_next_admission() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());
    for key in ["a", "b", "c"] {
        assert_ok!(cache.request_one(key).await);
    }

    cache.set_max_bytes(150).await;
    assert_eq!(cache.stats().await.count, 3);

    assert_ok!(cache.request_one("d").await);
    assert_eq!(cache.loader().released(), vec!["a", "b", "c"]);
    assert_eq!(cache.stats().await.max_bytes, 150);
}

#[tokio::test]
async fn test_dispose_aborts_pending_fetches() {
    let cache = manager(
        MediaCacheConfig::default(),
        ScriptedLoader::new().script("stuck", Behavior::Hang),
    );
    assert_ok!(cache.request_one("a").await);

    let pending = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request_one("stuck").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.is_loading("stuck").await);

    cache.dispose().await;

    let err = assert_err!(pending.await.unwrap());
    assert_eq!(err.kind(), MediaErrorKind::Aborted);
    let stats = cache.stats().await;
    assert_eq!(stats.count, 0);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(cache.loader().released(), vec!["a"]);
}

#[tokio::test]
async fn test_stats_serialize_for_the_ui() {
    let cache = manager(MediaCacheConfig::default(), ScriptedLoader::new());
    assert_ok!(cache.request_one("a").await);

    let json = serde_json::to_value(cache.stats().await).unwrap();
    assert_eq!(json["count"], 1);
    assert_eq!(json["total_bytes"], 100);
    assert_eq!(json["formatted_total"], "100 B");
    assert_eq!(json["formatted_max"], "2 GB");
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = MediaCacheConfig::builder().max_bytes(0).build();
    let result = MediaCacheManager::new(config, ScriptedLoader::new());
    assert!(matches!(result, Err(MediaError::Config(_))));
}
