//! Size estimation and formatting helpers
//!
//! A single estimation function feeds both admission and eviction, so the
//! ledger always matches the sum of what live entries recorded.

use crate::cache::config::MediaCacheConfig;
use crate::cache::types::SizeHint;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Estimate the footprint of a prepared resource in bytes
///
/// Exact sizes win; otherwise duration × `bytes_per_second`, falling back to
/// `fallback_duration` when the loader knows nothing about the media.
pub fn estimate_size_bytes(hint: &SizeHint, config: &MediaCacheConfig) -> u64 {
    if let Some(bytes) = hint.exact_bytes {
        return bytes;
    }

    let duration = hint
        .duration
        .filter(|d| !d.is_zero())
        .unwrap_or(config.fallback_duration);

    (duration.as_secs_f64() * config.bytes_per_second as f64).round() as u64
}

/// Human readable byte count in base 1024, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, UNITS[unit])
}

/// Budget usage as a percentage; an empty budget reads as 0%
pub fn usage_percent(total_bytes: u64, max_bytes: u64) -> f64 {
    if max_bytes == 0 {
        0.0
    } else {
        total_bytes as f64 / max_bytes as f64 * 100.0
    }
}
