//! Playlist files: one media URL per line

use anyhow::{Context, Result};
use std::path::Path;

/// Extract URLs from playlist text, skipping blank lines and `#` comments
pub fn parse_playlist(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read and parse a playlist file
pub fn load_playlist(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist {:?}", path))?;
    Ok(parse_playlist(&text))
}
