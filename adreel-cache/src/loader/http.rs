//! Download-only loader backed by `reqwest`
//!
//! The body is streamed into memory and held by the handle, so the cache
//! budget bounds real bytes rather than an estimate.

use super::{MediaLoader, Prepared, ProgressSink};
use crate::cache::types::{ResourceKey, SizeHint};
use crate::error::{MediaError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Largest up-front buffer reservation, regardless of advertised length
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// A fully downloaded media resource
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Loader that downloads the whole resource over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS, user agent)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaLoader for HttpLoader {
    type Handle = DownloadedMedia;

    async fn load(&self, key: &ResourceKey, progress: ProgressSink) -> Result<Prepared<DownloadedMedia>> {
        let response = self
            .client
            .get(key.as_str())
            .send()
            .await
            .map_err(|e| MediaError::load(key.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::load(key.as_str(), format!("HTTP {}", status)));
        }

        let content_length = response.content_length();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::with_capacity(content_length.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
        progress.report_bytes(0, content_length);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                debug!("Body stream for {} broke off: {}", key, e);
                MediaError::aborted(key.as_str())
            })?;
            body.extend_from_slice(&chunk);
            progress.report_bytes(body.len() as u64, content_length);
        }

        if let Some(expected) = content_length {
            if (body.len() as u64) < expected {
                return Err(MediaError::aborted(key.as_str()));
            }
        }

        let bytes = body.freeze();
        debug!("Downloaded {} ({} bytes)", key, bytes.len());

        Ok(Prepared::new(
            DownloadedMedia {
                url: key.clone(),
                content_type,
                bytes: bytes.clone(),
            },
            SizeHint::exact(bytes.len() as u64),
        ))
    }
}
