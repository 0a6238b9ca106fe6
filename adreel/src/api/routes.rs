//! API routes for the adreel server

use adreel_cache::{BatchOutcome, HttpLoader, MediaCacheManager};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Application state
pub struct AppState {
    pub cache: MediaCacheManager<HttpLoader>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Media lookup parameters
#[derive(Deserialize)]
pub struct MediaQuery {
    pub url: String,
}

/// Preload request
#[derive(Deserialize)]
pub struct PreloadRequest {
    pub urls: Vec<String>,
}

/// Preload response
#[derive(Serialize)]
pub struct PreloadResponse {
    /// `complete`, `failed` or `already_running`
    pub status: String,
    pub batch_id: Option<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedItem>,
}

#[derive(Serialize)]
pub struct FailedItem {
    pub url: String,
    pub error: String,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub released: usize,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Cache statistics endpoint
pub async fn stats(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.cache.stats().await)
}

/// Serve a cached clip, or send the player to the source when it is not cached
pub async fn media(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<MediaQuery>,
) -> Response {
    match app_state.cache.get_cached(&params.url).await {
        Some(media) => {
            let content_type = media
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            ([(header::CONTENT_TYPE, content_type)], media.bytes).into_response()
        }
        None => match source_location(&params.url) {
            Some(location) => {
                debug!("Cache miss for {}, redirecting to source", params.url);
                (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
            }
            None => StatusCode::BAD_REQUEST.into_response(),
        },
    }
}

/// Redirect target for an uncached clip: only plain http(s) URLs that fit in a header
fn source_location(url: &str) -> Option<HeaderValue> {
    let (scheme, rest) = url.split_once("://")?;
    let web = scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https");
    if !web || rest.is_empty() {
        return None;
    }
    HeaderValue::from_str(url).ok()
}

/// Run one preload batch and report per-URL outcomes
pub async fn preload(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PreloadRequest>,
) -> impl IntoResponse {
    let response = match app_state.cache.preload_all(&payload.urls).await {
        BatchOutcome::AlreadyRunning => PreloadResponse {
            status: "already_running".to_string(),
            batch_id: None,
            succeeded: Vec::new(),
            failed: Vec::new(),
        },
        BatchOutcome::Finished(report) => PreloadResponse {
            status: if report.is_complete() { "complete" } else { "failed" }.to_string(),
            batch_id: Some(report.id.to_string()),
            failed: report
                .failed
                .iter()
                .map(|(url, e)| FailedItem {
                    url: url.clone(),
                    error: e.to_string(),
                })
                .collect(),
            succeeded: report.succeeded,
        },
    };

    Json(response)
}

/// Release every cached clip
pub async fn clear_cache(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ClearResponse {
        released: app_state.cache.clear().await,
    })
}
