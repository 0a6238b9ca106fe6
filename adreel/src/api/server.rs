//! API server for adreel

use adreel_cache::{HttpLoader, MediaCacheConfig, MediaCacheManager};
use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::playlist::load_playlist;

use super::routes::{clear_cache, health_check, media, preload, stats, AppState};

/// Configuration for the API server
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
    pub cache: MediaCacheConfig,
    /// Playlist preloaded in the background once the server starts
    pub playlist: Option<PathBuf>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache: MediaCacheConfig::default(),
            playlist: None,
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server with configuration
    pub fn new(config: ApiServerConfig) -> Result<Self> {
        let cache = MediaCacheManager::new(config.cache.clone(), HttpLoader::new())?;
        Ok(Self {
            config,
            state: Arc::new(AppState { cache }),
        })
    }

    /// Create a new API server with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ApiServerConfig::default())
    }

    pub fn cache(&self) -> &MediaCacheManager<HttpLoader> {
        &self.state.cache
    }

    /// Build the router over the shared cache
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/stats", get(stats))
            .route("/media", get(media))
            .route("/preload", post(preload))
            .route("/cache", delete(clear_cache))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and start the API server
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        if let Some(path) = &self.config.playlist {
            let urls = load_playlist(path)?;
            info!("Warming cache with {} clips from {:?}", urls.len(), path);
            let cache = self.state.cache.clone();
            tokio::spawn(async move {
                if let Some(report) = cache.preload_all(&urls).await.report() {
                    if !report.is_complete() {
                        warn!("{} playlist clips failed to preload", report.failed.len());
                    }
                }
            });
        }

        let app = self.router();
        info!("Starting API server on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
