use std::path::PathBuf;
use std::time::Duration;
use clap::{Parser, Subcommand};
use anyhow::{bail, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adreel::api::{ApiServer, ApiServerConfig};
use adreel::playlist::load_playlist;
use adreel_cache::{
    estimate_size_bytes, format_bytes, BatchOutcome, HttpLoader, MediaCacheConfig,
    MediaCacheManager, SizeHint,
};

#[derive(Parser)]
#[command(name = "adreel")]
#[command(about = "Video ad preloader with a bounded media cache", long_about = None)]
struct Cli {
    /// Byte budget of the cache (overrides ADREEL_MAX_CACHE_BYTES)
    #[arg(long, global = true)]
    max_bytes: Option<u64>,

    /// Per-clip load timeout in seconds (overrides ADREEL_LOAD_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preload clips and report what was cached
    Preload {
        /// Clip URLs
        urls: Vec<String>,

        /// Playlist file with one URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Estimate the cached size of a clip from its duration
    Estimate {
        /// Clip duration in seconds
        #[arg(short, long)]
        duration_secs: f64,
    },

    /// Start API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Playlist to preload once the server is up
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "adreel=info,adreel_cache=info".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cache_config(&cli)?;

    match cli.command {
        Commands::Preload { urls, file } => {
            let mut urls = urls;
            if let Some(path) = file {
                urls.extend(load_playlist(&path)?);
            }
            if urls.is_empty() {
                bail!("No URLs to preload; pass them as arguments or with --file");
            }
            run_preload(config, urls).await?;
        }

        Commands::Estimate { duration_secs } => {
            let hint = SizeHint::duration(clip_duration(duration_secs)?);
            let bytes = estimate_size_bytes(&hint, &config);
            println!(
                "{}s at {}/s ≈ {} ({} bytes)",
                duration_secs,
                format_bytes(config.bytes_per_second),
                format_bytes(bytes),
                bytes
            );
        }

        Commands::Serve { host, port, file } => {
            let server = ApiServer::new(ApiServerConfig {
                host,
                port,
                cache: config,
                playlist: file,
            })?;
            server.start().await?;
        }
    }

    Ok(())
}

fn clip_duration(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Ok(duration),
        Err(e) => bail!("Invalid duration {}s: {}", secs, e),
    }
}

fn cache_config(cli: &Cli) -> Result<MediaCacheConfig> {
    let mut config = MediaCacheConfig::from_env()?;
    if let Some(max_bytes) = cli.max_bytes {
        config.max_bytes = max_bytes;
    }
    if let Some(secs) = cli.timeout_secs {
        config.load_timeout = Duration::from_secs(secs);
    }
    config.validate()?;
    Ok(config)
}

async fn run_preload(config: MediaCacheConfig, urls: Vec<String>) -> Result<()> {
    let cache = MediaCacheManager::new(config, HttpLoader::new())?;
    cache.on_progress(|index, total, fraction| {
        info!("[{}/{}] {:.0}%", index + 1, total, fraction * 100.0);
    });

    let report = match cache.preload_all(&urls).await {
        BatchOutcome::Finished(report) => report,
        BatchOutcome::AlreadyRunning => bail!("A preload is already running"),
    };

    println!("Preloaded {} of {} clips:", report.succeeded.len(), report.total);
    for url in &report.succeeded {
        println!("  ✓ {}", url);
    }
    for (url, e) in &report.failed {
        println!("  ✗ {} ({})", url, e);
    }
    println!("{}", cache.stats().await);

    cache.dispose().await;
    Ok(())
}
