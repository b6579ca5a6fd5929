use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scanslate::api::{create_router, AppState};
use scanslate::cache;
use scanslate::config::Config;
use scanslate::dispatch::WorkerPool;
use scanslate::ocr::{OcrProvider, TextRecognizer};
use scanslate::translation::{TranslationEngine, TranslationProvider};

#[derive(Parser)]
#[command(name = "scanslate")]
#[command(about = "Recognize text in uploaded images and translate it")]
struct Args {
    /// Bind address, overrides SCANSLATE_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides SCANSLATE_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanslate=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Connecting translation cache ({})...", config.cache.url);
    let cache = cache::connect(&config.cache).await?;

    tracing::info!("Initializing OCR engine: {}...", config.ocr.languages);
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(OcrProvider::new(&config.ocr));
    if !recognizer.is_available() {
        tracing::warn!("OCR unavailable - uploads will fail with 503");
    }

    tracing::info!("Initializing translation engine: {}...", config.translation.model);
    let engine: Arc<dyn TranslationEngine> =
        Arc::new(TranslationProvider::new(&config.translation));
    if !engine.is_available() {
        tracing::warn!("Translation unavailable - responses will carry translation errors");
    }

    let cancel_token = CancellationToken::new();

    // Stopped after the server has drained, not on the shutdown signal.
    let pool = Arc::new(WorkerPool::start(&config.workers, engine.clone()));

    let state = AppState::new(config.clone(), recognizer, engine, cache.clone(), pool.clone());

    tracing::info!("Starting rate limit sweeper...");
    let limiter = state.limiter.clone();
    let window = config.rate_limit.policy.window;
    let sweep_interval = Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1));
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Rate limit sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(sweep_interval) => {
                    let removed = limiter.sweep(window);
                    if removed > 0 {
                        tracing::debug!(removed, "Swept idle rate limit windows");
                    }
                }
            }
        }
    });

    tracing::info!("Starting cache purger...");
    let purge_interval = Duration::from_secs(config.cache.ttl_secs.clamp(60, 3600));
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Cache purger shutting down...");
                    break;
                }
                _ = tokio::time::sleep(purge_interval) => {
                    match cache.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Purged expired translations"),
                        Err(e) => tracing::warn!("Cache purge error: {}", e),
                    }
                }
            }
        }
    });

    tracing::info!("Starting job pruner...");
    let registry = pool.registry().clone();
    let retention = Duration::from_secs(config.workers.job_retention_secs);
    let prune_interval = Duration::from_secs(config.workers.job_retention_secs.clamp(10, 300));
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Job pruner shutting down...");
                    break;
                }
                _ = tokio::time::sleep(prune_interval) => {
                    let pruned = registry.prune(retention);
                    if pruned > 0 {
                        tracing::debug!(pruned, "Pruned finished translation jobs");
                    }
                }
            }
        }
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Scanslate starting on http://{}", addr);
    tracing::info!("  Upload:       POST http://{}/upload-image", addr);
    tracing::info!("  Health check: http://{}/health", addr);
    tracing::info!("  API docs:     http://{}/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token))
    .await?;

    pool.shutdown().await;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
