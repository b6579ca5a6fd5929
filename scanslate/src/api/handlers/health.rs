use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::state::AppState;
use crate::cache::CacheStore;
use crate::ocr::TextRecognizer;
use crate::translation::TranslationEngine;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `ok` when both engines are available, `degraded` otherwise.
    pub status: String,
    pub version: String,
    pub ocr: EngineStatus,
    pub translation: EngineStatus,
    pub cache: CacheStatus,
    pub workers: WorkerStatus,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EngineStatus {
    pub status: String,
    pub engine: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CacheStatus {
    pub backend: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct WorkerStatus {
    pub running: bool,
    pub queue_depth: usize,
    pub pending_jobs: usize,
    pub tracked_jobs: usize,
}

fn engine_status(available: bool, engine: String) -> EngineStatus {
    EngineStatus {
        status: if available { "ok" } else { "unavailable" }.to_string(),
        engine,
    }
}

/// `GET /health`
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let recognizer = state.translator.recognizer();
    let ocr = engine_status(recognizer.is_available(), recognizer.describe());
    let translation = engine_status(state.engine.is_available(), state.engine.describe());

    let status = if recognizer.is_available() && state.engine.is_available() {
        "ok"
    } else {
        "degraded"
    };

    let registry = state.pool.registry();

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr,
        translation,
        cache: CacheStatus {
            backend: state.translator.cache().kind().to_string(),
            ttl_secs: state.config.cache.ttl_secs,
        },
        workers: WorkerStatus {
            running: state.pool.is_running(),
            queue_depth: state.pool.queue_depth(),
            pending_jobs: registry.pending(),
            tracked_jobs: registry.len(),
        },
    })
}
