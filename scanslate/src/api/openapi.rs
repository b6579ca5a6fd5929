use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scanslate API",
        version = "1.0.0",
        description = "Upload an image, get the recognized text and its translation.",
    ),
    paths(
        handlers::upload::upload_image,
        handlers::health::health_check,
    ),
    components(schemas(
        handlers::upload::UploadResponse,
        handlers::upload::ErrorResponse,
        handlers::upload::RateLimitedResponse,
        handlers::health::HealthResponse,
        handlers::health::EngineStatus,
        handlers::health::CacheStatus,
        handlers::health::WorkerStatus,
    )),
    tags(
        (name = "translation", description = "Image text recognition and translation"),
        (name = "health", description = "Health check"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
