use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Body returned for every rate-limited request.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded";

#[derive(Error, Debug)]
pub enum ScanslateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Translation unavailable: {0}")]
    TranslationUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ScanslateError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ScanslateError::RateLimited { retry_after_secs } => {
                return rate_limited_response(*retry_after_secs)
            }
            ScanslateError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ScanslateError::InvalidImage(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ScanslateError::Cache(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ScanslateError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ScanslateError::Ocr(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ScanslateError::OcrUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ScanslateError::Translation(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ScanslateError::TranslationUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            ScanslateError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ScanslateError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ScanslateError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

fn rate_limited_response(retry_after_secs: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": RATE_LIMIT_MESSAGE })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

pub type Result<T> = std::result::Result<T, ScanslateError>;
