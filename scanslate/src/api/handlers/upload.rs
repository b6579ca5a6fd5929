use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::state::AppState;
use crate::error::{Result, ScanslateError};
use crate::services::file_too_large;

const FILE_FIELD: &str = "file";

/// Recognized text and its translation.
///
/// `translation` holds `Translation error: <reason>` when translation failed
/// after the text was recognized.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Text recognized in the image, in the configured source language.
    pub assamese_text: String,
    pub translation: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RateLimitedResponse {
    pub error: String,
}

/// A body cut off by the length limit is reported like any other oversized file.
fn multipart_error(err: MultipartError, context: &str, max_file_size_mb: u64) -> ScanslateError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return file_too_large(max_file_size_mb);
    }
    ScanslateError::Validation(format!("{context}: {}", err.body_text()))
}

/// `POST /upload-image`
#[utoipa::path(
    post,
    path = "/upload-image",
    tag = "translation",
    request_body(content_type = "multipart/form-data", content = String, description = "Image in a `file` field (jpg, jpeg or png)"),
    responses(
        (status = 200, description = "Recognized and translated text", body = UploadResponse),
        (status = 400, description = "Invalid file type, size or image", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitedResponse),
        (status = 500, description = "Text recognition failed", body = ErrorResponse),
        (status = 503, description = "Text recognition unavailable", body = ErrorResponse),
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let max_file_size_mb = state.config.upload.max_file_size_mb;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Invalid multipart body", max_file_size_mb))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read file", max_file_size_mb))?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) = upload.ok_or_else(|| {
        ScanslateError::Validation("Missing required 'file' field".to_string())
    })?;

    let size = bytes.len();
    let outcome = state.translator.process_upload(&file_name, bytes).await?;

    tracing::info!(
        file = %file_name,
        bytes = size,
        chars = outcome.extracted_text.chars().count(),
        source = ?outcome.source,
        translated = outcome.translation.is_ok(),
        "Upload processed"
    );

    Ok(Json(UploadResponse {
        translation: outcome.translation_text(),
        assamese_text: outcome.extracted_text,
    }))
}
