use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::dispatch::{DispatchPolicy, DispatchRoute, TranslationFailure};
use crate::error::{Result, ScanslateError};
use crate::ocr::{normalize_image, TextRecognizer};

/// Extensions accepted for upload, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub const INVALID_FILE_TYPE_MESSAGE: &str = "Invalid file type. Only JPG/PNG allowed.";

const TRANSLATION_ERROR_PREFIX: &str = "Translation error: ";

/// Where a translation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    /// No text was recognized, so nothing was translated.
    Empty,
    Cache,
    Inline,
    Background,
}

impl From<DispatchRoute> for OutcomeSource {
    fn from(route: DispatchRoute) -> Self {
        match route {
            DispatchRoute::Inline => OutcomeSource::Inline,
            DispatchRoute::Background => OutcomeSource::Background,
        }
    }
}

#[derive(Debug)]
pub struct TranslationOutcome {
    pub extracted_text: String,
    pub translation: std::result::Result<String, TranslationFailure>,
    pub source: OutcomeSource,
    pub job_id: Option<String>,
}

impl TranslationOutcome {
    fn empty() -> Self {
        Self {
            extracted_text: String::new(),
            translation: Ok(String::new()),
            source: OutcomeSource::Empty,
            job_id: None,
        }
    }

    /// The translation, or `Translation error: <reason>` when it failed.
    pub fn translation_text(&self) -> String {
        match &self.translation {
            Ok(translation) => translation.clone(),
            Err(failure) => format!("{TRANSLATION_ERROR_PREFIX}{failure}"),
        }
    }
}

/// Checks the upload's name and size before any decoding happens.
pub fn validate_upload(filename: &str, size: usize, max_file_size_mb: u64) -> Result<()> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ScanslateError::Validation(
            INVALID_FILE_TYPE_MESSAGE.to_string(),
        ));
    }

    let max_bytes = max_file_size_mb.saturating_mul(1024 * 1024);
    if size as u64 > max_bytes {
        return Err(file_too_large(max_file_size_mb));
    }

    Ok(())
}

/// The size rejection, shared with the transport cap in the upload handler.
pub fn file_too_large(max_file_size_mb: u64) -> ScanslateError {
    ScanslateError::Validation(format!("File too large (max {max_file_size_mb}MB)."))
}

/// Runs an upload through recognition, the cache and dispatch.
#[derive(Clone)]
pub struct TranslationService {
    recognizer: Arc<dyn TextRecognizer>,
    cache: Arc<dyn CacheStore>,
    dispatch: DispatchPolicy,
    cache_ttl: Duration,
    max_file_size_mb: u64,
    max_image_dimension: u32,
}

impl TranslationService {
    pub fn new(
        config: &Config,
        recognizer: Arc<dyn TextRecognizer>,
        cache: Arc<dyn CacheStore>,
        dispatch: DispatchPolicy,
    ) -> Self {
        Self {
            recognizer,
            cache,
            dispatch,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            max_file_size_mb: config.upload.max_file_size_mb,
            max_image_dimension: config.ocr.max_image_dimension,
        }
    }

    pub fn recognizer(&self) -> &Arc<dyn TextRecognizer> {
        &self.recognizer
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn dispatch(&self) -> &DispatchPolicy {
        &self.dispatch
    }

    pub async fn process_upload(&self, filename: &str, bytes: Vec<u8>) -> Result<TranslationOutcome> {
        validate_upload(filename, bytes.len(), self.max_file_size_mb)?;

        let max_dimension = self.max_image_dimension;
        let image = tokio::task::spawn_blocking(move || normalize_image(&bytes, max_dimension))
            .await
            .map_err(|e| ScanslateError::Internal(format!("Image normalization panicked: {e}")))??;

        let extracted_text = self.recognizer.extract_text(&image).await?;
        self.translate_text(extracted_text).await
    }

    /// Cache lookup, then dispatch on a miss. Only successes are cached.
    pub async fn translate_text(&self, extracted_text: String) -> Result<TranslationOutcome> {
        if extracted_text.is_empty() {
            debug!("No text recognized, skipping translation");
            return Ok(TranslationOutcome::empty());
        }

        match self.cache.get(&extracted_text).await {
            Ok(Some(entry)) => {
                debug!(key = %entry.key, "Translation cache hit");
                return Ok(TranslationOutcome {
                    extracted_text,
                    translation: Ok(entry.translation),
                    source: OutcomeSource::Cache,
                    job_id: None,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Cache read failed, treating as miss"),
        }

        let dispatched = self.dispatch.dispatch(&extracted_text).await;

        match &dispatched.translation {
            Ok(translation) => {
                if let Err(e) = self
                    .cache
                    .put(&extracted_text, translation, self.cache_ttl)
                    .await
                {
                    warn!(error = %e, "Cache write failed");
                }
            }
            Err(failure) => {
                info!(
                    route = ?dispatched.route,
                    job_id = dispatched.job_id.as_deref().unwrap_or("-"),
                    reason = %failure,
                    "Translation did not complete"
                );
            }
        }

        Ok(TranslationOutcome {
            extracted_text,
            translation: dispatched.translation,
            source: dispatched.route.into(),
            job_id: dispatched.job_id,
        })
    }
}
