use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leptess::capi::TessOcrEngineMode;
use leptess::tesseract::TessApi;
use leptess::{leptonica, Variable};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{NormalizedImage, TextRecognizer};
use crate::config::OcrConfig;
use crate::error::{Result, ScanslateError};

enum OcrBackend {
    Local { tesseract: Arc<Mutex<TessApi>> },
    Unavailable { reason: String },
}

/// Tesseract-backed recognizer, initialized once and shared by handle.
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

// The engine mode is init-only in Tesseract, so the API is initialized here
// rather than through `LepTess::new`.
fn create_tesseract(config: &OcrConfig) -> std::result::Result<TessApi, String> {
    let languages = CString::new(config.languages.as_str()).map_err(|e| e.to_string())?;
    let mut api = TessApi {
        raw: Default::default(),
    };
    api.raw
        .init_4(
            None,
            Some(languages.as_c_str()),
            TessOcrEngineMode::from(config.engine_mode),
        )
        .map_err(|e| format!("{e} (languages {}, oem {})", config.languages, config.engine_mode))?;

    let psm = CString::new(config.page_seg_mode.to_string()).map_err(|e| e.to_string())?;
    api.raw
        .set_variable(Variable::TesseditPagesegMode.as_cstr(), &psm)
        .map_err(|e| format!("Failed to set page segmentation mode: {e}"))?;
    Ok(api)
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Self {
        let backend = match create_tesseract(config) {
            Ok(api) => {
                info!(
                    languages = %config.languages,
                    oem = config.engine_mode,
                    psm = config.page_seg_mode,
                    "Tesseract OCR initialized"
                );
                OcrBackend::Local {
                    tesseract: Arc::new(Mutex::new(api)),
                }
            }
            Err(e) => {
                let reason = format!("Tesseract not available: {e}");
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Self {
            backend,
            config: config.clone(),
        }
    }

    pub fn unavailable(reason: &str, config: &OcrConfig) -> Self {
        Self {
            backend: OcrBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: config.clone(),
        }
    }

    async fn ocr_internal(&self, image: &NormalizedImage) -> Result<String> {
        match &self.backend {
            OcrBackend::Local { tesseract } => {
                let bytes = image.bytes().to_vec();
                let tesseract = Arc::clone(tesseract);

                let text = tokio::task::spawn_blocking(move || {
                    let pix = leptonica::pix_read_mem(&bytes)
                        .map_err(|e| ScanslateError::Ocr(format!("Failed to set image: {e}")))?;
                    let mut api = tesseract.blocking_lock();
                    api.set_image(&pix);
                    api.get_utf8_text()
                        .map_err(|e| ScanslateError::Ocr(format!("Failed to extract text: {e}")))
                })
                .await
                .map_err(|e| ScanslateError::Ocr(format!("OCR task panicked: {e}")))??;

                Ok(text.trim().to_string())
            }
            OcrBackend::Unavailable { reason } => {
                Err(ScanslateError::OcrUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl TextRecognizer for OcrProvider {
    fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    fn describe(&self) -> String {
        format!("tesseract ({})", self.config.languages)
    }

    async fn extract_text(&self, image: &NormalizedImage) -> Result<String> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(timeout_duration, self.ocr_internal(image)).await {
            Ok(inner_result) => inner_result,
            Err(_) => Err(ScanslateError::Ocr(format!(
                "OCR operation timed out after {} seconds",
                self.config.timeout_secs
            ))),
        }
    }
}
