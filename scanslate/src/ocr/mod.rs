//! Text recognition.
//!
//! Uploaded images go through [`normalize_image`] first: decode, bound the
//! largest side, re-encode as JPEG. Only a [`NormalizedImage`] can reach a
//! [`TextRecognizer`], so the preprocessing contract is enforced by type.
//!
//! The production recognizer is [`OcrProvider`], a Tesseract engine loaded
//! once at startup for a single script (Bengali script by default, which also
//! covers Assamese). Recognition is best-effort: no text is an empty string,
//! not an error.

mod preprocessing;
mod provider;

pub use preprocessing::{normalize_image, NormalizedImage, JPEG_QUALITY};
pub use provider::OcrProvider;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Engine and language, for logs and health output.
    fn describe(&self) -> String;

    /// Trimmed text found in `image`, empty when there is none.
    async fn extract_text(&self, image: &NormalizedImage) -> Result<String>;
}
