mod api;
mod provider;

pub use api::TranslationApiClient;
pub use provider::{TranslationBackend, TranslationProvider};

use async_trait::async_trait;

use crate::error::Result;

/// Source text in, translated text out.
///
/// Implementations must fail rather than return an empty translation for
/// non-empty input; callers treat an error and a success very differently.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    fn is_available(&self) -> bool;

    fn describe(&self) -> String;

    async fn translate(&self, text: &str) -> Result<String>;
}
