use async_trait::async_trait;
use tracing::{info, warn};

use super::{TranslationApiClient, TranslationEngine};
use crate::config::{parse_provider_model, TranslationConfig};
use crate::error::{Result, ScanslateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

/// Translation engine selected from `TRANSLATION_MODEL`.
///
/// The HTTP client is built once here and shared by every request and worker.
#[derive(Clone)]
pub struct TranslationProvider {
    backend: TranslationBackend,
    client: Option<TranslationApiClient>,
    source_language: String,
    target_language: String,
}

impl TranslationProvider {
    pub fn new(config: &TranslationConfig) -> Self {
        let (provider, _model) = parse_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => TranslationBackend::OpenAI,
            "openrouter" => TranslationBackend::OpenRouter,
            "ollama" => TranslationBackend::Ollama,
            "lmstudio" => TranslationBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    TranslationBackend::OpenAICompatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    TranslationBackend::Unavailable {
                        reason: format!("Unknown provider in model: {}", config.model),
                    }
                }
            }
        };

        if let TranslationBackend::Unavailable { reason } = &backend {
            warn!("{}", reason);
            return Self::unavailable(reason, config);
        }

        match TranslationApiClient::new(config) {
            Ok(client) => {
                info!(
                    model = %client.model(),
                    base_url = %client.base_url(),
                    "Translation engine initialized"
                );
                Self {
                    backend,
                    client: Some(client),
                    source_language: config.source_language.clone(),
                    target_language: config.target_language.clone(),
                }
            }
            Err(e) => {
                let reason = format!("Translation engine not available: {e}");
                warn!("{}", reason);
                Self::unavailable(&reason, config)
            }
        }
    }

    pub fn unavailable(reason: &str, config: &TranslationConfig) -> Self {
        Self {
            backend: TranslationBackend::Unavailable {
                reason: reason.to_string(),
            },
            client: None,
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
        }
    }

    pub fn backend(&self) -> &TranslationBackend {
        &self.backend
    }

    fn unavailable_reason(&self) -> String {
        match &self.backend {
            TranslationBackend::Unavailable { reason } => reason.clone(),
            _ => "Translation client was not initialized".to_string(),
        }
    }
}

#[async_trait]
impl TranslationEngine for TranslationProvider {
    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn describe(&self) -> String {
        match &self.client {
            Some(client) => format!(
                "{} ({} -> {})",
                client.model(),
                self.source_language,
                self.target_language
            ),
            None => "unavailable".to_string(),
        }
    }

    async fn translate(&self, text: &str) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ScanslateError::TranslationUnavailable(self.unavailable_reason()))?;

        client.translate(text).await
    }
}
