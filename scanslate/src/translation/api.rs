use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};

use crate::{
    config::{parse_provider_model, TranslationConfig},
    error::{Result, ScanslateError},
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

#[derive(Debug, Clone)]
struct ApiConfig {
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
    system_prompt: String,
}

/// Chat-completions client that asks a model for a plain translation.
#[derive(Clone)]
pub struct TranslationApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
}

impl TranslationApiClient {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let api_config = ApiConfig::from_translation_config(config);

        let (provider, _) = parse_provider_model(&config.model);
        let needs_api_key = !matches!(
            provider.to_lowercase().as_str(),
            "ollama" | "local" | "lmstudio"
        );

        if needs_api_key && api_config.api_key.is_none() {
            return Err(ScanslateError::TranslationUnavailable(
                "API key required for this provider".to_string(),
            ));
        }

        let openai_config = OpenAIConfig::new()
            .with_api_base(api_config.base_url.clone())
            .with_api_key(api_config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api_config.timeout_secs))
            .build()
            .map_err(|error| {
                ScanslateError::Translation(format!("Failed to create HTTP client: {error}"))
            })?;

        // async-openai retries 5xx on its own; keep that inside our timeout.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(api_config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            config: api_config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn translate(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(ScanslateError::Validation(
                "Text to translate cannot be empty".to_string(),
            ));
        }

        let mut last_error: Option<ScanslateError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(text)?;

            match self.client.chat().create(request).await {
                Ok(response) => return Self::extract_content(response),
                Err(error) => {
                    if let Some(terminal) = Self::terminal_error(&error) {
                        return Err(terminal);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.config.max_retries {
                        tracing::debug!(attempt, error = %mapped_error, "Retrying translation request");
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ScanslateError::Translation("Translation failed after retries".to_string())
        }))
    }

    fn build_request(&self, text: &str) -> Result<CreateChatCompletionRequest> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.config.system_prompt.as_str())
                .build()
                .map_err(|error| {
                    ScanslateError::Validation(format!("Invalid system prompt: {error}"))
                })?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()
                .map_err(|error| ScanslateError::Validation(format!("Invalid source text: {error}")))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(self.config.model.clone())
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|error| {
                ScanslateError::Validation(format!("Invalid translation request: {error}"))
            })
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                ScanslateError::Translation("Engine response contained no choices".to_string())
            })?
            .message
            .content
            .unwrap_or_default();

        let translation = message.trim();
        if translation.is_empty() {
            return Err(ScanslateError::Translation(
                "Engine returned an empty translation".to_string(),
            ));
        }

        Ok(translation.to_string())
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    /// Errors that retrying cannot fix: quota/rate limits and bad credentials.
    fn terminal_error(error: &OpenAIError) -> Option<ScanslateError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
            {
                Some(ScanslateError::Translation(
                    "Translation engine rate limit exceeded".to_string(),
                ))
            }
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
            {
                Some(ScanslateError::Translation(format!(
                    "Translation engine authentication failed: {reqwest_error}"
                )))
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => Some(
                ScanslateError::Translation("Translation engine rate limit exceeded".to_string()),
            ),
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => {
                Some(ScanslateError::Translation(format!(
                    "Translation engine authentication failed: {api_error}"
                )))
            }
            _ => None,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("authentication")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }

    fn map_openai_error(error: OpenAIError) -> ScanslateError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                ScanslateError::Translation(format!("request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                ScanslateError::Translation(format!("engine error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                ScanslateError::Translation(format!("failed to parse engine response: {err}"))
            }
            OpenAIError::InvalidArgument(message) => ScanslateError::Validation(message),
            other => ScanslateError::Translation(other.to_string()),
        }
    }
}

impl ApiConfig {
    fn from_translation_config(config: &TranslationConfig) -> Self {
        let (provider, model) = parse_provider_model(&config.model);

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());

        let normalized_model = if provider.eq_ignore_ascii_case("local") {
            config.model.clone()
        } else {
            model.to_string()
        };

        Self {
            base_url,
            api_key: config.api_key.clone(),
            model: normalized_model,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            system_prompt: system_prompt(&config.source_language, &config.target_language),
        }
    }
}

fn system_prompt(source_language: &str, target_language: &str) -> String {
    format!(
        "You are a translation engine. Translate the {source_language} text sent by the user \
         into {target_language}. Reply with the translation only, without notes, quotes or \
         transliteration. Preserve line breaks."
    )
}

fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openai" => OPENAI_BASE_URL,
        "openrouter" => OPENROUTER_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "lmstudio" => LMSTUDIO_BASE_URL,
        _ => OPENAI_BASE_URL,
    }
}
