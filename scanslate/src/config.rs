use serde::Deserialize;
use std::env;

use crate::ratelimit::RateLimitSpec;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
    pub rate_limit: RateLimitConfig,
    pub dispatch: DispatchConfig,
    pub workers: WorkerConfig,
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Key clients by the first `X-Forwarded-For` address instead of the peer IP.
    pub trust_forwarded_for: bool,
}

/// Translation cache backend.
///
/// `url` is either `memory` (process-local LRU) or a libsql URL
/// (`file:cache.db`, `libsql://...`, `https://...`).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub ttl_secs: u64,
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_file_size_mb: u64,
}

impl UploadConfig {
    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub policy: RateLimitSpec,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Texts longer than this many characters go to the worker pool.
    pub async_threshold_chars: usize,
    pub wait_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub job_retention_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language codes, `+` separated (e.g. `ben`, `ben+eng`).
    pub languages: String,
    /// Tesseract `--oem`; 1 selects the LSTM engine only.
    pub engine_mode: u8,
    pub page_seg_mode: u8,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "ben".to_string(),
            engine_mode: 1,
            page_seg_mode: 6,
            timeout_secs: 60,
            max_image_dimension: 1920,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            source_language: "Assamese".to_string(),
            target_language: "English".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SCANSLATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("SCANSLATE_PORT", 8000),
                trust_forwarded_for: parse_env_or("TRUST_FORWARDED_FOR", false),
            },
            cache: CacheConfig {
                url: env_non_empty("CACHE_URL").unwrap_or_else(|| "memory".to_string()),
                auth_token: env_non_empty("CACHE_AUTH_TOKEN"),
                ttl_secs: parse_env_or("CACHE_TTL", 3600),
                capacity: parse_env_or("CACHE_CAPACITY", 10_000),
            },
            upload: UploadConfig {
                max_file_size_mb: parse_env_or("MAX_FILE_SIZE_MB", 5),
            },
            rate_limit: RateLimitConfig {
                policy: parse_env_or("RATE_LIMIT", RateLimitSpec::per_minute(10)),
                sweep_interval_secs: parse_env_or("RATE_LIMIT_SWEEP_INTERVAL_SECS", 300),
            },
            dispatch: DispatchConfig {
                async_threshold_chars: parse_env_or("ASYNC_THRESHOLD_CHARS", 1000),
                wait_timeout_secs: parse_env_or("ASYNC_WAIT_TIMEOUT_SECS", 30),
            },
            workers: WorkerConfig {
                concurrency: parse_env_or("WORKER_CONCURRENCY", 2),
                queue_capacity: parse_env_or("WORKER_QUEUE_CAPACITY", 64),
                job_retention_secs: parse_env_or("JOB_RETENTION_SECS", 3600),
            },
            ocr: OcrConfig {
                languages: env_non_empty("OCR_LANGUAGES").unwrap_or_else(|| "ben".to_string()),
                engine_mode: parse_env_or("OCR_ENGINE_MODE", 1),
                page_seg_mode: parse_env_or("OCR_PAGE_SEG_MODE", 6),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
                max_image_dimension: parse_env_or("OCR_MAX_DIMENSION", 1920),
            },
            translation: TranslationConfig {
                model: env_non_empty("TRANSLATION_MODEL")
                    .unwrap_or_else(|| "openai/gpt-4o-mini".to_string()),
                api_key: env_non_empty("TRANSLATION_API_KEY"),
                base_url: env_non_empty("TRANSLATION_BASE_URL"),
                source_language: env_non_empty("TRANSLATION_SOURCE_LANGUAGE")
                    .unwrap_or_else(|| "Assamese".to_string()),
                target_language: env_non_empty("TRANSLATION_TARGET_LANGUAGE")
                    .unwrap_or_else(|| "English".to_string()),
                timeout_secs: parse_env_or("TRANSLATION_TIMEOUT", 30),
                max_retries: parse_env_or("TRANSLATION_MAX_RETRIES", 2),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known translation providers that speak the OpenAI chat completions API.
pub const KNOWN_TRANSLATION_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Split `provider/model` into its parts. Unknown prefixes are treated as a
/// bare model name served by a local OpenAI-compatible endpoint.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_TRANSLATION_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    const VARS: &[&str] = &[
        "CACHE_URL",
        "CACHE_TTL",
        "MAX_FILE_SIZE_MB",
        "RATE_LIMIT",
        "ASYNC_THRESHOLD_CHARS",
        "ASYNC_WAIT_TIMEOUT_SECS",
        "OCR_LANGUAGES",
        "OCR_ENGINE_MODE",
        "OCR_PAGE_SEG_MODE",
        "TRANSLATION_MODEL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();

        let config = Config::default();
        assert_eq!(config.cache.url, "memory");
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.upload.max_file_size_mb, 5);
        assert_eq!(config.upload.max_file_size_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.rate_limit.policy.limit, 10);
        assert_eq!(config.rate_limit.policy.window, Duration::from_secs(60));
        assert_eq!(config.dispatch.async_threshold_chars, 1000);
        assert_eq!(config.dispatch.wait_timeout_secs, 30);
        assert_eq!(config.ocr.languages, "ben");
        assert_eq!(config.ocr.engine_mode, 1);
        assert_eq!(config.ocr.page_seg_mode, 6);
        assert_eq!(config.ocr.max_image_dimension, 1920);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        std::env::set_var("CACHE_URL", "file:cache.db");
        std::env::set_var("CACHE_TTL", "60");
        std::env::set_var("MAX_FILE_SIZE_MB", "2");
        std::env::set_var("RATE_LIMIT", "100/hour");
        std::env::set_var("ASYNC_THRESHOLD_CHARS", "250");
        std::env::set_var("OCR_ENGINE_MODE", "3");
        std::env::set_var("OCR_PAGE_SEG_MODE", "4");

        let config = Config::default();
        assert_eq!(config.cache.url, "file:cache.db");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.upload.max_file_size_mb, 2);
        assert_eq!(config.rate_limit.policy.limit, 100);
        assert_eq!(config.rate_limit.policy.window, Duration::from_secs(3600));
        assert_eq!(config.dispatch.async_threshold_chars, 250);
        assert_eq!(config.ocr.engine_mode, 3);
        assert_eq!(config.ocr.page_seg_mode, 4);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_rate_limit_falls_back_to_default() {
        clear_env();
        std::env::set_var("RATE_LIMIT", "lots");

        let config = Config::default();
        assert_eq!(config.rate_limit.policy, RateLimitSpec::per_minute(10));

        clear_env();
    }

    #[test]
    fn test_parse_provider_model() {
        assert_eq!(parse_provider_model("openai/gpt-4o-mini"), ("openai", "gpt-4o-mini"));
        assert_eq!(parse_provider_model("ollama/aya"), ("ollama", "aya"));
        assert_eq!(parse_provider_model("opus-mt-bn-en"), ("local", "opus-mt-bn-en"));
        assert_eq!(
            parse_provider_model("Helsinki-NLP/opus-mt-bn-en"),
            ("local", "Helsinki-NLP/opus-mt-bn-en")
        );
    }
}
