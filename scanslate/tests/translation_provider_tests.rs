use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use scanslate::config::TranslationConfig;
use scanslate::error::ScanslateError;
use scanslate::translation::{
    TranslationApiClient, TranslationBackend, TranslationEngine, TranslationProvider,
};

fn translation_config(model: &str) -> TranslationConfig {
    TranslationConfig {
        model: model.to_string(),
        api_key: Some("test-key".to_string()),
        base_url: None,
        source_language: "Assamese".to_string(),
        target_language: "English".to_string(),
        timeout_secs: 30,
        max_retries: 3,
    }
}

fn translation_config_with_base_url(
    model: &str,
    base_url: String,
    max_retries: u32,
) -> TranslationConfig {
    TranslationConfig {
        base_url: Some(base_url),
        timeout_secs: 5,
        max_retries,
        ..translation_config(model)
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 1,
            "completion_tokens": 1,
            "total_tokens": 2
        }
    })
}

fn api_error_body(message: &str, error_type: &str, code: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": error_type,
            "param": serde_json::Value::Null,
            "code": code
        }
    })
}

#[test]
fn test_openai_provider_detection() {
    let provider = TranslationProvider::new(&translation_config("openai/gpt-4o-mini"));

    assert!(matches!(provider.backend(), TranslationBackend::OpenAI));
    assert!(provider.is_available());
}

#[test]
fn test_openrouter_provider_detection() {
    let provider = TranslationProvider::new(&translation_config("openrouter/google/gemma-3-27b"));

    assert!(matches!(provider.backend(), TranslationBackend::OpenRouter));
}

#[test]
fn test_api_client_uses_provider_default_base_url() {
    let config = translation_config("openrouter/openai/gpt-4o-mini");
    let client = TranslationApiClient::new(&config);

    match client {
        Ok(value) => {
            assert_eq!(value.base_url(), "https://openrouter.ai/api/v1");
            assert_eq!(value.model(), "openai/gpt-4o-mini");
        }
        Err(error) => panic!("Expected API client creation to succeed, got: {error}"),
    }
}

#[tokio::test]
async fn test_translate_returns_trimmed_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("  I eat rice.\n")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = translation_config_with_base_url(
        "openai/gpt-4o-mini",
        format!("{}/v1", server.uri()),
        1,
    );
    let provider = TranslationProvider::new(&config);

    let result = provider.translate("মই ভাত খাওঁ").await;

    match result {
        Ok(value) => assert_eq!(value, "I eat rice."),
        Err(error) => panic!("Expected translation to succeed, got: {error}"),
    }
}

#[tokio::test]
async fn test_request_carries_source_text_and_prompt() {
    let server = MockServer::start().await;
    let seen = Arc::new(std::sync::Mutex::new(None::<serde_json::Value>));
    let seen_for_mock = Arc::clone(&seen);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(move |request: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            *seen_for_mock.lock().unwrap() = Some(body);
            ResponseTemplate::new(200).set_body_json(completion_body("Good morning"))
        })
        .mount(&server)
        .await;

    let config = translation_config_with_base_url(
        "openai/gpt-4o-mini",
        format!("{}/v1", server.uri()),
        0,
    );
    let provider = TranslationProvider::new(&config);
    provider.translate("সুপ্ৰভাত").await.unwrap();

    let body = seen.lock().unwrap().clone().unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .contains("Assamese"));
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "সুপ্ৰভাত");
}

#[tokio::test]
async fn test_retry_on_server_error() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_mock = Arc::clone(&attempts);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(move |_request: &Request| {
            if attempts_for_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(500).set_body_string("upstream temporary failure")
            } else {
                ResponseTemplate::new(200).set_body_json(completion_body("Recovered"))
            }
        })
        .mount(&server)
        .await;

    let config = translation_config_with_base_url(
        "openai/gpt-4o-mini",
        format!("{}/v1", server.uri()),
        2,
    );
    let provider = TranslationProvider::new(&config);

    let result = provider.translate("Retry test").await;

    match result {
        Ok(value) => assert_eq!(value, "Recovered"),
        Err(error) => panic!("Expected retry to succeed, got: {error}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_quota_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(api_error_body(
                "You exceeded your current quota",
                "insufficient_quota",
                "insufficient_quota",
            )),
        )
        .mount(&server)
        .await;

    let config = translation_config_with_base_url(
        "openai/gpt-4o-mini",
        format!("{}/v1", server.uri()),
        3,
    );
    let provider = TranslationProvider::new(&config);

    let result = provider.translate("Quota test").await;

    match result {
        Err(ScanslateError::Translation(message)) => {
            assert!(message.contains("rate limit exceeded"));
        }
        other => panic!("Expected rate limit translation error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_auth_error_returns_translation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(api_error_body(
            "Invalid API key",
            "invalid_request_error",
            "invalid_api_key",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = translation_config_with_base_url(
        "openai/gpt-4o-mini",
        format!("{}/v1", server.uri()),
        3,
    );
    let provider = TranslationProvider::new(&config);

    let result = provider.translate("Auth test").await;

    match result {
        Err(ScanslateError::Translation(message)) => {
            assert!(message.to_lowercase().contains("authentication failed"));
        }
        other => panic!("Expected translation auth error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
        .mount(&server)
        .await;

    let config = translation_config_with_base_url(
        "openai/gpt-4o-mini",
        format!("{}/v1", server.uri()),
        0,
    );
    let provider = TranslationProvider::new(&config);

    let result = provider.translate("মই").await;

    assert!(matches!(result, Err(ScanslateError::Translation(_))));
}
