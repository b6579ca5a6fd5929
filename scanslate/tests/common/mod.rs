#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use scanslate::api::{create_router, AppState};
use scanslate::cache::MemoryCacheStore;
use scanslate::config::Config;
use scanslate::dispatch::WorkerPool;
use scanslate::error::{Result, ScanslateError};
use scanslate::ocr::{NormalizedImage, TextRecognizer};
use scanslate::translation::TranslationEngine;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const BOUNDARY: &str = "scanslate-test-boundary";

/// Recognizer that returns the same text for every image.
pub struct StubRecognizer {
    pub text: String,
    pub available: bool,
    pub calls: AtomicUsize,
}

impl StubRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for StubRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn describe(&self) -> String {
        "stub (ben)".to_string()
    }

    async fn extract_text(&self, _image: &NormalizedImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(ScanslateError::OcrUnavailable("stub offline".to_string()));
        }
        Ok(self.text.clone())
    }
}

/// Engine that prefixes the text, optionally slowly or failing.
pub struct StubEngine {
    pub delay: Duration,
    pub failure: Option<String>,
    pub calls: AtomicUsize,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationEngine for StubEngine {
    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "stub (Assamese -> English)".to_string()
    }

    async fn translate(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(reason) => Err(ScanslateError::Translation(reason.clone())),
            None => Ok(format!("EN[{text}]")),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub recognizer: Arc<StubRecognizer>,
    pub engine: Arc<StubEngine>,
    pub cache: Arc<MemoryCacheStore>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.cache.url = "memory".to_string();
    config.cache.ttl_secs = 3600;
    config.upload.max_file_size_mb = 5;
    config.rate_limit.policy = "10/minute".parse().unwrap();
    config.dispatch.async_threshold_chars = 1000;
    config.dispatch.wait_timeout_secs = 30;
    config.workers.concurrency = 2;
    config.workers.queue_capacity = 16;
    config.server.trust_forwarded_for = false;
    config
}

pub fn build_app(config: Config, recognizer: StubRecognizer, engine: StubEngine) -> TestApp {
    init_test_logger();

    let recognizer = Arc::new(recognizer);
    let engine = Arc::new(engine);
    let cache = Arc::new(MemoryCacheStore::new(config.cache.capacity));
    let pool = Arc::new(WorkerPool::start(&config.workers, engine.clone()));

    let state = AppState::new(
        config,
        recognizer.clone(),
        engine.clone(),
        cache.clone(),
        pool,
    );
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        recognizer,
        engine,
        cache,
    }
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 32, Rgb([250, 250, 250]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(file_name: &str, bytes: &[u8], client: &str) -> Request<Body> {
    upload_request_with_field("file", file_name, bytes, client)
}

pub fn upload_request_with_field(
    field: &str,
    file_name: &str,
    bytes: &[u8],
    client: &str,
) -> Request<Body> {
    let peer: SocketAddr = format!("{client}:40000").parse().unwrap();
    let mut request = Request::builder()
        .method("POST")
        .uri("/upload-image")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, file_name, bytes)))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
