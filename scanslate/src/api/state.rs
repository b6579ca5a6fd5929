use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::dispatch::{DispatchPolicy, WorkerPool};
use crate::ocr::TextRecognizer;
use crate::ratelimit::RateLimiter;
use crate::services::TranslationService;
use crate::translation::TranslationEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub translator: TranslationService,
    pub limiter: RateLimiter,
    pub engine: Arc<dyn TranslationEngine>,
    pub pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(
        config: Config,
        recognizer: Arc<dyn TextRecognizer>,
        engine: Arc<dyn TranslationEngine>,
        cache: Arc<dyn CacheStore>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let config = Arc::new(config);
        let dispatch = DispatchPolicy::new(engine.clone(), pool.clone(), &config.dispatch);
        let translator = TranslationService::new(&config, recognizer, cache, dispatch);

        Self {
            config,
            translator,
            limiter: RateLimiter::new(),
            engine,
            pool,
        }
    }
}
