//! Inline vs background translation.
//!
//! Short text is translated on the request task. Longer text goes to the
//! [`WorkerPool`] and the request waits a bounded time for it; past that
//! the job keeps running and stays visible in the [`JobRegistry`].

mod worker;

pub use worker::{JobHandle, JobRegistry, JobStatus, TranslationJob, WorkerPool};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::ScanslateError;
use crate::translation::TranslationEngine;

/// Why a translation did not produce text. `Display` is the bare reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationFailure {
    #[error("{0}")]
    Engine(String),

    #[error("The operation timed out after {waited_secs} seconds (job {job_id})")]
    Timeout { job_id: String, waited_secs: u64 },

    #[error("Translation queue is full")]
    QueueFull,

    #[error("Translation worker stopped before finishing")]
    WorkerGone,
}

impl From<ScanslateError> for TranslationFailure {
    fn from(error: ScanslateError) -> Self {
        match error {
            ScanslateError::Translation(reason) | ScanslateError::TranslationUnavailable(reason) => {
                TranslationFailure::Engine(reason)
            }
            other => TranslationFailure::Engine(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRoute {
    Inline,
    Background,
}

#[derive(Debug)]
pub struct Dispatched {
    pub route: DispatchRoute,
    pub job_id: Option<String>,
    pub translation: Result<String, TranslationFailure>,
}

#[derive(Clone)]
pub struct DispatchPolicy {
    engine: Arc<dyn TranslationEngine>,
    pool: Arc<WorkerPool>,
    threshold_chars: usize,
    wait: Duration,
}

impl DispatchPolicy {
    pub fn new(
        engine: Arc<dyn TranslationEngine>,
        pool: Arc<WorkerPool>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            engine,
            pool,
            threshold_chars: config.async_threshold_chars,
            wait: Duration::from_secs(config.wait_timeout_secs),
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Length is counted in characters, not bytes.
    pub fn route_for(&self, text: &str) -> DispatchRoute {
        if text.chars().count() > self.threshold_chars {
            DispatchRoute::Background
        } else {
            DispatchRoute::Inline
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub async fn dispatch(&self, text: &str) -> Dispatched {
        match self.route_for(text) {
            DispatchRoute::Inline => Dispatched {
                route: DispatchRoute::Inline,
                job_id: None,
                translation: self
                    .engine
                    .translate(text)
                    .await
                    .map_err(TranslationFailure::from),
            },
            DispatchRoute::Background => self.dispatch_background(text).await,
        }
    }

    async fn dispatch_background(&self, text: &str) -> Dispatched {
        let mut handle = match self.pool.submit(text) {
            Ok(handle) => handle,
            Err(failure) => {
                return Dispatched {
                    route: DispatchRoute::Background,
                    job_id: None,
                    translation: Err(failure),
                }
            }
        };
        let job_id = handle.id().to_string();
        debug!(job_id = %job_id, chars = text.chars().count(), "Waiting on background translation");

        let translation = match tokio::time::timeout(self.wait, handle.wait()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    wait_ms = self.wait.as_millis() as u64,
                    "Background translation still running after wait budget"
                );
                Err(TranslationFailure::Timeout {
                    job_id: job_id.clone(),
                    waited_secs: self.wait.as_secs(),
                })
            }
        };

        Dispatched {
            route: DispatchRoute::Background,
            job_id: Some(job_id),
            translation,
        }
    }
}
