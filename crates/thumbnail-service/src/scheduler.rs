//! Bounded generation scheduler.
//!
//! At most `limit` tasks run at once. Further submissions wait in a FIFO
//! queue (tokio's semaphore is fair) with no upper bound. Each task runs on
//! its own tokio task, so a panic inside one is reported to its submitter as
//! [`GenerationError::Panicked`] and leaves the scheduler and every other
//! task untouched. A task that has been admitted runs to completion even if
//! its submitter goes away.

use futures::future::BoxFuture;
use prometheus::IntGauge;
use std::{future::Future, sync::Arc};
use telemetry::metrics;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::{engine::RenderedImage, error::GenerationError};

pub const DEFAULT_MAX_CONCURRENT_GENERATIONS: usize = 5;

/// Deferred work producing one image
pub struct GenerationTask {
    label: String,
    work: BoxFuture<'static, Result<RenderedImage, GenerationError>>,
}

impl GenerationTask {
    pub fn new<F>(label: impl Into<String>, work: F) -> Self
    where
        F: Future<Output = Result<RenderedImage, GenerationError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            work: Box::pin(work),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success(RenderedImage),
    Failure(GenerationError),
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    pub fn into_result(self) -> Result<RenderedImage, GenerationError> {
        match self {
            GenerationResult::Success(image) => Ok(image),
            GenerationResult::Failure(err) => Err(err),
        }
    }

    fn status(&self) -> &'static str {
        match self {
            GenerationResult::Success(_) => "success",
            GenerationResult::Failure(GenerationError::Panicked) => "panicked",
            GenerationResult::Failure(GenerationError::Rejected) => "rejected",
            GenerationResult::Failure(_) => "failure",
        }
    }
}

impl From<Result<RenderedImage, GenerationError>> for GenerationResult {
    /// Empty output is never a success
    fn from(value: Result<RenderedImage, GenerationError>) -> Self {
        match value {
            Ok(image) if image.bytes.is_empty() => {
                GenerationResult::Failure(GenerationError::EmptyOutput)
            }
            Ok(image) => GenerationResult::Success(image),
            Err(err) => GenerationResult::Failure(err),
        }
    }
}

/// Increments a gauge for as long as it is alive
struct GaugeGuard(IntGauge);

impl GaugeGuard {
    fn new(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

#[derive(Clone)]
pub struct GenerationScheduler {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl GenerationScheduler {
    /// `limit` is raised to 1 if zero
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots not currently held by a running task
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Reject queued and future submissions; running tasks finish normally
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `task` once a slot is free and return its result
    pub async fn submit(&self, task: GenerationTask) -> GenerationResult {
        let GenerationTask { label, work } = task;

        let permit = {
            let _queued = GaugeGuard::new(&metrics::SCHEDULER_QUEUED);
            match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(task = %label, "scheduler closed, rejecting generation");
                    return Self::record(GenerationResult::Failure(GenerationError::Rejected));
                }
            }
        };

        debug!(task = %label, available = self.available(), "generation admitted");

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let _running = GaugeGuard::new(&metrics::SCHEDULER_IN_FLIGHT);
            let timer = metrics::THUMBNAIL_GENERATION_DURATION.start_timer();
            let outcome = work.await;
            timer.observe_duration();
            outcome
        });

        let result = match handle.await {
            Ok(outcome) => GenerationResult::from(outcome),
            Err(err) if err.is_panic() => {
                error!(task = %label, "generation task panicked");
                GenerationResult::Failure(GenerationError::Panicked)
            }
            Err(err) => {
                warn!(task = %label, error = %err, "generation task cancelled");
                GenerationResult::Failure(GenerationError::Rejected)
            }
        };

        Self::record(result)
    }

    fn record(result: GenerationResult) -> GenerationResult {
        metrics::THUMBNAIL_GENERATIONS
            .with_label_values(&[result.status()])
            .inc();
        result
    }
}

impl Default for GenerationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_GENERATIONS)
    }
}
