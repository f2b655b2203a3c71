//! # Worker Pool
//!
//! A fixed number of workers pull jobs from one shared FIFO queue and push
//! outcomes into a result channel. Each job runs in its own task, so a panic
//! is confined to the job that raised it. Job tasks are owned by their
//! worker's `JoinSet`: dropping the pool's `run` future tears down workers and
//! jobs alike.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome<R> {
    Completed(R),
    Panicked { message: String },
    /// Aborted by pool shutdown while running
    Cancelled,
}

impl<R> JobOutcome<R> {
    pub fn completed(self) -> Option<R> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Panicked { .. } | Self::Cancelled => None,
        }
    }
}

/// Bounded-concurrency job runner
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    cancellation_token: CancellationToken,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self::with_cancellation(workers, CancellationToken::new())
    }

    pub fn with_cancellation(workers: usize, cancellation_token: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancellation_token,
        }
    }

    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Cancelling this token stops workers from taking new jobs and aborts
    /// the ones in flight.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Run `handler` over every job and return outcomes in completion order.
    ///
    /// Returns once every worker has exited. Jobs still queued at shutdown are
    /// dropped without an outcome.
    pub async fn run<J, R, F, Fut>(&self, jobs: impl IntoIterator<Item = J>, handler: F) -> Vec<JobOutcome<R>>
    where
        J: Send + 'static,
        R: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let mut queued = 0usize;
        for job in jobs {
            if job_tx.send(job).is_err() {
                break;
            }
            queued += 1;
        }
        drop(job_tx);

        let worker_count = self.workers.min(queued.max(1));
        info!("🚀 Worker pool starting {} workers for {} jobs", worker_count, queued);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(handler);
        let mut workers = JoinSet::new();

        for worker_id in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let handler = Arc::clone(&handler);
            let token = self.cancellation_token.clone();

            workers.spawn(async move {
                let mut running = JoinSet::new();
                let mut processed = 0usize;
                loop {
                    let next = {
                        let mut rx = job_rx.lock().await;
                        tokio::select! {
                            biased;
                            () = token.cancelled() => None,
                            job = rx.recv() => job,
                        }
                    };
                    let Some(job) = next else { break };

                    let handler = Arc::clone(&handler);
                    running.spawn(async move { handler(job).await });
                    let outcome = tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            running.abort_all();
                            JobOutcome::Cancelled
                        }
                        joined = running.join_next() => match joined {
                            Some(Ok(result)) => JobOutcome::Completed(result),
                            Some(Err(e)) if e.is_panic() => {
                                let message = panic_message(e.into_panic());
                                error!("💥 Worker {} job panicked: {}", worker_id, message);
                                JobOutcome::Panicked { message }
                            }
                            Some(Err(_)) | None => JobOutcome::Cancelled,
                        },
                    };

                    processed += 1;
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                debug!("Worker {} exiting after {} jobs", worker_id, processed);
            });
        }
        drop(result_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Worker task ended abnormally: {}", e);
            }
        }

        let mut outcomes = Vec::with_capacity(queued);
        while let Some(outcome) = result_rx.recv().await {
            outcomes.push(outcome);
        }

        if self.cancellation_token.is_cancelled() {
            warn!("🛑 Worker pool stopped early: {} of {} jobs reported", outcomes.len(), queued);
        } else {
            info!("✅ Worker pool finished {} jobs", outcomes.len());
        }
        outcomes
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
