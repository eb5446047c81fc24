//! Batch orchestration.
//!
//! The runner owns the only copy of the counters. Workers run as separate
//! tasks and hand their [`Attempted`] report back through a [`JoinSet`], so
//! every completed worker is counted exactly once.
//!
//! In run-until-done mode the size of every batch comes from the remaining
//! success deficit, not from the remaining attempts. Under sustained failure
//! the total number of attempts is therefore unbounded.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::client::Transport;
use crate::config::RunMode;
use crate::progress::Progress;
use crate::statistics::RunSummary;
use crate::worker::{Attempted, RequestWorker};

pub struct BatchRunner<T, P> {
    worker: RequestWorker<T>,
    concurrency: usize,
    progress: P,
}

impl<T: Transport, P: Progress> BatchRunner<T, P> {
    /// `concurrency` is clamped to at least one.
    #[must_use]
    pub fn new(worker: RequestWorker<T>, concurrency: usize, progress: P) -> Self {
        Self {
            worker,
            concurrency: concurrency.max(1),
            progress,
        }
    }

    #[must_use]
    pub fn into_progress(self) -> P {
        self.progress
    }

    pub async fn run(&mut self, mode: RunMode) -> anyhow::Result<RunSummary> {
        match mode {
            RunMode::Fixed { total_requests } => self.run_fixed(total_requests).await,
            RunMode::UntilDone { target_successes } => {
                self.run_until_done(target_successes).await
            }
        }
    }

    /// Launches exactly `total_requests` workers behind a semaphore of
    /// `concurrency` permits and waits for every one of them.
    pub async fn run_fixed(&mut self, total_requests: u64) -> anyhow::Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(RunMode::Fixed { total_requests }.name());
        let permits = usize::try_from(total_requests)
            .unwrap_or(usize::MAX)
            .min(self.concurrency)
            .min(Semaphore::MAX_PERMITS);
        tracing::info!(
            total_requests,
            concurrency = self.concurrency,
            effective_concurrency = permits,
            "starting fixed-count run"
        );
        if total_requests > 0 {
            summary.batches.push(usize::try_from(total_requests).unwrap_or(usize::MAX));
            self.progress.batch_started(0, summary.batches[0]);
        }

        let gate = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();
        for _ in 0..total_requests {
            let gate = gate.clone();
            let worker = self.worker.clone();
            tasks.spawn(async move {
                let _permit = gate.acquire_owned().await?;
                Ok::<Attempted, AcquireError>(worker.run().await)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let report = joined
                .context("Request task panicked")?
                .context("Concurrency gate closed")?;
            summary.record(&report);
            self.progress.update(&summary.tally);
        }
        if !summary.batches.is_empty() {
            self.progress.batch_finished(0, &summary.tally);
        }

        summary.elapsed = start.elapsed();
        self.progress.finish(&summary);
        tracing::info!(
            success = summary.tally.success,
            failed = summary.tally.failed,
            attempts = summary.attempts,
            "fixed-count run complete"
        );
        Ok(summary)
    }

    /// Launches batches of `min(concurrency, deficit)` workers until at least
    /// `target_successes` of them have succeeded.
    pub async fn run_until_done(&mut self, target_successes: u64) -> anyhow::Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(RunMode::UntilDone { target_successes }.name());
        tracing::info!(
            target_successes,
            concurrency = self.concurrency,
            "starting run-until-done"
        );

        while summary.tally.success < target_successes {
            let deficit = target_successes - summary.tally.success;
            let batch_size = usize::try_from(deficit)
                .unwrap_or(usize::MAX)
                .min(self.concurrency);
            let index = summary.batches.len();
            summary.batches.push(batch_size);
            self.progress.batch_started(index, batch_size);
            tracing::debug!(batch = index, batch_size, deficit, "launching batch");

            let failed_before = summary.tally.failed;
            let mut tasks = JoinSet::new();
            for _ in 0..batch_size {
                let worker = self.worker.clone();
                tasks.spawn(async move { worker.run().await });
            }
            while let Some(joined) = tasks.join_next().await {
                let report = joined.context("Request task panicked")?;
                summary.record(&report);
                self.progress.update(&summary.tally);
            }
            self.progress.batch_finished(index, &summary.tally);

            let batch_failures = summary.tally.failed - failed_before;
            if batch_failures > 0 {
                self.progress.interrupt();
                tracing::warn!(
                    batch = index,
                    batch_failures,
                    remaining = target_successes.saturating_sub(summary.tally.success),
                    attempts = summary.attempts,
                    "batch had failures, sizing next batch from the remaining deficit"
                );
            }
        }

        summary.elapsed = start.elapsed();
        self.progress.finish(&summary);
        tracing::info!(
            success = summary.tally.success,
            failed = summary.tally.failed,
            attempts = summary.attempts,
            batches = summary.batches.len(),
            "run-until-done complete"
        );
        Ok(summary)
    }
}
