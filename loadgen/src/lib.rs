//! Bounded-concurrency batch GET runner.
//!
//! A [`worker::RequestWorker`] issues one GET against the target and retries
//! it a bounded number of times. A [`runner::BatchRunner`] fans workers out
//! under a concurrency cap, either for a fixed number of requests or in
//! batches until enough of them have succeeded.

pub mod client;
pub mod config;
pub mod error;
pub mod progress;
pub mod prompt;
pub mod retry;
pub mod runner;
pub mod statistics;
pub mod worker;

use crate::client::HttpClient;
use crate::config::BatchConfig;
use crate::progress::Progress;
use crate::runner::BatchRunner;
use crate::statistics::RunSummary;
use crate::worker::RequestWorker;

/// Runs `config` over a fresh HTTP client.
pub async fn run<P: Progress>(config: BatchConfig, progress: P) -> anyhow::Result<RunSummary> {
    let client = HttpClient::new(config.concurrency);
    let worker = RequestWorker::new(
        client,
        config.target.clone(),
        config.retry,
        config.request_timeout,
    );
    BatchRunner::new(worker, config.concurrency, progress)
        .run(config.mode)
        .await
}
