use std::time::Duration;

use hyper::StatusCode;
use tokio::time::Instant;

use crate::client::Transport;
use crate::config::Target;
use crate::error::RequestError;
use crate::retry::RetryPolicy;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// What one worker invocation reports back to the runner.
#[derive(Debug, Copy, Clone)]
pub struct Attempted {
    pub outcome: Outcome,
    /// HTTP attempts made, retries included.
    pub attempts: u32,
    /// Round trip of the successful attempt.
    pub latency: Option<Duration>,
}

/// Issues one GET against the target, retrying until it gets a `200 OK` or
/// runs out of attempts.
#[derive(Clone)]
pub struct RequestWorker<T> {
    transport: T,
    target: Target,
    retry: RetryPolicy,
    timeout: Duration,
}

impl<T: Transport> RequestWorker<T> {
    #[must_use]
    pub fn new(transport: T, target: Target, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            target,
            retry,
            timeout,
        }
    }

    pub async fn run(&self) -> Attempted {
        let retried = self.retry.run(|_| self.attempt()).await;
        match retried.result {
            Ok(latency) => Attempted {
                outcome: Outcome::Success,
                attempts: retried.attempts,
                latency: Some(latency),
            },
            Err(_) => Attempted {
                outcome: Outcome::Failure,
                attempts: retried.attempts,
                latency: None,
            },
        }
    }

    async fn attempt(&self) -> Result<Duration, RequestError> {
        let start = Instant::now();
        let status = tokio::time::timeout(self.timeout, self.transport.get(self.target.uri()))
            .await
            .map_err(|_| RequestError::Timeout(self.timeout))??;
        if status != StatusCode::OK {
            return Err(RequestError::Status(status));
        }
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeTransport;
    use crate::retry::Backoff;

    fn worker(transport: FakeTransport) -> RequestWorker<FakeTransport> {
        RequestWorker::new(
            transport,
            Target::parse("http://worker.test/").unwrap(),
            RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(500))),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_ok_never_retries() {
        let transport = FakeTransport::ok();
        let report = worker(transport.clone()).run().await;
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.attempts, 1);
        assert!(report.latency.is_some());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_200_fails_after_retry_limit() {
        let transport = FakeTransport::new(|_| Ok(StatusCode::SERVICE_UNAVAILABLE));
        let report = worker(transport.clone()).run().await;
        assert_eq!(report.outcome, Outcome::Failure);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.latency, None);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_2xx_is_not_success() {
        let transport = FakeTransport::new(|_| Ok(StatusCode::NO_CONTENT));
        let report = worker(transport).run().await;
        assert_eq!(report.outcome, Outcome::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_from_transient_errors() {
        let transport = FakeTransport::new(|call| {
            if call < 2 {
                Err(RequestError::Body("connection reset".into()))
            } else {
                Ok(StatusCode::OK)
            }
        });
        let report = worker(transport.clone()).run().await;
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_time_out() {
        let transport = FakeTransport::ok().with_delay(Duration::from_secs(30));
        let start = Instant::now();
        let report = worker(transport.clone()).run().await;
        assert_eq!(report.outcome, Outcome::Failure);
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.calls(), 3);
        // Three timeouts plus two backoff sleeps.
        assert!(start.elapsed() >= Duration::from_secs(16));
        assert!(start.elapsed() < Duration::from_secs(30));
    }
}
