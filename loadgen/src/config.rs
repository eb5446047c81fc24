use std::fmt;
use std::time::Duration;

use hyper::Uri;

use crate::error::ConfigError;
use crate::retry::{Backoff, RetryPolicy};

pub const DEFAULT_CONCURRENCY: usize = 500;
pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// The single URL every request goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(Uri);

impl Target {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        let uri: Uri = raw.parse().map_err(|source| ConfigError::InvalidUrl {
            url: raw.to_owned(),
            source,
        })?;
        match uri.scheme_str() {
            Some("http") => {}
            _ => return Err(ConfigError::UnsupportedScheme(raw.to_owned())),
        }
        if uri.host().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingHost(raw.to_owned()));
        }
        Ok(Self(uri))
    }

    #[inline]
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the runner decides it is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Launch exactly `total_requests` workers and wait for all of them.
    Fixed { total_requests: u64 },
    /// Launch batches until `target_successes` workers have succeeded.
    UntilDone { target_successes: u64 },
}

impl RunMode {
    /// The number the progress line counts towards.
    #[must_use]
    pub fn goal(&self) -> u64 {
        match *self {
            RunMode::Fixed { total_requests } => total_requests,
            RunMode::UntilDone { target_successes } => target_successes,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Fixed { .. } => "fixed",
            RunMode::UntilDone { .. } => "until-done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub target: Target,
    pub mode: RunMode,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl BatchConfig {
    #[must_use]
    pub fn new(target: Target, mode: RunMode) -> Self {
        Self {
            target,
            mode,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::new(DEFAULT_ATTEMPTS, Backoff::Fixed(DEFAULT_RETRY_BACKOFF)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Backoff) -> Result<Self, ConfigError> {
        if attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        self.retry = RetryPolicy::new(attempts, backoff);
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.request_timeout = timeout;
        Ok(self)
    }
}

pub fn parse_count(raw: &str) -> Result<u64, ConfigError> {
    let raw = raw.trim();
    raw.parse()
        .map_err(|_| ConfigError::InvalidNumber(raw.to_owned()))
}

/// Parses a concurrency answer, falling back to [`DEFAULT_CONCURRENCY`] when
/// it is blank, malformed or zero.
#[must_use]
pub fn parse_concurrency_or_default(raw: &str) -> usize {
    match raw.trim().parse() {
        Ok(0) | Err(_) => DEFAULT_CONCURRENCY,
        Ok(n) => n,
    }
}
