use std::time::Duration;

use hyper::StatusCode;

/// A failed attempt. Every variant is treated as transient and retried.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to build request: {0}")]
    Build(#[from] http::Error),
    #[error("failed to send request: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Rejected operator input. Raised before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no URL entered")]
    EmptyUrl,
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: http::uri::InvalidUri,
    },
    #[error("unsupported scheme in {0:?}, only plain http:// URLs are supported")]
    UnsupportedScheme(String),
    #[error("URL {0:?} has no host")]
    MissingHost(String),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("attempt limit must be at least 1")]
    ZeroAttempts,
    #[error("request timeout must be longer than zero")]
    ZeroTimeout,
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}
