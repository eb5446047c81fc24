use std::future::Future;

use bytes::Bytes;
use http_body_util::Full;
use http_test_util::drain::DiscardBodyFuture;
use http_test_util::empty_body;
use hyper::header::{HeaderValue, ACCEPT, CONNECTION, USER_AGENT};
use hyper::{Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::RequestError;

pub const USER_AGENT_VALUE: &str = concat!("loadgen/", env!("CARGO_PKG_VERSION"));

/// Something that can issue a GET and report the response status.
///
/// Implementations are shared by every worker in a run, so cloning should be
/// cheap.
pub trait Transport: Clone + Send + Sync + 'static {
    fn get(&self, target: &Uri) -> impl Future<Output = Result<StatusCode, RequestError>> + Send;
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpClient {
    /// `max_idle` bounds the number of idle keep-alive connections kept in
    /// the pool; a run never needs more than its concurrency.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(max_idle)
            .build(connector);
        Self { client }
    }
}

impl Transport for HttpClient {
    async fn get(&self, target: &Uri) -> Result<StatusCode, RequestError> {
        let request = Request::get(target.clone())
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .header(CONNECTION, HeaderValue::from_static("keep-alive"))
            .body(empty_body())?;
        let resp = self.client.request(request).await?;
        let status = resp.status();
        // Drained so the connection can go back to the pool.
        DiscardBodyFuture::new(resp.into_body())
            .await
            .map_err(|e| RequestError::Body(format!("{e:#}")))?;
        Ok(status)
    }
}
