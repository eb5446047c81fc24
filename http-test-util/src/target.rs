//! A scripted in-process HTTP/1 target for exercising request runners.
//!
//! Every request counts as a hit. The [`Script`] decides which status each hit
//! is answered with, and the server keeps track of how many requests it was
//! handling at the same time.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::{byte_body, empty_body};

#[derive(Debug, Clone)]
pub struct Script {
    status: StatusCode,
    fail_first: usize,
    fail_status: StatusCode,
    delay: Duration,
    body_len: Option<usize>,
}

impl Script {
    /// Answer every hit with `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self::always(StatusCode::OK)
    }

    #[must_use]
    pub fn always(status: StatusCode) -> Self {
        Self {
            status,
            fail_first: 0,
            fail_status: status,
            delay: Duration::ZERO,
            body_len: None,
        }
    }

    /// Answer the first `n` hits with `status`, then `200 OK`.
    #[must_use]
    pub fn fail_first(n: usize, status: StatusCode) -> Self {
        Self {
            status: StatusCode::OK,
            fail_first: n,
            fail_status: status,
            delay: Duration::ZERO,
            body_len: None,
        }
    }

    /// Hold every response for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer with a body of `len` filler bytes instead of the status text.
    #[must_use]
    pub fn with_body_len(mut self, len: usize) -> Self {
        self.body_len = Some(len);
        self
    }

    #[inline]
    #[must_use]
    pub fn status_for(&self, hit: usize) -> StatusCode {
        if hit < self.fail_first {
            self.fail_status
        } else {
            self.status
        }
    }
}

#[derive(Clone, Default)]
pub struct HitStats {
    inner: Arc<HitCounters>,
}

#[derive(Default)]
struct HitCounters {
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    last_headers: Mutex<Option<HeaderMap>>,
}

impl HitStats {
    /// Registers a hit, returning its zero-based index and a guard that holds
    /// the in-flight slot until dropped.
    #[must_use]
    pub fn enter(&self) -> (usize, InFlight) {
        let index = self.inner.hits.fetch_add(1, Ordering::AcqRel);
        let now = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        (
            index,
            InFlight {
                stats: self.clone(),
            },
        )
    }

    pub fn record_headers(&self, headers: &HeaderMap) {
        if let Ok(mut last) = self.inner.last_headers.lock() {
            *last = Some(headers.clone());
        }
    }

    /// Headers of the most recent request, if any arrived.
    #[must_use]
    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.inner
            .last_headers
            .lock()
            .ok()
            .and_then(|last| last.clone())
    }

    #[inline]
    #[must_use]
    pub fn hits(&self) -> usize {
        self.inner.hits.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::Acquire)
    }
}

pub struct InFlight {
    stats: HitStats,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.stats.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A running target server, shut down on drop.
pub struct TargetServer {
    addr: SocketAddr,
    stats: HitStats,
    accept_loop: JoinHandle<()>,
}

impl TargetServer {
    /// Binds an ephemeral port on localhost and starts serving `script`.
    pub async fn start(script: Script) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind target listener")?;
        let addr = listener
            .local_addr()
            .context("Failed to read target address")?;
        let stats = HitStats::default();
        let accept_loop = tokio::task::spawn(accept(listener, Arc::new(script), stats.clone()));
        Ok(Self {
            addr,
            stats,
            accept_loop,
        })
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn uri(&self) -> String {
        format!("http://{}/", self.addr)
    }

    #[must_use]
    pub fn stats(&self) -> &HitStats {
        &self.stats
    }
}

impl Drop for TargetServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn accept(listener: TcpListener, script: Arc<Script>, stats: HitStats) {
    loop {
        let Ok((tcp, _peer)) = listener.accept().await else {
            return;
        };
        let tcp = TokioIo::new(tcp);
        let script = script.clone();
        let stats = stats.clone();
        tokio::task::spawn(hyper::server::conn::http1::Builder::new().serve_connection(
            tcp,
            service_fn(move |req| respond(script.clone(), stats.clone(), req)),
        ));
    }
}

async fn respond<B: Body>(
    script: Arc<Script>,
    stats: HitStats,
    incoming: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (hit, _in_flight) = stats.enter();
    stats.record_headers(incoming.headers());
    if !script.delay.is_zero() {
        tokio::time::sleep(script.delay).await;
    }
    if incoming.method() != Method::GET {
        return Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(empty_body())
            .unwrap());
    }
    let status = script.status_for(hit);
    let body = match script.body_len {
        Some(len) => byte_body(vec![b'x'; len]),
        None => byte_body(status.as_str().to_owned()),
    };
    Ok(Response::builder().status(status).body(body).unwrap())
}
