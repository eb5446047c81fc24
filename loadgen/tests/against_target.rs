//! Runs through the real hyper client against an in-process target.

use std::time::Duration;

use http_test_util::target::{Script, TargetServer};
use hyper::header::{ACCEPT, CONNECTION, USER_AGENT};
use hyper::StatusCode;
use loadgen::client::USER_AGENT_VALUE;
use loadgen::config::{BatchConfig, RunMode, Target};
use loadgen::progress::NoProgress;
use loadgen::retry::Backoff;

async fn start(script: Script) -> (TargetServer, Target) {
    let server = TargetServer::start(script).await.unwrap();
    let target = Target::parse(&server.uri()).unwrap();
    (server, target)
}

fn config(target: Target, mode: RunMode, concurrency: usize, attempts: u32) -> BatchConfig {
    BatchConfig::new(target, mode)
        .with_concurrency(concurrency)
        .unwrap()
        .with_retry(attempts, Backoff::Fixed(Duration::from_millis(5)))
        .unwrap()
        .with_request_timeout(Duration::from_secs(5))
        .unwrap()
}

#[tokio::test]
async fn fixed_count_all_ok() {
    let (server, target) = start(Script::ok()).await;
    let summary = loadgen::run(
        config(target, RunMode::Fixed { total_requests: 20 }, 1000, 3),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.tally.success, 20);
    assert_eq!(summary.tally.failed, 0);
    assert_eq!(summary.attempts, 20);
    assert_eq!(summary.batches, vec![20]);
    assert_eq!(server.stats().hits(), 20);
    assert!(server.stats().peak_in_flight() <= 20);
    assert_eq!(summary.latency.samples, 20);
}

#[tokio::test]
async fn fixed_count_never_exceeds_cap() {
    let (server, target) = start(Script::ok().with_delay(Duration::from_millis(20))).await;
    let summary = loadgen::run(
        config(target, RunMode::Fixed { total_requests: 24 }, 4, 3),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.tally.completed(), 24);
    assert_eq!(server.stats().hits(), 24);
    assert!(server.stats().peak_in_flight() <= 4);
    assert!(server.stats().peak_in_flight() >= 1);
}

#[tokio::test]
async fn failing_target_spends_every_attempt() {
    let (server, target) = start(Script::always(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let summary = loadgen::run(
        config(target, RunMode::Fixed { total_requests: 5 }, 5, 3),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.tally.success, 0);
    assert_eq!(summary.tally.failed, 5);
    assert_eq!(summary.attempts, 15);
    assert_eq!(server.stats().hits(), 15);
}

#[tokio::test]
async fn until_done_two_batches() {
    let (server, target) = start(Script::ok()).await;
    let summary = loadgen::run(
        config(target, RunMode::UntilDone { target_successes: 10 }, 5, 3),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.batches, vec![5, 5]);
    assert_eq!(summary.tally.success, 10);
    assert_eq!(summary.tally.failed, 0);
    assert_eq!(server.stats().hits(), 10);
}

#[tokio::test]
async fn until_done_tops_up_after_failures() {
    let (server, target) = start(Script::fail_first(3, StatusCode::SERVICE_UNAVAILABLE)).await;
    let summary = loadgen::run(
        config(target, RunMode::UntilDone { target_successes: 5 }, 5, 1),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.batches, vec![5, 3]);
    assert_eq!(summary.tally.success, 5);
    assert_eq!(summary.tally.failed, 3);
    assert_eq!(server.stats().hits(), 8);
}

#[tokio::test]
async fn retries_recover_within_one_worker() {
    let (server, target) = start(Script::fail_first(2, StatusCode::BAD_GATEWAY)).await;
    let summary = loadgen::run(
        config(target, RunMode::Fixed { total_requests: 1 }, 1, 3),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.tally.success, 1);
    assert_eq!(summary.attempts, 3);
    assert_eq!(server.stats().hits(), 3);
}

#[tokio::test]
async fn slow_target_times_out() {
    let (_server, target) = start(Script::ok().with_delay(Duration::from_secs(2))).await;
    let config = config(target, RunMode::Fixed { total_requests: 1 }, 1, 2)
        .with_request_timeout(Duration::from_millis(50))
        .unwrap();
    let summary = loadgen::run(config, NoProgress).await.unwrap();
    assert_eq!(summary.tally.failed, 1);
    assert_eq!(summary.attempts, 2);
}

#[tokio::test]
async fn refused_connection_counts_as_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let target = Target::parse(&format!("http://{addr}/")).unwrap();
    let summary = loadgen::run(
        config(target, RunMode::Fixed { total_requests: 2 }, 2, 2),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.tally.failed, 2);
    assert_eq!(summary.attempts, 4);
}

#[tokio::test]
async fn requests_carry_fixed_headers() {
    let (server, target) = start(Script::ok()).await;
    loadgen::run(
        config(target, RunMode::Fixed { total_requests: 1 }, 1, 1),
        NoProgress,
    )
    .await
    .unwrap();
    let headers = server.stats().last_headers().unwrap();
    assert_eq!(
        headers.get(USER_AGENT).unwrap(),
        concat!("loadgen/", env!("CARGO_PKG_VERSION"))
    );
    assert_eq!(headers.get(USER_AGENT).unwrap(), USER_AGENT_VALUE);
    assert_eq!(headers.get(ACCEPT).unwrap(), "*/*");
    assert_eq!(headers.get(CONNECTION).unwrap(), "keep-alive");
}

#[tokio::test]
async fn large_bodies_are_drained() {
    let (server, target) = start(Script::ok().with_body_len(1024 * 1024)).await;
    let summary = loadgen::run(
        config(target, RunMode::Fixed { total_requests: 6 }, 2, 1),
        NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.tally.success, 6);
    assert_eq!(server.stats().hits(), 6);
}
