//! Pool admission control: the per-route ceiling, the global ceiling,
//! and backpressure showing up as queuing latency rather than errors.

mod common;

use std::sync::atomic::Ordering;
use std::time::Instant;

use pipeliner::{Client, Config, Request};

#[tokio::test]
async fn per_route_ceiling_is_never_exceeded() {
    common::init_tracing();
    let origin = common::start_origin().await;

    let mut config = Config::default();
    config.endpoint.max_connections_per_route = 2;
    config.endpoint.pipeline_max_size = 1;
    let client = Client::new(config).unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let client = client.clone();
        let destination = origin.destination();
        handles.push(tokio::spawn(async move {
            client.execute(destination, Request::get("/slow/150")).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // Six slow requests with one in flight per socket: demand for more
    // than two connections existed the whole time, yet only two opened.
    assert_eq!(origin.counters.peak.load(Ordering::SeqCst), 2);
    assert_eq!(origin.counters.accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn excess_tasks_wait_for_a_free_connection() {
    common::init_tracing();
    let origin = common::start_origin().await;

    let mut config = Config::default();
    config.endpoint.max_connections_per_route = 2;
    config.endpoint.pipeline_max_size = 1;
    let client = Client::new(config).unwrap();

    let started = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        let destination = origin.destination();
        handles.push(tokio::spawn(async move {
            client.execute(destination, Request::get("/slow/150")).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // The third task queued until one of the two connections freed up,
    // so the batch takes two rounds of origin latency.
    assert!(
        started.elapsed().as_millis() >= 250,
        "third task did not wait its turn"
    );
    assert_eq!(origin.counters.accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn global_ceiling_spans_destinations() {
    common::init_tracing();
    let shared = common::ConnCounters::default();
    let origin_a = common::start_origin_with(shared.clone()).await;
    let origin_b = common::start_origin_with(shared.clone()).await;

    let mut config = Config::default();
    config.max_connections_count = 2;
    config.endpoint.max_connections_per_route = 2;
    config.endpoint.pipeline_max_size = 1;
    // Short keep-alive so retiring sockets hand their global slots on.
    config.endpoint.keep_alive_ms = 200;
    let client = Client::new(config).unwrap();

    let mut handles = Vec::new();
    for origin in [&origin_a, &origin_b] {
        for _ in 0..2 {
            let client = client.clone();
            let destination = origin.destination();
            handles.push(tokio::spawn(async move {
                client.execute(destination, Request::get("/slow/100")).await
            }));
        }
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // Both destinations together never held more than the global limit.
    assert!(shared.peak.load(Ordering::SeqCst) <= 2);
    assert!(shared.accepted.load(Ordering::SeqCst) >= 2);
}
