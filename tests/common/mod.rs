//! Shared utilities for integration testing.
//!
//! The mock origin accepts raw TCP connections and speaks just enough
//! HTTP/1.1 to exercise the engine: each connection gets a request
//! reader and a scripted responder, so pipelined requests are parsed as
//! soon as they arrive while responses go out strictly in order.
//!
//! Behaviour is scripted through the request target:
//! - `/slow/{ms}...` — respond after a delay
//! - `/pad/{n}`      — respond with an n-byte padded body
//! - `/close`        — respond with `Connection: close` and hang up
//! - `/chunked`      — respond with a chunked body ("Wikipedia")
//! - anything else   — respond immediately, body = the target itself

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Connection counters, shareable across several origins so tests can
/// observe a global ceiling.
#[derive(Clone, Default)]
pub struct ConnCounters {
    pub accepted: Arc<AtomicUsize>,
    pub current: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl ConnCounters {
    fn opened(&self) -> usize {
        let id = self.accepted.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        id
    }

    fn closed(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One request or response observed at the origin.
#[derive(Clone)]
pub struct Event {
    pub conn: usize,
    pub target: String,
    pub at: Instant,
}

pub struct MockOrigin {
    pub addr: SocketAddr,
    pub counters: ConnCounters,
    /// Requests in the order their heads were parsed off the wire.
    pub requests: Arc<Mutex<Vec<Event>>>,
    /// Responses in the order they were written.
    pub responses: Arc<Mutex<Vec<Event>>>,
    /// Highest number of parsed-but-unanswered requests at any moment.
    pub outstanding_peak: Arc<AtomicUsize>,
}

impl MockOrigin {
    pub fn destination(&self) -> pipeliner::Destination {
        pipeliner::Destination::new("127.0.0.1", self.addr.port())
    }

    pub fn request_targets(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.target.clone())
            .collect()
    }

    pub fn response_targets(&self) -> Vec<String> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.target.clone())
            .collect()
    }

    pub fn request_events(&self) -> Vec<Event> {
        self.requests.lock().unwrap().clone()
    }

    pub fn response_events(&self) -> Vec<Event> {
        self.responses.lock().unwrap().clone()
    }
}

/// Start a mock origin on an ephemeral port.
pub async fn start_origin() -> MockOrigin {
    start_origin_with(ConnCounters::default()).await
}

/// Start a mock origin sharing `counters` with other origins.
pub async fn start_origin_with(counters: ConnCounters) -> MockOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let origin = MockOrigin {
        addr,
        counters: counters.clone(),
        requests: Arc::new(Mutex::new(Vec::new())),
        responses: Arc::new(Mutex::new(Vec::new())),
        outstanding_peak: Arc::new(AtomicUsize::new(0)),
    };

    let requests = Arc::clone(&origin.requests);
    let responses = Arc::clone(&origin.responses);
    let outstanding_peak = Arc::clone(&origin.outstanding_peak);

    tokio::spawn(async move {
        let outstanding = Arc::new(AtomicUsize::new(0));
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            let conn = counters.opened();
            tokio::spawn(handle_connection(
                socket,
                conn,
                counters.clone(),
                Arc::clone(&requests),
                Arc::clone(&responses),
                Arc::clone(&outstanding),
                Arc::clone(&outstanding_peak),
            ));
        }
    });

    origin
}

async fn handle_connection(
    socket: tokio::net::TcpStream,
    conn: usize,
    counters: ConnCounters,
    requests: Arc<Mutex<Vec<Event>>>,
    responses: Arc<Mutex<Vec<Event>>>,
    outstanding: Arc<AtomicUsize>,
    outstanding_peak: Arc<AtomicUsize>,
) {
    let (mut read_half, write_half) = socket.into_split();
    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<String>();

    let reader = {
        let requests = Arc::clone(&requests);
        let outstanding = Arc::clone(&outstanding);
        let outstanding_peak = Arc::clone(&outstanding_peak);
        async move {
            let mut buf: Vec<u8> = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                // Parse every complete request currently buffered.
                while let Some(head_end) = find_subslice(&buf, b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                    let mut lines = head.split("\r\n");
                    let target = lines
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    let content_length: usize = lines
                        .filter_map(|line| line.split_once(':'))
                        .filter(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .filter_map(|(_, value)| value.trim().parse().ok())
                        .next()
                        .unwrap_or(0);

                    if buf.len() < head_end + 4 + content_length {
                        break;
                    }
                    buf.drain(..head_end + 4 + content_length);

                    requests.lock().unwrap().push(Event {
                        conn,
                        target: target.clone(),
                        at: Instant::now(),
                    });
                    let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                    outstanding_peak.fetch_max(now, Ordering::SeqCst);

                    if queue_tx.send(target).is_err() {
                        return;
                    }
                }

                match read_half.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
        }
    };

    let responder = async move {
        let mut write_half = write_half;
        while let Some(target) = queue_rx.recv().await {
            let close = write_response(&mut write_half, &target).await;
            responses.lock().unwrap().push(Event {
                conn,
                target,
                at: Instant::now(),
            });
            outstanding.fetch_sub(1, Ordering::SeqCst);
            if close {
                let _ = write_half.shutdown().await;
                break;
            }
        }
    };

    tokio::join!(reader, responder);
    counters.closed();
}

/// Write the scripted response for `target`. Returns whether the
/// connection should close afterwards.
async fn write_response(write_half: &mut OwnedWriteHalf, target: &str) -> bool {
    if let Some(rest) = target.strip_prefix("/slow/") {
        let ms: u64 = rest
            .split('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    if target == "/chunked" {
        let wire = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let _ = write_half.write_all(wire.as_bytes()).await;
        return false;
    }

    let body = if let Some(n) = target.strip_prefix("/pad/") {
        let n: usize = n.parse().unwrap_or(0);
        format!("{}:{}", target, "x".repeat(n))
    } else {
        target.to_string()
    };

    let close = target == "/close";
    let wire = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n{}",
        body.len(),
        if close { "Connection: close\r\n" } else { "" },
        body
    );
    let _ = write_half.write_all(wire.as_bytes()).await;
    close
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
