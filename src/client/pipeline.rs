//! A single pipelined connection.
//!
//! # Responsibilities
//! - Run a writer loop and a reader loop concurrently over one socket
//! - Bound written-but-unanswered requests by `pipeline_max_size`
//! - Correlate responses to requests in strict FIFO order
//! - Retire the connection on idle timeout, queue closure, peer close,
//!   or I/O error
//!
//! # Ordering
//! The Nth response read from the socket answers the Nth request written
//! to it. Correlation is a FIFO channel filled by the writer in send
//! order and drained by the reader; there is no id-based lookup.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::client::endpoint::TaskQueue;
use crate::client::limit::ConnectionSlot;
use crate::client::task::RequestTask;
use crate::codec;
use crate::error::Error;
use crate::observability::metrics;

/// A request written to the socket, waiting for its response.
struct InFlight {
    task: RequestTask,
    /// Released once this entry's response has been fully read, opening
    /// a slot for the next pipelined write.
    permit: OwnedSemaphorePermit,
}

/// Spawn the pipeline task for a freshly connected socket.
///
/// `slot` is the global connection permit, held until termination.
/// `on_exit` runs after both loops finish and the socket is closed;
/// the owning endpoint uses it to decrement its connection count and
/// re-evaluate pool growth.
pub(crate) fn spawn(
    authority: Arc<str>,
    stream: TcpStream,
    queue: TaskQueue,
    pipeline_max_size: usize,
    keep_alive: Duration,
    slot: ConnectionSlot,
    on_exit: impl FnOnce() + Send + 'static,
) {
    tokio::spawn(async move {
        let (read_half, write_half) = stream.into_split();
        let (correlation_tx, correlation_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let in_flight = Arc::new(Semaphore::new(pipeline_max_size));

        metrics::connection_opened(&authority);
        tracing::debug!(authority = %authority, "connection pipeline started");

        tokio::join!(
            writer_loop(
                write_half,
                queue,
                correlation_tx,
                in_flight,
                Arc::clone(&authority),
                keep_alive,
                stop_rx,
            ),
            reader_loop(read_half, correlation_rx, Arc::clone(&authority), stop_tx),
        );

        metrics::connection_closed(&authority);
        tracing::debug!(authority = %authority, "connection pipeline terminated");

        drop(slot);
        on_exit();
    });
}

/// Writer half: dequeue tasks and serialize them onto the socket.
///
/// States: waiting for an in-flight slot → waiting for a task (bounded
/// by the keep-alive timer) → writing → … → draining. Exits on idle
/// timeout, queue closure, reader-initiated stop, or write error.
async fn writer_loop(
    mut write_half: OwnedWriteHalf,
    queue: TaskQueue,
    correlation_tx: mpsc::UnboundedSender<InFlight>,
    in_flight: Arc<Semaphore>,
    authority: Arc<str>,
    keep_alive: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        // A saturated pipeline must not claim tasks it cannot yet
        // write; idle pipelines absorb the work instead.
        let permit = tokio::select! {
            _ = stop_rx.changed() => break,
            permit = Arc::clone(&in_flight).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let task = tokio::select! {
            _ = stop_rx.changed() => break,
            outcome = timeout(keep_alive, queue.recv()) => match outcome {
                // Idle close is orderly retirement, not an error.
                Err(_) => {
                    tracing::debug!(authority = %authority, "connection idle, retiring");
                    break;
                }
                // Queue closed: endpoint is shutting down.
                Ok(None) => break,
                Ok(Some(task)) => task,
            },
        };

        if task.is_cancelled() {
            drop(permit);
            continue;
        }

        if let Err(error) = codec::write_request(&mut write_half, &task.request, &authority).await {
            tracing::debug!(authority = %authority, error = %error, "request write failed");
            metrics::request_failed(&authority);
            task.fail(error);
            break;
        }

        // Written requests enter the correlation queue in send order.
        if correlation_tx.send(InFlight { task, permit }).is_err() {
            break;
        }
    }
    // Dropping correlation_tx lets the reader drain in-flight entries
    // and terminate.
}

/// Reader half: parse responses in FIFO order and fulfil result slots.
async fn reader_loop(
    mut read_half: OwnedReadHalf,
    mut correlation_rx: mpsc::UnboundedReceiver<InFlight>,
    authority: Arc<str>,
    stop_tx: watch::Sender<bool>,
) {
    let mut buf = BytesMut::with_capacity(8 * 1024);

    while let Some(InFlight { task, permit }) = correlation_rx.recv().await {
        match codec::read_response(&mut read_half, &mut buf, &task.request.method).await {
            Ok((response, must_close)) => {
                metrics::request_completed(&authority);
                // A cancelled caller still required this parse: the
                // stream had to stay synchronized for later responses.
                task.complete(response);
                // The permit stays held until the body is fully drained;
                // releasing it earlier would let the writer exceed the
                // pipeline bound by one.
                drop(permit);
                if must_close {
                    tracing::debug!(authority = %authority, "peer closing connection");
                    let _ = stop_tx.send(true);
                    break;
                }
            }
            Err(error) => {
                tracing::debug!(authority = %authority, error = %error, "response read failed");
                metrics::request_failed(&authority);
                task.fail(error);
                let _ = stop_tx.send(true);
                break;
            }
        }
    }

    // Stop accepting new entries, then fail everything that was written
    // but never answered.
    correlation_rx.close();
    while let Some(InFlight { task, .. }) = correlation_rx.recv().await {
        metrics::request_failed(&authority);
        task.fail(Error::ConnectionClosed);
    }
}
