//! Per-destination connection pool and task queue.
//!
//! # Responsibilities
//! - Own the shared FIFO queue of pending request tasks
//! - Grow the pool on demand, never past `max_connections_per_route`
//! - Cascade shutdown: closing the queue fails unclaimed tasks and
//!   lets live pipelines drain naturally
//! - Retire itself after a period with no traffic at all
//!
//! Growth decisions are advisory and racy by design: concurrent callers
//! may each decide to grow, but the increment-before-spawn counter keeps
//! the hard ceiling intact.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::dedicated;
use crate::client::limit::ConnectionLimiter;
use crate::client::pipeline;
use crate::client::task::RequestTask;
use crate::client::Destination;
use crate::config::Config;
use crate::error::Error;
use crate::net::connect_with_retries;
use crate::observability::metrics;

/// Shared FIFO queue a pool of pipelines dequeues from.
///
/// Multiple pipelines contend on the receiver; whichever holds it when
/// a task arrives wins, so lightly-loaded connections naturally absorb
/// more work.
#[derive(Clone)]
pub(crate) struct TaskQueue {
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<RequestTask>>>,
    pending: Arc<AtomicUsize>,
}

impl TaskQueue {
    fn new(receiver: mpsc::UnboundedReceiver<RequestTask>) -> Self {
        Self {
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for the next task. Returns `None` once the queue is closed
    /// and drained.
    pub(crate) async fn recv(&self) -> Option<RequestTask> {
        let mut receiver = self.receiver.lock().await;
        let task = receiver.recv().await;
        if task.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            metrics::task_dequeued();
        }
        task
    }

    /// Take one already-queued task without waiting.
    pub(crate) async fn take_now(&self) -> Option<RequestTask> {
        let mut receiver = self.receiver.lock().await;
        match receiver.try_recv() {
            Ok(task) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                metrics::task_dequeued();
                Some(task)
            }
            Err(_) => None,
        }
    }

    /// Tasks enqueued but not yet claimed by any pipeline.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// The connection pool and task queue for one (host, port).
pub(crate) struct Endpoint {
    pub(crate) destination: Destination,
    pub(crate) authority: Arc<str>,
    pub(crate) config: Arc<Config>,
    pub(crate) limiter: ConnectionLimiter,
    queue: TaskQueue,
    sender: Mutex<Option<mpsc::UnboundedSender<RequestTask>>>,
    open_connections: Arc<AtomicUsize>,
    /// Milliseconds since `created` of the last `execute` call.
    last_activity_ms: AtomicU64,
    created: Instant,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl Endpoint {
    /// Create the endpoint and start its idle-expiry watchdog.
    ///
    /// `on_done` runs when the endpoint retires itself after
    /// `2 × connect_timeout` without traffic; the facade uses it to
    /// drop its map entry.
    pub(crate) fn new(
        destination: Destination,
        config: Arc<Config>,
        limiter: ConnectionLimiter,
        on_done: impl FnOnce() + Send + 'static,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let authority: Arc<str> = destination.authority().into();

        let endpoint = Arc::new(Self {
            destination,
            authority,
            config,
            limiter,
            queue: TaskQueue::new(receiver),
            sender: Mutex::new(Some(sender)),
            open_connections: Arc::new(AtomicUsize::new(0)),
            last_activity_ms: AtomicU64::new(0),
            created: Instant::now(),
            expiry: Mutex::new(None),
        });

        let handle = tokio::spawn({
            let endpoint = Arc::clone(&endpoint);
            async move {
                let idle = endpoint.config.endpoint.endpoint_idle_timeout();
                loop {
                    let since = endpoint.since_last_activity();
                    if since >= idle {
                        break;
                    }
                    tokio::time::sleep(idle - since).await;
                }
                tracing::debug!(authority = %endpoint.authority, "endpoint idle, retiring");
                endpoint.close_queue();
                on_done();
            }
        });
        if let Ok(mut guard) = endpoint.expiry.lock() {
            *guard = Some(handle);
        }

        endpoint
    }

    /// Submit one task: enqueue (never blocks, the queue is unbounded)
    /// and re-evaluate pool growth. Requests that must not share a
    /// connection bypass the queue entirely.
    pub(crate) fn execute(self: &Arc<Self>, task: RequestTask) {
        self.touch();

        if !self.config.pipelining || task.request.requires_dedicated_connection() {
            dedicated::spawn(Arc::clone(self), task);
            return;
        }

        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            task.fail(Error::ConnectionClosed);
            return;
        };

        self.queue.pending.fetch_add(1, Ordering::SeqCst);
        metrics::task_queued();
        if let Err(mpsc::error::SendError(task)) = sender.send(task) {
            self.queue.pending.fetch_sub(1, Ordering::SeqCst);
            metrics::task_dequeued();
            task.fail(Error::ConnectionClosed);
            return;
        }

        self.maybe_grow();
    }

    /// Open one more connection if there is demand and room.
    ///
    /// Also called when a pipeline terminates, closing the window where
    /// a task arrives just as the last connection retires.
    pub(crate) fn maybe_grow(self: &Arc<Self>) {
        if self.queue.pending() == 0 {
            return;
        }
        let ceiling = self.config.endpoint.max_connections_per_route;
        let reserved = self
            .open_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < ceiling).then_some(n + 1)
            });
        if reserved.is_err() {
            return;
        }

        let endpoint = Arc::clone(self);
        tokio::spawn(async move {
            // Global ceiling: the (G+1)th connection waits here until a
            // slot frees up.
            let slot = endpoint.limiter.acquire().await;

            let ep_config = &endpoint.config.endpoint;
            match connect_with_retries(
                &endpoint.destination.host,
                endpoint.destination.port,
                ep_config.connect_timeout(),
                ep_config.connect_attempts,
            )
            .await
            {
                Ok(stream) => {
                    let on_exit = {
                        let endpoint = Arc::clone(&endpoint);
                        move || {
                            endpoint.open_connections.fetch_sub(1, Ordering::SeqCst);
                            endpoint.maybe_grow();
                        }
                    };
                    pipeline::spawn(
                        Arc::clone(&endpoint.authority),
                        stream,
                        endpoint.queue.clone(),
                        ep_config.pipeline_max_size,
                        ep_config.keep_alive(),
                        slot,
                        on_exit,
                    );
                }
                Err(error) => {
                    drop(slot);
                    endpoint.open_connections.fetch_sub(1, Ordering::SeqCst);
                    metrics::connect_failed(&endpoint.authority);
                    tracing::warn!(
                        authority = %endpoint.authority,
                        error = %error,
                        "connection attempt failed"
                    );
                    // The failure is local to the demand that triggered
                    // it; other queued tasks wait for a future attempt.
                    if let Some(task) = endpoint.queue.take_now().await {
                        task.fail(error);
                    }
                }
            }
        });
    }

    /// Close the endpoint: stop the watchdog, close the queue, fail
    /// unclaimed tasks. Live pipelines drain naturally.
    pub(crate) fn close(&self) {
        if let Ok(mut guard) = self.expiry.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        self.close_queue();
    }

    fn close_queue(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        drop(sender);

        // Unclaimed tasks must fail rather than hang forever.
        let queue = self.queue.clone();
        tokio::spawn(async move {
            while let Some(task) = queue.recv().await {
                task.fail(Error::ConnectionClosed);
            }
        });
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        self.queue.pending()
    }

    fn touch(&self) {
        let elapsed = self.created.elapsed().as_millis() as u64;
        self.last_activity_ms.store(elapsed, Ordering::Relaxed);
    }

    fn since_last_activity(&self) -> Duration {
        let now = self.created.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }
}
