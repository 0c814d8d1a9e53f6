//! Client engine subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → Client::execute (facade: destination → endpoint lookup)
//!     → endpoint.rs (shared task queue, demand-driven pool growth)
//!     → pipeline.rs (writer loop → socket → reader loop, FIFO)
//!     → result slot fulfilled, caller resumes
//!
//! Non-pipelineable requests:
//!     → dedicated.rs (one connection, one exchange, closed)
//! ```
//!
//! # Design Decisions
//! - Admission control at two levels: limit.rs bounds sockets globally,
//!   each pipeline bounds written-but-unanswered requests
//! - No load balancing between pipelines: first to dequeue wins, busy
//!   pipelines simply do not dequeue
//! - Endpoints are created lazily and retire themselves when idle

mod dedicated;
mod endpoint;
mod limit;
mod pipeline;
mod task;

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::validation::validate_config;
use crate::config::Config;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use endpoint::Endpoint;
use limit::ConnectionLimiter;
use task::RequestTask;

/// A (host, port) destination identifying one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form, used for the `Host` header and logging.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The engine facade: routes requests to per-destination endpoints.
///
/// Cloning is cheap; all clones share the same pools and global limiter.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    limiter: ConnectionLimiter,
    endpoints: Arc<DashMap<Destination, Arc<Endpoint>>>,
}

impl Client {
    /// Validate `config` and build an engine with no open connections.
    pub fn new(config: Config) -> Result<Self, Error> {
        validate_config(&config).map_err(Error::Config)?;
        let limiter = ConnectionLimiter::new(config.max_connections_count);
        Ok(Self {
            config: Arc::new(config),
            limiter,
            endpoints: Arc::new(DashMap::new()),
        })
    }

    /// Execute one request against `destination` and await its response.
    ///
    /// Capacity exhaustion (per-route or global) shows up as queuing
    /// latency, never as an error.
    pub async fn execute(
        &self,
        destination: Destination,
        request: Request,
    ) -> Result<Response, Error> {
        let endpoint = self.endpoint_for(&destination);
        let (task, response_slot) = RequestTask::new(request);
        endpoint.execute(task);

        match response_slot.await {
            Ok(result) => result,
            // Sender dropped without fulfilment: the owning connection
            // or endpoint went away.
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    fn endpoint_for(&self, destination: &Destination) -> Arc<Endpoint> {
        if let Some(existing) = self.endpoints.get(destination) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .endpoints
            .entry(destination.clone())
            .or_insert_with(|| {
                let endpoints = Arc::clone(&self.endpoints);
                let key = destination.clone();
                Endpoint::new(
                    destination.clone(),
                    Arc::clone(&self.config),
                    self.limiter.clone(),
                    move || {
                        endpoints.remove(&key);
                    },
                )
            });
        Arc::clone(entry.value())
    }

    /// Currently open pooled connections, across all destinations.
    pub fn open_connections(&self) -> usize {
        self.endpoints
            .iter()
            .map(|entry| entry.value().open_connections())
            .sum()
    }

    /// Tasks enqueued but not yet claimed by any connection.
    pub fn pending_tasks(&self) -> usize {
        self.endpoints
            .iter()
            .map(|entry| entry.value().pending_tasks())
            .sum()
    }

    /// Close every endpoint. Unclaimed tasks fail with
    /// [`Error::ConnectionClosed`]; in-flight exchanges drain naturally.
    pub fn shutdown(&self) {
        for entry in self.endpoints.iter() {
            entry.value().close();
        }
        self.endpoints.clear();
    }
}
