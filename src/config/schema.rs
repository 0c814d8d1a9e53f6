//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! engine. All types derive Serde traits for deserialization from config
//! files, and every field has a default so minimal configs work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the client engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Global ceiling on simultaneously open sockets, across all
    /// destinations.
    pub max_connections_count: usize,

    /// Whether idempotent requests may share pipelined connections.
    /// When false every request runs on its own dedicated connection.
    pub pipelining: bool,

    /// Per-destination pool settings.
    pub endpoint: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections_count: 1000,
            pipelining: true,
            endpoint: EndpointConfig::default(),
        }
    }
}

/// Settings applied to each per-destination connection pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Maximum simultaneously open pipelined connections to one
    /// (host, port) destination.
    pub max_connections_per_route: usize,

    /// How long an idle connection waits for a new task before closing,
    /// in milliseconds.
    pub keep_alive_ms: u64,

    /// Maximum requests written-but-unanswered on one connection.
    pub pipeline_max_size: usize,

    /// Timeout for a single TCP connect attempt, in milliseconds.
    pub connect_timeout_ms: u64,

    /// How many TCP connect attempts to make before giving up.
    pub connect_attempts: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_connections_per_route: 100,
            keep_alive_ms: 5000,
            pipeline_max_size: 20,
            connect_timeout_ms: 5000,
            connect_attempts: 1,
        }
    }
}

impl EndpointConfig {
    /// Idle timeout as a [`Duration`].
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// How long an endpoint with no traffic at all survives before its
    /// queue is closed and it is removed from the engine.
    pub fn endpoint_idle_timeout(&self) -> Duration {
        self.connect_timeout() * 2
    }
}
