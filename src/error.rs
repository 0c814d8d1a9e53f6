//! Error taxonomy for the client engine.
//!
//! # Responsibilities
//! - Classify failures by where they occur (connect, write, read, parse)
//! - Keep failures local to the task(s) they affect
//!
//! # Design Decisions
//! - Pool/global capacity exhaustion is never an error, only latency
//! - Idle timeout and peer-initiated close are orderly retirement, not errors

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors produced by the engine and surfaced to individual callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket establishment failed for every attempt.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// All connect attempts exceeded the configured connect timeout.
    #[error("connect timed out after {attempts} attempt(s)")]
    ConnectTimeout { attempts: u32 },

    /// Serializing a request onto the socket failed.
    #[error("request write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading response bytes from the socket failed.
    #[error("response read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The peer sent bytes that do not form a valid HTTP/1.1 response,
    /// or closed the stream mid-message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection or endpoint was closed before the task completed.
    #[error("connection closed before the request completed")]
    ConnectionClosed,

    /// The configuration failed semantic validation.
    #[error("invalid configuration: {}", format_validation_errors(.0))]
    Config(Vec<ValidationError>),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
