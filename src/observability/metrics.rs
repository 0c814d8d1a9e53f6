//! Metrics collection.
//!
//! # Responsibilities
//! - Track connection lifecycle (opened, closed, failed connects)
//! - Track request outcomes (completed, failed)
//! - Expose queue and pool pressure as gauges
//!
//! # Metrics
//! - `client_connections_opened_total` (counter): by destination
//! - `client_connections_closed_total` (counter): by destination
//! - `client_connect_failures_total` (counter): by destination
//! - `client_open_connections` (gauge): currently open sockets
//! - `client_queued_tasks` (gauge): tasks waiting for a pipeline
//! - `client_requests_total` (counter): by destination and outcome

use metrics::{counter, gauge};

pub fn connection_opened(authority: &str) {
    counter!("client_connections_opened_total", "authority" => authority.to_string())
        .increment(1);
    gauge!("client_open_connections").increment(1.0);
}

pub fn connection_closed(authority: &str) {
    counter!("client_connections_closed_total", "authority" => authority.to_string())
        .increment(1);
    gauge!("client_open_connections").decrement(1.0);
}

pub fn connect_failed(authority: &str) {
    counter!("client_connect_failures_total", "authority" => authority.to_string())
        .increment(1);
}

pub fn task_queued() {
    gauge!("client_queued_tasks").increment(1.0);
}

pub fn task_dequeued() {
    gauge!("client_queued_tasks").decrement(1.0);
}

pub fn request_completed(authority: &str) {
    counter!("client_requests_total", "authority" => authority.to_string(), "outcome" => "ok")
        .increment(1);
}

pub fn request_failed(authority: &str) {
    counter!("client_requests_total", "authority" => authority.to_string(), "outcome" => "error")
        .increment(1);
}
