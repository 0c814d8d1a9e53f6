//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint decides to grow its pool
//!     → connect.rs (TCP establishment, timeout, bounded retries)
//!     → handed to a connection pipeline (reader/writer halves)
//! ```
//!
//! # Design Decisions
//! - Connect timeout applies per attempt, not across all attempts
//! - Timeout exhaustion and refusal are reported as distinct errors

pub mod connect;

pub use connect::connect_with_retries;
