//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine core produces:
//!     → tracing events (connection lifecycle, task failures)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → whatever subscriber/recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - This is a library: no subscriber or metrics recorder is installed here
//! - Metrics are cheap (atomic increments through the `metrics` facade)
//! - Label cardinality is bounded to the destination authority

pub mod metrics;
