//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (counts >= 1, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the engine

use crate::config::schema::Config;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human-readable description of the violation.
    pub message: &'static str,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.max_connections_count == 0 {
        errors.push(ValidationError {
            field: "max_connections_count",
            message: "must be at least 1",
        });
    }

    let ep = &config.endpoint;
    if ep.max_connections_per_route == 0 {
        errors.push(ValidationError {
            field: "endpoint.max_connections_per_route",
            message: "must be at least 1",
        });
    }
    if ep.pipeline_max_size == 0 {
        errors.push(ValidationError {
            field: "endpoint.pipeline_max_size",
            message: "must be at least 1",
        });
    }
    if ep.keep_alive_ms == 0 {
        errors.push(ValidationError {
            field: "endpoint.keep_alive_ms",
            message: "must be greater than zero",
        });
    }
    if ep.connect_timeout_ms == 0 {
        errors.push(ValidationError {
            field: "endpoint.connect_timeout_ms",
            message: "must be greater than zero",
        });
    }
    if ep.connect_attempts == 0 {
        errors.push(ValidationError {
            field: "endpoint.connect_attempts",
            message: "must be at least 1",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
