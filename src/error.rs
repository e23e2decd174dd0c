//! Domain errors for the engine core
//!
//! Filesystem and process plumbing uses `anyhow` with context; the variants
//! here are the failures callers actually branch on.

use thiserror::Error;

/// Errors raised while building or validating the monitored object graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VigilError {
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    #[error("Unknown service '{service}' on host '{host}'")]
    UnknownService { host: String, service: String },

    #[error("Unknown time period: {0}")]
    UnknownTimePeriod(String),

    #[error("Duplicate object name: {0}")]
    DuplicateName(String),

    /// An inheriting dependency chain loops back on itself
    #[error("Circular dependency detected: {0}")]
    DependencyCycle(String),

    /// Host (or service) parent links form a loop
    #[error("Circular parent relationship detected: {0}")]
    ParentCycle(String),

    /// Time period exclusions reference each other in a loop
    #[error("Circular time period exclusion detected: {0}")]
    ExclusionCycle(String),

    #[error("Invalid time range '{0}'")]
    InvalidTimeRange(String),

    #[error("Invalid date range '{0}'")]
    InvalidDateRange(String),

    #[error("Invalid dependency: {0}")]
    InvalidDependency(String),

    #[error("Malformed check result: {0}")]
    MalformedResult(String),
}
