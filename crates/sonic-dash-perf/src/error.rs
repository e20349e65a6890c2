//! Error types for DASH configuration generation and submission.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::tables::{DashTable, Tier};

/// Result type alias for dash-perf operations.
pub type DashPerfResult<T> = Result<T, DashPerfError>;

/// Errors that can occur while generating, writing or submitting DASH
/// configuration.
#[derive(Debug, Error)]
pub enum DashPerfError {
    /// Failed to read or write a file.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Failed to serialize a document.
    #[error("Failed to serialize {table} document: {source}")]
    Serialize {
        /// The table being serialized.
        table: DashTable,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Two generated entries in one document share a key.
    #[error("Duplicate key in {table} document: {key}")]
    DuplicateKey {
        /// The table being assembled.
        table: DashTable,
        /// The colliding key.
        key: String,
    },

    /// The set collaborator returned a non-zero status.
    #[error("Submission of {table} in tier {tier} failed (status {code}): {message}")]
    SubmissionFailed {
        /// The dependency tier being applied.
        tier: Tier,
        /// The table whose document was rejected.
        table: DashTable,
        /// The non-zero status code.
        code: i32,
        /// The collaborator's diagnostic message, verbatim.
        message: String,
    },

    /// A table never reached its expected entry count.
    #[error(
        "{table} not ready after {waited:?}: expected {expected} entries, observed {observed}"
    )]
    ReadinessTimeout {
        /// The table being polled.
        table: DashTable,
        /// Entries required.
        expected: usize,
        /// Entries seen on the last poll.
        observed: usize,
        /// Total time spent polling.
        waited: Duration,
    },

    /// Redis/database operation failed.
    #[error("Database operation failed: {operation}: {message}")]
    Database {
        /// The operation that failed (e.g., "connect", "scan").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Failed to spawn an external command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl DashPerfError {
    /// Creates an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a database error.
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns the tier this error names, for submission failures and
    /// readiness timeouts.
    pub fn failed_tier(&self) -> Option<Tier> {
        match self {
            DashPerfError::SubmissionFailed { tier, .. } => Some(*tier),
            DashPerfError::ReadinessTimeout { table, .. } => Some(table.tier()),
            _ => None,
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DashPerfError::Database { .. } | DashPerfError::ReadinessTimeout { .. }
        )
    }
}
