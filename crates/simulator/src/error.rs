//! Simulator error types.

use domain::{AuthoriseError, DomainError, IssueError};
use projections::ProjectionError;
use thiserror::Error;

/// Errors that end a simulation run.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Issuance failed: {0}")]
    Issue(#[from] IssueError),

    #[error("Authorisation failed: {0}")]
    Authorise(#[from] AuthoriseError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Reading the notification log failed: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(String),

    /// The log does not hold exactly one entry per issuance.
    #[error("Audit mismatch: expected {expected} {what}, found {found}")]
    AuditMismatch {
        what: &'static str,
        expected: u64,
        found: u64,
    },

    /// Racing callers did not produce exactly one successful use.
    #[error("Contention round granted access {winners} times")]
    Contention { winners: u32 },

    #[error("Interrupted")]
    Interrupted,
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimulatorError>;
