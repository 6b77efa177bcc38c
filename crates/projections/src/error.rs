//! Projection error types.

use event_store::Position;
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The log skipped or repeated a position.
    #[error("Notification log gap: expected position {expected}, found {found}")]
    Gap { expected: Position, found: Position },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
