//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::access_code::AccessCodeError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A command was rejected by the access code aggregate.
    #[error("Access code error: {0}")]
    AccessCode(AccessCodeError),

    /// Every attempt lost the optimistic concurrency race.
    #[error("Gave up on aggregate {aggregate_id} after {attempts} conflicting attempts")]
    RetriesExhausted {
        aggregate_id: AggregateId,
        attempts: u32,
    },

    /// Stored versions for an aggregate are not 1, 2, 3, ...
    #[error("Corrupt stream for aggregate {aggregate_id}: expected version {expected}, found {found}")]
    CorruptStream {
        aggregate_id: AggregateId,
        expected: Version,
        found: Version,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Check if the same request may succeed when tried again.
    ///
    /// Business rejections and corrupt data are permanent; store outages,
    /// timeouts and lost races are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::EventStore(e) => e.is_transient(),
            DomainError::RetriesExhausted { .. } => true,
            DomainError::AccessCode(_)
            | DomainError::CorruptStream { .. }
            | DomainError::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn store_outages_are_transient() {
        let timeout = DomainError::from(EventStoreError::Timeout {
            operation: "load",
            after: Duration::from_millis(10),
        });
        assert!(timeout.is_transient());

        let down = DomainError::from(EventStoreError::Unavailable("connection reset".into()));
        assert!(down.is_transient());

        let exhausted = DomainError::RetriesExhausted {
            aggregate_id: AggregateId::new(),
            attempts: 5,
        };
        assert!(exhausted.is_transient());
    }

    #[test]
    fn rejections_are_permanent() {
        assert!(!DomainError::AccessCode(AccessCodeError::NotFound).is_transient());

        let corrupt = DomainError::CorruptStream {
            aggregate_id: AggregateId::new(),
            expected: Version::new(2),
            found: Version::new(3),
        };
        assert!(!corrupt.is_transient());
    }
}
