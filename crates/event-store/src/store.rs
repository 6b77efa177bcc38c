use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Notification, Position, Result, Version,
};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the aggregate for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A stream of committed notifications, in position order.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Result<Notification>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store keeps one ordered stream per aggregate and a single global
/// log of every committed event. All implementations must be thread-safe.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to one aggregate's stream.
    ///
    /// Events are appended atomically - either all succeed or none do.
    /// The first event must carry the version right after the stream's
    /// current version. If `options.expected_version` is set, the operation
    /// fails with `ConcurrencyConflict` when the current version differs, so
    /// at most one writer wins any given version.
    ///
    /// Every committed event is given the next global [`Position`] under the
    /// same exclusion as the version check, which keeps the log gap-free and
    /// in commit order.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Retrieves all events for a specific aggregate.
    ///
    /// Events are returned in version order (oldest first).
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Reads up to `limit` notifications starting at `start` (inclusive).
    ///
    /// Only committed positions are returned, in ascending order. Reading the
    /// same range twice yields the same notifications. Fails with
    /// `InvalidPosition` if `start` is 0.
    async fn read_notifications(&self, start: Position, limit: usize)
    -> Result<Vec<Notification>>;

    /// Returns the position of the most recently committed event.
    async fn max_position(&self) -> Result<Option<Position>>;

    /// Streams the committed notifications from `from` (inclusive) onward.
    /// Fails with `InvalidPosition` if `from` is 0.
    async fn stream_notifications(&self, from: Position) -> Result<NotificationStream>;
}

/// Validates the shape of a batch before appending.
///
/// Rejects empty batches, batches that span aggregates, and versions that
/// are not consecutive.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}
