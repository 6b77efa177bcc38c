use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Notification, Position, Result, Version,
    store::{AppendOptions, EventStore, NotificationStream, validate_events_for_append},
};

/// The commit log and a per-aggregate index into it.
///
/// An event's global position is its index in `log` plus one.
#[derive(Default)]
struct Inner {
    log: Vec<EventEnvelope>,
    streams: HashMap<AggregateId, Vec<usize>>,
}

impl Inner {
    fn current_version(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|indexes| indexes.last())
            .map(|&i| self.log[i].version)
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store implementation.
///
/// A single lock guards both the version check and the position assignment,
/// so commits are serialized: the global log is gap-free and its order is
/// the commit order.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;
        let last_version = events[events.len() - 1].version;

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let current_version = inner.current_version(aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Unique (aggregate, version) constraint
        if first_new_version <= current_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        if first_new_version != current_version.next() {
            return Err(EventStoreError::InvalidAppend(format!(
                "Version gap for aggregate {aggregate_id}: stream is at {current_version}, got {first_new_version}"
            )));
        }

        let count = events.len();
        let first_index = inner.log.len();
        inner
            .streams
            .entry(aggregate_id)
            .or_default()
            .extend(first_index..first_index + count);
        inner.log.extend(events);

        metrics::counter!("event_store_events_appended").increment(count as u64);
        tracing::trace!(
            %aggregate_id,
            version = %last_version,
            position = first_index + count,
            "events committed"
        );

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        let events = inner
            .streams
            .get(&aggregate_id)
            .map(|indexes| indexes.iter().map(|&i| inner.log[i].clone()).collect())
            .unwrap_or_default();
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        let version = inner.current_version(aggregate_id);
        Ok((!version.is_initial()).then_some(version))
    }

    async fn read_notifications(
        &self,
        start: Position,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        if start < Position::first() {
            return Err(EventStoreError::InvalidPosition(start));
        }

        let inner = self.inner.read().await;
        let skip = (start.as_u64() - 1) as usize;

        let notifications = inner
            .log
            .iter()
            .enumerate()
            .skip(skip)
            .take(limit)
            .map(|(i, event)| Notification {
                position: Position::new(i as u64 + 1),
                event: event.clone(),
            })
            .collect();

        Ok(notifications)
    }

    async fn max_position(&self) -> Result<Option<Position>> {
        let len = self.inner.read().await.log.len() as u64;
        Ok((len > 0).then(|| Position::new(len)))
    }

    async fn stream_notifications(&self, from: Position) -> Result<NotificationStream> {
        use futures_util::stream;

        let notifications = self.read_notifications(from, usize::MAX).await?;
        let stream = stream::iter(notifications.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_event(
        aggregate_id: AggregateId,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("AccessCode")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        let event = create_test_event(aggregate_id, Version::first(), "AccessCodeCreated");

        let result = store.append(vec![event], AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::first());

        let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_multiple_events() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "AccessCodeCreated"),
            create_test_event(aggregate_id, Version::new(2), "AccessCodeAuthorised"),
            create_test_event(aggregate_id, Version::new(3), "AccessCodeRecycled"),
        ];

        let result = store.append(events, AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::new(3));

        let stored = store.get_events_for_aggregate(aggregate_id).await.unwrap();
        let versions: Vec<_> = stored.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, Version::first(), "AccessCodeCreated");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(aggregate_id, Version::new(2), "AccessCodeAuthorised");
        let result = store
            .append(
                vec![event2],
                AppendOptions::expect_version(Version::initial()),
            )
            .await;

        match result {
            Err(EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::initial());
                assert_eq!(actual, Version::first());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn append_with_correct_expected_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, Version::first(), "AccessCodeCreated");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(aggregate_id, Version::new(2), "AccessCodeRevoked");
        let result = store
            .append(
                vec![event2],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert_eq!(result.unwrap(), Version::new(2));
    }

    #[tokio::test]
    async fn duplicate_version_conflicts_without_expected_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let result = store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "B")],
                AppendOptions::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn version_gap_is_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let result = store
            .append(
                vec![create_test_event(aggregate_id, Version::new(2), "A")],
                AppendOptions::new(),
            )
            .await;

        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
        assert_eq!(store.event_count().await, 0);
        assert_eq!(store.max_position().await.unwrap(), None);
    }

    #[tokio::test]
    async fn notifications_follow_commit_order_across_aggregates() {
        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();

        for (id, version, event_type) in [
            (id1, 1, "AccessCodeCreated"),
            (id2, 1, "AccessCodeCreated"),
            (id1, 2, "AccessCodeAuthorised"),
        ] {
            store
                .append(
                    vec![create_test_event(id, Version::new(version), event_type)],
                    AppendOptions::expect_version(Version::new(version - 1)),
                )
                .await
                .unwrap();
        }

        let log = store.read_notifications(Position::first(), 10).await.unwrap();
        let seen: Vec<_> = log
            .iter()
            .map(|n| (n.position.as_u64(), n.event.aggregate_id, n.event.version.as_i64()))
            .collect();
        assert_eq!(seen, vec![(1, id1, 1), (2, id2, 1), (3, id1, 2)]);
        assert_eq!(store.max_position().await.unwrap(), Some(Position::new(3)));
    }

    #[tokio::test]
    async fn read_notifications_pages_without_overlap() {
        let store = InMemoryEventStore::new();
        for _ in 0..5 {
            let event = create_test_event(AggregateId::new(), Version::first(), "AccessCodeCreated");
            store.append(vec![event], AppendOptions::expect_new()).await.unwrap();
        }

        let first = store.read_notifications(Position::first(), 2).await.unwrap();
        let second = store.read_notifications(Position::new(3), 2).await.unwrap();
        let third = store.read_notifications(Position::new(5), 2).await.unwrap();
        let past_end = store.read_notifications(Position::new(6), 2).await.unwrap();

        let positions: Vec<_> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|n| n.position.as_u64())
            .collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
        assert!(past_end.is_empty());

        // Re-reading is idempotent
        let again = store.read_notifications(Position::new(3), 2).await.unwrap();
        assert_eq!(again, second);
    }

    #[tokio::test]
    async fn position_zero_is_rejected() {
        let store = InMemoryEventStore::new();
        let event = create_test_event(AggregateId::new(), Version::first(), "AccessCodeCreated");
        store.append(vec![event], AppendOptions::expect_new()).await.unwrap();

        let err = store.read_notifications(Position::new(0), 10).await.unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidPosition(p) if p.as_u64() == 0));
        assert!(!err.is_transient());

        assert!(store.stream_notifications(Position::new(0)).await.is_err());
    }

    #[tokio::test]
    async fn committed_positions_keep_their_event() {
        let store = InMemoryEventStore::new();
        let first = create_test_event(AggregateId::new(), Version::first(), "AccessCodeCreated");
        store.append(vec![first], AppendOptions::expect_new()).await.unwrap();
        let before = store.read_notifications(Position::first(), 1).await.unwrap();

        for _ in 0..3 {
            let event = create_test_event(AggregateId::new(), Version::first(), "AccessCodeCreated");
            store.append(vec![event], AppendOptions::expect_new()).await.unwrap();
        }

        let after = store.read_notifications(Position::first(), 1).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(store.max_position().await.unwrap(), Some(Position::new(4)));
    }

    #[tokio::test]
    async fn concurrent_appends_to_one_aggregate_have_one_winner() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "AccessCodeCreated")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let event = create_test_event(aggregate_id, Version::new(2), "AccessCodeAuthorised");
                store
                    .append(vec![event], AppendOptions::expect_version(Version::first()))
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(e.is_concurrency_conflict()),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(
            store.get_aggregate_version(aggregate_id).await.unwrap(),
            Some(Version::new(2))
        );
    }

    #[tokio::test]
    async fn concurrent_appends_keep_log_gap_free() {
        let store = InMemoryEventStore::new();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = AggregateId::new();
                for version in 1..=3 {
                    let event = create_test_event(id, Version::new(version), "E");
                    store
                        .append(
                            vec![event],
                            AppendOptions::expect_version(Version::new(version - 1)),
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = store.read_notifications(Position::first(), usize::MAX).await.unwrap();
        assert_eq!(log.len(), 96);
        for (i, notification) in log.iter().enumerate() {
            assert_eq!(notification.position.as_u64(), i as u64 + 1);
        }
    }

    #[tokio::test]
    async fn stream_notifications_from_position() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        for _ in 0..3 {
            let event = create_test_event(AggregateId::new(), Version::first(), "AccessCodeCreated");
            store.append(vec![event], AppendOptions::new()).await.unwrap();
        }

        let stream = store.stream_notifications(Position::new(2)).await.unwrap();
        let positions: Vec<_> = stream
            .map(|n| n.unwrap().position.as_u64())
            .collect()
            .await;
        assert_eq!(positions, vec![2, 3]);
    }

    #[tokio::test]
    async fn get_aggregate_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let version = store.get_aggregate_version(aggregate_id).await.unwrap();
        assert!(version.is_none());

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "Event1"),
            create_test_event(aggregate_id, Version::new(2), "Event2"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let version = store.get_aggregate_version(aggregate_id).await.unwrap();
        assert_eq!(version, Some(Version::new(2)));
    }
}
