//! Loading and saving event-sourced aggregates.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, Clock, SystemClock};
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreError, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::command::CommandResult;
use crate::config::RetryPolicy;
use crate::error::DomainError;

/// Repository for one aggregate type.
///
/// The repository is responsible for:
/// 1. Reconstituting an aggregate by replaying its stream
/// 2. Persisting new events with the loaded version as the expected version
/// 3. Re-running a command against fresh state when another writer got there first
pub struct Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    store_timeout: Option<Duration>,
    _phantom: PhantomData<A>,
}

impl<S, A> Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a repository with the default retry policy and no store timeout.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            store_timeout: None,
            _phantom: PhantomData,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Clock used to stamp envelopes.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate has no events, returns a default instance at version 0.
    /// Fails with `CorruptStream` if the stored versions are not contiguous
    /// from 1.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self
            .timed("load", self.store.get_events_for_aggregate(aggregate_id))
            .await?;

        let mut aggregate = A::default();
        for envelope in events {
            let expected = aggregate.version().next();
            if envelope.version != expected {
                return Err(DomainError::CorruptStream {
                    aggregate_id,
                    expected,
                    found: envelope.version,
                });
            }

            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it has no events.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.version().is_initial() {
            Ok(None)
        } else {
            Ok(Some(aggregate))
        }
    }

    /// Persists `events` on top of `aggregate`.
    ///
    /// The aggregate's version is the expected version, so a concurrent
    /// writer that committed first makes this fail with
    /// `EventStoreError::ConcurrencyConflict`. An empty batch is a no-op.
    pub async fn save(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        events: Vec<A::Event>,
    ) -> Result<CommandResult<A>, DomainError> {
        let current_version = aggregate.version();

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;

        let options = if current_version.is_initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self
            .timed("append", self.store.append(envelopes, options))
            .await?;

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Loads the aggregate, runs `command_fn` against it and saves the result.
    ///
    /// On a concurrency conflict the aggregate is reloaded and `command_fn`
    /// runs again against the fresh state, so a decision is never committed
    /// on stale data. Gives up with `RetriesExhausted` after
    /// `max_attempts` conflicting attempts. Every other error is returned
    /// immediately.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 1;
        loop {
            let aggregate = self.load(aggregate_id).await?;
            let events = command_fn(&aggregate)?;

            match self.save(aggregate_id, aggregate, events).await {
                Err(DomainError::EventStore(err)) if err.is_concurrency_conflict() => {
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(
                            %aggregate_id,
                            attempts = attempt,
                            "giving up after repeated concurrency conflicts"
                        );
                        return Err(DomainError::RetriesExhausted {
                            aggregate_id,
                            attempts: attempt,
                        });
                    }

                    let delay = self.retry.backoff_for(attempt);
                    tracing::debug!(
                        %aggregate_id,
                        attempt,
                        ?delay,
                        error = %err,
                        "concurrency conflict, reloading"
                    );
                    metrics::counter!("repository_conflict_retries").increment(1);

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let timestamp = self.clock.now();
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .timestamp(timestamp)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = event_store::Result<T>>,
    ) -> event_store::Result<T> {
        match self.store_timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .unwrap_or(Err(EventStoreError::Timeout { operation, after })),
            None => call.await,
        }
    }
}
