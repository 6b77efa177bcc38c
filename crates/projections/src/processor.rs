//! Projection processor for feeding the notification log to projections.

use event_store::{EventStore, Notification, Position};
use futures_util::StreamExt;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Delivers notifications from an event store to projections.
///
/// The processor supports:
/// - Catch-up: streams the log from the earliest position any projection
///   still needs and delivers each notification in order
/// - Single notification delivery
/// - Rebuild: resets all projections and replays from position 1
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Brings every projection up to the head of the log.
    ///
    /// Returns the number of notifications read. Fails with `Gap` if the
    /// stream skips a position.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut from: Option<Position> = None;
        for projection in &self.projections {
            let next = projection.position().await.next();
            from = Some(from.map_or(next, |f| f.min(next)));
        }
        let Some(from) = from else {
            return Ok(0);
        };

        let mut stream = self.store.stream_notifications(from).await?;
        let mut expected = from;
        let mut read: u64 = 0;

        while let Some(result) = stream.next().await {
            let notification = result?;
            if notification.position != expected {
                return Err(ProjectionError::Gap {
                    expected,
                    found: notification.position,
                });
            }

            self.process_notification(&notification).await?;
            expected = expected.next();
            read += 1;
        }

        tracing::info!(from = %from, notifications = read, "catch-up complete");

        Ok(read)
    }

    /// Delivers a single notification to every projection that has not seen it.
    #[tracing::instrument(
        skip(self, notification),
        fields(position = %notification.position, event_type = %notification.event.event_type)
    )]
    pub async fn process_notification(&self, notification: &Notification) -> Result<()> {
        for projection in &self.projections {
            if projection.position().await.covers(notification.position) {
                continue;
            }
            projection.handle(notification).await?;
            metrics::counter!("projections_notifications_processed").increment(1);
        }
        Ok(())
    }

    /// Resets all projections and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
