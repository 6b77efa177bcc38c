//! Paged, verified read-back of the store's global log.

use event_store::{EventStore, Notification, Position};

use crate::{ProjectionError, Result};

/// Number of notifications per [`LogSection`] unless configured otherwise.
pub const DEFAULT_SECTION_SIZE: usize = 10;

/// A fixed-size window of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSection {
    /// Position of the first slot in this section.
    pub start: Position,
    pub items: Vec<Notification>,
    /// Start of the following section, if this one is full.
    pub next: Option<Position>,
}

/// Read access to the notification log.
///
/// Every read checks that the positions it got back are exactly
/// `start, start + 1, ...`, so a reader paging through the log can neither
/// miss nor double-count an event without noticing.
#[derive(Clone)]
pub struct NotificationLog<S: EventStore> {
    store: S,
    section_size: usize,
}

impl<S: EventStore> NotificationLog<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            section_size: DEFAULT_SECTION_SIZE,
        }
    }

    /// Sets the section size; values below 1 are raised to 1.
    pub fn with_section_size(mut self, section_size: usize) -> Self {
        self.section_size = section_size.max(1);
        self
    }

    pub fn section_size(&self) -> usize {
        self.section_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Position of the most recent notification, or None for an empty log.
    pub async fn head(&self) -> Result<Option<Position>> {
        Ok(self.store.max_position().await?)
    }

    /// Reads up to `limit` notifications from `start` (inclusive).
    ///
    /// Reading the same range twice yields the same notifications, since
    /// committed entries are never rewritten.
    pub async fn read_range(&self, start: Position, limit: usize) -> Result<Vec<Notification>> {
        let start = start.max(Position::first());
        let items = self.store.read_notifications(start, limit).await?;

        let mut expected = start;
        for notification in &items {
            if notification.position != expected {
                return Err(ProjectionError::Gap {
                    expected,
                    found: notification.position,
                });
            }
            expected = expected.next();
        }

        Ok(items)
    }

    /// Reads the section that begins at `start`.
    pub async fn section(&self, start: Position) -> Result<LogSection> {
        let start = start.max(Position::first());
        let items = self.read_range(start, self.section_size).await?;
        let next = (items.len() == self.section_size)
            .then(|| start.advance(self.section_size as u64));

        Ok(LogSection { start, items, next })
    }
}

/// A cursor over the notification log.
pub struct NotificationLogReader<S: EventStore> {
    log: NotificationLog<S>,
    position: Position,
}

impl<S: EventStore> NotificationLogReader<S> {
    /// Creates a reader positioned at the start of the log.
    pub fn new(log: NotificationLog<S>) -> Self {
        Self {
            log,
            position: Position::first(),
        }
    }

    /// The next position this reader will return.
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn seek(&mut self, position: Position) {
        self.position = position.max(Position::first());
    }

    /// Reads up to `limit` notifications and moves past them.
    pub async fn read_next(&mut self, limit: usize) -> Result<Vec<Notification>> {
        let items = self.log.read_range(self.position, limit).await?;
        self.position = self.position.advance(items.len() as u64);
        Ok(items)
    }

    /// Reads everything from the current position to the head, one section
    /// at a time.
    pub async fn read_all(&mut self) -> Result<Vec<Notification>> {
        let mut all = Vec::new();
        loop {
            let section = self.log.section(self.position).await?;
            self.position = self.position.advance(section.items.len() as u64);
            all.extend(section.items);
            if section.next.is_none() {
                break;
            }
        }

        tracing::debug!(read = all.len(), next = %self.position, "read notification log");
        Ok(all)
    }
}
