//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::{Notification, Position};

use crate::Result;

/// The last notification log position a projection has handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    /// 0 until the first notification is handled.
    pub last_handled: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self { last_handled: 0 }
    }

    /// The next log position this projection wants.
    pub fn next(&self) -> Position {
        Position::new(self.last_handled + 1)
    }

    /// Returns true if `position` was already handled.
    pub fn covers(&self, position: Position) -> bool {
        position.as_u64() <= self.last_handled
    }

    /// Moves to `position`.
    pub fn advance_to(&self, position: Position) -> Self {
        Self {
            last_handled: position.as_u64(),
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_handled)
    }
}

/// A projection that folds the notification log into a read model.
///
/// Notifications must be handled in position order. A notification at or
/// below [`Projection::position`] is ignored, so redelivery is harmless.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single notification, updating the projection's read model.
    async fn handle(&self, notification: &Notification) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
