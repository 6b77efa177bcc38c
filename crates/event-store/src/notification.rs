//! Global commit order.

use serde::{Deserialize, Serialize};

use crate::EventEnvelope;

/// A 1-based position in the store's global commit order.
///
/// Positions are assigned by the store at commit time, never reused and
/// never skipped: the first committed event is at position 1, the Nth at N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The position of the first event ever committed.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the position `n` entries ahead of this one.
    pub fn advance(&self, n: u64) -> Self {
        Self(self.0 + n)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::first()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A committed event together with its position in the global log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub position: Position,
    pub event: EventEnvelope,
}
