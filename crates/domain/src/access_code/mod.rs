//! Access code aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod generator;
mod service;
mod state;
mod value_objects;

pub use aggregate::AccessCode;
pub use commands::*;
pub use events::{AccessCodeEvent, AuthorisedData, CreatedData, RecycledData, RevokedData};
pub use generator::{CodeNumberGenerator, RandomCodeNumbers};
pub use service::{AccessCodesService, AuthoriseError, IssueError, RevokeError};
pub use state::AccessCodeStatus;
pub use value_objects::{
    ACCESS_CODES_RANGE, AccessCodeNumber, InvalidCodeNumber, access_period, recycle_period,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons the access code aggregate rejects a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessCodeError {
    /// The code has never been issued.
    #[error("Access code has not been issued")]
    NotFound,

    /// The code is not in the status the command requires.
    #[error("Access code status is {current} but {required} is required")]
    InvalidStatus {
        current: AccessCodeStatus,
        required: AccessCodeStatus,
    },

    /// Access was attempted after the code expired.
    #[error("Access at {accessed_on} is after the code expired at {expires_on}")]
    InvalidAccessTime {
        accessed_on: DateTime<Utc>,
        expires_on: DateTime<Utc>,
    },

    /// The number was issued too recently to be issued again.
    #[error("Access code cannot be recycled before {recyclable_on}")]
    Recycle { recyclable_on: DateTime<Utc> },
}
