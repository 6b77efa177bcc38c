//! Domain layer for the access-code system.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - A generic repository that reconstitutes aggregates from their event
//!   streams and persists new events under optimistic concurrency, with a
//!   bounded retry on conflicts
//! - The AccessCode aggregate and its state machine
//! - AccessCodesService, the issue/authorise/revoke use cases

pub mod access_code;
pub mod aggregate;
pub mod command;
pub mod config;
pub mod error;
pub mod repository;

pub use access_code::{
    ACCESS_CODES_RANGE, AccessCode, AccessCodeError, AccessCodeEvent, AccessCodeNumber,
    AccessCodeStatus, AccessCodesService, AuthoriseAccess, AuthoriseError, CodeNumberGenerator,
    InvalidCodeNumber, IssueAccessCode, IssueError, RandomCodeNumbers, RevokeAccess, RevokeError,
    access_period, recycle_period,
};
pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandResult};
pub use config::{AccessCodesConfig, RetryPolicy};
pub use error::DomainError;
pub use repository::Repository;
