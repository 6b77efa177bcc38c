//! Read side of the access code system.
//!
//! This crate provides:
//! - [`NotificationLog`] and [`NotificationLogReader`] for paging through the
//!   store's gap-free global log, verifying every page
//! - [`Projection`] trait for processing notifications into read models
//! - [`ReadModel`] trait for query access to folded data
//! - [`ProjectionProcessor`] for feeding the log to projections
//! - Two views: current code status and an issuance audit

pub mod error;
pub mod notification_log;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use notification_log::{
    DEFAULT_SECTION_SIZE, LogSection, NotificationLog, NotificationLogReader,
};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{AccessCodeStatusView, CodeStatusEntry, IssuanceAuditView};
