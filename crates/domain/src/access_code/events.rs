//! Access code domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::AccessCodeNumber;

/// Events that can occur on an access code aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccessCodeEvent {
    /// The number was issued for the first time.
    Created(CreatedData),

    /// The code was used.
    Authorised(AuthorisedData),

    /// The code was withdrawn.
    Revoked(RevokedData),

    /// The number was issued again after the recycle period.
    Recycled(RecycledData),
}

impl AccessCodeEvent {
    pub fn created(code_number: AccessCodeNumber, issued_on: DateTime<Utc>) -> Self {
        AccessCodeEvent::Created(CreatedData {
            code_number,
            issued_on,
        })
    }

    pub fn authorised(accessed_on: DateTime<Utc>) -> Self {
        AccessCodeEvent::Authorised(AuthorisedData { accessed_on })
    }

    pub fn revoked() -> Self {
        AccessCodeEvent::Revoked(RevokedData {})
    }

    pub fn recycled(issued_on: DateTime<Utc>) -> Self {
        AccessCodeEvent::Recycled(RecycledData { issued_on })
    }

    /// Issue time carried by `Created` and `Recycled`.
    pub fn issued_on(&self) -> Option<DateTime<Utc>> {
        match self {
            AccessCodeEvent::Created(data) => Some(data.issued_on),
            AccessCodeEvent::Recycled(data) => Some(data.issued_on),
            AccessCodeEvent::Authorised(_) | AccessCodeEvent::Revoked(_) => None,
        }
    }
}

impl DomainEvent for AccessCodeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccessCodeEvent::Created(_) => "AccessCodeCreated",
            AccessCodeEvent::Authorised(_) => "AccessCodeAuthorised",
            AccessCodeEvent::Revoked(_) => "AccessCodeRevoked",
            AccessCodeEvent::Recycled(_) => "AccessCodeRecycled",
        }
    }
}

/// Data for Created event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedData {
    pub code_number: AccessCodeNumber,
    pub issued_on: DateTime<Utc>,
}

/// Data for Authorised event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorisedData {
    pub accessed_on: DateTime<Utc>,
}

/// Data for Revoked event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevokedData {}

/// Data for Recycled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecycledData {
    pub issued_on: DateTime<Utc>,
}
