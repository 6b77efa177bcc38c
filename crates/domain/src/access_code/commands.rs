//! Access code commands.

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::command::Command;

use super::{AccessCode, AccessCodeNumber};

/// Command to issue a number, creating or recycling its code.
#[derive(Debug, Clone)]
pub struct IssueAccessCode {
    pub code_number: AccessCodeNumber,
    pub issued_on: DateTime<Utc>,
}

impl IssueAccessCode {
    pub fn new(code_number: AccessCodeNumber, issued_on: DateTime<Utc>) -> Self {
        Self {
            code_number,
            issued_on,
        }
    }
}

impl Command for IssueAccessCode {
    type Aggregate = AccessCode;

    fn aggregate_id(&self) -> AggregateId {
        self.code_number.aggregate_id()
    }
}

/// Command to use a code.
#[derive(Debug, Clone)]
pub struct AuthoriseAccess {
    pub code_number: AccessCodeNumber,
    pub accessed_on: DateTime<Utc>,
}

impl AuthoriseAccess {
    pub fn new(code_number: AccessCodeNumber, accessed_on: DateTime<Utc>) -> Self {
        Self {
            code_number,
            accessed_on,
        }
    }
}

impl Command for AuthoriseAccess {
    type Aggregate = AccessCode;

    fn aggregate_id(&self) -> AggregateId {
        self.code_number.aggregate_id()
    }
}

/// Command to withdraw an unused code.
#[derive(Debug, Clone)]
pub struct RevokeAccess {
    pub code_number: AccessCodeNumber,
}

impl RevokeAccess {
    pub fn new(code_number: AccessCodeNumber) -> Self {
        Self { code_number }
    }
}

impl Command for RevokeAccess {
    type Aggregate = AccessCode;

    fn aggregate_id(&self) -> AggregateId {
        self.code_number.aggregate_id()
    }
}
