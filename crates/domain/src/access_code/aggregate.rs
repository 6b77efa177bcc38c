//! Access code aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    AccessCodeError, AccessCodeEvent, AccessCodeNumber, AccessCodeStatus, access_period,
    recycle_period,
};

/// Access code aggregate root.
///
/// A numbered, single-use code valid for one access period after issue.
/// Command methods only decide: they return the events to record and never
/// mutate `self`. State changes happen in [`Aggregate::apply`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessCode {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    code_number: Option<AccessCodeNumber>,

    status: AccessCodeStatus,

    /// Time of the most recent issue (creation or recycle).
    issued_on: Option<DateTime<Utc>>,

    /// Time of use; cleared by a recycle.
    accessed_on: Option<DateTime<Utc>>,
}

impl Aggregate for AccessCode {
    type Event = AccessCodeEvent;
    type Error = AccessCodeError;

    fn aggregate_type() -> &'static str {
        "AccessCode"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AccessCodeEvent::Created(data) => {
                self.id = Some(data.code_number.aggregate_id());
                self.code_number = Some(data.code_number);
                self.status = AccessCodeStatus::Issued;
                self.issued_on = Some(data.issued_on);
                self.accessed_on = None;
            }
            AccessCodeEvent::Authorised(data) => {
                self.status = AccessCodeStatus::Used;
                self.accessed_on = Some(data.accessed_on);
            }
            AccessCodeEvent::Revoked(_) => {
                self.status = AccessCodeStatus::Revoked;
            }
            AccessCodeEvent::Recycled(data) => {
                self.status = AccessCodeStatus::Issued;
                self.issued_on = Some(data.issued_on);
                self.accessed_on = None;
            }
        }
    }
}

// Commands
impl AccessCode {
    /// Issues `code_number` for the first time.
    pub fn create(code_number: AccessCodeNumber, issued_on: DateTime<Utc>) -> Vec<AccessCodeEvent> {
        vec![AccessCodeEvent::created(code_number, issued_on)]
    }

    /// Uses the code.
    ///
    /// Requires `Issued` and `accessed_on <= issued_on + access_period()`.
    /// There is no lower bound: access stamped before the issue time is
    /// accepted.
    pub fn authorise(
        &self,
        accessed_on: DateTime<Utc>,
    ) -> Result<Vec<AccessCodeEvent>, AccessCodeError> {
        let issued_on = self.require_issued_on()?;
        if !self.status.can_authorise() {
            return Err(self.invalid_status(AccessCodeStatus::Issued));
        }

        let expires_on = issued_on + access_period();
        if accessed_on > expires_on {
            return Err(AccessCodeError::InvalidAccessTime {
                accessed_on,
                expires_on,
            });
        }

        Ok(vec![AccessCodeEvent::authorised(accessed_on)])
    }

    /// Withdraws an unused code.
    pub fn revoke(&self) -> Result<Vec<AccessCodeEvent>, AccessCodeError> {
        self.require_issued_on()?;
        if !self.status.can_revoke() {
            return Err(self.invalid_status(AccessCodeStatus::Issued));
        }

        Ok(vec![AccessCodeEvent::revoked()])
    }

    /// Issues the number again.
    ///
    /// Allowed from any status once `issued_on` is at least
    /// `recycle_period()` after the previous issue.
    pub fn recycle(
        &self,
        issued_on: DateTime<Utc>,
    ) -> Result<Vec<AccessCodeEvent>, AccessCodeError> {
        let previous = self.require_issued_on()?;

        let recyclable_on = previous + recycle_period();
        if issued_on < recyclable_on {
            return Err(AccessCodeError::Recycle { recyclable_on });
        }

        Ok(vec![AccessCodeEvent::recycled(issued_on)])
    }

    /// Fails with `InvalidStatus` unless the code is in `required`.
    pub fn assert_status(&self, required: AccessCodeStatus) -> Result<(), AccessCodeError> {
        if self.status != required {
            return Err(self.invalid_status(required));
        }
        Ok(())
    }

    fn invalid_status(&self, required: AccessCodeStatus) -> AccessCodeError {
        AccessCodeError::InvalidStatus {
            current: self.status,
            required,
        }
    }

    fn require_issued_on(&self) -> Result<DateTime<Utc>, AccessCodeError> {
        self.issued_on.ok_or(AccessCodeError::NotFound)
    }
}

// Queries
impl AccessCode {
    /// Returns true once a `Created` event has been applied.
    pub fn exists(&self) -> bool {
        self.issued_on.is_some()
    }

    pub fn code_number(&self) -> Option<AccessCodeNumber> {
        self.code_number
    }

    pub fn status(&self) -> AccessCodeStatus {
        self.status
    }

    pub fn issued_on(&self) -> Option<DateTime<Utc>> {
        self.issued_on
    }

    pub fn accessed_on(&self) -> Option<DateTime<Utc>> {
        self.accessed_on
    }

    /// Last instant at which the code can be used.
    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.issued_on.map(|t| t + access_period())
    }

    /// First instant at which the number can be issued again.
    pub fn recyclable_on(&self) -> Option<DateTime<Utc>> {
        self.issued_on.map(|t| t + recycle_period())
    }
}
