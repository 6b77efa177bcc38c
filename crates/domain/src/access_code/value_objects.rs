//! Value objects for the access code domain.

use std::ops::RangeInclusive;

use chrono::Duration;
use common::AggregateId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every number an access code can take: seven digits, no leading zero.
pub const ACCESS_CODES_RANGE: RangeInclusive<u32> = 1_000_000..=1_999_999;

/// How long after issue a code may be used.
pub fn access_period() -> Duration {
    Duration::days(1)
}

/// How long after issue a number stays reserved before it can be reissued.
pub fn recycle_period() -> Duration {
    Duration::days(180)
}

/// The number was outside [`ACCESS_CODES_RANGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Access code number {0} is outside 1000000..=1999999")]
pub struct InvalidCodeNumber(pub u32);

/// The human-facing number of an access code.
///
/// The number doubles as the aggregate identity: see [`Self::aggregate_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AccessCodeNumber(u32);

impl AccessCodeNumber {
    pub fn new(value: u32) -> Result<Self, InvalidCodeNumber> {
        if ACCESS_CODES_RANGE.contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidCodeNumber(value))
        }
    }

    /// For values already drawn from [`ACCESS_CODES_RANGE`].
    pub(super) fn from_range(value: u32) -> Self {
        debug_assert!(ACCESS_CODES_RANGE.contains(&value));
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Stable identity of the aggregate holding this number.
    ///
    /// A UUID v5 in the URL namespace over `/access_codes/{number}`, so the
    /// same number always maps to the same stream.
    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::from_url_path(&format!("/access_codes/{}", self.0))
    }
}

impl std::fmt::Display for AccessCodeNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for AccessCodeNumber {
    type Error = InvalidCodeNumber;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccessCodeNumber> for u32 {
    fn from(number: AccessCodeNumber) -> Self {
        number.0
    }
}
