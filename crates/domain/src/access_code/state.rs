//! Access code state machine.

use serde::{Deserialize, Serialize};

/// The status of an access code.
///
/// Transitions:
/// ```text
///            authorise
/// Issued ──────────────► Used
///   │  ▲                  │
///   │  └── recycle ───────┤
///   │                     │
///   └──── revoke ──► Revoked
/// ```
/// Recycling returns any status to `Issued` once the recycle period has
/// elapsed since the last issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessCodeStatus {
    /// Issued and not yet used.
    #[default]
    Issued,

    /// Consumed by a successful authorisation.
    Used,

    /// Withdrawn before use.
    Revoked,
}

impl AccessCodeStatus {
    /// Returns true if the code may be authorised in this status.
    pub fn can_authorise(&self) -> bool {
        matches!(self, AccessCodeStatus::Issued)
    }

    /// Returns true if the code may be revoked in this status.
    pub fn can_revoke(&self) -> bool {
        matches!(self, AccessCodeStatus::Issued)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessCodeStatus::Issued => "ISSUED",
            AccessCodeStatus::Used => "USED",
            AccessCodeStatus::Revoked => "REVOKED",
        }
    }
}

impl std::fmt::Display for AccessCodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
