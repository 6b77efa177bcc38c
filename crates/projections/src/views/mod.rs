//! Read model views over the notification log.

pub mod access_code_status;
pub mod issuance_audit;

pub use access_code_status::{AccessCodeStatusView, CodeStatusEntry};
pub use issuance_audit::IssuanceAuditView;
