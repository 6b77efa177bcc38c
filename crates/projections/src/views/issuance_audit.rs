//! Issuance audit read model.
//!
//! Counts every issuance (creation or recycle) seen in the log and checks
//! that positions arrived without gaps, so an auditor can compare the count
//! against the number of issuances the callers believe they made.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{AccessCode, AccessCodeEvent, AccessCodeNumber, Aggregate};
use event_store::Notification;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Default)]
struct AuditState {
    issuances: u64,
    per_code: HashMap<AggregateId, u64>,
    notifications_seen: u64,
    contiguous: bool,
}

impl AuditState {
    fn fresh() -> Self {
        Self {
            contiguous: true,
            ..Self::default()
        }
    }
}

/// Read model view of issuance totals.
#[derive(Clone)]
pub struct IssuanceAuditView {
    state: Arc<RwLock<AuditState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl IssuanceAuditView {
    /// Creates a new empty audit view.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AuditState::fresh())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Total `Created` plus `Recycled` events seen.
    pub async fn issuances(&self) -> u64 {
        self.state.read().await.issuances
    }

    /// How many times `code_number` has been issued.
    pub async fn issuances_of(&self, code_number: AccessCodeNumber) -> u64 {
        self.state
            .read()
            .await
            .per_code
            .get(&code_number.aggregate_id())
            .copied()
            .unwrap_or(0)
    }

    /// Notifications of any kind seen.
    pub async fn notifications_seen(&self) -> u64 {
        self.state.read().await.notifications_seen
    }

    /// False once a notification arrived that was not the one right after
    /// the previous.
    pub async fn is_contiguous(&self) -> bool {
        self.state.read().await.contiguous
    }
}

impl Default for IssuanceAuditView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for IssuanceAuditView {
    fn name(&self) -> &'static str {
        "IssuanceAuditView"
    }

    async fn handle(&self, notification: &Notification) -> Result<()> {
        let mut pos = self.position.write().await;
        if pos.covers(notification.position) {
            return Ok(());
        }

        let event = &notification.event;
        let is_issuance = if event.aggregate_type == AccessCode::aggregate_type() {
            let access_code_event: AccessCodeEvent =
                serde_json::from_value(event.payload.clone())?;
            access_code_event.issued_on().is_some()
        } else {
            false
        };

        let mut state = self.state.write().await;
        if notification.position != pos.next() {
            tracing::warn!(
                expected = %pos.next(),
                found = %notification.position,
                "issuance audit saw a gap in the notification log"
            );
            state.contiguous = false;
        }
        state.notifications_seen += 1;
        if is_issuance {
            state.issuances += 1;
            *state.per_code.entry(event.aggregate_id).or_insert(0) += 1;
        }

        *pos = pos.advance_to(notification.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = AuditState::fresh();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for IssuanceAuditView {
    fn name(&self) -> &'static str {
        "IssuanceAuditView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.per_code.len())
            .unwrap_or(0)
    }
}
