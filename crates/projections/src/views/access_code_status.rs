//! Access code status read model: current status of every issued code.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{AccessCode, AccessCodeEvent, AccessCodeNumber, AccessCodeStatus, Aggregate};
use event_store::{Notification, Position};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Current state of one code in the status view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeStatusEntry {
    pub code_number: AccessCodeNumber,
    pub status: AccessCodeStatus,
    pub issued_on: DateTime<Utc>,
    pub accessed_on: Option<DateTime<Utc>>,
    /// Log position of the last event applied to this entry.
    pub last_position: Position,
}

/// Read model view of every code's current status.
#[derive(Clone, Default)]
pub struct AccessCodeStatusView {
    codes: Arc<RwLock<HashMap<AggregateId, CodeStatusEntry>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl AccessCodeStatusView {
    /// Creates a new empty status view.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, code_number: AccessCodeNumber) -> Option<CodeStatusEntry> {
        self.codes
            .read()
            .await
            .get(&code_number.aggregate_id())
            .cloned()
    }

    pub async fn status_of(&self, code_number: AccessCodeNumber) -> Option<AccessCodeStatus> {
        self.get(code_number).await.map(|entry| entry.status)
    }

    pub async fn count_by_status(&self, status: AccessCodeStatus) -> usize {
        self.codes
            .read()
            .await
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }
}

#[async_trait]
impl Projection for AccessCodeStatusView {
    fn name(&self) -> &'static str {
        "AccessCodeStatusView"
    }

    async fn handle(&self, notification: &Notification) -> Result<()> {
        let mut pos = self.position.write().await;
        if pos.covers(notification.position) {
            return Ok(());
        }

        let event = &notification.event;
        if event.aggregate_type == AccessCode::aggregate_type() {
            let access_code_event: AccessCodeEvent =
                serde_json::from_value(event.payload.clone())?;
            let mut codes = self.codes.write().await;

            match access_code_event {
                AccessCodeEvent::Created(data) => {
                    codes.insert(
                        event.aggregate_id,
                        CodeStatusEntry {
                            code_number: data.code_number,
                            status: AccessCodeStatus::Issued,
                            issued_on: data.issued_on,
                            accessed_on: None,
                            last_position: notification.position,
                        },
                    );
                }
                AccessCodeEvent::Authorised(data) => {
                    if let Some(entry) = codes.get_mut(&event.aggregate_id) {
                        entry.status = AccessCodeStatus::Used;
                        entry.accessed_on = Some(data.accessed_on);
                        entry.last_position = notification.position;
                    }
                }
                AccessCodeEvent::Revoked(_) => {
                    if let Some(entry) = codes.get_mut(&event.aggregate_id) {
                        entry.status = AccessCodeStatus::Revoked;
                        entry.last_position = notification.position;
                    }
                }
                AccessCodeEvent::Recycled(data) => {
                    if let Some(entry) = codes.get_mut(&event.aggregate_id) {
                        entry.status = AccessCodeStatus::Issued;
                        entry.issued_on = data.issued_on;
                        entry.accessed_on = None;
                        entry.last_position = notification.position;
                    }
                }
            }
        }

        *pos = pos.advance_to(notification.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.codes.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for AccessCodeStatusView {
    fn name(&self) -> &'static str {
        "AccessCodeStatusView"
    }

    fn count(&self) -> usize {
        // Use try_read to avoid blocking; returns 0 if lock is held
        self.codes.try_read().map(|c| c.len()).unwrap_or(0)
    }
}
