//! Access code service: the issue, authorise and revoke use cases.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::Clock;
use event_store::EventStore;
use thiserror::Error;

use crate::aggregate::Aggregate;
use crate::command::{Command, CommandResult};
use crate::config::AccessCodesConfig;
use crate::error::DomainError;
use crate::repository::Repository;

use super::{
    AccessCode, AccessCodeError, AccessCodeNumber, AccessCodeStatus, AuthoriseAccess,
    CodeNumberGenerator, IssueAccessCode, RandomCodeNumbers, RevokeAccess,
};

impl From<AccessCodeError> for DomainError {
    fn from(e: AccessCodeError) -> Self {
        DomainError::AccessCode(e)
    }
}

/// Why a number could not be issued.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The number was issued too recently.
    #[error("Access code {code_number} cannot be reissued before {recyclable_on}")]
    Recycle {
        code_number: AccessCodeNumber,
        recyclable_on: DateTime<Utc>,
    },

    /// Issuing did not leave the code `Issued`.
    #[error("Access code {code_number} ended up {status} after issue")]
    InvalidStatus {
        code_number: AccessCodeNumber,
        status: AccessCodeStatus,
    },

    /// Every random draw hit a number that is still cooling down.
    #[error("No issuable access code number found in {draws} draws")]
    Exhausted { draws: u32 },

    #[error("Could not issue access code {code_number}: {source}")]
    Unavailable {
        code_number: AccessCodeNumber,
        #[source]
        source: DomainError,
    },
}

impl IssueError {
    /// Check if the same request may succeed when tried again.
    pub fn is_transient(&self) -> bool {
        match self {
            IssueError::Unavailable { source, .. } => source.is_transient(),
            IssueError::Exhausted { .. } => true,
            IssueError::Recycle { .. } | IssueError::InvalidStatus { .. } => false,
        }
    }
}

/// Why access was not granted.
///
/// Unknown, expired and already used codes are all reported as
/// `AccessDenied` so a caller cannot probe which numbers exist.
#[derive(Debug, Error)]
pub enum AuthoriseError {
    #[error("Access denied")]
    AccessDenied,

    #[error("Could not authorise access: {0}")]
    Unavailable(#[source] DomainError),
}

impl AuthoriseError {
    pub fn is_transient(&self) -> bool {
        match self {
            AuthoriseError::AccessDenied => false,
            AuthoriseError::Unavailable(source) => source.is_transient(),
        }
    }
}

/// Why a code could not be revoked.
#[derive(Debug, Error)]
pub enum RevokeError {
    #[error("Access code {0} has not been issued")]
    NotFound(AccessCodeNumber),

    #[error("Access code {code_number} is {status} and cannot be revoked")]
    InvalidStatus {
        code_number: AccessCodeNumber,
        status: AccessCodeStatus,
    },

    #[error("Could not revoke access code: {0}")]
    Unavailable(#[source] DomainError),
}

impl RevokeError {
    pub fn is_transient(&self) -> bool {
        match self {
            RevokeError::Unavailable(source) => source.is_transient(),
            RevokeError::NotFound(_) | RevokeError::InvalidStatus { .. } => false,
        }
    }
}

/// Service for managing access codes.
///
/// Each use case loads the code, lets the aggregate decide, and appends the
/// resulting event under optimistic concurrency. Lost races are retried by
/// the repository against fresh state.
pub struct AccessCodesService<S: EventStore> {
    repository: Repository<S, AccessCode>,
    generator: Arc<dyn CodeNumberGenerator>,
}

impl<S: EventStore> AccessCodesService<S> {
    /// Creates a service with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, &AccessCodesConfig::default())
    }

    pub fn with_config(store: S, config: &AccessCodesConfig) -> Self {
        Self {
            repository: Repository::new(store)
                .with_retry_policy(config.retry.clone())
                .with_store_timeout(config.store_timeout),
            generator: Arc::new(RandomCodeNumbers),
        }
    }

    /// Replaces the source of numbers used by random issue.
    pub fn with_generator(mut self, generator: impl CodeNumberGenerator + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    /// Clock used to stamp stored events.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.repository = self.repository.with_clock(clock);
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &Repository<S, AccessCode> {
        &self.repository
    }

    /// Issues a number: creates its code, or recycles it if it already exists.
    #[tracing::instrument(skip(self), fields(code_number = %cmd.code_number))]
    pub async fn issue_access_code(
        &self,
        cmd: IssueAccessCode,
    ) -> Result<CommandResult<AccessCode>, IssueError> {
        let code_number = cmd.code_number;
        let issued_on = cmd.issued_on;

        let result = self
            .repository
            .execute(cmd.aggregate_id(), |code| {
                let events = if code.exists() {
                    code.recycle(issued_on)?
                } else {
                    AccessCode::create(code_number, issued_on)
                };

                let mut issued = code.clone();
                issued.apply_events(events.iter().cloned());
                issued.assert_status(AccessCodeStatus::Issued)?;

                Ok(events)
            })
            .await;

        match result {
            Ok(result) => {
                metrics::counter!("access_codes_issued").increment(1);
                tracing::debug!(version = %result.new_version, "access code issued");
                Ok(result)
            }
            Err(DomainError::AccessCode(AccessCodeError::Recycle { recyclable_on })) => {
                Err(IssueError::Recycle {
                    code_number,
                    recyclable_on,
                })
            }
            Err(DomainError::AccessCode(AccessCodeError::InvalidStatus { current, .. })) => {
                Err(IssueError::InvalidStatus {
                    code_number,
                    status: current,
                })
            }
            Err(source) => Err(IssueError::Unavailable {
                code_number,
                source,
            }),
        }
    }

    /// Uses a code.
    #[tracing::instrument(skip(self), fields(code_number = %cmd.code_number))]
    pub async fn authorise_access(
        &self,
        cmd: AuthoriseAccess,
    ) -> Result<CommandResult<AccessCode>, AuthoriseError> {
        let accessed_on = cmd.accessed_on;

        let result = self
            .repository
            .execute(cmd.aggregate_id(), |code| code.authorise(accessed_on))
            .await;

        match result {
            Ok(result) => {
                metrics::counter!("access_codes_authorised").increment(1);
                Ok(result)
            }
            Err(DomainError::AccessCode(reason)) => {
                metrics::counter!("access_codes_denied").increment(1);
                tracing::debug!(%reason, "access denied");
                Err(AuthoriseError::AccessDenied)
            }
            Err(e) => Err(AuthoriseError::Unavailable(e)),
        }
    }

    /// Withdraws an unused code.
    #[tracing::instrument(skip(self), fields(code_number = %cmd.code_number))]
    pub async fn revoke_access(
        &self,
        cmd: RevokeAccess,
    ) -> Result<CommandResult<AccessCode>, RevokeError> {
        let code_number = cmd.code_number;

        let result = self
            .repository
            .execute(cmd.aggregate_id(), |code| code.revoke())
            .await;

        match result {
            Ok(result) => {
                metrics::counter!("access_codes_revoked").increment(1);
                Ok(result)
            }
            Err(DomainError::AccessCode(AccessCodeError::NotFound)) => {
                Err(RevokeError::NotFound(code_number))
            }
            Err(DomainError::AccessCode(AccessCodeError::InvalidStatus { current, .. })) => {
                Err(RevokeError::InvalidStatus {
                    code_number,
                    status: current,
                })
            }
            Err(e) => Err(RevokeError::Unavailable(e)),
        }
    }

    /// Draws a candidate number. It may already be in use.
    pub fn generate_access_code_number(&self) -> AccessCodeNumber {
        self.generator.generate()
    }

    /// Issues a randomly drawn number.
    ///
    /// Draws again while the drawn number is still cooling down, up to
    /// `max_draws` times. Any other failure is returned immediately.
    #[tracing::instrument(skip(self))]
    pub async fn issue_random_access_code(
        &self,
        issued_on: DateTime<Utc>,
        max_draws: u32,
    ) -> Result<AccessCodeNumber, IssueError> {
        for draw in 1..=max_draws {
            let code_number = self.generate_access_code_number();
            match self
                .issue_access_code(IssueAccessCode::new(code_number, issued_on))
                .await
            {
                Ok(_) => return Ok(code_number),
                Err(IssueError::Recycle { .. }) => {
                    tracing::trace!(%code_number, draw, "number still cooling down, drawing again");
                }
                Err(e) => return Err(e),
            }
        }

        Err(IssueError::Exhausted { draws: max_draws })
    }

    /// Current state of a code, or None if it was never issued.
    pub async fn get_access_code(
        &self,
        code_number: AccessCodeNumber,
    ) -> Result<Option<AccessCode>, DomainError> {
        self.repository
            .load_existing(code_number.aggregate_id())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::Duration;
    use common::AggregateId;
    use event_store::{
        AppendOptions, EventEnvelope, EventStoreError, InMemoryEventStore, Notification,
        NotificationStream, Position, Result as StoreResult, Version,
    };

    use super::*;
    use crate::config::RetryPolicy;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn number(n: u32) -> AccessCodeNumber {
        AccessCodeNumber::new(n).unwrap()
    }

    /// Hands out a fixed sequence of numbers, then repeats the last one.
    struct Scripted(Mutex<Vec<u32>>);

    impl Scripted {
        fn new(numbers: &[u32]) -> Self {
            let mut numbers = numbers.to_vec();
            numbers.reverse();
            Self(Mutex::new(numbers))
        }
    }

    impl CodeNumberGenerator for Scripted {
        fn generate(&self) -> AccessCodeNumber {
            let mut numbers = self.0.lock().unwrap();
            let next = if numbers.len() > 1 {
                numbers.pop().unwrap()
            } else {
                numbers[0]
            };
            number(next)
        }
    }

    #[tokio::test]
    async fn issue_creates_then_recycles() {
        let service = AccessCodesService::new(InMemoryEventStore::new());
        let code_number = number(1_234_567);

        let created = service
            .issue_access_code(IssueAccessCode::new(code_number, t0()))
            .await
            .unwrap();
        assert_eq!(created.new_version.as_i64(), 1);
        assert_eq!(created.aggregate.status(), AccessCodeStatus::Issued);

        let err = service
            .issue_access_code(IssueAccessCode::new(code_number, t0() + Duration::days(179)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IssueError::Recycle { recyclable_on, .. } if recyclable_on == t0() + Duration::days(180)
        ));
        assert!(!err.is_transient());

        let recycled = service
            .issue_access_code(IssueAccessCode::new(code_number, t0() + Duration::days(181)))
            .await
            .unwrap();
        assert_eq!(recycled.new_version.as_i64(), 2);
        assert_eq!(
            recycled.aggregate.issued_on(),
            Some(t0() + Duration::days(181))
        );
    }

    #[tokio::test]
    async fn authorise_folds_every_rejection_into_access_denied() {
        let service = AccessCodesService::new(InMemoryEventStore::new());
        let code_number = number(1_000_001);

        // Never issued
        let unknown = service
            .authorise_access(AuthoriseAccess::new(code_number, t0()))
            .await
            .unwrap_err();
        assert!(matches!(unknown, AuthoriseError::AccessDenied));

        service
            .issue_access_code(IssueAccessCode::new(code_number, t0()))
            .await
            .unwrap();

        // Expired
        let expired = service
            .authorise_access(AuthoriseAccess::new(
                code_number,
                t0() + Duration::days(1) + Duration::seconds(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(expired, AuthoriseError::AccessDenied));

        service
            .authorise_access(AuthoriseAccess::new(code_number, t0() + Duration::hours(1)))
            .await
            .unwrap();

        // Already used
        let used = service
            .authorise_access(AuthoriseAccess::new(code_number, t0() + Duration::hours(2)))
            .await
            .unwrap_err();
        assert!(matches!(used, AuthoriseError::AccessDenied));
        assert!(!used.is_transient());
    }

    #[tokio::test]
    async fn revoke_reports_not_found_and_invalid_status() {
        let service = AccessCodesService::new(InMemoryEventStore::new());
        let code_number = number(1_900_000);

        let err = service
            .revoke_access(RevokeAccess::new(code_number))
            .await
            .unwrap_err();
        assert!(matches!(err, RevokeError::NotFound(n) if n == code_number));

        service
            .issue_access_code(IssueAccessCode::new(code_number, t0()))
            .await
            .unwrap();
        service
            .revoke_access(RevokeAccess::new(code_number))
            .await
            .unwrap();

        let err = service
            .revoke_access(RevokeAccess::new(code_number))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RevokeError::InvalidStatus {
                status: AccessCodeStatus::Revoked,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn random_issue_skips_cooling_numbers() {
        let store = InMemoryEventStore::new();
        let service = AccessCodesService::new(store)
            .with_generator(Scripted::new(&[1_111_111, 1_111_111, 1_222_222]));

        let first = service.issue_random_access_code(t0(), 5).await.unwrap();
        assert_eq!(first, number(1_111_111));

        let second = service
            .issue_random_access_code(t0() + Duration::days(1), 5)
            .await
            .unwrap();
        assert_eq!(second, number(1_222_222));
    }

    #[tokio::test]
    async fn random_issue_gives_up_after_max_draws() {
        let service = AccessCodesService::new(InMemoryEventStore::new())
            .with_generator(Scripted::new(&[1_333_333]));

        service.issue_random_access_code(t0(), 3).await.unwrap();

        let err = service
            .issue_random_access_code(t0() + Duration::days(2), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, IssueError::Exhausted { draws: 3 }));
    }

    #[tokio::test]
    async fn get_access_code_returns_current_state() {
        let service = AccessCodesService::new(InMemoryEventStore::new());
        let code_number = number(1_500_500);

        assert!(service.get_access_code(code_number).await.unwrap().is_none());

        service
            .issue_access_code(IssueAccessCode::new(code_number, t0()))
            .await
            .unwrap();
        service
            .authorise_access(AuthoriseAccess::new(code_number, t0()))
            .await
            .unwrap();

        let code = service.get_access_code(code_number).await.unwrap().unwrap();
        assert_eq!(code.status(), AccessCodeStatus::Used);
        assert_eq!(code.accessed_on(), Some(t0()));
    }

    #[derive(Clone, Copy)]
    enum AppendFault {
        Unavailable,
        Conflict,
    }

    /// Reads from a seeded in-memory store; every append fails.
    struct FailingAppends {
        inner: InMemoryEventStore,
        fault: AppendFault,
    }

    #[async_trait]
    impl EventStore for FailingAppends {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> StoreResult<Version> {
            Err(match self.fault {
                AppendFault::Unavailable => EventStoreError::Unavailable("connection reset".into()),
                AppendFault::Conflict => EventStoreError::ConcurrencyConflict {
                    aggregate_id: events[0].aggregate_id,
                    expected: options.expected_version.unwrap_or_default(),
                    actual: Version::new(99),
                },
            })
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> StoreResult<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> StoreResult<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }

        async fn read_notifications(
            &self,
            start: Position,
            limit: usize,
        ) -> StoreResult<Vec<Notification>> {
            self.inner.read_notifications(start, limit).await
        }

        async fn max_position(&self) -> StoreResult<Option<Position>> {
            self.inner.max_position().await
        }

        async fn stream_notifications(&self, from: Position) -> StoreResult<NotificationStream> {
            self.inner.stream_notifications(from).await
        }
    }

    /// A service whose store already holds `issued`, issued at `t0()`, and
    /// then fails every append with `fault`.
    async fn failing_service(
        issued: AccessCodeNumber,
        fault: AppendFault,
    ) -> AccessCodesService<FailingAppends> {
        let inner = InMemoryEventStore::new();
        AccessCodesService::new(inner.clone())
            .issue_access_code(IssueAccessCode::new(issued, t0()))
            .await
            .unwrap();

        let config = AccessCodesConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: StdDuration::from_millis(1),
                max_backoff: StdDuration::from_millis(2),
            },
            store_timeout: None,
        };
        AccessCodesService::with_config(FailingAppends { inner, fault }, &config)
    }

    #[tokio::test]
    async fn store_outage_is_unavailable_not_denied() {
        let code_number = number(1_700_001);
        let service = failing_service(code_number, AppendFault::Unavailable).await;

        let err = service
            .authorise_access(AuthoriseAccess::new(code_number, t0() + Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthoriseError::Unavailable(DomainError::EventStore(EventStoreError::Unavailable(_)))
        ));
        assert!(err.is_transient());

        let err = service
            .revoke_access(RevokeAccess::new(code_number))
            .await
            .unwrap_err();
        assert!(matches!(err, RevokeError::Unavailable(_)));
        assert!(err.is_transient());

        let fresh = number(1_700_002);
        let err = service
            .issue_access_code(IssueAccessCode::new(fresh, t0()))
            .await
            .unwrap_err();
        assert!(matches!(err, IssueError::Unavailable { code_number, .. } if code_number == fresh));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn exhausted_conflict_retries_are_unavailable_not_denied() {
        let code_number = number(1_700_003);
        let service = failing_service(code_number, AppendFault::Conflict).await;

        let err = service
            .authorise_access(AuthoriseAccess::new(code_number, t0() + Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthoriseError::Unavailable(DomainError::RetriesExhausted { attempts: 3, .. })
        ));
        assert!(err.is_transient());

        let err = service
            .revoke_access(RevokeAccess::new(code_number))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RevokeError::Unavailable(DomainError::RetriesExhausted { .. })
        ));
        assert!(err.is_transient());

        let err = service
            .issue_access_code(IssueAccessCode::new(number(1_700_004), t0()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IssueError::Unavailable {
                source: DomainError::RetriesExhausted { .. },
                ..
            }
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn denial_is_still_reported_when_appends_would_fail() {
        let code_number = number(1_700_005);
        let service = failing_service(code_number, AppendFault::Unavailable).await;

        // The aggregate rejects before the store is asked to append
        let err = service
            .authorise_access(AuthoriseAccess::new(code_number, t0() + Duration::days(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthoriseError::AccessDenied));
        assert!(!err.is_transient());
    }
}
