//! Drives the access code service through simulated days.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use domain::{AccessCodesService, AuthoriseAccess, AuthoriseError};
use event_store::EventStore;
use projections::{
    IssuanceAuditView, NotificationLog, NotificationLogReader, ProjectionProcessor,
};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, SimulatorError};

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub days: u32,
    pub issued: u64,
    /// Entries read back from the notification log before the contention round.
    pub log_entries: u64,
    /// Issuances counted by the audit projection.
    pub audited_issuances: u64,
    pub contention_winners: u32,
    pub contention_denied: u32,
    #[serde(with = "millis")]
    pub elapsed: StdDuration,
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

/// A simulation over one event store.
pub struct Simulation<S: EventStore + Clone + 'static> {
    store: S,
    service: Arc<AccessCodesService<S>>,
    config: Config,
}

impl<S: EventStore + Clone + 'static> Simulation<S> {
    pub fn new(store: S, config: Config) -> Self {
        let service = AccessCodesService::with_config(store.clone(), &config.service);
        Self {
            store,
            service: Arc::new(service),
            config,
        }
    }

    /// Runs the day loop, audits the log, then runs the contention round.
    #[tracing::instrument(skip(self), fields(days = self.config.days, codes_per_day = self.config.codes_per_day))]
    pub async fn run(&self, started_on: DateTime<Utc>) -> Result<SimulationReport> {
        let timer = Instant::now();

        let issued = self.run_days(started_on).await?;
        let (log_entries, audited_issuances) = self.audit(issued).await?;

        let contention_on = started_on + Duration::days(i64::from(self.config.days));
        let (contention_winners, contention_denied) = self.run_contention(contention_on).await?;

        Ok(SimulationReport {
            days: self.config.days,
            issued,
            log_entries,
            audited_issuances,
            contention_winners,
            contention_denied,
            elapsed: timer.elapsed(),
        })
    }

    /// Issues `codes_per_day` random codes on each simulated day, spread
    /// over `workers` concurrent tasks. Returns the number issued.
    pub async fn run_days(&self, started_on: DateTime<Utc>) -> Result<u64> {
        let mut issued = 0;

        for day in 0..self.config.days {
            let issued_on = started_on + Duration::days(i64::from(day));
            issued += self.run_day(issued_on).await?;
            metrics::counter!("simulation_days_completed").increment(1);

            if (day + 1) % 10 == 0 || day + 1 == self.config.days {
                tracing::info!(day = day + 1, issued, "simulated day complete");
            }
        }

        Ok(issued)
    }

    async fn run_day(&self, issued_on: DateTime<Utc>) -> Result<u64> {
        let workers = self.config.workers.max(1);
        let per_worker = self.config.codes_per_day / workers;
        let remainder = self.config.codes_per_day % workers;

        let mut handles = Vec::with_capacity(workers as usize);
        for worker in 0..workers {
            let quota = per_worker + u32::from(worker < remainder);
            let service = Arc::clone(&self.service);
            let max_draws = self.config.max_draws;

            handles.push(tokio::spawn(async move {
                for _ in 0..quota {
                    service.issue_random_access_code(issued_on, max_draws).await?;
                }
                Ok::<u64, SimulatorError>(u64::from(quota))
            }));
        }

        let mut issued = 0;
        for handle in handles {
            issued += handle.await??;
        }
        Ok(issued)
    }

    /// Checks that the log holds exactly one entry per issuance.
    ///
    /// Reads the whole log as a list through the section reader and folds it
    /// through the audit projection; both must agree with `expected`.
    pub async fn audit(&self, expected: u64) -> Result<(u64, u64)> {
        let mut reader = NotificationLogReader::new(NotificationLog::new(self.store.clone()));
        let log_entries = reader.read_all().await?.len() as u64;
        if log_entries != expected {
            return Err(SimulatorError::AuditMismatch {
                what: "log entries",
                expected,
                found: log_entries,
            });
        }

        let audit = IssuanceAuditView::new();
        let mut processor = ProjectionProcessor::new(self.store.clone());
        processor.register(Box::new(audit.clone()));
        processor.run_catch_up().await?;

        let audited = audit.issuances().await;
        if audited != expected || !audit.is_contiguous().await {
            return Err(SimulatorError::AuditMismatch {
                what: "issuances",
                expected,
                found: audited,
            });
        }

        tracing::info!(log_entries, audited, "notification log audit passed");
        Ok((log_entries, audited))
    }

    /// Issues one code and lets `contenders` callers race to use it.
    ///
    /// Returns `(winners, denied)`; anything other than exactly one winner is
    /// an error.
    pub async fn run_contention(&self, issued_on: DateTime<Utc>) -> Result<(u32, u32)> {
        if self.config.contenders == 0 {
            return Ok((0, 0));
        }

        let code = self
            .service
            .issue_random_access_code(issued_on, self.config.max_draws)
            .await?;

        let mut handles = Vec::with_capacity(self.config.contenders as usize);
        for i in 0..self.config.contenders {
            let service = Arc::clone(&self.service);
            let accessed_on = issued_on + Duration::seconds(i64::from(i));
            handles.push(tokio::spawn(async move {
                service
                    .authorise_access(AuthoriseAccess::new(code, accessed_on))
                    .await
            }));
        }

        let mut winners = 0;
        let mut denied = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => winners += 1,
                Err(AuthoriseError::AccessDenied) => denied += 1,
                Err(e) => return Err(e.into()),
            }
        }

        if winners != 1 {
            return Err(SimulatorError::Contention { winners });
        }

        tracing::info!(%code, winners, denied, "contention round passed");
        Ok((winners, denied))
    }
}
