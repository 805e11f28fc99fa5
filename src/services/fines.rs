//! Overdue fine accrual

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{config::LibraryConfig, error::AppResult, repository::Repository};

/// Outcome of one sweep over the subscriptions
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub visited: usize,
    pub charged: usize,
    pub failed: usize,
    /// Pending loans and loans not yet due
    pub not_due: usize,
}

/// Adds the configured fine to every overdue approved loan and to its
/// borrower's balance.
///
/// One invocation charges one increment per overdue loan, however many days
/// late it is, so it is meant to run once per calendar day.
#[derive(Clone)]
pub struct FineAccrualJob {
    repository: Repository,
    config: LibraryConfig,
    running: Arc<Mutex<()>>,
}

impl FineAccrualJob {
    pub fn new(repository: Repository, config: LibraryConfig) -> Self {
        Self {
            repository,
            config,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Run a sweep for today's date. Returns `None` if a sweep is already in
    /// progress.
    pub async fn calculate_and_add_fines(&self) -> AppResult<Option<SweepReport>> {
        self.calculate_and_add_fines_on(Utc::now().date_naive()).await
    }

    pub async fn calculate_and_add_fines_on(
        &self,
        today: NaiveDate,
    ) -> AppResult<Option<SweepReport>> {
        let _guard = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Fine sweep already running, skipping this invocation");
                return Ok(None);
            }
        };

        let subscriptions = self.repository.subscriptions.list_all().await?;
        let mut report = SweepReport::default();

        for subscription in subscriptions {
            report.visited += 1;

            if !subscription.is_overdue(today) {
                report.not_due += 1;
                continue;
            }

            match self
                .repository
                .subscriptions
                .add_fine(subscription.id, self.config.fine_per_day)
                .await
            {
                Ok(()) => {
                    debug!(
                        subscription_id = subscription.id,
                        user_id = subscription.user_id,
                        amount = self.config.fine_per_day,
                        "Fine added"
                    );
                    report.charged += 1;
                }
                Err(e) => {
                    warn!(
                        subscription_id = subscription.id,
                        error = %e,
                        "Failed to add fine, continuing sweep"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            %today,
            visited = report.visited,
            charged = report.charged,
            failed = report.failed,
            "Fine sweep finished"
        );
        Ok(Some(report))
    }
}
