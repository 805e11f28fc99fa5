//! Periodic trigger for the fine sweep

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info};

use crate::services::fines::FineAccrualJob;

/// Background task running the fine sweep at a fixed interval
pub struct FineScheduler {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl FineScheduler {
    /// Spawn the scheduler. The first sweep runs one interval after start so a
    /// restart does not charge twice on the same day.
    pub fn start(job: FineAccrualJob, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Starting fine scheduler");

            let start = tokio::time::Instant::now() + interval;
            let mut timer = tokio::time::interval_at(start, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = job.calculate_and_add_fines().await {
                            error!(error = %e, "Fine sweep failed, retrying on next tick");
                        }
                    }

                    changed = shutdown_rx.changed() => {
                        // A dropped sender also stops the loop
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Fine scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            handle,
            shutdown_tx,
        }
    }

    /// Signal the task to stop and wait for it
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Fine scheduler task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LibraryConfig,
        models::{NewBook, NewUser, Role},
        repository::Repository,
        services::loans::LoansService,
    };
    use chrono::{Duration as Days, Utc};

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_waits_one_interval() {
        let repository = Repository::in_memory();
        repository
            .users
            .insert(&NewUser {
                name: "Ann".to_string(),
                email: "ann@example.com".to_string(),
                password: "hash".to_string(),
                role: Role::Reader,
            })
            .await
            .unwrap();
        let book = repository
            .books
            .add_copy(&NewBook::first_copy("Dune", "Frank Herbert", 1965))
            .await
            .unwrap();
        let loans = LoansService::new(repository.clone(), LibraryConfig::default());
        let pending = loans.order_book("ann@example.com", book.id).await.unwrap();
        loans
            .approve_subscription_on(pending.id, Utc::now().date_naive() - Days::days(100))
            .await
            .unwrap();

        let job = FineAccrualJob::new(repository.clone(), LibraryConfig::default());
        let scheduler = FineScheduler::start(job, Duration::from_secs(60));

        // The clock is paused; sleeping advances it once every task is idle
        tokio::time::sleep(Duration::from_secs(59)).await;
        let user = repository.users.find_by_email("ann@example.com").await.unwrap().unwrap();
        assert_eq!(user.fine, 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let user = repository.users.find_by_email("ann@example.com").await.unwrap().unwrap();
        assert_eq!(user.fine, 10);

        // Each tick charges an overdue loan once more
        tokio::time::sleep(Duration::from_secs(60)).await;
        let user = repository.users.find_by_email("ann@example.com").await.unwrap().unwrap();
        assert_eq!(user.fine, 20);

        scheduler.shutdown().await;
    }
}
