//! Loan management service

use chrono::{NaiveDate, Utc};

use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::{Subscription, SubscriptionDetails, SubscriptionScope},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LibraryConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LibraryConfig) -> Self {
        Self { repository, config }
    }

    /// Place a pending subscription for `book_id` on behalf of the user
    /// identified by `email`, taking one available copy.
    pub async fn order_book(&self, email: &str, book_id: i32) -> AppResult<Subscription> {
        let user = self
            .repository
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;

        let book = self
            .repository
            .books
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if !book.is_available() {
            tracing::info!("Order rejected: no copy of book id={} left", book.id);
            return Err(AppError::Unavailable(format!(
                "No available copies of {:?}",
                book.title
            )));
        }

        // The availability check above is advisory; the store re-checks under its own guard
        let subscription = self
            .repository
            .subscriptions
            .create_with_reservation(user.id, book.id)
            .await?;

        tracing::info!(
            "Order placed: subscription id={} user id={} book id={}",
            subscription.id,
            user.id,
            book.id
        );
        Ok(subscription)
    }

    /// Approve a pending subscription starting today
    pub async fn approve_subscription(&self, subscription_id: i32) -> AppResult<Subscription> {
        self.approve_subscription_on(subscription_id, Utc::now().date_naive())
            .await
    }

    pub async fn approve_subscription_on(
        &self,
        subscription_id: i32,
        start_date: NaiveDate,
    ) -> AppResult<Subscription> {
        let subscription = self
            .repository
            .subscriptions
            .mark_approved(subscription_id, start_date, self.config.lending_period_days)
            .await
            .map_err(|e| {
                if let AppError::AlreadyApproved(id) = e {
                    tracing::warn!("Approval rejected: subscription id={} is already approved", id);
                }
                e
            })?;

        tracing::info!(
            "Subscription id={} approved from {} for {} days",
            subscription.id,
            start_date,
            self.config.lending_period_days
        );
        Ok(subscription)
    }

    /// Subscriptions visible within `scope`
    pub async fn subscriptions(&self, scope: &SubscriptionScope) -> AppResult<Vec<Subscription>> {
        match scope {
            SubscriptionScope::All => self.repository.subscriptions.list_all().await,
            SubscriptionScope::Borrower(email) => {
                self.repository
                    .subscriptions
                    .list_by_borrower_email(email)
                    .await
            }
        }
    }

    /// Subscriptions visible within `scope`, joined with book and borrower
    pub async fn subscription_details(
        &self,
        scope: &SubscriptionScope,
    ) -> AppResult<Vec<SubscriptionDetails>> {
        self.repository.subscriptions.list_details(scope).await
    }
}
