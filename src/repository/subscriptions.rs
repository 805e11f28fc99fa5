//! Subscriptions repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{Subscription, SubscriptionDetails, SubscriptionScope},
};

use super::LoanStore;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, book_id, approved, start_date, period, fine";

const DETAILS_SELECT: &str = r#"
    SELECT s.id, s.approved, s.start_date, s.period, s.fine,
           b.id as book_id, b.title as book_title, b.author as book_author,
           u.id as user_id, u.name as user_name, u.email as user_email
    FROM subscriptions s
    JOIN books b ON s.book_id = b.id
    JOIN users u ON s.user_id = u.id
"#;

#[derive(Clone)]
pub struct SubscriptionsRepository {
    pool: Pool<Postgres>,
}

impl SubscriptionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn exists(&self, table: &str, id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl LoanStore for SubscriptionsRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions ORDER BY id",
            SUBSCRIPTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn list_by_borrower_email(&self, email: &str) -> AppResult<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT s.id, s.user_id, s.book_id, s.approved, s.start_date, s.period, s.fine
            FROM subscriptions s
            JOIN users u ON s.user_id = u.id
            WHERE LOWER(u.email) = LOWER($1)
            ORDER BY s.id
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn list_details(&self, scope: &SubscriptionScope) -> AppResult<Vec<SubscriptionDetails>> {
        let details = match scope {
            SubscriptionScope::All => {
                sqlx::query_as::<_, SubscriptionDetails>(&format!("{} ORDER BY s.id", DETAILS_SELECT))
                    .fetch_all(&self.pool)
                    .await?
            }
            SubscriptionScope::Borrower(email) => {
                sqlx::query_as::<_, SubscriptionDetails>(&format!(
                    "{} WHERE LOWER(u.email) = LOWER($1) ORDER BY s.id",
                    DETAILS_SELECT
                ))
                .bind(email)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(details)
    }

    async fn create_with_reservation(&self, user_id: i32, book_id: i32) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await?;

        // The guard serializes concurrent orders on the same book row
        let reserved = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE books SET available_copies = available_copies - 1
            WHERE id = $1 AND available_copies > 0
            RETURNING id
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        if reserved.is_none() {
            tx.rollback().await?;
            if self.exists("books", book_id).await? {
                return Err(AppError::Unavailable(format!(
                    "No available copies of book {}",
                    book_id
                )));
            }
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (user_id, book_id, approved, fine)
            VALUES ($1, $2, FALSE, 0)
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(subscription)
    }

    async fn mark_approved(
        &self,
        id: i32,
        start_date: NaiveDate,
        period: i32,
    ) -> AppResult<Subscription> {
        let approved = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions SET approved = TRUE, start_date = $2, period = $3, fine = 0
            WHERE id = $1 AND approved = FALSE
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .bind(start_date)
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        match approved {
            Some(subscription) => Ok(subscription),
            None if self.exists("subscriptions", id).await? => Err(AppError::AlreadyApproved(id)),
            None => Err(AppError::NotFound(format!("Subscription with id {} not found", id))),
        }
    }

    async fn add_fine(&self, id: i32, amount: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, i32>(
            "UPDATE subscriptions SET fine = fine + $2 WHERE id = $1 RETURNING user_id",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subscription with id {} not found", id)))?;

        sqlx::query("UPDATE users SET fine = fine + $2 WHERE id = $1")
            .bind(user_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
