//! Subscription (loan) model and related types

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::Role;

/// Approval state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Pending,
    Approved,
}

/// Subscription model from database.
///
/// `start_date` and `period` are only meaningful once `approved` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subscription {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub approved: bool,
    pub start_date: Option<NaiveDate>,
    /// Lending window in days
    pub period: Option<i32>,
    /// Fine accrued by this loan
    pub fine: i64,
}

impl Subscription {
    /// Last day of the lending window, if the loan has been approved
    pub fn due_date(&self) -> Option<NaiveDate> {
        if !self.approved {
            return None;
        }
        let start = self.start_date?;
        let period = self.period?;
        start.checked_add_signed(Duration::days(period as i64))
    }

    /// True when `today` is strictly after the due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date().map(|due| today > due).unwrap_or(false)
    }
}

/// Which subscriptions a caller may list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionScope {
    All,
    Borrower(String),
}

impl SubscriptionScope {
    /// Staff see every subscription, readers only their own
    pub fn for_viewer(role: Role, email: &str) -> Self {
        if role.can_view_all_subscriptions() {
            SubscriptionScope::All
        } else {
            SubscriptionScope::Borrower(email.to_string())
        }
    }
}

/// Subscription with book and borrower details for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SubscriptionDetails {
    pub id: i32,
    pub approved: bool,
    pub start_date: Option<NaiveDate>,
    pub period: Option<i32>,
    pub fine: i64,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: String,
    pub user_id: i32,
    pub user_name: String,
    pub user_email: String,
}

impl SubscriptionDetails {
    pub fn state(&self) -> SubscriptionState {
        if self.approved {
            SubscriptionState::Approved
        } else {
            SubscriptionState::Pending
        }
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        if !self.approved {
            return None;
        }
        self.start_date?
            .checked_add_signed(Duration::days(self.period? as i64))
    }
}
