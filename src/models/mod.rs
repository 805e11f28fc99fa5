//! Data models

pub mod book;
pub mod subscription;
pub mod user;

use serde::Serialize;

// Re-export commonly used types
pub use book::{Book, BookFilter, NewBook, PageRequest};
pub use subscription::{Subscription, SubscriptionDetails, SubscriptionScope, SubscriptionState};
pub use user::{NewUser, Role, User};

/// One page of an ordered result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of rows matching the filter, over all pages
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    /// Number of pages; an empty result still has one (empty) page
    pub fn total_pages(&self) -> i64 {
        total_pages(self.total, self.per_page)
    }
}

pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 1;
    }
    ((total + per_page - 1) / per_page).max(1)
}
