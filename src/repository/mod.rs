//! Repository layer: store contracts and their Postgres / in-memory backends

pub mod books;
pub mod memory;
pub mod subscriptions;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookFilter, NewBook, NewUser, Page, PageRequest, Role, Subscription,
        SubscriptionDetails, SubscriptionScope, User,
    },
};

/// Persistent collection of books
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Lookup by the (title, author, year) uniqueness key
    async fn find_by_identity(
        &self,
        title: &str,
        author: &str,
        publication_year: i32,
    ) -> AppResult<Option<Book>>;

    /// Add one copy of the (title, author, year) triple in a single step:
    /// an existing book has both copy counters incremented, otherwise `book`
    /// is inserted. Concurrent calls for the same triple never conflict.
    async fn add_copy(&self, book: &NewBook) -> AppResult<Book>;

    /// Overwrite title, author and year; copy counters are left untouched
    async fn update_details(
        &self,
        id: i32,
        title: &str,
        author: &str,
        publication_year: i32,
    ) -> AppResult<Book>;

    async fn search(&self, filter: &BookFilter, page: &PageRequest) -> AppResult<Page<Book>>;

    async fn count_matching(&self, filter: &BookFilter) -> AppResult<i64>;
}

/// Persistent collection of users keyed by email
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `Conflict` if the email is taken
    async fn insert(&self, user: &NewUser) -> AppResult<User>;

    /// Flip the blocked flag, returning the updated user
    async fn toggle_blocked(&self, id: i32) -> AppResult<User>;

    async fn list_where_role_not(&self, role: Role) -> AppResult<Vec<User>>;
}

/// Persistent collection of subscriptions.
///
/// The mutating operations are each applied as one unit: either every row
/// they touch is written or none is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Subscription>>;

    async fn list_all(&self) -> AppResult<Vec<Subscription>>;

    async fn list_by_borrower_email(&self, email: &str) -> AppResult<Vec<Subscription>>;

    async fn list_details(&self, scope: &SubscriptionScope) -> AppResult<Vec<SubscriptionDetails>>;

    /// Take one available copy of the book and record a pending subscription.
    /// Fails with `Unavailable` when no copy is left, `NotFound` when the book
    /// does not exist.
    async fn create_with_reservation(&self, user_id: i32, book_id: i32) -> AppResult<Subscription>;

    /// PENDING -> APPROVED. Fails with `AlreadyApproved` if the subscription
    /// has left PENDING, `NotFound` if it does not exist.
    async fn mark_approved(
        &self,
        id: i32,
        start_date: NaiveDate,
        period: i32,
    ) -> AppResult<Subscription>;

    /// Add `amount` to the subscription's fine and to its borrower's balance
    async fn add_fine(&self, id: i32, amount: i64) -> AppResult<()>;
}

/// Store handles shared by all services
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserDirectory>,
    pub subscriptions: Arc<dyn LoanStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            subscriptions: Arc::new(subscriptions::SubscriptionsRepository::new(pool)),
        }
    }

    /// Create a repository holding everything in process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            books: store.clone(),
            users: store.clone(),
            subscriptions: store,
        }
    }
}

/// Turn a unique-constraint violation into a `Conflict`, pass anything else through
pub(crate) fn conflict_on_unique(error: sqlx::Error, message: impl Into<String>) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::Conflict(message.into())
        }
        _ => AppError::Database(error),
    }
}
