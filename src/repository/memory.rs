//! In-memory store implementing every repository contract.
//!
//! All collections sit behind one lock, so each trait method is applied
//! atomically with respect to the others. Used by tests and local runs
//! without a database.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{SortField, SortOrder},
        Book, BookFilter, NewBook, NewUser, Page, PageRequest, Role, Subscription,
        SubscriptionDetails, SubscriptionScope, User,
    },
};

use super::{CatalogStore, LoanStore, UserDirectory};

#[derive(Debug, Default)]
struct State {
    books: BTreeMap<i32, Book>,
    users: BTreeMap<i32, User>,
    subscriptions: BTreeMap<i32, Subscription>,
    last_book_id: i32,
    last_user_id: i32,
    last_subscription_id: i32,
}

impl State {
    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn details(&self, subscription: &Subscription) -> Option<SubscriptionDetails> {
        let book = self.books.get(&subscription.book_id)?;
        let user = self.users.get(&subscription.user_id)?;
        Some(SubscriptionDetails {
            id: subscription.id,
            approved: subscription.approved,
            start_date: subscription.start_date,
            period: subscription.period,
            fine: subscription.fine,
            book_id: book.id,
            book_title: book.title.clone(),
            book_author: book.author.clone(),
            user_id: user.id,
            user_name: user.name.clone(),
            user_email: user.email.clone(),
        })
    }
}

/// In-memory store for tests and database-less runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Case-insensitive ordering on the sort column, ties broken by id
fn sort_books(books: &mut [Book], field: SortField, order: SortOrder) {
    books.sort_by(|a, b| {
        let ordering = match field {
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Author => a.author.to_lowercase().cmp(&b.author.to_lowercase()),
        };
        let ordering = match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        ordering.then(a.id.cmp(&b.id))
    });
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.books.get(&id).cloned())
    }

    async fn find_by_identity(
        &self,
        title: &str,
        author: &str,
        publication_year: i32,
    ) -> AppResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state
            .books
            .values()
            .find(|b| b.title == title && b.author == author && b.publication_year == publication_year)
            .cloned())
    }

    async fn add_copy(&self, book: &NewBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let existing = state.books.values_mut().find(|b| {
            b.title == book.title
                && b.author == book.author
                && b.publication_year == book.publication_year
        });
        if let Some(existing) = existing {
            existing.add_copy();
            return Ok(existing.clone());
        }

        state.last_book_id += 1;
        let created = Book {
            id: state.last_book_id,
            title: book.title.clone(),
            author: book.author.clone(),
            publication_year: book.publication_year,
            num_of_copies: book.num_of_copies,
            available_copies: book.available_copies,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_details(
        &self,
        id: i32,
        title: &str,
        author: &str,
        publication_year: i32,
    ) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let duplicate = state.books.values().any(|b| {
            b.id != id && b.title == title && b.author == author && b.publication_year == publication_year
        });
        if duplicate {
            return Err(AppError::Conflict(
                "Book with this title, author and year already exists".to_string(),
            ));
        }

        let book = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        book.title = title.to_string();
        book.author = author.to_string();
        book.publication_year = publication_year;
        Ok(book.clone())
    }

    async fn search(&self, filter: &BookFilter, page: &PageRequest) -> AppResult<Page<Book>> {
        let state = self.state.read().await;
        let mut matching: Vec<Book> = state
            .books
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        sort_books(&mut matching, page.sort_field, page.sort_order);

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset().max(0) as usize)
            .take(page.per_page.max(0) as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    async fn count_matching(&self, filter: &BookFilter) -> AppResult<i64> {
        let state = self.state.read().await;
        Ok(state.books.values().filter(|b| filter.matches(b)).count() as i64)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.user_by_email(email).cloned())
    }

    async fn insert(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.user_by_email(&user.email).is_some() {
            return Err(AppError::Conflict(format!(
                "Email {} is already registered",
                user.email
            )));
        }

        state.last_user_id += 1;
        let created = User {
            id: state.last_user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            role: user.role,
            fine: 0,
            blocked: false,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn toggle_blocked(&self, id: i32) -> AppResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        user.blocked = !user.blocked;
        Ok(user.clone())
    }

    async fn list_where_role_not(&self, role: Role) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.role != role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state.subscriptions.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        let state = self.state.read().await;
        Ok(state.subscriptions.values().cloned().collect())
    }

    async fn list_by_borrower_email(&self, email: &str) -> AppResult<Vec<Subscription>> {
        let state = self.state.read().await;
        let user_id = match state.user_by_email(email) {
            Some(user) => user.id,
            None => return Ok(Vec::new()),
        };
        Ok(state
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_details(&self, scope: &SubscriptionScope) -> AppResult<Vec<SubscriptionDetails>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .filter_map(|s| state.details(s))
            .filter(|d| match scope {
                SubscriptionScope::All => true,
                SubscriptionScope::Borrower(email) => d.user_email.eq_ignore_ascii_case(email),
            })
            .collect())
    }

    async fn create_with_reservation(&self, user_id: i32, book_id: i32) -> AppResult<Subscription> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        if !book.is_available() {
            return Err(AppError::Unavailable(format!(
                "No available copies of book {}",
                book_id
            )));
        }
        book.available_copies -= 1;

        state.last_subscription_id += 1;
        let subscription = Subscription {
            id: state.last_subscription_id,
            user_id,
            book_id,
            approved: false,
            start_date: None,
            period: None,
            fine: 0,
        };
        state.subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn mark_approved(
        &self,
        id: i32,
        start_date: NaiveDate,
        period: i32,
    ) -> AppResult<Subscription> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Subscription with id {} not found", id)))?;
        if subscription.approved {
            return Err(AppError::AlreadyApproved(id));
        }
        subscription.approved = true;
        subscription.start_date = Some(start_date);
        subscription.period = Some(period);
        subscription.fine = 0;
        Ok(subscription.clone())
    }

    async fn add_fine(&self, id: i32, amount: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let user_id = state
            .subscriptions
            .get(&id)
            .map(|s| s.user_id)
            .ok_or_else(|| AppError::NotFound(format!("Subscription with id {} not found", id)))?;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        if let Some(subscription) = state.subscriptions.get_mut(&id) {
            subscription.fine += amount;
        }
        if let Some(user) = state.users.get_mut(&user_id) {
            user.fine += amount;
        }
        Ok(())
    }
}
