//! Service tests against a live PostgreSQL database
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres_tests -- --ignored

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;

use library_server::{
    config::{AuthConfig, LibraryConfig},
    models::{Role, SubscriptionScope},
    repository::Repository,
    services::{users::UsersService, Services},
    AppError,
};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Suffix keeping rows from different tests and runs apart
fn unique(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}-{}-{}", prefix, nanos, COUNTER.fetch_add(1, Ordering::Relaxed))
}

async fn repository() -> Repository {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Repository::new(pool)
}

async fn services() -> Services {
    Services::new(repository().await, LibraryConfig::default(), AuthConfig::default())
}

async fn reader(services: &Services) -> String {
    let email = format!("{}@example.com", unique("reader"));
    services
        .users
        .create_user("Reader", &email, "secret", Role::Reader)
        .await
        .expect("Failed to create reader");
    email
}

#[tokio::test]
#[ignore]
async fn test_created_user_can_log_in() {
    let services = services().await;
    let email = reader(&services).await;

    let (token, user) = services
        .users
        .authenticate(&email, "secret")
        .await
        .expect("Login failed");
    assert!(!token.is_empty());
    assert_eq!(user.role, Role::Reader);
    assert_eq!(user.fine, 0);
    assert!(!user.blocked);
}

#[tokio::test]
#[ignore]
async fn test_add_twice_gives_two_copies() {
    let services = services().await;
    let title = unique("Dune");

    let first = services.catalog.add(&title, "Frank Herbert", "1965").await.unwrap();
    let second = services.catalog.add(&title, "Frank Herbert", "1965").await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.num_of_copies, 2);
    assert_eq!(second.available_copies, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_adds_of_new_title_all_succeed() {
    let services = services().await;
    let title = unique("Race");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let catalog = services.catalog.clone();
            let title = title.clone();
            tokio::spawn(async move { catalog.add(&title, "Author", "2000").await })
        })
        .collect();
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().expect("Concurrent add failed").id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let book = services.catalog.get_book(ids[0]).await.unwrap();
    assert_eq!(book.num_of_copies, 8);
    assert_eq!(book.available_copies, 8);
}

#[tokio::test]
#[ignore]
async fn test_ordering_the_last_copy_twice() {
    let services = services().await;
    let ann = reader(&services).await;
    let bob = reader(&services).await;
    let book = services
        .catalog
        .add(&unique("Dune"), "Frank Herbert", "1965")
        .await
        .unwrap();

    services.loans.order_book(&ann, book.id).await.unwrap();
    let second = services.loans.order_book(&bob, book.id).await;
    assert!(matches!(second, Err(AppError::Unavailable(_))));

    let book = services.catalog.get_book(book.id).await.unwrap();
    assert_eq!(book.available_copies, 0);
    assert_eq!(book.num_of_copies, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_racing_orders_take_only_one_copy() {
    let services = services().await;
    let ann = reader(&services).await;
    let bob = reader(&services).await;
    let book = services
        .catalog
        .add(&unique("Dune"), "Frank Herbert", "1965")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        services.loans.order_book(&ann, book.id),
        services.loans.order_book(&bob, book.id)
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    let book = services.catalog.get_book(book.id).await.unwrap();
    assert_eq!(book.available_copies, 0);
}

#[tokio::test]
#[ignore]
async fn test_approving_twice() {
    let services = services().await;
    let ann = reader(&services).await;
    let book = services
        .catalog
        .add(&unique("Dune"), "Frank Herbert", "1965")
        .await
        .unwrap();
    let pending = services.loans.order_book(&ann, book.id).await.unwrap();

    let approved = services.loans.approve_subscription(pending.id).await.unwrap();
    assert!(approved.approved);
    assert_eq!(approved.period, Some(60));
    assert_eq!(approved.start_date, Some(Utc::now().date_naive()));

    let again = services.loans.approve_subscription(pending.id).await;
    assert!(matches!(again, Err(AppError::AlreadyApproved(id)) if id == pending.id));

    let missing = services.loans.approve_subscription(i32::MAX).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore]
async fn test_sweep_charges_overdue_loan() {
    let services = services().await;
    let ann = reader(&services).await;
    let book = services
        .catalog
        .add(&unique("Dune"), "Frank Herbert", "1965")
        .await
        .unwrap();
    let pending = services.loans.order_book(&ann, book.id).await.unwrap();
    services
        .loans
        .approve_subscription_on(pending.id, Utc::now().date_naive() - Duration::days(70))
        .await
        .unwrap();

    let report = services
        .fines
        .calculate_and_add_fines()
        .await
        .unwrap()
        .expect("Sweep skipped");
    assert!(report.charged >= 1);

    let user = services.users.get_by_email(&ann).await.unwrap();
    assert_eq!(user.fine, 10);
    let loans = services
        .loans
        .subscriptions(&SubscriptionScope::Borrower(ann.clone()))
        .await
        .unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].fine, 10);
}

#[tokio::test]
#[ignore]
async fn test_toggle_block_and_edit_conflict() {
    let services = services().await;
    let email = reader(&services).await;
    let user = services.users.get_by_email(&email).await.unwrap();

    let blocked = services.users.toggle_block(user.id).await.unwrap();
    assert!(blocked.blocked);
    let login = services.users.authenticate(&email, "secret").await;
    assert!(matches!(login, Err(AppError::Authentication(_))));
    let unblocked = services.users.toggle_block(user.id).await.unwrap();
    assert!(!unblocked.blocked);

    let title = unique("Dune");
    services.catalog.add(&title, "Frank Herbert", "1965").await.unwrap();
    let other = services
        .catalog
        .add(&unique("Hobbit"), "J.R.R. Tolkien", "1937")
        .await
        .unwrap();
    let edit = services
        .catalog
        .edit(other.id, &title, "Frank Herbert", "1965")
        .await;
    assert!(matches!(edit, Err(AppError::Conflict(_))));
}

#[tokio::test]
#[ignore]
async fn test_bootstrap_admin_is_created_once() {
    let email = format!("{}@example.com", unique("admin"));
    let users = UsersService::new(
        repository().await,
        AuthConfig {
            bootstrap_admin_email: Some(email.clone()),
            bootstrap_admin_password: Some("admin-pass".to_string()),
            ..AuthConfig::default()
        },
    );

    let created = users.ensure_bootstrap_admin().await.unwrap();
    assert_eq!(created.map(|u| u.role), Some(Role::Admin));
    assert!(users.ensure_bootstrap_admin().await.unwrap().is_none());
    assert!(users.authenticate(&email, "admin-pass").await.is_ok());
}
