//! Library management server
//!
//! REST JSON API over a book catalog, loan requests ("subscriptions") with
//! librarian approval, and a daily sweep charging fines on overdue loans.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me))
        // Catalog
        .route("/books", get(api::books::list_books).post(api::books::add_book))
        .route("/books/:id", get(api::books::get_book).put(api::books::edit_book))
        .route("/books/:id/order", post(api::books::order_book))
        // Subscriptions
        .route("/subscriptions", get(api::subscriptions::list_subscriptions))
        .route(
            "/subscriptions/:id/approve",
            post(api::subscriptions::approve_subscription),
        )
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users/:id/block", post(api::users::toggle_block))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
