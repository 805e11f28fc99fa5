//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookForm, BookQuery},
        Book, Page, Subscription,
    },
};

use super::AuthenticatedUser;

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(BookPage = PaginatedResponse<Book>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
    /// Number of pages; at least 1
    pub total_pages: i64,
}

impl<T> From<Page<T>> for PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    fn from(page: Page<T>) -> Self {
        Self {
            total_pages: page.total_pages(),
            items: page.items,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
        }
    }
}

/// List books with search, sorting and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "One page of books", body = BookPage),
        (status = 400, description = "Page out of range", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let page = state
        .services
        .catalog
        .get_books(
            query.query.as_deref().unwrap_or_default(),
            query.field.as_deref().unwrap_or_default(),
            query.page.unwrap_or(1),
            query.sort_field.as_deref().unwrap_or_default(),
            query.sort_order.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(page.into()))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a copy of a book, creating the book on its first copy
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookForm,
    responses(
        (status = 201, description = "Copy added", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Insufficient rights")
    )
)]
pub async fn add_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(form): Json<BookForm>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_manage_catalog()?;
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let book = state
        .services
        .catalog
        .add(&form.title, &form.author, &form.publication_year)
        .await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Edit title, author and publication year of a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookForm,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Another book has this title, author and year", body = crate::error::ErrorResponse)
    )
)]
pub async fn edit_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(form): Json<BookForm>,
) -> AppResult<Json<Book>> {
    claims.require_manage_catalog()?;
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let book = state
        .services
        .catalog
        .edit(id, &form.title, &form.author, &form.publication_year)
        .await?;
    Ok(Json(book))
}

/// Order a copy of a book for the current user
#[utoipa::path(
    post,
    path = "/books/{id}/order",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Pending subscription created", body = Subscription),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "No copy available", body = crate::error::ErrorResponse)
    )
)]
pub async fn order_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<(StatusCode, Json<Subscription>)> {
    let subscription = state.services.loans.order_book(&claims.sub, id).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}
