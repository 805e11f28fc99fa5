//! Book (catalog entry) model and search parameters

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database.
///
/// A row represents one title/author/year triple; copies are counted, not
/// stored individually. `available_copies` never exceeds `num_of_copies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub num_of_copies: i32,
    pub available_copies: i32,
}

impl Book {
    /// Register one more owned (and lendable) copy
    pub fn add_copy(&mut self) {
        self.num_of_copies += 1;
        self.available_copies += 1;
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// A book that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub num_of_copies: i32,
    pub available_copies: i32,
}

impl NewBook {
    /// First copy of a title entering the catalog
    pub fn first_copy(title: &str, author: &str, publication_year: i32) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            publication_year,
            num_of_copies: 1,
            available_copies: 1,
        }
    }
}

/// Add-a-copy / edit request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookForm {
    #[validate(length(min = 1, max = 64, message = "Title must be 1-64 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 64, message = "Author must be 1-64 characters"))]
    pub author: String,
    /// Publication year, parsed as an integer by the catalog service
    pub publication_year: String,
}

/// Field a catalog search filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Author,
}

impl From<&str> for SearchField {
    fn from(s: &str) -> Self {
        match s {
            "author" => SearchField::Author,
            _ => SearchField::Title,
        }
    }
}

/// Column a catalog page is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    Author,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Author => "author",
        }
    }
}

impl From<&str> for SortField {
    fn from(s: &str) -> Self {
        match s {
            "author" => SortField::Author,
            _ => SortField::Title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl From<&str> for SortOrder {
    fn from(s: &str) -> Self {
        match s {
            "desc" => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

/// Substring filter applied before sorting and paging.
/// `None` means the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookFilter {
    pub search: Option<(SearchField, String)>,
}

impl BookFilter {
    /// Build a filter from raw query values; both must be non-empty to filter
    pub fn new(query: &str, field: &str) -> Self {
        if query.is_empty() || field.is_empty() {
            return Self::default();
        }
        Self {
            search: Some((SearchField::from(field), query.to_string())),
        }
    }

    pub fn matches(&self, book: &Book) -> bool {
        match &self.search {
            None => true,
            Some((field, query)) => {
                let haystack = match field {
                    SearchField::Title => &book.title,
                    SearchField::Author => &book.author,
                };
                haystack.to_lowercase().contains(&query.to_lowercase())
            }
        }
    }
}

/// One-based page request with ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// Catalog listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Search text
    pub query: Option<String>,
    /// Field to search in ("title" or "author")
    pub field: Option<String>,
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Sort column ("title" or "author", default: title)
    pub sort_field: Option<String>,
    /// Sort direction ("asc" or "desc", default: asc)
    pub sort_order: Option<String>,
}
