//! Catalog management service

use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::{
        book::{SortField, SortOrder},
        total_pages, Book, BookFilter, NewBook, Page, PageRequest,
    },
    repository::Repository,
};

/// Parse a publication year given as text
fn parse_year(year: &str) -> AppResult<i32> {
    year.trim()
        .parse::<i32>()
        .map_err(|_| AppError::Validation(format!("Invalid publication year: {:?}", year)))
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    config: LibraryConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, config: LibraryConfig) -> Self {
        Self { repository, config }
    }

    /// Round trip to the catalog store
    pub async fn ping(&self) -> AppResult<()> {
        self.repository
            .books
            .count_matching(&BookFilter::default())
            .await?;
        Ok(())
    }

    /// Add a copy of a book.
    ///
    /// An existing (title, author, year) triple gains one owned and one
    /// available copy; otherwise a new book with a single copy is created.
    pub async fn add(&self, title: &str, author: &str, year: &str) -> AppResult<Book> {
        require_text("Title", title)?;
        let year = parse_year(year)?;

        let book = self
            .repository
            .books
            .add_copy(&NewBook::first_copy(title, author, year))
            .await?;
        tracing::info!(
            "Catalog add: book id={} {:?} by {} now has {} copies",
            book.id,
            book.title,
            book.author,
            book.num_of_copies
        );
        Ok(book)
    }

    /// Overwrite the bibliographic fields of a book
    pub async fn edit(&self, book_id: i32, title: &str, author: &str, year: &str) -> AppResult<Book> {
        require_text("Title", title)?;
        let year = parse_year(year)?;

        if let Some(other) = self
            .repository
            .books
            .find_by_identity(title, author, year)
            .await?
        {
            if other.id != book_id {
                tracing::warn!(
                    "Catalog edit rejected: book id={} already has this title, author and year",
                    other.id
                );
                return Err(AppError::Conflict(format!(
                    "Book id={} already has this title, author and year",
                    other.id
                )));
            }
        }

        self.get_book(book_id).await?;
        let book = self
            .repository
            .books
            .update_details(book_id, title, author, year)
            .await?;
        tracing::info!("Catalog edit: book id={} updated", book.id);
        Ok(book)
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// One sorted page of the catalog, filtered when both `search_query` and
    /// `search_field` are non-empty.
    ///
    /// Page numbers start at 1. An empty result has exactly one (empty) page;
    /// asking for a page past the last one is a validation error.
    pub async fn get_books(
        &self,
        search_query: &str,
        search_field: &str,
        page_no: i64,
        sort_field: &str,
        sort_order: &str,
    ) -> AppResult<Page<Book>> {
        if page_no < 1 {
            return Err(AppError::Validation(format!("Invalid page number: {}", page_no)));
        }

        let filter = BookFilter::new(search_query, search_field);
        let total = self.repository.books.count_matching(&filter).await?;
        let last_page = total_pages(total, self.config.page_size);
        if page_no > last_page {
            return Err(AppError::Validation(format!(
                "Page {} is out of range (last page is {})",
                page_no, last_page
            )));
        }

        let request = PageRequest {
            page: page_no,
            per_page: self.config.page_size,
            sort_field: SortField::from(sort_field),
            sort_order: SortOrder::from(sort_order),
        };

        tracing::debug!("Catalog page: filter={:?} request={:?}", filter, request);
        self.repository.books.search(&filter, &request).await
    }
}
