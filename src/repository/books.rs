//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{SearchField, SortField},
        Book, BookFilter, NewBook, Page, PageRequest,
    },
};

use super::{conflict_on_unique, CatalogStore};

const BOOK_COLUMNS: &str =
    "id, title, author, publication_year, num_of_copies, available_copies";

/// Escape LIKE wildcards so the search text is matched literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// WHERE clause for a filter; binds the pattern as $1 when present
fn where_clause(filter: &BookFilter) -> (String, Option<String>) {
    match &filter.search {
        None => (String::new(), None),
        Some((field, query)) => {
            let column = match field {
                SearchField::Title => "title",
                SearchField::Author => "author",
            };
            (
                format!("WHERE {} ILIKE $1 ESCAPE '\\'", column),
                Some(like_pattern(query)),
            )
        }
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for BooksRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn find_by_identity(
        &self,
        title: &str,
        author: &str,
        publication_year: i32,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE title = $1 AND author = $2 AND publication_year = $3",
            BOOK_COLUMNS
        ))
        .bind(title)
        .bind(author)
        .bind(publication_year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn add_copy(&self, book: &NewBook) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, publication_year, num_of_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (title, author, publication_year) DO UPDATE
            SET num_of_copies = books.num_of_copies + 1,
                available_copies = books.available_copies + 1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(book.num_of_copies)
        .bind(book.available_copies)
        .fetch_one(&self.pool)
        .await?;

        Ok(book)
    }

    async fn update_details(
        &self,
        id: i32,
        title: &str,
        author: &str,
        publication_year: i32,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books SET title = $2, author = $3, publication_year = $4
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(title)
        .bind(author)
        .bind(publication_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Book with this title, author and year already exists"))?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn search(&self, filter: &BookFilter, page: &PageRequest) -> AppResult<Page<Book>> {
        let total = self.count_matching(filter).await?;
        let (where_sql, pattern) = where_clause(filter);

        let select_query = format!(
            "SELECT {} FROM books {} ORDER BY LOWER({}) {}, id LIMIT {} OFFSET {}",
            BOOK_COLUMNS,
            where_sql,
            page.sort_field.column(),
            page.sort_order.keyword(),
            page.per_page,
            page.offset()
        );

        let mut query = sqlx::query_as::<_, Book>(&select_query);
        if let Some(pattern) = pattern {
            query = query.bind(pattern);
        }
        let items = query.fetch_all(&self.pool).await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    async fn count_matching(&self, filter: &BookFilter) -> AppResult<i64> {
        let (where_sql, pattern) = where_clause(filter);
        let count_query = format!("SELECT COUNT(*) FROM books {}", where_sql);

        let mut query = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(pattern) = pattern {
            query = query.bind(pattern);
        }

        Ok(query.fetch_one(&self.pool).await?)
    }
}
