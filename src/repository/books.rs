//! Books repository for database operations

use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{constraint_violation, AppError, AppResult, CHECK_VIOLATION, UNIQUE_VIOLATION},
    models::book::{Book, BookUpdate, CreateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

/// Map constraint violations on book writes to validation errors.
fn map_write_error(err: sqlx::Error) -> AppError {
    if let Some(constraint) = constraint_violation(&err, UNIQUE_VIOLATION) {
        return AppError::Validation(format!("A book with this ISBN already exists ({})", constraint));
    }
    if let Some(constraint) = constraint_violation(&err, CHECK_VIOLATION) {
        return AppError::Validation(format!("Copy counts are inconsistent ({})", constraint));
    }
    AppError::Database(err)
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// List books ordered by title, optionally restricted to one category
    pub async fn list(&self, skip: i64, limit: i64, category: Option<&str>) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR category = $1)
            ORDER BY title, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(category)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Case-insensitive search over title, author, ISBN and category
    pub async fn search(&self, term: &str, limit: i64) -> AppResult<Vec<Book>> {
        let pattern = format!("%{}%", term.trim());
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1 OR category ILIKE $1
            ORDER BY title, id
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Best rated books that have at least one review
    pub async fn recommended(&self, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE total_reviews > 0
            ORDER BY average_rating DESC, total_reviews DESC, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Insert a book; `book.isbn` must already be normalized
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, google_books_id, description, category,
                               publication_year, cover_url, total_pages, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.google_books_id)
        .bind(&book.description)
        .bind(&book.category)
        .bind(book.publication_year)
        .bind(&book.cover_url)
        .bind(book.total_pages)
        .bind(book.total_copies)
        .bind(book.available())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    /// Apply a partial update; absent fields keep their stored value
    pub async fn update(&self, conn: impl PgExecutor<'_>, id: i32, update: &BookUpdate) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                description = COALESCE($4, description),
                category = COALESCE($5, category),
                publication_year = COALESCE($6, publication_year),
                cover_url = COALESCE($7, cover_url),
                total_pages = COALESCE($8, total_pages),
                total_copies = COALESCE($9, total_copies),
                available_copies = COALESCE($10, available_copies)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.description)
        .bind(&update.category)
        .bind(update.publication_year)
        .bind(&update.cover_url)
        .bind(update.total_pages)
        .bind(update.total_copies)
        .bind(update.available_copies)
        .fetch_optional(conn)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Lock the book row for the rest of the transaction
    pub async fn lock(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(book)
    }

    /// Current available copies, `None` when the book does not exist
    pub async fn available_copies(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<Option<i32>> {
        let available = sqlx::query_scalar::<_, i32>("SELECT available_copies FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(available)
    }

    /// Take one copy; zero rows affected means none was left
    pub async fn decrement_available(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Give one copy back; zero rows affected means the shelf was already full
    pub async fn increment_available(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies + 1 WHERE id = $1 AND available_copies < total_copies",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Recompute rating aggregates from the reviews table
    pub async fn refresh_rating(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET
                average_rating = COALESCE((SELECT AVG(rating)::float8 FROM reviews WHERE book_id = $1), 0),
                total_reviews = (SELECT COUNT(*)::int4 FROM reviews WHERE book_id = $1)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
