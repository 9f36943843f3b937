//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    isbn::validate_isbn,
    models::{
        book::{resolve_copies, Book, BookUpdate, BookViewer, CreateBook},
        user::Actor,
    },
    repository::Repository,
    services::metadata::{MetadataProvider, RemoteBook, SearchField},
};

/// Outcome of a book deletion
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct DeletedBook {
    pub id: i32,
    pub title: String,
    pub forced: bool,
    pub loans_removed: u64,
    pub reviews_removed: u64,
}

/// Deletion guard: active loans block deletion unless forced
pub fn check_delete(book_id: i32, active_loans: i64, force: bool) -> AppResult<()> {
    if active_loans > 0 && !force {
        return Err(AppError::ActiveLoans {
            book_id,
            count: active_loans,
        });
    }
    Ok(())
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    metadata: Arc<dyn MetadataProvider>,
}

impl CatalogService {
    pub fn new(repository: Repository, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { repository, metadata }
    }

    pub async fn list(&self, skip: i64, limit: i64, category: Option<&str>) -> AppResult<Vec<Book>> {
        self.repository.books.list(skip, limit, category).await
    }

    pub async fn search(&self, term: &str, limit: i64) -> AppResult<Vec<Book>> {
        if term.trim().is_empty() {
            return Err(AppError::Validation("Search term must not be empty".to_string()));
        }
        self.repository.books.search(term, limit).await
    }

    pub async fn recommended(&self, limit: i64) -> AppResult<Vec<Book>> {
        self.repository.books.recommended(limit).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Create a book; the ISBN is checksum-validated and stored normalized
    pub async fn create(&self, mut book: CreateBook) -> AppResult<Book> {
        book.check()?;
        book.isbn = validate_isbn(&book.isbn)?;

        if self.repository.books.isbn_exists(&book.isbn).await? {
            return Err(AppError::Validation(format!(
                "A book with ISBN {} already exists",
                book.isbn
            )));
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book created: {}", created.title);
        Ok(created)
    }

    /// Partial update. Copy counts are resolved against the activo loans
    /// under a row lock so borrows cannot interleave.
    pub async fn update(&self, id: i32, mut update: BookUpdate) -> AppResult<Book> {
        update.validate()?;
        if update.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        let mut tx = self.repository.begin().await?;

        let current = self
            .repository
            .books
            .lock(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if update.total_copies.is_some() || update.available_copies.is_some() {
            let active = self.repository.loans.count_active_for_book(&mut *tx, id).await?;
            let (total, available) = resolve_copies(
                current.total_copies,
                current.available_copies,
                active,
                update.total_copies,
                update.available_copies,
            )?;
            update.total_copies = Some(total);
            update.available_copies = Some(available);
        }

        let updated = self.repository.books.update(&mut *tx, id, &update).await?;
        tx.commit().await?;

        tracing::info!(
            book_id = id,
            total_copies = updated.total_copies,
            available_copies = updated.available_copies,
            "Book updated"
        );
        Ok(updated)
    }

    /// Delete a book together with its loan and review history.
    /// Active loans block the deletion unless `force` is set.
    pub async fn delete(&self, id: i32, force: bool) -> AppResult<DeletedBook> {
        let mut tx = self.repository.begin().await?;

        let book = self
            .repository
            .books
            .lock(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let active = self.repository.loans.count_active_for_book(&mut *tx, id).await?;
        check_delete(id, active, force)?;

        let loans_removed = self.repository.loans.delete_for_book(&mut *tx, id).await?;
        let reviews_removed = self.repository.reviews.delete_for_book(&mut *tx, id).await?;
        self.repository.books.delete(&mut *tx, id).await?;
        tx.commit().await?;

        if active > 0 {
            tracing::warn!(
                book_id = id,
                active_loans = active,
                loans_removed,
                reviews_removed,
                "Forced deletion of book with active loans: {}",
                book.title
            );
        } else {
            tracing::info!(book_id = id, loans_removed, reviews_removed, "Book deleted: {}", book.title);
        }

        Ok(DeletedBook {
            id,
            title: book.title,
            forced: force,
            loans_removed,
            reviews_removed,
        })
    }

    /// Public preview information
    pub async fn preview(&self, id: i32) -> AppResult<BookViewer> {
        let book = self.repository.books.get_by_id(id).await?;
        Ok(BookViewer::preview(&book))
    }

    /// Full reader access, only while the caller holds an activo loan
    pub async fn read(&self, actor: &Actor, id: i32) -> AppResult<BookViewer> {
        let book = self.repository.books.get_by_id(id).await?;
        let has_loan = self
            .repository
            .loans
            .has_active_loan(&self.repository.pool, actor.user_id, id)
            .await?;

        if !has_loan {
            return Err(AppError::Forbidden(
                "You need an active loan of this book to read it".to_string(),
            ));
        }

        tracing::debug!(user_id = actor.user_id, book_id = id, "Reader access granted");
        Ok(BookViewer::full(&book))
    }

    /// Remote catalog search filtered on the selected field
    pub async fn remote_search(
        &self,
        query: &str,
        max_results: u32,
        field: SearchField,
    ) -> AppResult<Vec<RemoteBook>> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("Search term must not be empty".to_string()));
        }

        let results: Vec<RemoteBook> = self
            .metadata
            .search(query, max_results.clamp(1, 40))
            .await
            .into_iter()
            .filter(|book| field.matches(book, query))
            .collect();

        tracing::info!("Remote search '{}' ({:?}): {} result(s)", query, field, results.len());
        Ok(results)
    }
}
