//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    /// Normalized ISBN-10 or ISBN-13
    pub isbn: String,
    pub google_books_id: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
    pub total_pages: Option<i32>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 150, message = "Author must be 1 to 150 characters"))]
    pub author: String,
    #[validate(length(min = 10, max = 20, message = "ISBN must be 10 to 20 characters"))]
    pub isbn: String,
    #[validate(length(max = 50))]
    pub google_books_id: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 1000, max = 2100))]
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
    #[validate(range(min = 0))]
    pub total_pages: Option<i32>,
    #[serde(default = "default_copies")]
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    #[validate(range(min = 0))]
    pub available_copies: Option<i32>,
}

fn default_copies() -> i32 {
    1
}

impl CreateBook {
    pub fn available(&self) -> i32 {
        self.available_copies.unwrap_or(self.total_copies)
    }

    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        check_copies(self.total_copies, self.available())
    }
}

/// `0 <= available <= total` and `total >= 1`
pub fn check_copies(total: i32, available: i32) -> Result<(), AppError> {
    if total < 1 {
        return Err(AppError::Validation(
            "total_copies must be at least 1".to_string(),
        ));
    }
    if available < 0 || available > total {
        return Err(AppError::Validation(format!(
            "available_copies ({}) must be between 0 and total_copies ({})",
            available, total
        )));
    }
    Ok(())
}

/// Copy counts after an update.
///
/// A new total without an explicit `available_copies` shifts availability by
/// the same delta, so copies out on loan stay accounted for. The total can
/// never drop below the number of activo loans.
pub fn resolve_copies(
    current_total: i32,
    current_available: i32,
    active_loans: i64,
    new_total: Option<i32>,
    new_available: Option<i32>,
) -> Result<(i32, i32), AppError> {
    let total = new_total.unwrap_or(current_total);
    if i64::from(total) < active_loans {
        return Err(AppError::Validation(format!(
            "total_copies ({}) cannot be lower than the {} copies currently on loan",
            total, active_loans
        )));
    }

    let available = match new_available {
        Some(available) => available,
        None => current_available + (total - current_total),
    };
    check_copies(total, available)?;
    Ok((total, available))
}

/// Partial update; only the fields present are written
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BookUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub author: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 1000, max = 2100))]
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
    #[validate(range(min = 0))]
    pub total_pages: Option<i32>,
    #[validate(range(min = 1))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0))]
    pub available_copies: Option<i32>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.publication_year.is_none()
            && self.cover_url.is_none()
            && self.total_pages.is_none()
            && self.total_copies.is_none()
            && self.available_copies.is_none()
    }
}

/// Catalog listing parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct BookQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
}

/// Catalog search parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct BookSearchQuery {
    /// Matched against title, author, ISBN and category
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecommendedQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteBookQuery {
    #[serde(default)]
    pub force: bool,
}

/// Embedded-viewer information for a book
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookViewer {
    pub book_id: i32,
    pub book_title: String,
    pub google_books_id: Option<String>,
    pub total_pages: i32,
    pub is_preview: bool,
    pub has_loan: bool,
}

impl BookViewer {
    pub fn preview(book: &Book) -> Self {
        Self {
            book_id: book.id,
            book_title: book.title.clone(),
            google_books_id: book.google_books_id.clone(),
            total_pages: book.total_pages.unwrap_or(0),
            is_preview: true,
            has_loan: false,
        }
    }

    pub fn full(book: &Book) -> Self {
        Self {
            is_preview: false,
            has_loan: true,
            ..Self::preview(book)
        }
    }
}

/// Clamp paging parameters to sane bounds
pub fn page_bounds(skip: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(default_limit).clamp(1, max_limit);
    (skip, limit)
}
