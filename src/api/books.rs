//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::book::{
        page_bounds, Book, BookQuery, BookSearchQuery, BookUpdate, BookViewer, CreateBook,
        DeleteBookQuery, RecommendedQuery,
    },
    services::{
        catalog::DeletedBook,
        metadata::{RemoteBook, SearchField},
    },
};

use super::{ApiResponse, AuthenticatedUser};

/// Remote catalog search parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct RemoteSearchQuery {
    pub q: String,
    /// 1 to 40, default 10
    pub max_results: Option<u32>,
    #[param(inline)]
    #[serde(default)]
    pub search_field: SearchField,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Books in the catalog", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<ApiResponse<Vec<Book>>>> {
    let (skip, limit) = page_bounds(query.skip, query.limit, 100, 1000);
    let books = state
        .services
        .catalog
        .list(skip, limit, query.category.as_deref())
        .await?;
    Ok(ApiResponse::ok(format!("{} book(s)", books.len()), books))
}

/// Search the local catalog
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(BookSearchQuery),
    responses(
        (status = 200, description = "Matching books", body = Vec<Book>),
        (status = 400, description = "Empty search term")
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookSearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<Book>>>> {
    let (_, limit) = page_bounds(None, query.limit, 20, 100);
    let books = state.services.catalog.search(&query.q, limit).await?;
    Ok(ApiResponse::ok(format!("{} book(s) found", books.len()), books))
}

/// Best rated books
#[utoipa::path(
    get,
    path = "/books/recommended",
    tag = "books",
    params(RecommendedQuery),
    responses(
        (status = 200, description = "Recommended books", body = Vec<Book>)
    )
)]
pub async fn recommended_books(
    State(state): State<crate::AppState>,
    Query(query): Query<RecommendedQuery>,
) -> AppResult<Json<ApiResponse<Vec<Book>>>> {
    let (_, limit) = page_bounds(None, query.limit, 5, 20);
    let books = state.services.catalog.recommended(limit).await?;
    Ok(ApiResponse::ok("Recommended books", books))
}

/// Search Google Books
#[utoipa::path(
    get,
    path = "/books/google-books/search",
    tag = "books",
    params(RemoteSearchQuery),
    responses(
        (status = 200, description = "Remote candidates", body = Vec<RemoteBook>),
        (status = 400, description = "Empty search term")
    )
)]
pub async fn google_books_search(
    State(state): State<crate::AppState>,
    Query(query): Query<RemoteSearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<RemoteBook>>>> {
    let books = state
        .services
        .catalog
        .remote_search(&query.q, query.max_results.unwrap_or(10), query.search_field)
        .await?;
    Ok(ApiResponse::ok(format!("{} result(s)", books.len()), books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Book>>> {
    let book = state.services.catalog.get(id).await?;
    Ok(ApiResponse::ok("Book found", book))
}

/// Create a new book (admin only)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input or duplicate ISBN"),
        (status = 403, description = "Admin rights required")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<ApiResponse<Book>>)> {
    claims.require_admin()?;

    let created = state.services.catalog.create(book).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok("Book created", created)))
}

/// Update a book (admin only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookUpdate,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin rights required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<BookUpdate>,
) -> AppResult<Json<ApiResponse<Book>>> {
    claims.require_admin()?;

    let book = state.services.catalog.update(id, update).await?;
    Ok(ApiResponse::ok("Book updated", book))
}

/// Delete a book (admin only)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID"),
        DeleteBookQuery
    ),
    responses(
        (status = 200, description = "Book deleted", body = DeletedBook),
        (status = 403, description = "Admin rights required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book has active loans")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(params): Query<DeleteBookQuery>,
) -> AppResult<Json<ApiResponse<DeletedBook>>> {
    claims.require_admin()?;

    let deleted = state.services.catalog.delete(id, params.force).await?;
    if deleted.forced && deleted.loans_removed > 0 {
        let detail = format!("{} loan record(s) removed", deleted.loans_removed);
        return Ok(ApiResponse::with_detail("Book deleted", deleted, detail));
    }
    Ok(ApiResponse::ok("Book deleted", deleted))
}

/// Public preview of a book
#[utoipa::path(
    get,
    path = "/books/{id}/preview",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Preview information", body = BookViewer),
        (status = 404, description = "Book not found")
    )
)]
pub async fn preview_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<BookViewer>>> {
    let viewer = state.services.catalog.preview(id).await?;
    Ok(ApiResponse::ok("Preview available", viewer))
}

/// Full reader access for a borrowed book
#[utoipa::path(
    get,
    path = "/books/{id}/read",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Reader access granted", body = BookViewer),
        (status = 403, description = "No active loan of this book"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn read_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<BookViewer>>> {
    let viewer = state.services.catalog.read(&claims.actor(), id).await?;
    Ok(ApiResponse::ok("Reader access granted", viewer))
}
