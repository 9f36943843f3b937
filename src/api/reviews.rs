//! Review endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::review::{CreateReview, Review, ReviewDetails},
};

use super::{ApiResponse, AuthenticatedUser};

/// Review a returned book
#[utoipa::path(
    post,
    path = "/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Invalid rating or comment"),
        (status = 409, description = "Book already reviewed"),
        (status = 422, description = "No returned loan of this book")
    )
)]
pub async fn create_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateReview>,
) -> AppResult<(StatusCode, Json<ApiResponse<Review>>)> {
    let review = state.services.reviews.create(&claims.actor(), request).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok("Review created", review)))
}

/// Reviews of a book
#[utoipa::path(
    get,
    path = "/reviews/book/{id}",
    tag = "reviews",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Reviews of the book", body = Vec<ReviewDetails>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn book_reviews(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Vec<ReviewDetails>>>> {
    let reviews = state.services.reviews.list_for_book(id).await?;
    Ok(ApiResponse::ok(format!("{} review(s)", reviews.len()), reviews))
}

/// Reviews written by a user
#[utoipa::path(
    get,
    path = "/reviews/user/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Reviews by the user", body = Vec<ReviewDetails>),
        (status = 403, description = "Not your reviews")
    )
)]
pub async fn user_reviews(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<Vec<ReviewDetails>>>> {
    let reviews = state
        .services
        .reviews
        .list_for_user(&claims.actor(), id)
        .await?;
    Ok(ApiResponse::ok(format!("{} review(s)", reviews.len()), reviews))
}

/// Delete a review
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Not your review"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.reviews.delete(&claims.actor(), id).await?;
    Ok(ApiResponse::message("Review deleted"))
}
