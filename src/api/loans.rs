//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        book::page_bounds,
        loan::{CreateLoan, Loan, LoanDetails, LoanQuery, MyLoansQuery, ReturnOutcome},
    },
};

use super::{ApiResponse, AuthenticatedUser};

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copies available, duplicate loan or concurrent update"),
        (status = 422, description = "Loan limit reached")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<ApiResponse<Loan>>)> {
    let loan = state
        .services
        .loans
        .borrow(&claims.actor(), request.book_id)
        .await?;

    let message = format!("Loan created, due {}", loan.due_date.format("%Y-%m-%d"));
    Ok((StatusCode::CREATED, ApiResponse::ok(message, loan)))
}

/// Loans of the current user
#[utoipa::path(
    get,
    path = "/loans/my-loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(MyLoansQuery),
    responses(
        (status = 200, description = "Caller's loans", body = Vec<LoanDetails>)
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MyLoansQuery>,
) -> AppResult<Json<ApiResponse<Vec<LoanDetails>>>> {
    let loans = state
        .services
        .loans
        .my_loans(&claims.actor(), query.status)
        .await?;
    Ok(ApiResponse::ok(format!("{} loan(s)", loans.len()), loans))
}

/// All loans (admin only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = Vec<LoanDetails>),
        (status = 403, description = "Admin rights required")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<ApiResponse<Vec<LoanDetails>>>> {
    claims.require_admin()?;

    let (skip, limit) = page_bounds(query.skip, query.limit, 100, 1000);
    let loans = state.services.loans.list(skip, limit, query.status).await?;
    Ok(ApiResponse::ok(format!("{} loan(s)", loans.len()), loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<LoanDetails>>> {
    let loan = state.services.loans.get(&claims.actor(), id).await?;
    Ok(ApiResponse::ok("Loan found", loan))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnOutcome),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<ReturnOutcome>>> {
    let outcome = state.services.loans.return_loan(&claims.actor(), id).await?;

    match outcome.warning.as_ref().map(|w| w.message.clone()) {
        Some(detail) => Ok(ApiResponse::with_detail("Book returned", outcome, detail)),
        None => Ok(ApiResponse::ok("Book returned", outcome)),
    }
}
