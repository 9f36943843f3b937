//! Error types for Biblioteca server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error kind, sent to clients in the `detail` field of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    NoAvailability,
    LoanLimitExceeded,
    DuplicateLoan,
    AlreadyReturned,
    DuplicateReview,
    NotEligible,
    AlreadyReviewed,
    Conflict,
    ActiveLoans,
    PayloadTooLarge,
    Timeout,
    StoreError,
    InternalError,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No copies available for book {book_id}")]
    NoAvailability { book_id: i32 },

    #[error("Loan limit of {max} simultaneous loans reached")]
    LoanLimitExceeded { max: i64 },

    #[error("User already has an active loan for book {book_id}")]
    DuplicateLoan { book_id: i32 },

    #[error("Loan {loan_id} was already returned")]
    AlreadyReturned { loan_id: i32 },

    #[error("A review for book {book_id} already exists")]
    DuplicateReview { book_id: i32 },

    #[error("Book {book_id} must be borrowed and returned before it can be reviewed")]
    NotEligible { book_id: i32 },

    #[error("A review was already submitted for loan {loan_id}")]
    AlreadyReviewed { loan_id: i32 },

    /// A conditional write lost a race; retry the whole operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Book {book_id} has {count} active loan(s)")]
    ActiveLoans { book_id: i32, count: i64 },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication(_) => ErrorKind::Unauthorized,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::ValidationError,
            AppError::NoAvailability { .. } => ErrorKind::NoAvailability,
            AppError::LoanLimitExceeded { .. } => ErrorKind::LoanLimitExceeded,
            AppError::DuplicateLoan { .. } => ErrorKind::DuplicateLoan,
            AppError::AlreadyReturned { .. } => ErrorKind::AlreadyReturned,
            AppError::DuplicateReview { .. } => ErrorKind::DuplicateReview,
            AppError::NotEligible { .. } => ErrorKind::NotEligible,
            AppError::AlreadyReviewed { .. } => ErrorKind::AlreadyReviewed,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::ActiveLoans { .. } => ErrorKind::ActiveLoans,
            AppError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Database(_) => ErrorKind::StoreError,
            AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::LoanLimitExceeded | ErrorKind::NotEligible => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::NoAvailability
            | ErrorKind::DuplicateLoan
            | ErrorKind::AlreadyReturned
            | ErrorKind::DuplicateReview
            | ErrorKind::AlreadyReviewed
            | ErrorKind::Conflict
            | ErrorKind::ActiveLoans => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::StoreError | ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Store and internal failures never leak detail.
    /// Text safe to show a client; store and internal failures stay generic
    pub fn public_message(&self) -> String {
        match self {
            AppError::Authentication(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Timeout(msg) => msg.clone(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error envelope body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            _ => tracing::debug!("Request rejected: {}", self),
        }

        let body = Json(ErrorResponse {
            message: self.public_message(),
            detail: format!("{:?}", self.kind()),
        });

        (self.status_code(), body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Postgres SQLSTATE for unique_violation
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for check_violation
pub const CHECK_VIOLATION: &str = "23514";

/// Returns the violated constraint name when `err` carries the given SQLSTATE.
pub fn constraint_violation<'a>(err: &'a sqlx::Error, sqlstate: &str) -> Option<&'a str> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(sqlstate) => {
            Some(db.constraint().unwrap_or_default())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn test_loan_errors_map_to_conflict_classes() {
        assert_eq!(
            AppError::NoAvailability { book_id: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::LoanLimitExceeded { max: 3 }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Conflict("lost race".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_envelope_carries_message_and_kind() {
        let (status, body) = body_json(AppError::DuplicateLoan { book_id: 42 }).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["detail"], "DuplicateLoan");
        assert_eq!(body["message"], "User already has an active loan for book 42");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_store_errors_hide_internal_detail() {
        let (status, body) = body_json(AppError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Database error");
        assert_eq!(body["detail"], "StoreError");
    }

    #[test]
    fn test_constraint_violation_ignores_other_errors() {
        assert!(constraint_violation(&sqlx::Error::RowNotFound, UNIQUE_VIOLATION).is_none());
    }
}
