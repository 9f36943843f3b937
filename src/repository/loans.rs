//! Loans repository for database operations
//!
//! Statements taking a `PgExecutor` are meant to run inside the caller's
//! transaction (`&mut *tx`); the others use the pool directly.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails, LoanStatus},
};

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.book_id, l.loan_date, l.due_date, l.return_date,
           l.status, l.has_review, l.created_at,
           b.title AS book_title, b.author AS book_author, u.username AS user_username
    FROM loans l
    JOIN books b ON l.book_id = b.id
    JOIN users u ON l.user_id = u.id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan with book and borrower details
    pub async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetails>(&format!("{} WHERE l.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Loans of one user, newest first
    pub async fn list_for_user(
        &self,
        user_id: i32,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE l.user_id = $1 AND ($2::text IS NULL OR l.status = $2) ORDER BY l.loan_date DESC, l.id DESC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// All loans, newest first
    pub async fn list(
        &self,
        skip: i64,
        limit: i64,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE ($1::text IS NULL OR l.status = $1) ORDER BY l.loan_date DESC, l.id DESC LIMIT $2 OFFSET $3",
            DETAILS_SELECT
        ))
        .bind(status)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Flip every due, unreturned activo loan to vencido
    pub async fn refresh_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET status = 'vencido'
            WHERE status = 'activo' AND due_date < $1 AND return_date IS NULL
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lock the borrower row; serializes concurrent borrows of one user.
    /// Returns the account's `is_active` flag, `None` when the user is gone.
    pub async fn lock_user(&self, conn: impl PgExecutor<'_>, user_id: i32) -> AppResult<Option<bool>> {
        let is_active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;

        Ok(is_active)
    }

    pub async fn count_active_for_user(&self, conn: impl PgExecutor<'_>, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status = 'activo'",
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    pub async fn count_active_for_book(&self, conn: impl PgExecutor<'_>, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'activo'",
        )
        .bind(book_id)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    pub async fn has_active_loan(
        &self,
        conn: impl PgExecutor<'_>,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND status = 'activo')",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    /// Insert an activo loan. Raw sqlx error so callers can inspect constraint violations.
    pub async fn insert(
        &self,
        conn: impl PgExecutor<'_>,
        user_id: i32,
        book_id: i32,
        loan_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Result<Loan, sqlx::Error> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, due_date, status)
            VALUES ($1, $2, $3, $4, 'activo')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(loan_date)
        .bind(due_date)
        .fetch_one(conn)
        .await
    }

    /// Lock a loan row for the rest of the transaction
    pub async fn lock(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(loan)
    }

    /// Close the loan unless it was already returned; `None` means it was
    pub async fn mark_returned(
        &self,
        conn: impl PgExecutor<'_>,
        id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'devuelto', return_date = $2
            WHERE id = $1 AND status <> 'devuelto'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(loan)
    }

    /// Most recent returned loan of (user, book), locked
    pub async fn latest_returned(
        &self,
        conn: impl PgExecutor<'_>,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE user_id = $1 AND book_id = $2 AND status = 'devuelto'
            ORDER BY return_date DESC, id DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(conn)
        .await?;

        Ok(loan)
    }

    /// Set `has_review`; zero rows affected means another review got there first
    pub async fn mark_reviewed(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<u64> {
        let result = sqlx::query("UPDATE loans SET has_review = TRUE WHERE id = $1 AND has_review = FALSE")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_for_book(&self, conn: impl PgExecutor<'_>, book_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(book_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
