//! Loan lifecycle: borrow, return and overdue transitions
//!
//! Every write that depends on an earlier read re-asserts its condition in
//! the `WHERE` clause. A zero-row write rolls the transaction back and
//! surfaces a conflict-class error.

use chrono::Utc;

use crate::{
    config::LoansConfig,
    error::{constraint_violation, AppError, AppResult, UNIQUE_VIOLATION},
    models::{
        loan::{self, ConsistencyWarning, Loan, LoanDetails, LoanStatus, ReturnOutcome},
        user::Actor,
    },
    repository::Repository,
};

/// Borrow preconditions, checked in order
pub fn check_borrow(
    book_id: i32,
    available_copies: Option<i32>,
    active_loans: i64,
    already_borrowed: bool,
    max_loans: i64,
) -> AppResult<()> {
    let available = available_copies
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
    if available <= 0 {
        return Err(AppError::NoAvailability { book_id });
    }
    if active_loans >= max_loans {
        return Err(AppError::LoanLimitExceeded { max: max_loans });
    }
    if already_borrowed {
        return Err(AppError::DuplicateLoan { book_id });
    }
    Ok(())
}

/// Return preconditions: ownership first, then state
pub fn check_return(actor: &Actor, loan: &Loan) -> AppResult<()> {
    actor.require_owner_or_admin(loan.user_id)?;
    if loan.status == LoanStatus::Devuelto {
        return Err(AppError::AlreadyReturned { loan_id: loan.id });
    }
    Ok(())
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    /// Borrow a copy of `book_id` for the actor
    pub async fn borrow(&self, actor: &Actor, book_id: i32) -> AppResult<Loan> {
        let mut tx = self.repository.begin().await?;

        match self.repository.loans.lock_user(&mut *tx, actor.user_id).await? {
            None => return Err(AppError::Authentication("User no longer exists".to_string())),
            Some(false) => return Err(AppError::Forbidden("Account is disabled".to_string())),
            Some(true) => {}
        }

        let available = self.repository.books.available_copies(&mut *tx, book_id).await?;
        let active = self
            .repository
            .loans
            .count_active_for_user(&mut *tx, actor.user_id)
            .await?;
        let duplicate = self
            .repository
            .loans
            .has_active_loan(&mut *tx, actor.user_id, book_id)
            .await?;

        check_borrow(book_id, available, active, duplicate, self.config.max_loans_per_user)?;

        let now = Utc::now();
        let due = loan::due_date(now, self.config.loan_duration_days);
        let created = match self
            .repository
            .loans
            .insert(&mut *tx, actor.user_id, book_id, now, due)
            .await
        {
            Ok(loan) => loan,
            Err(e) if constraint_violation(&e, UNIQUE_VIOLATION).is_some() => {
                return Err(AppError::DuplicateLoan { book_id });
            }
            Err(e) => return Err(e.into()),
        };

        if self.repository.books.decrement_available(&mut *tx, book_id).await? == 0 {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Book {} was borrowed concurrently, please retry",
                book_id
            )));
        }

        tx.commit().await?;

        tracing::info!(
            loan_id = created.id,
            user_id = actor.user_id,
            book_id,
            due_date = %created.due_date,
            "Loan created"
        );
        Ok(created)
    }

    /// Return a loan; owner or admin only
    pub async fn return_loan(&self, actor: &Actor, loan_id: i32) -> AppResult<ReturnOutcome> {
        let mut tx = self.repository.begin().await?;

        let current = self
            .repository
            .loans
            .lock(&mut *tx, loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        check_return(actor, &current)?;

        let now = Utc::now();
        let late = current.is_late(now);
        let returned = self
            .repository
            .loans
            .mark_returned(&mut *tx, loan_id, now)
            .await?
            .ok_or(AppError::AlreadyReturned { loan_id })?;

        let warning = if self
            .repository
            .books
            .increment_available(&mut *tx, returned.book_id)
            .await?
            == 0
        {
            tracing::warn!(
                loan_id,
                book_id = returned.book_id,
                "Available copies already at total on return, counter left unchanged"
            );
            Some(ConsistencyWarning {
                book_id: returned.book_id,
                message: "available_copies was already equal to total_copies".to_string(),
            })
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            loan_id,
            user_id = returned.user_id,
            book_id = returned.book_id,
            late,
            "Loan returned"
        );
        Ok(ReturnOutcome {
            loan: returned,
            warning,
        })
    }

    /// Flip overdue activo loans to vencido; safe to run any number of times
    pub async fn refresh_overdue(&self) -> AppResult<u64> {
        let count = self.repository.loans.refresh_overdue(Utc::now()).await?;
        if count > 0 {
            tracing::info!("{} loan(s) marked overdue", count);
        }
        Ok(count)
    }

    pub async fn my_loans(&self, actor: &Actor, status: Option<LoanStatus>) -> AppResult<Vec<LoanDetails>> {
        self.refresh_overdue().await?;
        self.repository.loans.list_for_user(actor.user_id, status).await
    }

    pub async fn list(
        &self,
        skip: i64,
        limit: i64,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanDetails>> {
        self.refresh_overdue().await?;
        self.repository.loans.list(skip, limit, status).await
    }

    /// Get a loan; owner or admin only
    pub async fn get(&self, actor: &Actor, loan_id: i32) -> AppResult<LoanDetails> {
        self.refresh_overdue().await?;
        let details = self.repository.loans.get_details(loan_id).await?;
        actor.require_owner_or_admin(details.user_id)?;
        Ok(details)
    }

    pub async fn count_active_loans(&self, user_id: i32) -> AppResult<i64> {
        self.repository
            .loans
            .count_active_for_user(&self.repository.pool, user_id)
            .await
    }

    /// Current available copies of a book
    pub async fn check_availability(&self, book_id: i32) -> AppResult<i32> {
        self.repository
            .books
            .available_copies(&self.repository.pool, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use chrono::Duration;

    fn loan(user_id: i32, status: LoanStatus) -> Loan {
        let now = Utc::now();
        Loan {
            id: 10,
            user_id,
            book_id: 3,
            loan_date: now,
            due_date: now + Duration::days(14),
            return_date: None,
            status,
            has_review: false,
            created_at: now,
        }
    }

    #[test]
    fn test_borrow_missing_book_is_not_found() {
        assert!(matches!(check_borrow(1, None, 0, false, 3), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_borrow_checks_availability_before_limit() {
        assert!(matches!(
            check_borrow(1, Some(0), 3, true, 3),
            Err(AppError::NoAvailability { book_id: 1 })
        ));
    }

    #[test]
    fn test_borrow_limit_before_duplicate() {
        assert!(matches!(
            check_borrow(1, Some(2), 3, true, 3),
            Err(AppError::LoanLimitExceeded { max: 3 })
        ));
    }

    #[test]
    fn test_borrow_duplicate() {
        assert!(matches!(
            check_borrow(1, Some(2), 1, true, 3),
            Err(AppError::DuplicateLoan { book_id: 1 })
        ));
    }

    #[test]
    fn test_borrow_allowed_below_limit() {
        assert!(check_borrow(1, Some(1), 2, false, 3).is_ok());
    }

    #[test]
    fn test_return_by_other_user_forbidden() {
        let actor = Actor { user_id: 2, role: UserRole::Usuario };
        assert!(matches!(
            check_return(&actor, &loan(1, LoanStatus::Devuelto)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_return_twice_rejected() {
        let actor = Actor { user_id: 1, role: UserRole::Usuario };
        assert!(matches!(
            check_return(&actor, &loan(1, LoanStatus::Devuelto)),
            Err(AppError::AlreadyReturned { loan_id: 10 })
        ));
    }

    #[test]
    fn test_admin_may_return_overdue_loan_of_others() {
        let admin = Actor { user_id: 99, role: UserRole::Admin };
        assert!(check_return(&admin, &loan(1, LoanStatus::Vencido)).is_ok());
    }
}
