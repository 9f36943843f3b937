//! Review eligibility gate and rating aggregation

use validator::Validate;

use crate::{
    error::{constraint_violation, AppError, AppResult, CHECK_VIOLATION, UNIQUE_VIOLATION},
    models::{
        loan::Loan,
        review::{CreateReview, Review, ReviewDetails},
        user::Actor,
    },
    repository::Repository,
};

/// Review preconditions after rating validation, checked in order.
/// Returns the id of the loan the review will be attached to.
pub fn check_review_eligibility(
    book_id: i32,
    already_reviewed_book: bool,
    latest_returned: Option<&Loan>,
) -> AppResult<i32> {
    if already_reviewed_book {
        return Err(AppError::DuplicateReview { book_id });
    }
    let loan = latest_returned.ok_or(AppError::NotEligible { book_id })?;
    if loan.has_review {
        return Err(AppError::AlreadyReviewed { loan_id: loan.id });
    }
    Ok(loan.id)
}

#[derive(Clone)]
pub struct ReviewsService {
    repository: Repository,
}

impl ReviewsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, actor: &Actor, request: CreateReview) -> AppResult<Review> {
        request.validate()?;
        let book_id = request.book_id;

        let mut tx = self.repository.begin().await?;

        let reviewed = self
            .repository
            .reviews
            .exists(&mut *tx, actor.user_id, book_id)
            .await?;
        let latest = self
            .repository
            .loans
            .latest_returned(&mut *tx, actor.user_id, book_id)
            .await?;

        let loan_id = check_review_eligibility(book_id, reviewed, latest.as_ref())?;

        let review = match self
            .repository
            .reviews
            .insert(
                &mut *tx,
                actor.user_id,
                book_id,
                request.rating,
                request.comment.as_deref(),
            )
            .await
        {
            Ok(review) => review,
            Err(e) if constraint_violation(&e, UNIQUE_VIOLATION).is_some() => {
                return Err(AppError::DuplicateReview { book_id });
            }
            Err(e) if constraint_violation(&e, CHECK_VIOLATION).is_some() => {
                return Err(AppError::Validation("Rating must be between 1 and 5".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if self.repository.loans.mark_reviewed(&mut *tx, loan_id).await? == 0 {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Loan {} was reviewed concurrently",
                loan_id
            )));
        }

        self.repository.books.refresh_rating(&mut *tx, book_id).await?;
        tx.commit().await?;

        tracing::info!(
            review_id = review.id,
            user_id = actor.user_id,
            book_id,
            rating = review.rating,
            "Review created"
        );
        Ok(review)
    }

    pub async fn list_for_book(&self, book_id: i32) -> AppResult<Vec<ReviewDetails>> {
        self.repository.books.get_by_id(book_id).await?;
        self.repository.reviews.list_for_book(book_id).await
    }

    /// Reviews written by a user; self or admin only
    pub async fn list_for_user(&self, actor: &Actor, user_id: i32) -> AppResult<Vec<ReviewDetails>> {
        actor.require_owner_or_admin(user_id)?;
        self.repository.reviews.list_for_user(user_id).await
    }

    /// Delete a review and recompute the book's aggregates.
    /// The originating loan keeps `has_review` set.
    pub async fn delete(&self, actor: &Actor, review_id: i32) -> AppResult<()> {
        let review = self.repository.reviews.get_by_id(review_id).await?;
        actor.require_owner_or_admin(review.user_id)?;

        let mut tx = self.repository.begin().await?;
        if self.repository.reviews.delete(&mut *tx, review_id).await? == 0 {
            return Err(AppError::NotFound(format!("Review with id {} not found", review_id)));
        }
        self.repository.books.refresh_rating(&mut *tx, review.book_id).await?;
        tx.commit().await?;

        tracing::info!(review_id, book_id = review.book_id, "Review deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loan::LoanStatus;
    use chrono::Utc;

    fn returned_loan(has_review: bool) -> Loan {
        let now = Utc::now();
        Loan {
            id: 5,
            user_id: 1,
            book_id: 2,
            loan_date: now,
            due_date: now,
            return_date: Some(now),
            status: LoanStatus::Devuelto,
            has_review,
            created_at: now,
        }
    }

    #[test]
    fn test_existing_review_wins_over_everything() {
        assert!(matches!(
            check_review_eligibility(2, true, None),
            Err(AppError::DuplicateReview { book_id: 2 })
        ));
    }

    #[test]
    fn test_no_returned_loan_not_eligible() {
        assert!(matches!(
            check_review_eligibility(2, false, None),
            Err(AppError::NotEligible { book_id: 2 })
        ));
    }

    #[test]
    fn test_latest_loan_already_reviewed() {
        let loan = returned_loan(true);
        assert!(matches!(
            check_review_eligibility(2, false, Some(&loan)),
            Err(AppError::AlreadyReviewed { loan_id: 5 })
        ));
    }

    #[test]
    fn test_eligible_returns_loan_id() {
        let loan = returned_loan(false);
        assert_eq!(check_review_eligibility(2, false, Some(&loan)).unwrap(), 5);
    }
}
