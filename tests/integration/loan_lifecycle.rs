//! Loan engine tests against a real database
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use biblioteca_server::{
    config::AppConfig,
    error::AppError,
    models::{
        review::CreateReview,
        user::{Actor, RegisterUser},
        Book, BookUpdate, CreateBook, LoanStatus,
    },
    repository::Repository,
    services::{
        metadata::{BookMetadata, MetadataProvider, RemoteBook},
        Services,
    },
};

/// Enrichment is never needed here
struct NoMetadata;

#[async_trait]
impl MetadataProvider for NoMetadata {
    async fn lookup_isbn(&self, _isbn: &str) -> Option<BookMetadata> {
        None
    }

    async fn search(&self, _query: &str, _max_results: u32) -> Vec<RemoteBook> {
        Vec::new()
    }
}

fn services(pool: PgPool) -> Services {
    Services::new(Repository::new(pool), Arc::new(NoMetadata), &AppConfig::default())
}

async fn reader(services: &Services, username: &str) -> Actor {
    let user = services
        .users
        .register(RegisterUser {
            username: username.to_string(),
            email: format!("{}@example.org", username),
            full_name: None,
            password: "secret123".to_string(),
            role: None,
        })
        .await
        .expect("register");
    Actor {
        user_id: user.id,
        role: user.role,
    }
}

async fn book(services: &Services, isbn: &str, copies: i32) -> Book {
    services
        .catalog
        .create(CreateBook {
            title: format!("Book {}", isbn),
            author: "Test Author".to_string(),
            isbn: isbn.to_string(),
            google_books_id: None,
            description: None,
            category: Some("Ficción".to_string()),
            publication_year: Some(1967),
            cover_url: None,
            total_pages: Some(417),
            total_copies: copies,
            available_copies: None,
        })
        .await
        .expect("create book")
}

async fn available(services: &Services, book_id: i32) -> i32 {
    services.loans.check_availability(book_id).await.expect("availability")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_borrow_and_return_keep_inventory_consistent(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 2).await;

    let loan = services.loans.borrow(&ana, book.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Activo);
    assert_eq!(available(&services, book.id).await, 1);

    let outcome = services.loans.return_loan(&ana, loan.id).await.unwrap();
    assert_eq!(outcome.loan.status, LoanStatus::Devuelto);
    assert!(outcome.loan.return_date.is_some());
    assert!(outcome.warning.is_none());
    assert_eq!(available(&services, book.id).await, 2);

    let again = services.loans.return_loan(&ana, loan.id).await;
    assert!(matches!(again, Err(AppError::AlreadyReturned { .. })));
    assert_eq!(available(&services, book.id).await, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_borrow_of_last_copy(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let luis = reader(&services, "luis").await;
    let book = book(&services, "9780306406157", 1).await;

    let (first, second) = tokio::join!(
        services.loans.borrow(&ana, book.id),
        services.loans.borrow(&luis, book.id)
    );

    let successes = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);
    for result in [first, second] {
        if let Err(e) = result {
            assert!(
                matches!(e, AppError::Conflict(_) | AppError::NoAvailability { .. }),
                "unexpected error: {:?}",
                e
            );
        }
    }
    assert_eq!(available(&services, book.id).await, 0);

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'activo'")
        .bind(book.id)
        .fetch_one(&services.repository.pool)
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_loan_limit_leaves_no_trace(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;

    for isbn in ["9780306406157", "0306406152", "080442957X"] {
        let book = book(&services, isbn, 1).await;
        services.loans.borrow(&ana, book.id).await.unwrap();
    }
    let fourth = book(&services, "9780140449136", 1).await;

    let result = services.loans.borrow(&ana, fourth.id).await;
    assert!(matches!(result, Err(AppError::LoanLimitExceeded { max: 3 })));
    assert_eq!(available(&services, fourth.id).await, 1);
    assert_eq!(services.loans.count_active_loans(ana.user_id).await.unwrap(), 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_active_loan_rejected(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 3).await;

    services.loans.borrow(&ana, book.id).await.unwrap();
    let result = services.loans.borrow(&ana, book.id).await;

    assert!(matches!(result, Err(AppError::DuplicateLoan { .. })));
    assert_eq!(available(&services, book.id).await, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_review_requires_return_and_only_once(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 1).await;
    let request = || CreateReview {
        book_id: book.id,
        rating: 5,
        comment: Some("Excelente".to_string()),
    };

    let loan = services.loans.borrow(&ana, book.id).await.unwrap();
    let early = services.reviews.create(&ana, request()).await;
    assert!(matches!(early, Err(AppError::NotEligible { .. })));

    services.loans.return_loan(&ana, loan.id).await.unwrap();
    let review = services.reviews.create(&ana, request()).await.unwrap();
    assert_eq!(review.rating, 5);

    let rated = services.catalog.get(book.id).await.unwrap();
    assert_eq!(rated.total_reviews, 1);
    assert!((rated.average_rating - 5.0).abs() < f64::EPSILON);

    let second = services.reviews.create(&ana, request()).await;
    assert!(matches!(second, Err(AppError::DuplicateReview { .. })));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_refresh_overdue_is_idempotent(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 1).await;
    let loan = services.loans.borrow(&ana, book.id).await.unwrap();

    sqlx::query("UPDATE loans SET due_date = NOW() - INTERVAL '1 day' WHERE id = $1")
        .bind(loan.id)
        .execute(&services.repository.pool)
        .await
        .unwrap();

    assert_eq!(services.loans.refresh_overdue().await.unwrap(), 1);
    assert_eq!(services.loans.refresh_overdue().await.unwrap(), 0);

    let details = services.loans.get(&ana, loan.id).await.unwrap();
    assert_eq!(details.status, LoanStatus::Vencido);

    // An overdue loan can still be returned
    let outcome = services.loans.return_loan(&ana, loan.id).await.unwrap();
    assert_eq!(outcome.loan.status, LoanStatus::Devuelto);
    assert_eq!(available(&services, book.id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_delete_guarded_by_active_loans(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 1).await;
    services.loans.borrow(&ana, book.id).await.unwrap();

    let blocked = services.catalog.delete(book.id, false).await;
    assert!(matches!(blocked, Err(AppError::ActiveLoans { count: 1, .. })));

    let deleted = services.catalog.delete(book.id, true).await.unwrap();
    assert!(deleted.forced);
    assert_eq!(deleted.loans_removed, 1);
    assert!(matches!(services.catalog.get(book.id).await, Err(AppError::NotFound(_))));
}

async fn active_loans(services: &Services, book_id: i32) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'activo'")
        .bind(book_id)
        .fetch_one(&services.repository.pool)
        .await
        .unwrap()
}

async fn assert_copies_balance(services: &Services, book_id: i32) {
    let book = services.catalog.get(book_id).await.unwrap();
    assert_eq!(
        i64::from(book.total_copies - book.available_copies),
        active_loans(services, book_id).await,
        "copies out of the shelf must match activo loans"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_changing_total_copies_keeps_loans_accounted(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let luis = reader(&services, "luis").await;
    let book = book(&services, "9780306406157", 3).await;
    services.loans.borrow(&ana, book.id).await.unwrap();

    let grown = services
        .catalog
        .update(
            book.id,
            BookUpdate {
                total_copies: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!((grown.total_copies, grown.available_copies), (5, 4));
    assert_copies_balance(&services, book.id).await;

    services.loans.borrow(&luis, book.id).await.unwrap();
    let shrink_too_far = services
        .catalog
        .update(
            book.id,
            BookUpdate {
                total_copies: Some(1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(shrink_too_far, Err(AppError::Validation(_))));

    let shrunk = services
        .catalog
        .update(
            book.id,
            BookUpdate {
                total_copies: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!((shrunk.total_copies, shrunk.available_copies), (2, 0));
    assert_copies_balance(&services, book.id).await;
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_disabled_account_cannot_borrow(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 1).await;

    services.users.update_active(ana.user_id, false).await.unwrap();

    let result = services.loans.borrow(&ana, book.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(available(&services, book.id).await, 1);
    assert_eq!(active_loans(&services, book.id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_return_onto_full_shelf_warns(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 2).await;
    let loan = services.loans.borrow(&ana, book.id).await.unwrap();

    sqlx::query("UPDATE books SET available_copies = total_copies WHERE id = $1")
        .bind(book.id)
        .execute(&services.repository.pool)
        .await
        .unwrap();

    let outcome = services.loans.return_loan(&ana, loan.id).await.unwrap();
    assert_eq!(outcome.loan.status, LoanStatus::Devuelto);
    let warning = outcome.warning.expect("consistency warning");
    assert_eq!(warning.book_id, book.id);
    assert_eq!(available(&services, book.id).await, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_reviews_of_one_loan(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 1).await;
    let loan = services.loans.borrow(&ana, book.id).await.unwrap();
    services.loans.return_loan(&ana, loan.id).await.unwrap();

    let request = |rating| CreateReview {
        book_id: book.id,
        rating,
        comment: None,
    };
    let (first, second) = tokio::join!(
        services.reviews.create(&ana, request(4)),
        services.reviews.create(&ana, request(2))
    );

    assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
    for result in [first, second] {
        if let Err(e) = result {
            assert!(
                matches!(
                    e,
                    AppError::DuplicateReview { .. } | AppError::AlreadyReviewed { .. } | AppError::Conflict(_)
                ),
                "unexpected error: {:?}",
                e
            );
        }
    }

    let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE book_id = $1")
        .bind(book.id)
        .fetch_one(&services.repository.pool)
        .await
        .unwrap();
    assert_eq!(reviews, 1);

    let has_review: bool = sqlx::query_scalar("SELECT has_review FROM loans WHERE id = $1")
        .bind(loan.id)
        .fetch_one(&services.repository.pool)
        .await
        .unwrap();
    assert!(has_review);
    assert_eq!(services.catalog.get(book.id).await.unwrap().total_reviews, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_second_loan_does_not_allow_second_review(pool: PgPool) {
    let services = services(pool);
    let ana = reader(&services, "ana").await;
    let book = book(&services, "9780306406157", 1).await;
    let request = || CreateReview {
        book_id: book.id,
        rating: 3,
        comment: None,
    };

    let first = services.loans.borrow(&ana, book.id).await.unwrap();
    services.loans.return_loan(&ana, first.id).await.unwrap();
    services.reviews.create(&ana, request()).await.unwrap();

    let second = services.loans.borrow(&ana, book.id).await.unwrap();
    services.loans.return_loan(&ana, second.id).await.unwrap();

    let result = services.reviews.create(&ana, request()).await;
    assert!(matches!(result, Err(AppError::DuplicateReview { .. })));
}
