//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, bulk_upload, health, loans, reviews, users};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblioteca API",
        version = "1.0.0",
        description = "Digital library REST API: catalog, loans and reviews"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Users
        users::list_users,
        users::update_role,
        users::update_active,
        // Books
        books::list_books,
        books::search_books,
        books::recommended_books,
        books::google_books_search,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::preview_book,
        books::read_book,
        bulk_upload::bulk_upload,
        // Loans
        loans::create_loan,
        loans::my_loans,
        loans::list_loans,
        loans::get_loan,
        loans::return_loan,
        // Reviews
        reviews::create_review,
        reviews::book_reviews,
        reviews::user_reviews,
        reviews::delete_review,
    ),
    components(
        schemas(
            // Users
            crate::models::user::User,
            crate::models::user::UserRole,
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            crate::models::user::TokenResponse,
            crate::models::user::UpdateRole,
            crate::models::user::UpdateActive,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::BookUpdate,
            crate::models::book::BookViewer,
            crate::services::catalog::DeletedBook,
            crate::services::metadata::RemoteBook,
            crate::services::metadata::SearchField,
            // Import
            bulk_upload::BulkUploadForm,
            crate::models::import_report::ImportReport,
            crate::models::import_report::ImportSummary,
            crate::models::import_report::ImportDetails,
            crate::models::import_report::RowRecord,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::CreateLoan,
            crate::models::loan::ReturnOutcome,
            crate::models::loan::ConsistencyWarning,
            // Reviews
            crate::models::review::Review,
            crate::models::review::ReviewDetails,
            crate::models::review::CreateReview,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and authentication"),
        (name = "users", description = "User administration"),
        (name = "books", description = "Catalog management"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "reviews", description = "Book reviews")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
