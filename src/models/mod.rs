//! Data models for Biblioteca

pub mod book;
pub mod import_report;
pub mod loan;
pub mod review;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookUpdate, CreateBook};
pub use import_report::ImportReport;
pub use loan::{ConsistencyWarning, Loan, LoanDetails, LoanStatus, ReturnOutcome};
pub use review::{Review, ReviewDetails};
pub use user::{Actor, User, UserClaims, UserRole};
