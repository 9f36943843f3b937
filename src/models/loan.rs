//! Loan (borrow) model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Outstanding, not yet due
    Activo,
    /// Returned; terminal
    Devuelto,
    /// Outstanding past its due date
    Vencido,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Activo => "activo",
            LoanStatus::Devuelto => "devuelto",
            LoanStatus::Vencido => "vencido",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activo" => Ok(LoanStatus::Activo),
            "devuelto" => Ok(LoanStatus::Devuelto),
            "vencido" => Ok(LoanStatus::Vencido),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as TEXT)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub has_review: bool,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        is_overdue(self.status, self.due_date, self.return_date, now)
    }

    /// Past due at `now`, whether or not the overdue sweep has flagged it yet
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Vencido || self.is_overdue(now)
    }
}

/// Loan joined with its book and borrower for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub has_review: bool,
    pub created_at: DateTime<Utc>,
    pub book_title: String,
    pub book_author: String,
    pub user_username: String,
}

/// Create loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub book_id: i32,
}

/// Filter for the caller's own loans
#[derive(Debug, Deserialize, IntoParams)]
pub struct MyLoansQuery {
    pub status: Option<LoanStatus>,
}

/// Admin loan listing parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct LoanQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<LoanStatus>,
}

/// Inventory counter could not be incremented on return.
///
/// The return itself is committed; the book's counters need manual repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConsistencyWarning {
    pub book_id: i32,
    pub message: String,
}

/// Result of a successful return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: Loan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ConsistencyWarning>,
}

pub fn due_date(loan_date: DateTime<Utc>, duration_days: i64) -> DateTime<Utc> {
    loan_date + Duration::days(duration_days)
}

/// Only an activo, unreturned loan whose due date has passed is overdue.
pub fn is_overdue(
    status: LoanStatus,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status == LoanStatus::Activo && return_date.is_none() && due_date < now
}
