//! Bulk import report models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One spreadsheet row and what happened to it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RowRecord {
    /// 1-based sheet row, header is row 1
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RowRecord {
    pub fn imported(row: usize, isbn: &str, title: &str) -> Self {
        Self {
            row,
            isbn: Some(isbn.to_string()),
            title: Some(title.to_string()),
            reason: None,
        }
    }

    pub fn rejected(row: usize, isbn: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            row,
            isbn: isbn.filter(|s| !s.is_empty()).map(str::to_string),
            title: None,
            reason: Some(reason.into()),
        }
    }
}

/// Per-outcome row lists
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ImportDetails {
    pub success: Vec<RowRecord>,
    pub errors: Vec<RowRecord>,
    pub skipped: Vec<RowRecord>,
    pub enriched: Vec<RowRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub successful: usize,
    pub errors: usize,
    pub skipped: usize,
    pub enriched: usize,
}

/// Report returned by a bulk upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportReport {
    pub summary: ImportSummary,
    pub details: ImportDetails,
}

impl ImportReport {
    pub fn from_details(total_rows: usize, details: ImportDetails) -> Self {
        let summary = ImportSummary {
            total_rows,
            successful: details.success.len(),
            errors: details.errors.len(),
            skipped: details.skipped.len(),
            enriched: details.enriched.len(),
        };
        Self { summary, details }
    }
}
