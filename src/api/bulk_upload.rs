//! Spreadsheet bulk import endpoint

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    models::import_report::ImportReport,
};

use super::{ApiResponse, AuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
pub struct BulkUploadQuery {
    /// Fill blank fields from Google Books before inserting
    #[serde(default)]
    pub enrich_with_google: bool,
}

/// Multipart body: a single `file` part holding the workbook
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct BulkUploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Import books from an Excel workbook (admin only)
#[utoipa::path(
    post,
    path = "/books/bulk-upload",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BulkUploadQuery),
    request_body(content = BulkUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Import processed", body = ImportReport),
        (status = 400, description = "Not an Excel workbook or missing columns"),
        (status = 403, description = "Admin rights required"),
        (status = 408, description = "Import took too long"),
        (status = 413, description = "File too large")
    )
)]
pub async fn bulk_upload(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BulkUploadQuery>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ImportReport>>)> {
    claims.require_admin()?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read upload from {}: {}", claims.sub, e);
            AppError::PayloadTooLarge(format!("Could not read uploaded file: {}", e))
        })?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' part".to_string()))?;

    tracing::info!(
        uploaded_by = %claims.sub,
        filename = %filename,
        size = data.len(),
        enrich = query.enrich_with_google,
        "Bulk upload received"
    );

    let report = state
        .services
        .import
        .import(&filename, data.to_vec(), query.enrich_with_google, &claims.sub)
        .await?;

    let message = format!(
        "Processed {} row(s): {} imported, {} skipped, {} error(s)",
        report.summary.total_rows,
        report.summary.successful,
        report.summary.skipped,
        report.summary.errors
    );
    Ok((StatusCode::CREATED, ApiResponse::ok(message, report)))
}
