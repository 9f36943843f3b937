//! Bulk catalog import from Excel workbooks
//!
//! First sheet, first row is the header. Each data row is reported with its
//! 1-based sheet row number. Rows already inserted stay inserted when the
//! overall time budget runs out.

use std::{collections::HashMap, io::Cursor, sync::Arc, time::Duration};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use crate::{
    config::ImportConfig,
    error::{AppError, AppResult},
    isbn::validate_isbn,
    models::{
        book::{check_copies, Book, CreateBook},
        import_report::{ImportDetails, ImportReport, RowRecord},
    },
    repository::Repository,
    services::metadata::{BookMetadata, MetadataProvider},
};

const REQUIRED_COLUMNS: [&str; 3] = ["title", "author", "isbn"];

/// One data row as read from the sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    pub row: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub publication_year: Option<String>,
    pub total_copies: Option<String>,
    pub available_copies: Option<String>,
    pub cover_url: Option<String>,
}

impl SheetRow {
    fn is_blank(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.publication_year.is_none()
            && self.total_copies.is_none()
            && self.available_copies.is_none()
            && self.cover_url.is_none()
    }
}

/// Why a row did not become a book
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    Skipped(String),
    Error(String),
}

/// Cell rendered as trimmed text; blanks become `None`
fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Numeric ISBNs and counts arrive as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Map the header row and read every non-blank data row
pub fn parse_sheet(range: &Range<Data>) -> AppResult<Vec<SheetRow>> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| AppError::Validation("The spreadsheet is empty".to_string()))?;

    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .filter_map(|(i, cell)| cell_text(Some(cell)).map(|name| (name.to_lowercase(), i)))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let field = |cells: &[Data], name: &str| {
        columns
            .get(name)
            .and_then(|&i| cell_text(cells.get(i)))
    };

    let parsed = rows
        .enumerate()
        .map(|(i, cells)| SheetRow {
            row: i + 2,
            title: field(cells, "title"),
            author: field(cells, "author"),
            isbn: field(cells, "isbn"),
            description: field(cells, "description"),
            category: field(cells, "category"),
            publication_year: field(cells, "publication_year"),
            total_copies: field(cells, "total_copies"),
            available_copies: field(cells, "available_copies"),
            cover_url: field(cells, "cover_url"),
        })
        .filter(|row| !row.is_blank())
        .collect();

    Ok(parsed)
}

/// Open a workbook from memory and parse its first sheet
pub fn parse_workbook(bytes: Vec<u8>) -> AppResult<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::Validation(format!("Unable to read Excel file: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Validation("The workbook has no sheets".to_string()))?
        .map_err(|e| AppError::Validation(format!("Unable to read first sheet: {}", e)))?;
    parse_sheet(&range)
}

fn parse_int(value: Option<&str>, column: &str) -> Result<Option<i32>, RowRejection> {
    value
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| RowRejection::Error(format!("Invalid {}: {}", column, v)))
        })
        .transpose()
}

/// Turn a sheet row into a validated book, or say why it is rejected
pub fn prepare_row(row: &SheetRow) -> Result<CreateBook, RowRejection> {
    let (Some(title), Some(author), Some(raw_isbn)) = (&row.title, &row.author, &row.isbn) else {
        return Err(RowRejection::Skipped(
            "Incomplete row (title, author or ISBN missing)".to_string(),
        ));
    };

    let isbn = validate_isbn(raw_isbn)
        .map_err(|_| RowRejection::Skipped("Invalid ISBN".to_string()))?;

    let total_copies = parse_int(row.total_copies.as_deref(), "total_copies")?.unwrap_or(1);
    let available_copies =
        parse_int(row.available_copies.as_deref(), "available_copies")?.unwrap_or(total_copies);
    check_copies(total_copies, available_copies).map_err(|e| RowRejection::Error(e.to_string()))?;

    let book = CreateBook {
        title: title.clone(),
        author: author.clone(),
        isbn,
        google_books_id: None,
        description: row.description.clone(),
        category: row.category.clone(),
        publication_year: parse_int(row.publication_year.as_deref(), "publication_year")?,
        cover_url: row.cover_url.clone(),
        total_pages: None,
        total_copies,
        available_copies: Some(available_copies),
    };

    book.check().map_err(|e| RowRejection::Error(e.to_string()))?;
    Ok(book)
}

/// Fill blank fields from metadata; a found record counts as enriched
pub fn apply_enrichment(book: &mut CreateBook, metadata: BookMetadata) -> bool {
    fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
        if slot.is_none() {
            *slot = value;
        }
    }

    fill(&mut book.description, metadata.description);
    fill(&mut book.category, metadata.category);
    fill(
        &mut book.publication_year,
        metadata.publication_year.filter(|y| (1000..=2100).contains(y)),
    );
    fill(&mut book.cover_url, metadata.cover_url);
    fill(&mut book.total_pages, metadata.page_count.filter(|p| *p >= 0));
    true
}

/// Time-bounded lookup; a slow or failing provider leaves the book untouched
pub async fn enrich(
    provider: &dyn MetadataProvider,
    book: &mut CreateBook,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, provider.lookup_isbn(&book.isbn)).await {
        Ok(Some(metadata)) => apply_enrichment(book, metadata),
        Ok(None) => false,
        Err(_) => {
            tracing::warn!("Metadata lookup for ISBN {} timed out", book.isbn);
            false
        }
    }
}

/// Record the outcome of a row insert. A row only counts as enriched once it
/// is actually in the catalog; store failures are reported without detail.
pub fn record_insert(
    details: &mut ImportDetails,
    row: usize,
    isbn: &str,
    enriched: bool,
    result: AppResult<Book>,
) {
    match result {
        Ok(created) => {
            let record = RowRecord::imported(row, &created.isbn, &created.title);
            if enriched {
                details.enriched.push(record.clone());
            }
            details.success.push(record);
        }
        Err(e) => {
            tracing::warn!("Row {} not imported: {:?}", row, e);
            details
                .errors
                .push(RowRecord::rejected(row, Some(isbn), e.public_message()));
        }
    }
}

/// Reject files that are not Excel workbooks or exceed the size limit
pub fn check_upload(filename: &str, size: usize, max_bytes: usize) -> AppResult<()> {
    let lower = filename.to_lowercase();
    if !(lower.ends_with(".xlsx") || lower.ends_with(".xls")) {
        return Err(AppError::Validation(
            "The file must be an Excel workbook (.xlsx or .xls)".to_string(),
        ));
    }
    if size > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File is {} bytes, the limit is {} bytes",
            size, max_bytes
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ImportService {
    repository: Repository,
    metadata: Arc<dyn MetadataProvider>,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(repository: Repository, metadata: Arc<dyn MetadataProvider>, config: ImportConfig) -> Self {
        Self {
            repository,
            metadata,
            config,
        }
    }

    /// Import an uploaded workbook within the configured time budget
    pub async fn import(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        enrich_with_metadata: bool,
        uploaded_by: &str,
    ) -> AppResult<ImportReport> {
        check_upload(filename, bytes.len(), self.config.max_file_bytes)?;

        let budget = self.config.timeout();
        let report = tokio::time::timeout(budget, self.process(bytes, enrich_with_metadata))
            .await
            .map_err(|_| {
                tracing::error!("Bulk import by {} exceeded {:?}", uploaded_by, budget);
                AppError::Timeout(format!(
                    "Processing exceeded the {} second limit",
                    budget.as_secs()
                ))
            })??;

        tracing::info!(
            uploaded_by,
            total_rows = report.summary.total_rows,
            successful = report.summary.successful,
            errors = report.summary.errors,
            skipped = report.summary.skipped,
            enriched = report.summary.enriched,
            "Bulk import completed"
        );
        Ok(report)
    }

    async fn process(&self, bytes: Vec<u8>, enrich_with_metadata: bool) -> AppResult<ImportReport> {
        let rows = parse_workbook(bytes)?;
        let mut details = ImportDetails::default();

        for row in &rows {
            let mut book = match prepare_row(row) {
                Ok(book) => book,
                Err(RowRejection::Skipped(reason)) => {
                    details
                        .skipped
                        .push(RowRecord::rejected(row.row, row.isbn.as_deref(), reason));
                    continue;
                }
                Err(RowRejection::Error(reason)) => {
                    details
                        .errors
                        .push(RowRecord::rejected(row.row, row.isbn.as_deref(), reason));
                    continue;
                }
            };

            match self.repository.books.isbn_exists(&book.isbn).await {
                Ok(true) => {
                    details.skipped.push(RowRecord::rejected(
                        row.row,
                        Some(&book.isbn),
                        "ISBN already in catalog",
                    ));
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Row {}: {:?}", row.row, e);
                    details
                        .errors
                        .push(RowRecord::rejected(row.row, Some(&book.isbn), e.public_message()));
                    continue;
                }
            }

            let enriched = enrich_with_metadata
                && enrich(self.metadata.as_ref(), &mut book, self.config.enrichment_timeout()).await;

            let result = self.repository.books.create(&book).await;
            record_insert(&mut details, row.row, &book.isbn, enriched, result);
        }

        Ok(ImportReport::from_details(rows.len(), details))
    }
}
