//! Third-party book metadata (Google Books)
//!
//! The provider never fails its caller: transport, status and decoding
//! errors are logged and degrade to `None` or an empty list.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::GoogleBooksConfig;

/// Metadata found for one ISBN
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
    pub page_count: Option<i32>,
}

/// Candidate book returned by a remote search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RemoteBook {
    pub isbn: String,
    pub google_books_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
}

/// Field a remote search result must match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Description,
    Category,
    #[default]
    All,
}

impl SearchField {
    /// Case-insensitive containment test against the selected field(s)
    pub fn matches(&self, book: &RemoteBook, term: &str) -> bool {
        let term = term.to_lowercase();
        let contains = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| v.to_lowercase().contains(&term))
                .unwrap_or(false)
        };
        match self {
            SearchField::Title => contains(&book.title),
            SearchField::Description => contains(&book.description),
            SearchField::Category => contains(&book.category),
            SearchField::All => {
                contains(&book.title) || contains(&book.description) || contains(&book.category)
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Metadata for an ISBN, `None` when unknown or unreachable
    async fn lookup_isbn(&self, isbn: &str) -> Option<BookMetadata>;

    /// Free-text search; results without an ISBN are dropped
    async fn search(&self, query: &str, max_results: u32) -> Vec<RemoteBook>;
}

// Google Books volumes API payload

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u32,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: Option<String>,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    published_date: Option<String>,
    page_count: Option<i32>,
    image_links: Option<ImageLinks>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

fn join_non_empty(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Leading four-digit year of a `publishedDate` such as "2004-05-01"
fn parse_year(published: Option<&str>) -> Option<i32> {
    published
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok())
}

impl VolumeInfo {
    fn into_metadata(self) -> BookMetadata {
        BookMetadata {
            author: join_non_empty(&self.authors),
            category: join_non_empty(&self.categories),
            publication_year: parse_year(self.published_date.as_deref()),
            cover_url: self.image_links.and_then(|l| l.thumbnail),
            title: self.title,
            description: self.description,
            page_count: self.page_count,
        }
    }

    fn isbn(&self) -> Option<String> {
        self.industry_identifiers
            .iter()
            .find(|id| id.kind == "ISBN_13" || id.kind == "ISBN_10")
            .map(|id| id.identifier.clone())
    }
}

fn parse_lookup(body: &[u8]) -> Result<Option<BookMetadata>, serde_json::Error> {
    let response: VolumesResponse = serde_json::from_slice(body)?;
    if response.total_items == 0 {
        return Ok(None);
    }
    Ok(response
        .items
        .into_iter()
        .next()
        .map(|v| v.volume_info.into_metadata()))
}

fn parse_search(body: &[u8]) -> Result<Vec<RemoteBook>, serde_json::Error> {
    let response: VolumesResponse = serde_json::from_slice(body)?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|volume| {
            let isbn = volume.volume_info.isbn()?;
            let metadata = volume.volume_info.into_metadata();
            Some(RemoteBook {
                isbn,
                google_books_id: volume.id,
                title: metadata.title,
                author: metadata.author,
                description: metadata.description,
                category: metadata.category,
                publication_year: metadata.publication_year,
                cover_url: metadata.cover_url,
            })
        })
        .collect())
}

/// Reqwest-backed Google Books client
pub struct GoogleBooksClient {
    client: Client,
    base_url: String,
}

impl GoogleBooksClient {
    pub fn new(config: &GoogleBooksConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    async fn fetch(&self, query: &str, max_results: u32) -> Option<Vec<u8>> {
        let max_results = max_results.to_string();
        let response = match self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Google Books request failed for '{}': {}", query, e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Google Books returned {} for '{}'", status, query);
            return None;
        }

        match response.bytes().await {
            Ok(body) => Some(body.to_vec()),
            Err(e) => {
                tracing::warn!("Google Books body unreadable for '{}': {}", query, e);
                None
            }
        }
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksClient {
    async fn lookup_isbn(&self, isbn: &str) -> Option<BookMetadata> {
        let isbn = crate::isbn::normalize_isbn(isbn);
        let body = self.fetch(&format!("isbn:{}", isbn), 1).await?;
        match parse_lookup(&body) {
            Ok(Some(metadata)) => {
                tracing::debug!("Metadata found for ISBN {}: {:?}", isbn, metadata.title);
                Some(metadata)
            }
            Ok(None) => {
                tracing::debug!("No metadata for ISBN {}", isbn);
                None
            }
            Err(e) => {
                tracing::warn!("Invalid Google Books payload for ISBN {}: {}", isbn, e);
                None
            }
        }
    }

    async fn search(&self, query: &str, max_results: u32) -> Vec<RemoteBook> {
        let Some(body) = self.fetch(query, max_results).await else {
            return Vec::new();
        };
        parse_search(&body).unwrap_or_else(|e| {
            tracing::warn!("Invalid Google Books search payload for '{}': {}", query, e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUME: &str = r#"{
        "totalItems": 1,
        "items": [{
            "id": "abc123",
            "volumeInfo": {
                "title": "The Rust Programming Language",
                "authors": ["Steve Klabnik", "Carol Nichols"],
                "description": "Official book",
                "categories": ["Computers"],
                "publishedDate": "2018-06-26",
                "pageCount": 552,
                "imageLinks": {"thumbnail": "http://books.google.com/thumb.jpg"},
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "1593278284"},
                    {"type": "ISBN_13", "identifier": "9781593278281"}
                ]
            }
        }]
    }"#;

    #[test]
    fn test_parse_lookup_maps_volume_info() {
        let metadata = parse_lookup(VOLUME.as_bytes()).unwrap().unwrap();
        assert_eq!(metadata.title.as_deref(), Some("The Rust Programming Language"));
        assert_eq!(metadata.author.as_deref(), Some("Steve Klabnik, Carol Nichols"));
        assert_eq!(metadata.category.as_deref(), Some("Computers"));
        assert_eq!(metadata.publication_year, Some(2018));
        assert_eq!(metadata.page_count, Some(552));
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("http://books.google.com/thumb.jpg")
        );
    }

    #[test]
    fn test_parse_lookup_empty_result() {
        assert_eq!(parse_lookup(br#"{"totalItems": 0}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_search_uses_first_isbn_and_drops_unidentified() {
        let body = r#"{
            "totalItems": 2,
            "items": [
                {"id": "x", "volumeInfo": {"title": "Sin ISBN"}},
                {"id": "y", "volumeInfo": {
                    "title": "Con ISBN",
                    "publishedDate": "1999",
                    "industryIdentifiers": [{"type": "OTHER", "identifier": "Z"}, {"type": "ISBN_13", "identifier": "9780306406157"}]
                }}
            ]
        }"#;
        let books = parse_search(body.as_bytes()).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].isbn, "9780306406157");
        assert_eq!(books[0].google_books_id.as_deref(), Some("y"));
        assert_eq!(books[0].publication_year, Some(1999));
    }

    #[test]
    fn test_parse_year_tolerates_garbage() {
        assert_eq!(parse_year(Some("19")), None);
        assert_eq!(parse_year(Some("abcd-01")), None);
        assert_eq!(parse_year(None), None);
    }

    #[test]
    fn test_search_field_filter() {
        let book = RemoteBook {
            isbn: "9780306406157".to_string(),
            google_books_id: None,
            title: Some("Rust in Action".to_string()),
            author: None,
            description: Some("Systems programming".to_string()),
            category: Some("Computers".to_string()),
            publication_year: None,
            cover_url: None,
        };
        assert!(SearchField::Title.matches(&book, "rust"));
        assert!(!SearchField::Title.matches(&book, "systems"));
        assert!(SearchField::Description.matches(&book, "SYSTEMS"));
        assert!(SearchField::All.matches(&book, "computers"));
        assert!(!SearchField::Category.matches(&book, "rust"));
    }
}
