//! Google Books adapter.
//!
//! Authenticates with an API key passed as a query parameter; works
//! keyless at a reduced quota. Strongest on descriptions and cover art.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::{MetadataRecord, PublicationDate};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{FieldType, MetadataProvider, ProviderError, ProviderFuture};
use crate::rate_limit::RateLimitConfig;
use crate::ProviderId;

const VOLUMES_URL: &str = "https://www.googleapis.com/books/v1/volumes";
const RESULT_LIMIT: usize = 10;

pub struct GoogleBooksAdapter {
    http: Arc<dyn HttpClient>,
    auth: HttpAuth,
    mock: bool,
}

impl Default for GoogleBooksAdapter {
    fn default() -> Self {
        Self {
            http: Arc::new(NoopHttpClient),
            auth: HttpAuth::None,
            mock: true,
        }
    }
}

impl GoogleBooksAdapter {
    pub fn with_http_client(http: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let auth = match api_key {
            Some(value) => HttpAuth::QueryParam {
                name: String::from("key"),
                value,
            },
            None => HttpAuth::None,
        };
        Self {
            http,
            auth,
            mock: false,
        }
    }

    async fn query_volumes(&self, terms: String, operation: &str) -> Result<Vec<MetadataRecord>, ProviderError> {
        let url = format!(
            "{VOLUMES_URL}?q={}&maxResults={RESULT_LIMIT}",
            urlencoding::encode(&terms)
        );
        let request = HttpRequest::get(url)
            .with_timeout(self.timeout())
            .with_auth(&self.auth);

        let response = self.http.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                ProviderError::timeout(error.message().to_string())
            } else {
                ProviderError::network(error.message().to_string())
            }
        })?;

        if !response.is_success() {
            return Err(ProviderError::from_status(
                response.status,
                format!("google books returned status {}", response.status),
                response.retry_after,
            ));
        }

        let payload: Value = serde_json::from_str(&response.body).map_err(|error| {
            ProviderError::malformed(format!("google books {operation} payload: {error}"))
        })?;
        self.parse_volumes(&payload)
    }

    fn parse_volumes(&self, payload: &Value) -> Result<Vec<MetadataRecord>, ProviderError> {
        // An empty result set omits `items` entirely.
        let Some(items) = payload.get("items") else {
            return Ok(Vec::new());
        };
        let items = items
            .as_array()
            .ok_or_else(|| ProviderError::malformed("volumes payload 'items' is not an array"))?;

        let mut records = Vec::with_capacity(items.len());
        for item in items.iter().take(RESULT_LIMIT) {
            if let Some(record) = self.parse_volume(item) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn parse_volume(&self, item: &Value) -> Option<MetadataRecord> {
        let info = item.get("volumeInfo")?;
        let title = info.get("title").and_then(Value::as_str)?;

        // averageRating and ratingsCount signal catalog depth; richer
        // volumes get a modest confidence bump.
        let mut confidence: f64 = 0.8;
        if info.get("description").is_some() {
            confidence += 0.05;
        }
        if info.get("industryIdentifiers").is_some() {
            confidence += 0.05;
        }

        let mut record = MetadataRecord::new(ProviderId::GoogleBooks, confidence.min(1.0))
            .ok()?
            .with_title(title);

        if let Some(authors) = info.get("authors").and_then(Value::as_array) {
            record.authors = authors
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(identifiers) = info.get("industryIdentifiers").and_then(Value::as_array) {
            record.isbn = identifiers
                .iter()
                .filter(|entry| {
                    entry
                        .get("type")
                        .and_then(Value::as_str)
                        .is_some_and(|kind| kind.starts_with("ISBN"))
                })
                .filter_map(|entry| entry.get("identifier").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
        }
        if let Some(publisher) = info.get("publisher").and_then(Value::as_str) {
            record = record.with_publisher(publisher);
        }
        if let Some(date) = info.get("publishedDate").and_then(Value::as_str) {
            if let Ok(parsed) = PublicationDate::parse(date) {
                record = record.with_publication_date(parsed);
            }
        }
        if let Some(description) = info.get("description").and_then(Value::as_str) {
            record = record.with_description(description);
        }
        if let Some(categories) = info.get("categories").and_then(Value::as_array) {
            record.subjects = categories
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(pages) = info.get("pageCount").and_then(Value::as_u64) {
            record.page_count = Some(pages as u32);
        }
        if let Some(language) = info.get("language").and_then(Value::as_str) {
            record = record.with_language(language);
        }
        if let Some(thumbnail) = info
            .get("imageLinks")
            .and_then(|links| links.get("thumbnail"))
            .and_then(Value::as_str)
        {
            record = record.with_cover_image(thumbnail);
        }

        Some(record)
    }

    fn mock_records(&self, title: &str) -> Vec<MetadataRecord> {
        vec![MetadataRecord::new(ProviderId::GoogleBooks, 0.85)
            .expect("mock confidence is in range")
            .with_title(title)
            .with_authors(vec![String::from("F. Scott Fitzgerald")])
            .with_isbn(vec![String::from("978-0-7432-7356-5")])
            .with_description(
                "A portrait of the Jazz Age in all of its decadence and excess.",
            )
            .with_cover_image("https://books.google.com/books/content?id=mock&img=1")]
    }
}

impl MetadataProvider for GoogleBooksAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleBooks
    }

    fn supports_field(&self, field: FieldType) -> bool {
        self.reliability(field) > 0.0
    }

    fn reliability(&self, field: FieldType) -> f64 {
        match field {
            FieldType::Title => 0.85,
            FieldType::Authors => 0.8,
            FieldType::Isbn => 0.9,
            FieldType::Publisher => 0.75,
            FieldType::PublicationDate => 0.8,
            FieldType::Description => 0.9,
            FieldType::Subjects => 0.7,
            FieldType::Series => 0.0,
            FieldType::PageCount => 0.85,
            FieldType::Language => 0.85,
            FieldType::CoverImage => 0.9,
        }
    }

    fn priority(&self) -> u8 {
        90
    }

    fn languages(&self) -> &[&'static str] {
        &["en", "es", "fr", "de", "it", "pt"]
    }

    fn rate_limit(&self) -> Option<RateLimitConfig> {
        Some(RateLimitConfig::new(Duration::from_secs(60), 100))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(4)
    }

    fn search_by_title<'a>(&'a self, title: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                return Ok(self.mock_records(title));
            }
            self.query_volumes(format!("intitle:{title}"), "search_by_title")
                .await
        })
    }

    fn search_by_isbn<'a>(&'a self, isbn: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                let mut records = self.mock_records("The Great Gatsby");
                records[0].isbn = vec![isbn.to_string()];
                return Ok(records);
            }
            self.query_volumes(format!("isbn:{isbn}"), "search_by_isbn")
                .await
        })
    }

    fn search_by_creator<'a>(&'a self, creator: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                let mut records = self.mock_records("The Great Gatsby");
                records[0].authors = vec![creator.to_string()];
                return Ok(records);
            }
            self.query_volumes(format!("inauthor:{creator}"), "search_by_creator")
                .await
        })
    }
}
