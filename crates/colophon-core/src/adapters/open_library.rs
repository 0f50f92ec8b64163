//! Open Library adapter.
//!
//! Keyless JSON API. Search endpoints return ranked `docs`; ISBN lookups
//! return a single edition object. Mock mode (the default transport)
//! serves deterministic records for offline tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::{MetadataRecord, PublicationDate};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{FieldType, MetadataProvider, ProviderError, ProviderFuture};
use crate::rate_limit::RateLimitConfig;
use crate::ProviderId;

const SEARCH_URL: &str = "https://openlibrary.org/search.json";
const EDITION_URL: &str = "https://openlibrary.org/isbn";
const RESULT_LIMIT: usize = 10;

pub struct OpenLibraryAdapter {
    http: Arc<dyn HttpClient>,
    mock: bool,
}

impl Default for OpenLibraryAdapter {
    fn default() -> Self {
        Self {
            http: Arc::new(NoopHttpClient),
            mock: true,
        }
    }
}

impl OpenLibraryAdapter {
    pub fn with_http_client(http: Arc<dyn HttpClient>) -> Self {
        Self { http, mock: false }
    }

    async fn fetch(&self, url: String, operation: &str) -> Result<Value, ProviderError> {
        let request = HttpRequest::get(url).with_timeout(self.timeout());
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
                format!("open library returned status {}", response.status),
                response.retry_after,
            ));
        }

        serde_json::from_str(&response.body).map_err(|error| {
            ProviderError::malformed(format!("open library {operation} payload: {error}"))
        })
    }

    fn parse_search(&self, payload: &Value) -> Result<Vec<MetadataRecord>, ProviderError> {
        let docs = payload
            .get("docs")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::malformed("search payload missing 'docs'"))?;

        let mut records = Vec::with_capacity(docs.len().min(RESULT_LIMIT));
        for (rank, doc) in docs.iter().take(RESULT_LIMIT).enumerate() {
            if let Some(record) = self.parse_doc(doc, rank) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn parse_doc(&self, doc: &Value, rank: usize) -> Option<MetadataRecord> {
        let title = doc.get("title").and_then(Value::as_str)?;
        // Search ranking is the only relevance signal the API exposes.
        let confidence = (0.9 - rank as f64 * 0.05).max(0.5);

        let mut record = MetadataRecord::new(ProviderId::OpenLibrary, confidence)
            .ok()?
            .with_title(title)
            .with_authors(string_list(doc.get("author_name")))
            .with_isbn(string_list(doc.get("isbn")))
            .with_subjects(string_list(doc.get("subject")));

        if let Some(publisher) = doc
            .get("publisher")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_str)
        {
            record = record.with_publisher(publisher);
        }
        if let Some(year) = doc.get("first_publish_year").and_then(Value::as_i64) {
            if let Ok(date) = PublicationDate::from_year(year as i32) {
                record = record.with_publication_date(date);
            }
        }
        if let Some(language) = doc
            .get("language")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_str)
        {
            record = record.with_language(language);
        }
        if let Some(pages) = doc.get("number_of_pages_median").and_then(Value::as_u64) {
            record.page_count = Some(pages as u32);
        }
        if let Some(cover) = doc.get("cover_i").and_then(Value::as_i64) {
            record = record
                .with_cover_image(format!("https://covers.openlibrary.org/b/id/{cover}-L.jpg"));
        }

        Some(record)
    }

    fn parse_edition(&self, isbn: &str, payload: &Value) -> Result<Vec<MetadataRecord>, ProviderError> {
        let Some(title) = payload.get("title").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };

        let mut record = MetadataRecord::new(ProviderId::OpenLibrary, 0.95)
            .map_err(|error| ProviderError::malformed(error.to_string()))?
            .with_title(title)
            .with_isbn(vec![isbn.to_string()]);

        if let Some(publisher) = payload
            .get("publishers")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_str)
        {
            record = record.with_publisher(publisher);
        }
        if let Some(date) = payload.get("publish_date").and_then(Value::as_str) {
            if let Ok(parsed) = PublicationDate::parse(date) {
                record = record.with_publication_date(parsed);
            }
        }
        if let Some(pages) = payload.get("number_of_pages").and_then(Value::as_u64) {
            record.page_count = Some(pages as u32);
        }

        Ok(vec![record])
    }

    fn mock_search(&self, term: &str) -> Vec<MetadataRecord> {
        vec![
            MetadataRecord::new(ProviderId::OpenLibrary, 0.9)
                .expect("mock confidence is in range")
                .with_title(term)
                .with_authors(vec![String::from("F. Scott Fitzgerald")])
                .with_isbn(vec![String::from("9780743273565")])
                .with_publisher("Scribner")
                .with_subjects(vec![String::from("Fiction"), String::from("Classics")]),
            MetadataRecord::new(ProviderId::OpenLibrary, 0.7)
                .expect("mock confidence is in range")
                .with_title(format!("{term} (annotated edition)"))
                .with_authors(vec![String::from("F. Scott Fitzgerald")]),
        ]
    }
}

impl MetadataProvider for OpenLibraryAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenLibrary
    }

    fn supports_field(&self, field: FieldType) -> bool {
        self.reliability(field) > 0.0
    }

    fn reliability(&self, field: FieldType) -> f64 {
        match field {
            FieldType::Title => 0.9,
            FieldType::Authors => 0.85,
            FieldType::Isbn => 0.95,
            FieldType::Publisher => 0.8,
            FieldType::PublicationDate => 0.75,
            FieldType::Description => 0.6,
            FieldType::Subjects => 0.85,
            FieldType::Series => 0.7,
            FieldType::PageCount => 0.8,
            FieldType::Language => 0.8,
            FieldType::CoverImage => 0.85,
        }
    }

    fn priority(&self) -> u8 {
        80
    }

    fn languages(&self) -> &[&'static str] {
        &["en", "fr", "de", "es"]
    }

    fn rate_limit(&self) -> Option<RateLimitConfig> {
        Some(
            RateLimitConfig::new(Duration::from_secs(60), 60)
                .with_min_delay(Duration::from_millis(500)),
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn search_by_title<'a>(&'a self, title: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                return Ok(self.mock_search(title));
            }
            let url = format!(
                "{SEARCH_URL}?title={}&limit={RESULT_LIMIT}",
                urlencoding::encode(title)
            );
            let payload = self.fetch(url, "search_by_title").await?;
            self.parse_search(&payload)
        })
    }

    fn search_by_isbn<'a>(&'a self, isbn: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                let mut records = self.mock_search("The Great Gatsby");
                records.truncate(1);
                records[0].isbn = vec![isbn.to_string()];
                return Ok(records);
            }
            let url = format!("{EDITION_URL}/{}.json", urlencoding::encode(isbn.trim()));
            let payload = self.fetch(url, "search_by_isbn").await?;
            self.parse_edition(isbn, &payload)
        })
    }

    fn search_by_creator<'a>(&'a self, creator: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                let mut records = self.mock_search("The Great Gatsby");
                records.truncate(1);
                records[0].authors = vec![creator.to_string()];
                return Ok(records);
            }
            let url = format!(
                "{SEARCH_URL}?author={}&limit={RESULT_LIMIT}",
                urlencoding::encode(creator)
            );
            let payload = self.fetch(url, "search_by_creator").await?;
            self.parse_search(&payload)
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
