//! Crossref adapter.
//!
//! Keyless; a `mailto` parameter routes requests through the polite pool.
//! DOI-centric, strong on publication dates and publishers, no cover art.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::{MetadataRecord, PublicationDate};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{FieldType, MetadataProvider, ProviderError, ProviderFuture};
use crate::rate_limit::RateLimitConfig;
use crate::ProviderId;

const WORKS_URL: &str = "https://api.crossref.org/works";
const POLITE_MAILTO: &str = "metadata@colophon.dev";
const RESULT_LIMIT: usize = 10;

pub struct CrossrefAdapter {
    http: Arc<dyn HttpClient>,
    mock: bool,
}

impl Default for CrossrefAdapter {
    fn default() -> Self {
        Self {
            http: Arc::new(NoopHttpClient),
            mock: true,
        }
    }
}

impl CrossrefAdapter {
    pub fn with_http_client(http: Arc<dyn HttpClient>) -> Self {
        Self { http, mock: false }
    }

    async fn query_works(&self, params: String, operation: &str) -> Result<Vec<MetadataRecord>, ProviderError> {
        let url = format!("{WORKS_URL}?{params}&rows={RESULT_LIMIT}&mailto={POLITE_MAILTO}");
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
                format!("crossref returned status {}", response.status),
                response.retry_after,
            ));
        }

        let payload: Value = serde_json::from_str(&response.body).map_err(|error| {
            ProviderError::malformed(format!("crossref {operation} payload: {error}"))
        })?;
        self.parse_works(&payload)
    }

    fn parse_works(&self, payload: &Value) -> Result<Vec<MetadataRecord>, ProviderError> {
        let items = payload
            .get("message")
            .and_then(|message| message.get("items"))
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::malformed("works payload missing 'message.items'"))?;

        let mut records = Vec::with_capacity(items.len());
        for item in items.iter().take(RESULT_LIMIT) {
            if let Some(record) = self.parse_work(item) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn parse_work(&self, item: &Value) -> Option<MetadataRecord> {
        let title = item
            .get("title")
            .and_then(Value::as_array)
            .and_then(|titles| titles.first())
            .and_then(Value::as_str)?;

        // Crossref exposes a relevance score; normalize the typical range
        // into a confidence.
        let confidence = item
            .get("score")
            .and_then(Value::as_f64)
            .map(|score| (score / 120.0).clamp(0.4, 0.95))
            .unwrap_or(0.7);

        let mut record = MetadataRecord::new(ProviderId::Crossref, confidence)
            .ok()?
            .with_title(title);

        if let Some(authors) = item.get("author").and_then(Value::as_array) {
            record.authors = authors
                .iter()
                .filter_map(|author| {
                    let given = author.get("given").and_then(Value::as_str);
                    let family = author.get("family").and_then(Value::as_str)?;
                    Some(match given {
                        Some(given) => format!("{given} {family}"),
                        None => family.to_string(),
                    })
                })
                .collect();
        }

        if let Some(isbns) = item.get("ISBN").and_then(Value::as_array) {
            record.isbn = isbns
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(doi) = item.get("DOI").and_then(Value::as_str) {
            record = record.with_provider_data(serde_json::json!({ "doi": doi }));
        }

        if let Some(publisher) = item.get("publisher").and_then(Value::as_str) {
            record = record.with_publisher(publisher);
        }
        if let Some(date) = parse_date_parts(item) {
            record = record.with_publication_date(date);
        }
        if let Some(subjects) = item.get("subject").and_then(Value::as_array) {
            record.subjects = subjects
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        Some(record)
    }

    fn mock_records(&self, title: &str) -> Vec<MetadataRecord> {
        vec![MetadataRecord::new(ProviderId::Crossref, 0.75)
            .expect("mock confidence is in range")
            .with_title(title)
            .with_authors(vec![String::from("F. Scott Fitzgerald")])
            .with_isbn(vec![String::from("978-0-7432-7356-5")])
            .with_publisher("Charles Scribner's Sons")
            .with_provider_data(serde_json::json!({ "doi": "10.1000/gatsby.1925" }))]
    }
}

/// `published-print` / `published-online` carry `date-parts: [[y, m, d]]`
/// at whatever precision the depositor supplied.
fn parse_date_parts(item: &Value) -> Option<PublicationDate> {
    let parts = ["published-print", "published-online", "issued"]
        .iter()
        .find_map(|key| item.get(*key))?
        .get("date-parts")
        .and_then(Value::as_array)?
        .first()
        .and_then(Value::as_array)?;

    let year = parts.first().and_then(Value::as_i64)? as i32;
    let month = parts.get(1).and_then(Value::as_i64).map(|m| m as u8);
    let day = parts.get(2).and_then(Value::as_i64).map(|d| d as u8);

    match (month, day) {
        (Some(month), Some(day)) => PublicationDate::from_ymd(year, month, day).ok(),
        (Some(month), None) => PublicationDate::from_year_month(year, month).ok(),
        _ => PublicationDate::from_year(year).ok(),
    }
}

impl MetadataProvider for CrossrefAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Crossref
    }

    fn supports_field(&self, field: FieldType) -> bool {
        self.reliability(field) > 0.0
    }

    fn reliability(&self, field: FieldType) -> f64 {
        match field {
            FieldType::Title => 0.8,
            FieldType::Authors => 0.85,
            FieldType::Isbn => 0.9,
            FieldType::Publisher => 0.85,
            FieldType::PublicationDate => 0.9,
            FieldType::Description => 0.3,
            FieldType::Subjects => 0.6,
            FieldType::Series => 0.5,
            FieldType::PageCount => 0.3,
            FieldType::Language => 0.5,
            FieldType::CoverImage => 0.0,
        }
    }

    fn priority(&self) -> u8 {
        70
    }

    fn languages(&self) -> &[&'static str] {
        &["en"]
    }

    fn rate_limit(&self) -> Option<RateLimitConfig> {
        Some(
            RateLimitConfig::new(Duration::from_secs(1), 5)
                .with_min_delay(Duration::from_millis(100)),
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(6)
    }

    fn search_by_title<'a>(&'a self, title: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.mock {
                return Ok(self.mock_records(title));
            }
            self.query_works(
                format!("query.title={}", urlencoding::encode(title)),
                "search_by_title",
            )
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
            self.query_works(
                format!("filter=isbn:{}", urlencoding::encode(isbn)),
                "search_by_isbn",
            )
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
            self.query_works(
                format!("query.author={}", urlencoding::encode(creator)),
                "search_by_creator",
            )
            .await
        })
    }
}
