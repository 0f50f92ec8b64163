//! Provider trait and error types.
//!
//! This module defines the adapter contract (`MetadataProvider`) that all
//! metadata source implementations follow, along with the provider error
//! taxonomy used by the retry layer.
//!
//! # Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `search_by_title` | Title search |
//! | `search_by_isbn` | ISBN lookup |
//! | `search_by_creator` | Author/creator search |
//! | `search` | Multi-criteria search |
//!
//! Every operation returns raw `MetadataRecord`s; reconciliation happens
//! downstream. Implementations must be `Send + Sync` — the coordinator
//! shares them across concurrent query tasks.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{MetadataRecord, SearchQuery};
use crate::rate_limit::RateLimitConfig;
use crate::ProviderId;

/// Semantic field a provider can supply, used for capability checks and
/// per-field reliability lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Title,
    Authors,
    Isbn,
    Publisher,
    PublicationDate,
    Description,
    Subjects,
    Series,
    PageCount,
    Language,
    CoverImage,
}

impl FieldType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Authors => "authors",
            Self::Isbn => "isbn",
            Self::Publisher => "publisher",
            Self::PublicationDate => "publication_date",
            Self::Description => "description",
            Self::Subjects => "subjects",
            Self::Series => "series",
            Self::PageCount => "page_count",
            Self::Language => "language",
            Self::CoverImage => "cover_image",
        }
    }

    pub const fn all() -> [FieldType; 11] {
        [
            Self::Title,
            Self::Authors,
            Self::Isbn,
            Self::Publisher,
            Self::PublicationDate,
            Self::Description,
            Self::Subjects,
            Self::Series,
            Self::PageCount,
            Self::Language,
            Self::CoverImage,
        ]
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The source has no answer. Not a failure: callers substitute an
    /// empty result.
    NotFound,
    /// Credentials rejected. Fatal, never retried.
    Unauthorized,
    /// Upstream asked us to back off (HTTP 429).
    RateLimited,
    /// Upstream server failure (5xx).
    Upstream,
    Timeout,
    Network,
    /// Request the source cannot accept (other 4xx, bad input).
    InvalidRequest,
    /// The provider does not implement this operation.
    UnsupportedOperation,
    /// Upstream payload did not parse into records.
    Malformed,
}

/// Structured provider error carried through retry and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    operation: Option<String>,
    retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: None,
            retry_after: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unauthorized, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let mut error = Self::new(ProviderErrorKind::RateLimited, message);
        error.retry_after = retry_after;
        error
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Upstream, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn unsupported_operation(provider: ProviderId, operation: &str) -> Self {
        Self::new(
            ProviderErrorKind::UnsupportedOperation,
            format!("provider '{provider}' does not support '{operation}'"),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Malformed, message)
    }

    /// Map an upstream HTTP status onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            404 => Self::not_found(message),
            401 | 403 => Self::unauthorized(message),
            429 => Self::rate_limited(message, retry_after),
            500..=599 => Self::upstream(message),
            _ => Self::invalid_request(message),
        }
    }

    /// Annotate with the operation that produced this error.
    pub fn for_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimited
                | ProviderErrorKind::Upstream
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::NotFound => "provider.not_found",
            ProviderErrorKind::Unauthorized => "provider.unauthorized",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::Upstream => "provider.upstream",
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::Network => "provider.network",
            ProviderErrorKind::InvalidRequest => "provider.invalid_request",
            ProviderErrorKind::UnsupportedOperation => "provider.unsupported_operation",
            ProviderErrorKind::Malformed => "provider.malformed",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.operation {
            Some(operation) => write!(f, "{} during {} ({})", self.message, operation, self.code()),
            None => write!(f, "{} ({})", self.message, self.code()),
        }
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<MetadataRecord>, ProviderError>> + Send + 'a>>;

/// Capability-describing adapter over one external metadata source.
pub trait MetadataProvider: Send + Sync {
    /// Unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Whether this source can supply the given field.
    fn supports_field(&self, field: FieldType) -> bool;

    /// Trustworthiness of this source for the given field, within [0, 1].
    /// Unsupported fields score 0.
    fn reliability(&self, field: FieldType) -> f64;

    /// Static ordering weight used by the `priority` strategy; higher wins.
    fn priority(&self) -> u8;

    /// ISO 639-1 language codes this source covers well.
    fn languages(&self) -> &[&'static str];

    /// Admission-control configuration; `None` means unrestricted.
    fn rate_limit(&self) -> Option<RateLimitConfig>;

    /// Per-call budget enforced by the coordinator.
    fn timeout(&self) -> Duration;

    fn search_by_title<'a>(&'a self, title: &'a str) -> ProviderFuture<'a>;

    fn search_by_isbn<'a>(&'a self, isbn: &'a str) -> ProviderFuture<'a>;

    fn search_by_creator<'a>(&'a self, creator: &'a str) -> ProviderFuture<'a>;

    /// Multi-criteria search; the default routes to the most specific
    /// single-criterion operation the query populates.
    fn search<'a>(&'a self, query: &'a SearchQuery) -> ProviderFuture<'a> {
        if let Some(isbn) = query.isbn.as_deref() {
            return self.search_by_isbn(isbn);
        }
        if let Some(title) = query.title.as_deref() {
            return self.search_by_title(title);
        }
        if let Some(creator) = query.creators.first() {
            return self.search_by_creator(creator);
        }
        let id = self.id();
        Box::pin(async move { Err(ProviderError::unsupported_operation(id, "search")) })
    }

    /// Mean reliability over a set of fields; 0 when the set is empty.
    fn average_reliability(&self, fields: &[FieldType]) -> f64 {
        if fields.is_empty() {
            return 0.0;
        }
        let sum: f64 = fields.iter().map(|field| self.reliability(*field)).sum();
        sum / fields.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_taxonomy() {
        assert_eq!(
            ProviderError::from_status(404, "missing", None).kind(),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            ProviderError::from_status(401, "denied", None).kind(),
            ProviderErrorKind::Unauthorized
        );
        assert_eq!(
            ProviderError::from_status(429, "slow down", None).kind(),
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            ProviderError::from_status(503, "unavailable", None).kind(),
            ProviderErrorKind::Upstream
        );
        assert_eq!(
            ProviderError::from_status(400, "bad query", None).kind(),
            ProviderErrorKind::InvalidRequest
        );
    }

    #[test]
    fn retryable_covers_transient_kinds_only() {
        assert!(ProviderError::timeout("t").retryable());
        assert!(ProviderError::upstream("u").retryable());
        assert!(ProviderError::rate_limited("r", None).retryable());
        assert!(!ProviderError::unauthorized("a").retryable());
        assert!(!ProviderError::not_found("n").retryable());
        assert!(!ProviderError::invalid_request("i").retryable());
    }

    #[test]
    fn operation_annotation_shows_in_display() {
        let error = ProviderError::timeout("deadline exceeded").for_operation("search_by_title");
        let rendered = error.to_string();
        assert!(rendered.contains("search_by_title"), "{rendered}");
        assert!(rendered.contains("provider.timeout"), "{rendered}");
    }
}
