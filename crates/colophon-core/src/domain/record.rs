use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::publication::PublicationDate;
use crate::{ProviderId, ValidationError};

/// Attribution for one value contributed during reconciliation.
///
/// Many fields may share one source; the reliability is the provider's
/// trustworthiness for the contributing field, not the record confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSource {
    pub name: String,
    pub reliability: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub retrieved_at: OffsetDateTime,
}

impl MetadataSource {
    pub fn new(name: impl Into<String>, reliability: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&reliability) {
            return Err(ValidationError::ReliabilityOutOfRange { value: reliability });
        }
        Ok(Self {
            name: name.into(),
            reliability,
            retrieved_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Physical dimensions reported by some providers, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalDimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_cm: Option<f64>,
}

/// One provider's answer to a discovery query.
///
/// Immutable once produced; owned by the coordinator for the duration of
/// one query and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: Uuid,
    pub source: ProviderId,
    /// Provider-assigned confidence in this record, within [0, 1].
    pub confidence: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub retrieved_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub isbn: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<PublicationDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_dimensions: Option<PhysicalDimensions>,
    /// Opaque provider-specific payload, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_data: Option<serde_json::Value>,
}

impl MetadataRecord {
    pub fn new(source: ProviderId, confidence: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange { value: confidence });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            confidence,
            retrieved_at: OffsetDateTime::now_utc(),
            title: None,
            authors: Vec::new(),
            isbn: Vec::new(),
            publisher: None,
            publication_date: None,
            description: None,
            subjects: Vec::new(),
            series: None,
            page_count: None,
            language: None,
            cover_image: None,
            physical_dimensions: None,
            provider_data: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_isbn(mut self, isbn: Vec<String>) -> Self {
        self.isbn = isbn;
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_publication_date(mut self, date: PublicationDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_cover_image(mut self, url: impl Into<String>) -> Self {
        self.cover_image = Some(url.into());
        self
    }

    pub fn with_provider_data(mut self, data: serde_json::Value) -> Self {
        self.provider_data = Some(data);
        self
    }

    /// Equality key for aggregate deduplication: normalized title plus
    /// normalized, order-insensitive authors.
    pub fn dedup_key(&self) -> (String, String) {
        let title = normalize_for_key(self.title.as_deref().unwrap_or_default());
        let mut authors: Vec<String> = self
            .authors
            .iter()
            .map(|author| normalize_for_key(author))
            .filter(|author| !author.is_empty())
            .collect();
        authors.sort();
        authors.dedup();
        (title, authors.join("|"))
    }
}

/// Lowercased, alphanumeric-only, whitespace-collapsed key form.
pub fn normalize_for_key(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        let err = MetadataRecord::new(ProviderId::OpenLibrary, 1.2).expect_err("must fail");
        assert!(matches!(err, ValidationError::ConfidenceOutOfRange { .. }));
    }

    #[test]
    fn dedup_key_ignores_case_punctuation_and_author_order() {
        let a = MetadataRecord::new(ProviderId::OpenLibrary, 0.9)
            .expect("valid")
            .with_title("The Great Gatsby!")
            .with_authors(vec!["F. Scott Fitzgerald".into()]);
        let b = MetadataRecord::new(ProviderId::GoogleBooks, 0.8)
            .expect("valid")
            .with_title("the great gatsby")
            .with_authors(vec!["F Scott Fitzgerald".into()]);

        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn key_normalization_is_idempotent() {
        let once = normalize_for_key("  The GREAT Gatsby!! ");
        assert_eq!(once, normalize_for_key(&once));
    }
}
