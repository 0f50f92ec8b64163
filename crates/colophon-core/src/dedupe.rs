//! Duplicate screening against an existing catalog.
//!
//! A candidate entry is compared field by field against each existing
//! entry; weighted similarity classifies the pair and a recommendation
//! (skip / review / add) falls out of the thresholds alone.

use serde::{Deserialize, Serialize};

use crate::domain::publication::canonical_publisher;
use crate::domain::{Identifier, IdentifierKind, PublicationDate};
use crate::similarity::{set_similarity, string_similarity};

/// Similarity at or above which the pair is the same entry.
pub const DUPLICATE_EXACT_THRESHOLD: f64 = 0.9;
pub const DUPLICATE_LIKELY_THRESHOLD: f64 = 0.7;
pub const DUPLICATE_POSSIBLE_THRESHOLD: f64 = 0.5;

/// ISBN or title+authors similarity above this marks a different edition
/// of the same work.
pub const EDITION_SIGNAL_THRESHOLD: f64 = 0.8;

/// Matches below this floor are not reported at all.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;

/// Per-field similarity at or above which the field counts as matching.
const FIELD_MATCH_FLOOR: f64 = 0.8;

/// Catalog entry shape consumed from the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub isbn: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<PublicationDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Likely,
    Possible,
    DifferentEdition,
    RelatedWork,
}

impl MatchKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Likely => "likely",
            Self::Possible => "possible",
            Self::DifferentEdition => "different_edition",
            Self::RelatedWork => "related_work",
        }
    }

    /// Recommendation is a pure function of the match kind.
    pub const fn recommendation(self) -> Recommendation {
        match self {
            Self::Exact => Recommendation::Skip,
            Self::Likely | Self::Possible => Recommendation::ReviewManually,
            Self::DifferentEdition | Self::RelatedWork => Recommendation::AddAsNew,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Skip,
    ReviewManually,
    AddAsNew,
}

/// Field weights for the combined similarity. Only fields present on both
/// sides contribute; the sum is normalized over the applicable weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldWeights {
    pub title: f64,
    pub authors: f64,
    pub isbn: f64,
    pub publication_date: f64,
    pub publisher: f64,
    pub series: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 0.3,
            authors: 0.25,
            isbn: 0.25,
            publication_date: 0.08,
            publisher: 0.07,
            series: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicateConfig {
    pub weights: FieldWeights,
    /// Matches below this similarity are dropped.
    pub min_similarity: f64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

/// One screened pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub existing: CatalogEntry,
    pub similarity: f64,
    pub kind: MatchKind,
    pub matching_fields: Vec<String>,
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    config: DuplicateConfig,
}

impl DuplicateDetector {
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Screen a candidate against a list of existing entries; matches at
    /// or above the floor, sorted by descending similarity.
    pub fn detect(&self, candidate: &CatalogEntry, existing: &[CatalogEntry]) -> Vec<DuplicateMatch> {
        let mut matches: Vec<DuplicateMatch> = existing
            .iter()
            .map(|entry| self.compare(candidate, entry))
            .filter(|result| result.similarity >= self.config.min_similarity)
            .collect();
        matches.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
        matches
    }

    /// Compare one pair.
    pub fn compare(&self, candidate: &CatalogEntry, existing: &CatalogEntry) -> DuplicateMatch {
        let weights = self.config.weights;
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut matching_fields = Vec::new();
        let mut diverging_fields = Vec::new();

        let mut field = |name: &str, weight: f64, similarity: Option<f64>| match similarity {
            Some(similarity) => {
                weighted_sum += weight * similarity;
                weight_total += weight;
                if similarity >= FIELD_MATCH_FLOOR {
                    matching_fields.push(name.to_string());
                } else {
                    diverging_fields.push(name.to_string());
                }
                similarity
            }
            None => 0.0,
        };

        let title_similarity = field(
            "title",
            weights.title,
            applicable_str(&candidate.title, &existing.title).map(|(a, b)| string_similarity(a, b)),
        );
        let authors_similarity = field(
            "authors",
            weights.authors,
            if candidate.authors.is_empty() || existing.authors.is_empty() {
                None
            } else {
                Some(set_similarity(&candidate.authors, &existing.authors))
            },
        );
        let isbn_similarity = field(
            "isbn",
            weights.isbn,
            shared_isbn(&candidate.isbn, &existing.isbn),
        );
        field(
            "publication_date",
            weights.publication_date,
            match (candidate.publication_date, existing.publication_date) {
                (Some(a), Some(b)) => Some(a.similarity(&b)),
                _ => None,
            },
        );
        field(
            "publisher",
            weights.publisher,
            match (&candidate.publisher, &existing.publisher) {
                (Some(a), Some(b)) => applicable_str(a, b)
                    .map(|(a, b)| string_similarity(&canonical_publisher(a), &canonical_publisher(b))),
                _ => None,
            },
        );
        field(
            "series",
            weights.series,
            match (&candidate.series, &existing.series) {
                (Some(a), Some(b)) => applicable_str(a, b).map(|(a, b)| string_similarity(a, b)),
                _ => None,
            },
        );

        let similarity = if weight_total > 0.0 {
            (weighted_sum / weight_total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let kind = classify(similarity, isbn_similarity, title_similarity, authors_similarity);
        let confidence =
            (similarity * (0.8 + 0.04 * matching_fields.len() as f64)).min(0.98);

        let explanation = explain(kind, similarity, &matching_fields, &diverging_fields);

        DuplicateMatch {
            existing: existing.clone(),
            similarity,
            kind,
            matching_fields,
            confidence,
            recommendation: kind.recommendation(),
            explanation,
        }
    }
}

fn applicable_str<'a>(a: &'a str, b: &'a str) -> Option<(&'a str, &'a str)> {
    if a.trim().is_empty() || b.trim().is_empty() {
        None
    } else {
        Some((a, b))
    }
}

/// Exact-after-normalization: 1.0 when the entries share any canonical
/// ISBN, 0.0 otherwise.
fn shared_isbn(candidate: &[String], existing: &[String]) -> Option<f64> {
    if candidate.is_empty() || existing.is_empty() {
        return None;
    }
    let normalize = |values: &[String]| -> Vec<String> {
        values
            .iter()
            .map(|raw| Identifier::with_kind(IdentifierKind::Isbn, raw).normalized)
            .filter(|value| !value.is_empty())
            .collect()
    };
    let candidate = normalize(candidate);
    let existing = normalize(existing);
    if candidate.iter().any(|isbn| existing.contains(isbn)) {
        Some(1.0)
    } else {
        Some(0.0)
    }
}

fn classify(
    similarity: f64,
    isbn_similarity: f64,
    title_similarity: f64,
    authors_similarity: f64,
) -> MatchKind {
    if similarity >= DUPLICATE_EXACT_THRESHOLD {
        MatchKind::Exact
    } else if similarity >= DUPLICATE_LIKELY_THRESHOLD {
        MatchKind::Likely
    } else if similarity >= DUPLICATE_POSSIBLE_THRESHOLD {
        MatchKind::Possible
    } else if isbn_similarity > EDITION_SIGNAL_THRESHOLD
        || (title_similarity > EDITION_SIGNAL_THRESHOLD
            && authors_similarity > EDITION_SIGNAL_THRESHOLD)
    {
        MatchKind::DifferentEdition
    } else {
        MatchKind::RelatedWork
    }
}

fn explain(
    kind: MatchKind,
    similarity: f64,
    matching: &[String],
    diverging: &[String],
) -> String {
    let mut parts = vec![format!(
        "{} match at {:.0}% combined similarity",
        kind.as_str(),
        similarity * 100.0
    )];
    if !matching.is_empty() {
        parts.push(format!("matching: {}", matching.join(", ")));
    }
    if !diverging.is_empty() {
        parts.push(format!("diverging: {}", diverging.join(", ")));
    }
    parts.join("; ")
}
