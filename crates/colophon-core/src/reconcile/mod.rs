//! Field-by-field reconciliation of multi-source metadata.
//!
//! Every reconciler takes `(value, source)` tuples and returns a
//! [`ReconciledField`]: the winning value, a confidence score, the
//! supporting sources, human-readable reasoning, and any detected
//! conflicts. Reconciliation is pure and never fails partway — the worst
//! case is low confidence and many conflicts, not an error.

pub mod conflict;
pub mod content;
pub mod identifiers;
pub mod publication;
pub mod subjects;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::record::normalize_for_key;
use crate::domain::{Identifier, MetadataRecord, MetadataSource, PublicationDate, Subject, SubjectClaim};

pub use conflict::{
    Conflict, ConflictConfig, ConflictDetector, ConflictImpact, ConflictKind, ConflictSeverity,
    ConflictSummary, ConflictingValue, DetectionMetadata,
};
pub use content::{
    ContentBundle, ContentInputs, ContentReconciler, CoverClaim, DescriptionClaim, ExcerptClaim,
    RatingClaim, ReviewClaim, TocClaim,
};
pub use identifiers::IdentifiersReconciler;
pub use publication::PublicationReconciler;
pub use subjects::SubjectsReconciler;

/// Consensus confidence never exceeds this cap, to avoid false certainty.
pub const CONSENSUS_CONFIDENCE_CAP: f64 = 0.98;

/// Confidence added per additional agreeing source.
pub const AGREEMENT_BOOST: f64 = 0.05;

/// Multiplicative penalty applied once per disagreeing source.
pub const DISAGREEMENT_PENALTY: f64 = 0.85;

/// Shared consensus rule: `min(cap, base + boost × (agreeing − 1))`.
pub fn consensus_confidence(base: f64, agreeing_sources: usize) -> f64 {
    if agreeing_sources == 0 {
        return 0.0;
    }
    (base + AGREEMENT_BOOST * (agreeing_sources as f64 - 1.0))
        .min(CONSENSUS_CONFIDENCE_CAP)
        .clamp(0.0, CONSENSUS_CONFIDENCE_CAP)
}

/// Consensus confidence with the disagreement penalty applied. Adding an
/// agreeing source never lowers the result; adding a disagreeing source
/// never raises it.
pub fn penalized_confidence(base: f64, agreeing_sources: usize, disagreeing_sources: usize) -> f64 {
    consensus_confidence(base, agreeing_sources)
        * DISAGREEMENT_PENALTY.powi(disagreeing_sources as i32)
}

/// A raw value paired with its source attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: MetadataSource,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: MetadataSource) -> Self {
        Self { value, source }
    }
}

/// One reconciled field: the value that won, why, and at what confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledField<T> {
    pub value: T,
    pub confidence: f64,
    pub sources: Vec<MetadataSource>,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
}

/// Reconcile a free-text field by grouping normalized-equal values and
/// letting total source reliability pick the winning group.
pub(crate) fn reconcile_string_field(
    field: &str,
    inputs: &[Sourced<String>],
    normalize: impl Fn(&str) -> String + Copy,
    detector: &ConflictDetector,
) -> Option<ReconciledField<String>> {
    let inputs: Vec<&Sourced<String>> = inputs
        .iter()
        .filter(|input| !input.value.trim().is_empty())
        .collect();
    if inputs.is_empty() {
        return None;
    }

    // Group by canonical form, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<&Sourced<String>>> = BTreeMap::new();
    for input in &inputs {
        let key = normalize(&input.value);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(*input);
    }

    // Highest combined reliability wins; first-seen group wins ties so the
    // result is deterministic regardless of arrival order.
    let mut winning: Option<(&String, f64)> = None;
    for key in &order {
        let weight: f64 = groups[key].iter().map(|input| input.source.reliability).sum();
        if winning.map_or(true, |(_, best)| weight > best) {
            winning = Some((key, weight));
        }
    }
    let winning_key = winning?.0.clone();

    let group = &groups[&winning_key];
    let best = group
        .iter()
        .max_by(|a, b| a.source.reliability.total_cmp(&b.source.reliability))?;
    let chosen = best.value.clone();
    let chosen_source = best.source.clone();

    let disagreeing: Vec<Sourced<String>> = inputs
        .iter()
        .filter(|input| normalize(&input.value) != winning_key)
        .map(|input| (*input).clone())
        .collect();
    let all: Vec<Sourced<String>> = inputs.iter().map(|input| (*input).clone()).collect();
    let conflicts = detector.detect_string_conflicts(field, &chosen, &chosen_source, normalize, &all);

    let base = group
        .iter()
        .map(|input| input.source.reliability)
        .fold(0.0, f64::max);
    let confidence = penalized_confidence(base, group.len(), disagreeing.len());

    let reasoning = if disagreeing.is_empty() {
        format!(
            "'{chosen}' is backed by all {} source{}",
            group.len(),
            if group.len() == 1 { "" } else { "s" }
        )
    } else {
        format!(
            "'{chosen}' is backed by {} of {} sources with the highest combined reliability",
            group.len(),
            inputs.len()
        )
    };

    Some(ReconciledField {
        value: chosen,
        confidence,
        sources: group.iter().map(|input| input.source.clone()).collect(),
        reasoning,
        conflicts,
    })
}

/// Reconcile an unordered list field (authors). Sources whose list is a
/// subset of a candidate count as support for it, so partial records
/// reinforce the most complete agreeing list instead of fighting it.
pub(crate) fn reconcile_array_field(
    field: &str,
    inputs: &[Sourced<Vec<String>>],
    detector: &ConflictDetector,
) -> Option<ReconciledField<Vec<String>>> {
    let inputs: Vec<&Sourced<Vec<String>>> = inputs
        .iter()
        .filter(|input| !input.value.is_empty())
        .collect();
    if inputs.is_empty() {
        return None;
    }

    let key_of = |items: &[String]| -> Vec<String> {
        let mut keys: Vec<String> = items
            .iter()
            .map(|item| normalize_for_key(item))
            .filter(|item| !item.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    };

    // Support = summed reliability of every input whose list is contained
    // in the candidate's. Ties break toward the longer list, then the
    // earlier input.
    let mut winner_index = 0usize;
    let mut best_support = f64::MIN;
    for (index, candidate) in inputs.iter().enumerate() {
        let candidate_key = key_of(&candidate.value);
        let support: f64 = inputs
            .iter()
            .filter(|input| {
                let key = key_of(&input.value);
                key.iter().all(|item| candidate_key.contains(item))
            })
            .map(|input| input.source.reliability)
            .sum();
        let longer_tie = support == best_support
            && inputs[index].value.len() > inputs[winner_index].value.len();
        if support > best_support || longer_tie {
            best_support = support;
            winner_index = index;
        }
    }

    let winner = inputs[winner_index];
    let winner_key = key_of(&winner.value);
    let agreeing: Vec<&&Sourced<Vec<String>>> = inputs
        .iter()
        .filter(|input| {
            key_of(&input.value)
                .iter()
                .all(|item| winner_key.contains(item))
        })
        .collect();
    let disagreeing = inputs.len() - agreeing.len();

    let all: Vec<Sourced<Vec<String>>> = inputs.iter().map(|input| (*input).clone()).collect();
    let conflicts =
        detector.detect_array_conflicts(field, &winner.value, &winner.source, &all);

    let base = agreeing
        .iter()
        .map(|input| input.source.reliability)
        .fold(0.0, f64::max);
    let confidence = penalized_confidence(base, agreeing.len(), disagreeing);

    Some(ReconciledField {
        value: winner.value.clone(),
        confidence,
        sources: agreeing.iter().map(|input| input.source.clone()).collect(),
        reasoning: format!(
            "kept the most complete list supported by {} of {} sources",
            agreeing.len(),
            inputs.len()
        ),
        conflicts,
    })
}

/// Raw per-field inputs for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInputs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<Sourced<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Sourced<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publication_dates: Vec<Sourced<PublicationDate>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishers: Vec<Sourced<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub places: Vec<Sourced<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Sourced<SubjectClaim>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Sourced<String>>,
    #[serde(default)]
    pub content: ContentInputs,
}

impl FieldInputs {
    /// Build reconciliation inputs from aggregated provider records,
    /// using each record's provider-assigned confidence as the source
    /// reliability.
    pub fn from_records(records: &[MetadataRecord]) -> Self {
        let mut inputs = FieldInputs::default();

        for record in records {
            let source = MetadataSource {
                name: record.source.as_str().to_string(),
                reliability: record.confidence,
                retrieved_at: record.retrieved_at,
            };

            if let Some(title) = &record.title {
                inputs
                    .titles
                    .push(Sourced::new(title.clone(), source.clone()));
            }
            if !record.authors.is_empty() {
                inputs
                    .authors
                    .push(Sourced::new(record.authors.clone(), source.clone()));
            }
            if let Some(date) = record.publication_date {
                inputs
                    .publication_dates
                    .push(Sourced::new(date, source.clone()));
            }
            if let Some(publisher) = &record.publisher {
                inputs
                    .publishers
                    .push(Sourced::new(publisher.clone(), source.clone()));
            }
            for subject in &record.subjects {
                inputs.subjects.push(Sourced::new(
                    SubjectClaim::free_text(subject.clone()),
                    source.clone(),
                ));
            }
            for identifier in &record.isbn {
                inputs
                    .identifiers
                    .push(Sourced::new(identifier.clone(), source.clone()));
            }
            if let Some(description) = &record.description {
                inputs.content.descriptions.push(Sourced::new(
                    DescriptionClaim {
                        text: description.clone(),
                        quality: None,
                    },
                    source.clone(),
                ));
            }
            if let Some(url) = &record.cover_image {
                inputs.content.covers.push(Sourced::new(
                    CoverClaim {
                        url: url.clone(),
                        width: None,
                        height: None,
                        verified: false,
                    },
                    source.clone(),
                ));
            }
        }

        inputs
    }
}

/// Full reconciled preview returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledPreview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<ReconciledField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<ReconciledField<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<ReconciledField<PublicationDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<ReconciledField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<ReconciledField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<ReconciledField<Vec<Subject>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<ReconciledField<Vec<Identifier>>>,
    pub content: ContentBundle,
    pub conflict_summary: ConflictSummary,
}

/// Facade tying the per-field reconcilers together.
#[derive(Debug, Clone, Default)]
pub struct ReconcileEngine {
    detector: ConflictDetector,
}

impl ReconcileEngine {
    pub fn new(config: ConflictConfig) -> Self {
        Self {
            detector: ConflictDetector::new(config),
        }
    }

    pub fn reconcile(&self, inputs: &FieldInputs) -> ReconciledPreview {
        let publication = PublicationReconciler::new(self.detector.clone());
        let subjects = SubjectsReconciler::default();
        let identifiers = IdentifiersReconciler::default();
        let content = ContentReconciler::default();

        let title = reconcile_string_field("title", &inputs.titles, normalize_for_key, &self.detector);
        let authors = reconcile_array_field("authors", &inputs.authors, &self.detector);
        let publication_date = publication.reconcile_date(&inputs.publication_dates);
        let publisher = publication.reconcile_publisher(&inputs.publishers);
        let place = publication.reconcile_place(&inputs.places);
        let subjects = subjects.reconcile(&inputs.subjects);
        let identifiers = identifiers.reconcile(&inputs.identifiers);
        let content = content.reconcile(&inputs.content);

        let mut all_conflicts: Vec<Conflict> = Vec::new();
        if let Some(field) = &title {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &authors {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &publication_date {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &publisher {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &place {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &subjects {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &identifiers {
            all_conflicts.extend(field.conflicts.iter().cloned());
        }
        all_conflicts.extend(content.conflicts().iter().cloned());

        let conflict_summary = self.detector.analyze_all(&all_conflicts);

        ReconciledPreview {
            title,
            authors,
            publication_date,
            publisher,
            place,
            subjects,
            identifiers,
            content,
            conflict_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, reliability: f64) -> MetadataSource {
        MetadataSource::new(name, reliability).expect("valid reliability")
    }

    #[test]
    fn consensus_confidence_is_capped() {
        assert_eq!(consensus_confidence(0.97, 10), CONSENSUS_CONFIDENCE_CAP);
        assert_eq!(consensus_confidence(0.9, 1), 0.9);
        assert_eq!(consensus_confidence(0.9, 0), 0.0);
    }

    #[test]
    fn agreeing_sources_never_decrease_confidence() {
        let base = 0.8;
        let mut last = 0.0;
        for agreeing in 1..8 {
            let confidence = penalized_confidence(base, agreeing, 0);
            assert!(confidence >= last, "agreeing={agreeing}");
            last = confidence;
        }
    }

    #[test]
    fn disagreeing_sources_never_increase_confidence() {
        let base = 0.8;
        let mut last = 1.0;
        for disagreeing in 0..8 {
            let confidence = penalized_confidence(base, 2, disagreeing);
            assert!(confidence <= last, "disagreeing={disagreeing}");
            last = confidence;
        }
    }

    #[test]
    fn string_field_picks_the_better_supported_group() {
        let detector = ConflictDetector::default();
        let inputs = vec![
            Sourced::new(String::from("The Great Gatsby"), source("open_library", 0.9)),
            Sourced::new(String::from("the great gatsby"), source("crossref", 0.7)),
            Sourced::new(String::from("Tender Is the Night"), source("google_books", 0.8)),
        ];

        let field = reconcile_string_field("title", &inputs, normalize_for_key, &detector)
            .expect("non-empty input");
        assert_eq!(field.value, "The Great Gatsby");
        assert_eq!(field.sources.len(), 2);
        assert!(!field.reasoning.is_empty());
        assert!(field.confidence > 0.0 && field.confidence <= CONSENSUS_CONFIDENCE_CAP);
        assert!(!field.conflicts.is_empty());
    }

    #[test]
    fn empty_inputs_reconcile_to_none() {
        let detector = ConflictDetector::default();
        assert!(reconcile_string_field("title", &[], normalize_for_key, &detector).is_none());
        assert!(reconcile_array_field("authors", &[], &detector).is_none());
    }

    #[test]
    fn array_field_subsets_support_the_complete_list() {
        let detector = ConflictDetector::default();
        let inputs = vec![
            Sourced::new(
                vec![String::from("Neil Gaiman")],
                source("crossref", 0.7),
            ),
            Sourced::new(
                vec![String::from("Neil Gaiman"), String::from("Terry Pratchett")],
                source("open_library", 0.9),
            ),
        ];

        let field =
            reconcile_array_field("authors", &inputs, &detector).expect("non-empty input");
        assert_eq!(field.value.len(), 2);
        assert_eq!(field.sources.len(), 2, "the subset source counts as support");
    }

    #[test]
    fn from_records_routes_fields_to_their_inputs() {
        let record = MetadataRecord::new(crate::ProviderId::OpenLibrary, 0.9)
            .expect("valid")
            .with_title("Dune")
            .with_authors(vec![String::from("Frank Herbert")])
            .with_isbn(vec![String::from("9780441172719")])
            .with_description("Melange and sandworms.")
            .with_subjects(vec![String::from("Science Fiction")]);

        let inputs = FieldInputs::from_records(&[record]);
        assert_eq!(inputs.titles.len(), 1);
        assert_eq!(inputs.authors.len(), 1);
        assert_eq!(inputs.identifiers.len(), 1);
        assert_eq!(inputs.subjects.len(), 1);
        assert_eq!(inputs.content.descriptions.len(), 1);
        assert_eq!(inputs.titles[0].source.name, "open_library");
    }

    #[test]
    fn engine_produces_a_preview_with_summary() {
        let engine = ReconcileEngine::default();
        let inputs = FieldInputs {
            titles: vec![
                Sourced::new(String::from("Dune"), source("open_library", 0.9)),
                Sourced::new(String::from("Dune"), source("google_books", 0.8)),
            ],
            ..FieldInputs::default()
        };

        let preview = engine.reconcile(&inputs);
        let title = preview.title.expect("title reconciled");
        assert_eq!(title.value, "Dune");
        assert!(title.confidence > 0.9, "two agreeing sources boost confidence");
        assert_eq!(preview.conflict_summary.total, 0);
    }
}
