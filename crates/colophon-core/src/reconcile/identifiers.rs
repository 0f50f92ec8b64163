//! Identifier reconciliation: normalize, deduplicate, validate, order.

use std::collections::BTreeMap;

use crate::domain::{Identifier, IdentifierKind};
use crate::reconcile::{
    consensus_confidence, Conflict, ConflictKind, ConflictingValue, ReconciledField, Sourced,
};
use crate::reconcile::conflict::{impact_score, severity_for, ConflictImpact, DetectionMetadata};

#[derive(Debug, Clone, Default)]
pub struct IdentifiersReconciler;

impl IdentifiersReconciler {
    /// Parse and normalize every raw identifier, collapse identical
    /// normalized values (recording a format-difference conflict when the
    /// raw spellings differed), and order valid-before-invalid with ISBNs
    /// first.
    pub fn reconcile(
        &self,
        inputs: &[Sourced<String>],
    ) -> Option<ReconciledField<Vec<Identifier>>> {
        let inputs: Vec<&Sourced<String>> = inputs
            .iter()
            .filter(|input| !input.value.trim().is_empty())
            .collect();
        if inputs.is_empty() {
            return None;
        }

        struct Entry {
            identifier: Identifier,
            source: crate::domain::MetadataSource,
            raw_variants: Vec<(String, String)>,
        }

        let mut entries: BTreeMap<(IdentifierKind, String), Entry> = BTreeMap::new();
        for input in &inputs {
            let identifier = Identifier::parse(&input.value);
            let key = (identifier.kind, identifier.normalized.clone());
            entries
                .entry(key)
                .and_modify(|entry| {
                    if identifier.raw != entry.identifier.raw {
                        entry
                            .raw_variants
                            .push((identifier.raw.clone(), input.source.name.clone()));
                    }
                    if input.source.reliability > entry.source.reliability {
                        entry.source = input.source.clone();
                    }
                })
                .or_insert_with(|| Entry {
                    identifier: identifier.clone(),
                    source: input.source.clone(),
                    raw_variants: Vec::new(),
                });
        }

        let mut conflicts: Vec<Conflict> = Vec::new();
        for entry in entries.values() {
            if entry.raw_variants.is_empty() {
                continue;
            }
            let mut values = vec![ConflictingValue {
                value: entry.identifier.raw.clone(),
                source: entry.source.name.clone(),
            }];
            values.extend(
                entry
                    .raw_variants
                    .iter()
                    .map(|(raw, source)| ConflictingValue {
                        value: raw.clone(),
                        source: source.clone(),
                    }),
            );
            let score = impact_score(0.1, entry.source.reliability);
            conflicts.push(Conflict {
                kind: ConflictKind::FormatDifference,
                severity: severity_for(score),
                field: String::from("identifiers"),
                values,
                explanation: format!(
                    "multiple surface forms normalize to {} '{}'",
                    entry.identifier.kind, entry.identifier.normalized
                ),
                resolution: format!("kept the canonical form '{}'", entry.identifier.normalized),
                resolution_suggestions: vec![String::from("store the normalized form")],
                auto_resolvable: true,
                impact: ConflictImpact {
                    score,
                    affected_areas: vec![String::from("identifiers")],
                },
                detection: DetectionMetadata {
                    comparator: String::from("normalized_equality"),
                    disagreement: 0.1,
                    threshold: 1.0,
                },
            });
        }
        let mut ordered: Vec<(Identifier, crate::domain::MetadataSource, usize)> = entries
            .into_values()
            .map(|entry| {
                let duplicates = entry.raw_variants.len();
                (entry.identifier, entry.source, duplicates)
            })
            .collect();
        ordered.sort_by(|(a, _, _), (b, _, _)| {
            b.valid
                .cmp(&a.valid)
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.normalized.cmp(&b.normalized))
        });

        let valid_count = ordered.iter().filter(|(id, _, _)| id.valid).count();
        let agreement = 1 + ordered
            .iter()
            .map(|(_, _, duplicates)| *duplicates)
            .max()
            .unwrap_or(0);
        let base = ordered
            .iter()
            .map(|(_, source, _)| source.reliability)
            .fold(0.0, f64::max);
        let confidence = consensus_confidence(base, agreement);

        let reasoning = format!(
            "normalized {} raw identifier{} into {} canonical entr{} ({} valid)",
            inputs.len(),
            if inputs.len() == 1 { "" } else { "s" },
            ordered.len(),
            if ordered.len() == 1 { "y" } else { "ies" },
            valid_count
        );

        let sources = {
            let mut sources: Vec<_> = ordered
                .iter()
                .map(|(_, source, _)| source.clone())
                .collect();
            sources.sort_by(|a, b| a.name.cmp(&b.name));
            sources.dedup_by(|a, b| a.name == b.name);
            sources
        };

        Some(ReconciledField {
            value: ordered.into_iter().map(|(id, _, _)| id).collect(),
            confidence,
            sources,
            reasoning,
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetadataSource;

    fn source(name: &str, reliability: f64) -> MetadataSource {
        MetadataSource::new(name, reliability).expect("valid reliability")
    }

    #[test]
    fn equivalent_isbn_forms_collapse_to_one_identifier() {
        let reconciler = IdentifiersReconciler;
        let inputs = vec![
            Sourced::new(String::from("978-0-7432-7356-5"), source("open_library", 0.9)),
            Sourced::new(String::from("9780743273565"), source("google_books", 0.8)),
        ];

        let field = reconciler.reconcile(&inputs).expect("non-empty input");
        assert_eq!(field.value.len(), 1);
        assert_eq!(field.value[0].normalized, "9780743273565");
        assert!(field.value[0].valid);
        // Different surface forms leave an auto-resolvable trace.
        assert_eq!(field.conflicts.len(), 1);
        assert_eq!(field.conflicts[0].kind, ConflictKind::FormatDifference);
        assert!(field.conflicts[0].auto_resolvable);
    }

    #[test]
    fn valid_identifiers_sort_before_invalid_and_isbn_first() {
        let reconciler = IdentifiersReconciler;
        let inputs = vec![
            Sourced::new(
                String::from("https://doi.org/10.1093/ajae/aaq063"),
                source("crossref", 0.9),
            ),
            Sourced::new(String::from("9780743273566"), source("a", 0.5)),
            Sourced::new(String::from("978-0-7432-7356-5"), source("b", 0.8)),
        ];

        let field = reconciler.reconcile(&inputs).expect("non-empty input");
        let kinds: Vec<(IdentifierKind, bool)> = field
            .value
            .iter()
            .map(|id| (id.kind, id.valid))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (IdentifierKind::Isbn, true),
                (IdentifierKind::Doi, true),
                (IdentifierKind::Isbn, false),
            ]
        );
    }

    #[test]
    fn agreement_on_one_identifier_boosts_confidence() {
        let reconciler = IdentifiersReconciler;
        let single = vec![Sourced::new(
            String::from("9780743273565"),
            source("a", 0.8),
        )];
        let agreeing = vec![
            Sourced::new(String::from("9780743273565"), source("a", 0.8)),
            Sourced::new(String::from("978-0-7432-7356-5"), source("b", 0.8)),
        ];

        let lone = reconciler.reconcile(&single).expect("non-empty input");
        let backed = reconciler.reconcile(&agreeing).expect("non-empty input");
        assert!(backed.confidence > lone.confidence);
    }
}
