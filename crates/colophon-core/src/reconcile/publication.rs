//! Publication info reconciliation: dates, publishers, places.

use crate::domain::publication::{canonical_place, canonical_publisher};
use crate::domain::PublicationDate;
use crate::reconcile::{
    penalized_confidence, reconcile_string_field, ConflictDetector, ReconciledField, Sourced,
};

/// Merges publication dates, publishers, and places.
#[derive(Debug, Clone, Default)]
pub struct PublicationReconciler {
    detector: ConflictDetector,
}

impl PublicationReconciler {
    pub fn new(detector: ConflictDetector) -> Self {
        Self { detector }
    }

    /// Prefer the most specific date; among equally specific candidates
    /// the more reliable source wins.
    pub fn reconcile_date(
        &self,
        inputs: &[Sourced<PublicationDate>],
    ) -> Option<ReconciledField<PublicationDate>> {
        if inputs.is_empty() {
            return None;
        }

        let winner = inputs.iter().max_by(|a, b| {
            a.value
                .cmp_specificity(&b.value)
                .then_with(|| a.source.reliability.total_cmp(&b.source.reliability))
        })?;

        let agreeing: Vec<&Sourced<PublicationDate>> = inputs
            .iter()
            .filter(|input| input.value.agrees_with(&winner.value))
            .collect();
        let disagreeing = inputs.len() - agreeing.len();

        let conflicts =
            self.detector
                .detect_date_conflicts("publication_date", &winner.value, &winner.source, inputs);

        let base = agreeing
            .iter()
            .map(|input| input.source.reliability)
            .fold(0.0, f64::max);
        let confidence = penalized_confidence(base, agreeing.len(), disagreeing);

        let reasoning = format!(
            "kept '{}', the most specific date, confirmed by {} of {} source{}",
            winner.value.canonical(),
            agreeing.len(),
            inputs.len(),
            if inputs.len() == 1 { "" } else { "s" }
        );

        Some(ReconciledField {
            value: winner.value,
            confidence,
            sources: agreeing.iter().map(|input| input.source.clone()).collect(),
            reasoning,
            conflicts,
        })
    }

    /// Publisher names are compared after canonicalization so "Penguin
    /// Books Ltd." and "The Penguin Group (UK)" land in one group.
    pub fn reconcile_publisher(
        &self,
        inputs: &[Sourced<String>],
    ) -> Option<ReconciledField<String>> {
        reconcile_string_field("publisher", inputs, canonical_publisher, &self.detector)
    }

    pub fn reconcile_place(&self, inputs: &[Sourced<String>]) -> Option<ReconciledField<String>> {
        reconcile_string_field("place", inputs, canonical_place, &self.detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetadataSource;
    use crate::reconcile::ConflictKind;

    fn source(name: &str, reliability: f64) -> MetadataSource {
        MetadataSource::new(name, reliability).expect("valid reliability")
    }

    #[test]
    fn most_specific_date_wins_across_precisions() {
        let reconciler = PublicationReconciler::default();
        let inputs = vec![
            Sourced::new(
                PublicationDate::from_year(2005).expect("valid"),
                source("open_library", 0.9),
            ),
            Sourced::new(
                PublicationDate::from_year_month(2005, 7).expect("valid"),
                source("crossref", 0.85),
            ),
            Sourced::new(
                PublicationDate::from_ymd(2005, 7, 16).expect("valid"),
                source("google_books", 0.8),
            ),
        ];

        let field = reconciler.reconcile_date(&inputs).expect("non-empty input");
        assert_eq!(field.value.canonical(), "2005-07-16");
        // All three agree at their own precision, so all support the value.
        assert_eq!(field.sources.len(), 3);
        assert_eq!(field.conflicts.len(), 2);
        assert!(field
            .conflicts
            .iter()
            .all(|c| c.kind == ConflictKind::PrecisionDifference && c.auto_resolvable));
    }

    #[test]
    fn specificity_ties_break_by_reliability() {
        let reconciler = PublicationReconciler::default();
        let inputs = vec![
            Sourced::new(
                PublicationDate::from_year(1999).expect("valid"),
                source("crossref", 0.6),
            ),
            Sourced::new(
                PublicationDate::from_year(2001).expect("valid"),
                source("open_library", 0.9),
            ),
        ];

        let field = reconciler.reconcile_date(&inputs).expect("non-empty input");
        assert_eq!(field.value.year, 2001);
        assert_eq!(field.conflicts.len(), 1);
        assert_eq!(field.conflicts[0].kind, ConflictKind::TemporalDifference);
    }

    #[test]
    fn disagreeing_date_lowers_confidence_below_agreement_case() {
        let reconciler = PublicationReconciler::default();
        let agreeing_only = vec![
            Sourced::new(
                PublicationDate::from_year(2005).expect("valid"),
                source("open_library", 0.9),
            ),
            Sourced::new(
                PublicationDate::from_year(2005).expect("valid"),
                source("google_books", 0.8),
            ),
        ];
        let with_dissent = {
            let mut inputs = agreeing_only.clone();
            inputs.push(Sourced::new(
                PublicationDate::from_year(2007).expect("valid"),
                source("crossref", 0.7),
            ));
            inputs
        };

        let clean = reconciler
            .reconcile_date(&agreeing_only)
            .expect("non-empty input");
        let contested = reconciler
            .reconcile_date(&with_dissent)
            .expect("non-empty input");
        assert!(contested.confidence < clean.confidence);
    }

    #[test]
    fn equivalent_publisher_spellings_collapse_to_one_group() {
        let reconciler = PublicationReconciler::default();
        let inputs = vec![
            Sourced::new(String::from("Penguin Books Ltd."), source("open_library", 0.8)),
            Sourced::new(
                String::from("The Penguin Group (UK)"),
                source("google_books", 0.9),
            ),
        ];

        let field = reconciler
            .reconcile_publisher(&inputs)
            .expect("non-empty input");
        // Chosen from the more reliable source in the merged group.
        assert_eq!(field.value, "The Penguin Group (UK)");
        assert_eq!(field.sources.len(), 2);
        assert!(field
            .conflicts
            .iter()
            .all(|c| c.kind == ConflictKind::FormatDifference));
    }

    #[test]
    fn place_reconciliation_keeps_city_equivalence() {
        let reconciler = PublicationReconciler::default();
        let inputs = vec![
            Sourced::new(String::from("New York, NY"), source("open_library", 0.8)),
            Sourced::new(String::from("New York"), source("crossref", 0.7)),
        ];

        let field = reconciler.reconcile_place(&inputs).expect("non-empty input");
        assert_eq!(field.sources.len(), 2);
    }
}
