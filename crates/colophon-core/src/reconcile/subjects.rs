//! Subject reconciliation: canonicalize, deduplicate, rank.

use crate::domain::{Subject, SubjectClaim};
use crate::reconcile::{consensus_confidence, ReconciledField, Sourced};
use crate::similarity::string_similarity;

/// Subjects closer than this are considered the same term.
pub const SUBJECT_DEDUP_SIMILARITY: f64 = 0.9;

/// Confidence boost granted when any classification code is present.
const CODE_BONUS: f64 = 0.05;

/// Per-subject count bonus, capped.
const COUNT_BONUS_STEP: f64 = 0.02;
const COUNT_BONUS_CAP: f64 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct SubjectsReconciler {
    dedup_similarity: f64,
}

impl SubjectsReconciler {
    pub fn new(dedup_similarity: f64) -> Self {
        Self { dedup_similarity }
    }

    fn threshold(&self) -> f64 {
        if self.dedup_similarity > 0.0 {
            self.dedup_similarity
        } else {
            SUBJECT_DEDUP_SIMILARITY
        }
    }

    /// Normalize every claim, collapse near-duplicates (keeping the entry
    /// from the more reliable source), and order subject > genre >
    /// keyword > tag.
    pub fn reconcile(
        &self,
        inputs: &[Sourced<SubjectClaim>],
    ) -> Option<ReconciledField<Vec<Subject>>> {
        if inputs.is_empty() {
            return None;
        }

        let mut kept: Vec<(Subject, Sourced<SubjectClaim>)> = Vec::new();
        for input in inputs {
            let candidate = Subject::from_claim(&input.value);
            if candidate.name.is_empty() {
                continue;
            }

            let found = kept.iter().position(|(existing, _)| {
                string_similarity(&existing.name, &candidate.name) >= self.threshold()
            });
            match found {
                Some(index) => {
                    // Same term from two sources: keep the more reliable
                    // one, but never drop a classification code.
                    let (existing, holder) = &mut kept[index];
                    if input.source.reliability > holder.source.reliability {
                        let previous_code = existing.code.take();
                        *existing = Subject {
                            code: candidate.code.clone().or(previous_code),
                            ..candidate
                        };
                        *holder = input.clone();
                    } else if existing.code.is_none() {
                        existing.code = candidate.code;
                    }
                }
                None => kept.push((candidate, input.clone())),
            }
        }

        if kept.is_empty() {
            return None;
        }

        kept.sort_by(|(a, _), (b, _)| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));

        let has_codes = kept.iter().any(|(subject, _)| subject.code.is_some());
        let base = kept
            .iter()
            .map(|(_, input)| input.source.reliability)
            .fold(0.0, f64::max);
        let distinct_sources = {
            let mut names: Vec<&str> = kept
                .iter()
                .map(|(_, input)| input.source.name.as_str())
                .collect();
            names.sort();
            names.dedup();
            names.len()
        };

        let count_bonus = (COUNT_BONUS_STEP * kept.len() as f64).min(COUNT_BONUS_CAP);
        let code_bonus = if has_codes { CODE_BONUS } else { 0.0 };
        let confidence = (consensus_confidence(base, distinct_sources) + count_bonus + code_bonus)
            .min(crate::reconcile::CONSENSUS_CONFIDENCE_CAP);

        let reasoning = format!(
            "normalized {} claim{} into {} subject{}{}",
            inputs.len(),
            if inputs.len() == 1 { "" } else { "s" },
            kept.len(),
            if kept.len() == 1 { "" } else { "s" },
            if has_codes {
                ", anchored by classification codes"
            } else {
                ""
            }
        );

        let sources = {
            let mut sources: Vec<_> = kept.iter().map(|(_, input)| input.source.clone()).collect();
            sources.sort_by(|a, b| a.name.cmp(&b.name));
            sources.dedup_by(|a, b| a.name == b.name);
            sources
        };

        Some(ReconciledField {
            value: kept.into_iter().map(|(subject, _)| subject).collect(),
            confidence,
            sources,
            reasoning,
            conflicts: Vec::new(),
        })
    }
}
