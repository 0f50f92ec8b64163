//! Content reconciliation: descriptions, tables of contents, reviews,
//! ratings, covers, excerpts.

use serde::{Deserialize, Serialize};

use crate::reconcile::{consensus_confidence, Conflict, ReconciledField, Sourced};

/// Description text with an optional upstream quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionClaim {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocClaim {
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewClaim {
    pub reviewer: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub helpful_votes: u32,
}

/// An aggregate rating as reported by one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingClaim {
    pub average: f64,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverClaim {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub verified: bool,
}

impl CoverClaim {
    fn resolution(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcerptClaim {
    pub text: String,
}

/// Raw content inputs, one vector per aspect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentInputs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<Sourced<DescriptionClaim>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tocs: Vec<Sourced<TocClaim>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Sourced<ReviewClaim>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratings: Vec<Sourced<RatingClaim>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<Sourced<CoverClaim>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excerpts: Vec<Sourced<ExcerptClaim>>,
}

/// Reconciled content aspects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ReconciledField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_of_contents: Option<ReconciledField<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<ReconciledField<Vec<ReviewClaim>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<ReconciledField<RatingClaim>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<ReconciledField<CoverClaim>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<ReconciledField<String>>,
}

impl ContentBundle {
    /// All conflicts across the bundle's aspects.
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut all = Vec::new();
        if let Some(field) = &self.description {
            all.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &self.table_of_contents {
            all.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &self.reviews {
            all.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &self.rating {
            all.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &self.cover {
            all.extend(field.conflicts.iter().cloned());
        }
        if let Some(field) = &self.excerpt {
            all.extend(field.conflicts.iter().cloned());
        }
        all
    }
}

/// Description length at which the length heuristic saturates.
const DESCRIPTION_SATURATION_LEN: f64 = 2000.0;

#[derive(Debug, Clone, Default)]
pub struct ContentReconciler;

impl ContentReconciler {
    pub fn reconcile(&self, inputs: &ContentInputs) -> ContentBundle {
        ContentBundle {
            description: self.reconcile_description(&inputs.descriptions),
            table_of_contents: self.reconcile_toc(&inputs.tocs),
            reviews: self.reconcile_reviews(&inputs.reviews),
            rating: self.reconcile_rating(&inputs.ratings),
            cover: self.reconcile_cover(&inputs.covers),
            excerpt: self.reconcile_excerpt(&inputs.excerpts),
        }
    }

    /// Highest explicit quality score wins; without one, a
    /// length-plus-reliability heuristic stands in.
    fn reconcile_description(
        &self,
        inputs: &[Sourced<DescriptionClaim>],
    ) -> Option<ReconciledField<String>> {
        if inputs.is_empty() {
            return None;
        }

        let score = |input: &Sourced<DescriptionClaim>| -> f64 {
            input.value.quality.unwrap_or_else(|| {
                let length = (input.value.text.chars().count() as f64
                    / DESCRIPTION_SATURATION_LEN)
                    .min(1.0);
                0.6 * length + 0.4 * input.source.reliability
            })
        };

        let winner = inputs.iter().max_by(|a, b| score(a).total_cmp(&score(b)))?;
        Some(ReconciledField {
            value: winner.value.text.clone(),
            confidence: consensus_confidence(winner.source.reliability, 1),
            sources: vec![winner.source.clone()],
            reasoning: format!(
                "kept the highest-quality description of {} candidate{} ({} chars, from {})",
                inputs.len(),
                if inputs.len() == 1 { "" } else { "s" },
                winner.value.text.chars().count(),
                winner.source.name
            ),
            conflicts: Vec::new(),
        })
    }

    /// The most complete table of contents wins.
    fn reconcile_toc(&self, inputs: &[Sourced<TocClaim>]) -> Option<ReconciledField<Vec<String>>> {
        if inputs.is_empty() {
            return None;
        }

        let winner = inputs.iter().max_by(|a, b| {
            a.value
                .entries
                .len()
                .cmp(&b.value.entries.len())
                .then_with(|| a.source.reliability.total_cmp(&b.source.reliability))
        })?;

        Some(ReconciledField {
            value: winner.value.entries.clone(),
            confidence: consensus_confidence(winner.source.reliability, 1),
            sources: vec![winner.source.clone()],
            reasoning: format!(
                "kept the most complete table of contents ({} entries, from {})",
                winner.value.entries.len(),
                winner.source.name
            ),
            conflicts: Vec::new(),
        })
    }

    /// All reviews survive, verified first, then by helpfulness.
    fn reconcile_reviews(
        &self,
        inputs: &[Sourced<ReviewClaim>],
    ) -> Option<ReconciledField<Vec<ReviewClaim>>> {
        if inputs.is_empty() {
            return None;
        }

        let mut reviews: Vec<(ReviewClaim, &Sourced<ReviewClaim>)> = inputs
            .iter()
            .map(|input| (input.value.clone(), input))
            .collect();
        reviews.sort_by(|(a, _), (b, _)| {
            b.verified
                .cmp(&a.verified)
                .then_with(|| b.helpful_votes.cmp(&a.helpful_votes))
        });

        let base = inputs
            .iter()
            .map(|input| input.source.reliability)
            .fold(0.0, f64::max);

        let sources = {
            let mut sources: Vec<_> = inputs.iter().map(|input| input.source.clone()).collect();
            sources.sort_by(|a, b| a.name.cmp(&b.name));
            sources.dedup_by(|a, b| a.name == b.name);
            sources
        };

        Some(ReconciledField {
            value: reviews.into_iter().map(|(review, _)| review).collect(),
            confidence: consensus_confidence(base, 1),
            sources,
            reasoning: format!(
                "kept all {} review{}, verified first, then by helpful votes",
                inputs.len(),
                if inputs.len() == 1 { "" } else { "s" }
            ),
            conflicts: Vec::new(),
        })
    }

    /// Reliability-weighted average, with sample counts summed across
    /// sources.
    fn reconcile_rating(
        &self,
        inputs: &[Sourced<RatingClaim>],
    ) -> Option<ReconciledField<RatingClaim>> {
        if inputs.is_empty() {
            return None;
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut count_total: u32 = 0;
        for input in inputs {
            let weight = input.source.reliability * f64::from(input.value.count.max(1));
            weighted_sum += input.value.average * weight;
            weight_total += weight;
            count_total = count_total.saturating_add(input.value.count);
        }
        if weight_total == 0.0 {
            return None;
        }

        let base = inputs
            .iter()
            .map(|input| input.source.reliability)
            .fold(0.0, f64::max);

        Some(ReconciledField {
            value: RatingClaim {
                average: weighted_sum / weight_total,
                count: count_total,
            },
            confidence: consensus_confidence(base, inputs.len()),
            sources: inputs.iter().map(|input| input.source.clone()).collect(),
            reasoning: format!(
                "reliability-weighted average over {} source{} covering {} rating{}",
                inputs.len(),
                if inputs.len() == 1 { "" } else { "s" },
                count_total,
                if count_total == 1 { "" } else { "s" }
            ),
            conflicts: Vec::new(),
        })
    }

    /// Highest-resolution verified cover; unverified covers only when no
    /// verified one exists.
    fn reconcile_cover(&self, inputs: &[Sourced<CoverClaim>]) -> Option<ReconciledField<CoverClaim>> {
        if inputs.is_empty() {
            return None;
        }

        let pick = |verified_only: bool| {
            inputs
                .iter()
                .filter(|input| !verified_only || input.value.verified)
                .max_by(|a, b| {
                    a.value
                        .resolution()
                        .cmp(&b.value.resolution())
                        .then_with(|| a.source.reliability.total_cmp(&b.source.reliability))
                })
        };

        let winner = pick(true).or_else(|| pick(false))?;
        Some(ReconciledField {
            value: winner.value.clone(),
            confidence: consensus_confidence(winner.source.reliability, 1),
            sources: vec![winner.source.clone()],
            reasoning: format!(
                "kept the {} cover with the highest resolution ({}x{}, from {})",
                if winner.value.verified {
                    "verified"
                } else {
                    "best available"
                },
                winner.value.width.unwrap_or(0),
                winner.value.height.unwrap_or(0),
                winner.source.name
            ),
            conflicts: Vec::new(),
        })
    }

    /// Longest excerpt wins.
    fn reconcile_excerpt(&self, inputs: &[Sourced<ExcerptClaim>]) -> Option<ReconciledField<String>> {
        if inputs.is_empty() {
            return None;
        }

        let winner = inputs.iter().max_by(|a, b| {
            a.value
                .text
                .chars()
                .count()
                .cmp(&b.value.text.chars().count())
                .then_with(|| a.source.reliability.total_cmp(&b.source.reliability))
        })?;

        Some(ReconciledField {
            value: winner.value.text.clone(),
            confidence: consensus_confidence(winner.source.reliability, 1),
            sources: vec![winner.source.clone()],
            reasoning: format!(
                "kept the longest excerpt ({} chars, from {})",
                winner.value.text.chars().count(),
                winner.source.name
            ),
            conflicts: Vec::new(),
        })
    }
}
