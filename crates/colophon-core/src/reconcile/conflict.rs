//! Conflict detection and aggregation.
//!
//! Given a reconciled value and its raw per-source inputs, classify every
//! disagreement into a typed conflict. Severity is derived strictly from
//! the numeric disagreement and the reliability of the agreeing sources —
//! never assigned ad hoc.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{MetadataSource, PublicationDate};
use crate::reconcile::Sourced;
use crate::similarity::{relative_difference, set_similarity, string_similarity};

/// Conflict taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    ValueMismatch,
    FormatDifference,
    PrecisionDifference,
    CompletenessDifference,
    QualityDifference,
    TemporalDifference,
    SourceDisagreement,
    NormalizationConflict,
}

impl ConflictKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValueMismatch => "value_mismatch",
            Self::FormatDifference => "format_difference",
            Self::PrecisionDifference => "precision_difference",
            Self::CompletenessDifference => "completeness_difference",
            Self::QualityDifference => "quality_difference",
            Self::TemporalDifference => "temporal_difference",
            Self::SourceDisagreement => "source_disagreement",
            Self::NormalizationConflict => "normalization_conflict",
        }
    }

    /// Resolvable by normalization/precision rules without human input.
    pub const fn auto_resolvable(self) -> bool {
        matches!(
            self,
            Self::FormatDifference | Self::PrecisionDifference | Self::CompletenessDifference
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Critical,
    Major,
    Minor,
    Informational,
}

impl ConflictSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Informational => "informational",
        }
    }
}

/// Impact thresholds mapping a derived score onto a severity.
pub const SEVERITY_CRITICAL_FLOOR: f64 = 0.75;
pub const SEVERITY_MAJOR_FLOOR: f64 = 0.5;
pub const SEVERITY_MINOR_FLOOR: f64 = 0.25;

/// Impact score: disagreement magnitude scaled by the inverse of the
/// agreeing sources' reliability — a disagreement against weak agreement
/// matters more.
pub fn impact_score(disagreement: f64, agreeing_reliability: f64) -> f64 {
    (disagreement * (1.0 - 0.5 * agreeing_reliability.clamp(0.0, 1.0))).clamp(0.0, 1.0)
}

pub fn severity_for(impact: f64) -> ConflictSeverity {
    if impact >= SEVERITY_CRITICAL_FLOOR {
        ConflictSeverity::Critical
    } else if impact >= SEVERITY_MAJOR_FLOOR {
        ConflictSeverity::Major
    } else if impact >= SEVERITY_MINOR_FLOOR {
        ConflictSeverity::Minor
    } else {
        ConflictSeverity::Informational
    }
}

/// One contributed value in a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingValue {
    pub value: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictImpact {
    pub score: f64,
    pub affected_areas: Vec<String>,
}

/// How the conflict was found, for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetadata {
    pub comparator: String,
    pub disagreement: f64,
    pub threshold: f64,
}

/// A typed disagreement between sources on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub field: String,
    pub values: Vec<ConflictingValue>,
    pub explanation: String,
    pub resolution: String,
    pub resolution_suggestions: Vec<String>,
    pub auto_resolvable: bool,
    pub impact: ConflictImpact,
    pub detection: DetectionMetadata,
}

impl Conflict {
    fn build(
        kind: ConflictKind,
        field: &str,
        values: Vec<ConflictingValue>,
        explanation: String,
        resolution: String,
        suggestions: Vec<String>,
        disagreement: f64,
        agreeing_reliability: f64,
        comparator: &str,
        threshold: f64,
    ) -> Self {
        let score = impact_score(disagreement, agreeing_reliability);
        Self {
            kind,
            severity: severity_for(score),
            field: field.to_string(),
            values,
            explanation,
            resolution,
            resolution_suggestions: suggestions,
            auto_resolvable: kind.auto_resolvable(),
            impact: ConflictImpact {
                score,
                affected_areas: vec![field.to_string()],
            },
            detection: DetectionMetadata {
                comparator: comparator.to_string(),
                disagreement,
                threshold,
            },
        }
    }
}

/// Detector thresholds; the defaults pin current behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Edit-distance similarity at or above which two strings are treated
    /// as near-equal rather than mismatched.
    pub string_similarity_threshold: f64,
    /// Relative difference tolerated between numeric values.
    pub numeric_tolerance: f64,
    /// Reliability spread between agreeing sources that triggers a
    /// quality_difference.
    pub reliability_gap: f64,
    /// Set similarity below which arrays count as outright disagreement.
    pub disagreement_floor: f64,
    /// Cap on conflicts reported per field; unbounded when `None`.
    pub max_conflicts_per_field: Option<usize>,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            string_similarity_threshold: 0.8,
            numeric_tolerance: 0.05,
            reliability_gap: 0.2,
            disagreement_floor: 0.3,
            max_conflicts_per_field: None,
        }
    }
}

/// Compares reconciled values against their raw inputs with
/// type-appropriate comparators.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &ConflictConfig {
        &self.config
    }

    fn capped(&self, mut conflicts: Vec<Conflict>) -> Vec<Conflict> {
        if let Some(cap) = self.config.max_conflicts_per_field {
            conflicts.truncate(cap);
        }
        conflicts
    }

    /// String comparator. `chosen_key` is the normalized form of the
    /// winning value; inputs whose normalized form matches but whose raw
    /// text differs are format differences.
    pub fn detect_string_conflicts(
        &self,
        field: &str,
        chosen: &str,
        chosen_source: &MetadataSource,
        normalize: impl Fn(&str) -> String,
        inputs: &[Sourced<String>],
    ) -> Vec<Conflict> {
        let chosen_key = normalize(chosen);
        let mut conflicts = Vec::new();

        for input in inputs {
            if input.value == chosen {
                // Exact agreement; flag only a reliability spread.
                let gap = (chosen_source.reliability - input.source.reliability).abs();
                if gap > self.config.reliability_gap && input.source.name != chosen_source.name {
                    conflicts.push(Conflict::build(
                        ConflictKind::QualityDifference,
                        field,
                        values_pair(chosen, chosen_source, input),
                        format!(
                            "sources agree on '{chosen}' but their reliability differs by {gap:.2}"
                        ),
                        format!("kept '{chosen}'; agreement is not in question"),
                        vec![String::from("review the lower-reliability source's record")],
                        gap,
                        chosen_source.reliability,
                        "reliability_gap",
                        self.config.reliability_gap,
                    ));
                }
                continue;
            }

            let input_key = normalize(&input.value);
            if input_key == chosen_key {
                conflicts.push(Conflict::build(
                    ConflictKind::FormatDifference,
                    field,
                    values_pair(chosen, chosen_source, input),
                    format!(
                        "'{}' and '{}' are the same value in different surface forms",
                        chosen, input.value
                    ),
                    format!("normalized both to '{chosen_key}' and kept '{chosen}'"),
                    vec![format!("use the canonical form '{chosen_key}'")],
                    0.1,
                    chosen_source.reliability,
                    "normalized_equality",
                    1.0,
                ));
                continue;
            }

            let similarity = string_similarity(chosen, &input.value);
            let disagreement = 1.0 - similarity;
            if similarity >= self.config.string_similarity_threshold {
                conflicts.push(Conflict::build(
                    ConflictKind::NormalizationConflict,
                    field,
                    values_pair(chosen, chosen_source, input),
                    format!(
                        "'{}' and '{}' are {:.0}% similar but normalize differently",
                        chosen,
                        input.value,
                        similarity * 100.0
                    ),
                    format!("kept '{chosen}' from the better-supported group"),
                    vec![
                        format!("verify whether '{}' is a variant spelling", input.value),
                        String::from("extend the normalization rules if it is"),
                    ],
                    disagreement,
                    chosen_source.reliability,
                    "edit_distance",
                    self.config.string_similarity_threshold,
                ));
            } else {
                conflicts.push(Conflict::build(
                    ConflictKind::ValueMismatch,
                    field,
                    values_pair(chosen, chosen_source, input),
                    format!(
                        "'{}' ({}) disagrees with '{}' ({})",
                        chosen, chosen_source.name, input.value, input.source.name
                    ),
                    format!("kept '{chosen}' from the better-supported group"),
                    vec![
                        String::from("review the disagreeing source manually"),
                        format!("confirm '{chosen}' against the physical item"),
                    ],
                    disagreement,
                    chosen_source.reliability,
                    "edit_distance",
                    self.config.string_similarity_threshold,
                ));
            }
        }

        self.capped(conflicts)
    }

    /// Date comparator: agreement at different granularity is a precision
    /// difference; different dates are temporal differences scaled by
    /// distance.
    pub fn detect_date_conflicts(
        &self,
        field: &str,
        chosen: &PublicationDate,
        chosen_source: &MetadataSource,
        inputs: &[Sourced<PublicationDate>],
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for input in inputs {
            if input.value == *chosen {
                continue;
            }

            if input.value.agrees_with(chosen) {
                if input.value.precision() != chosen.precision() {
                    conflicts.push(Conflict::build(
                        ConflictKind::PrecisionDifference,
                        field,
                        date_values_pair(chosen, chosen_source, input),
                        format!(
                            "'{}' and '{}' agree but at different precision",
                            chosen.canonical(),
                            input.value.canonical()
                        ),
                        format!("kept the most specific date '{}'", chosen.canonical()),
                        vec![String::from("prefer the most specific agreeing date")],
                        0.15,
                        chosen_source.reliability,
                        "date_precision",
                        1.0,
                    ));
                }
                continue;
            }

            let disagreement = 1.0 - chosen.similarity(&input.value);
            conflicts.push(Conflict::build(
                ConflictKind::TemporalDifference,
                field,
                date_values_pair(chosen, chosen_source, input),
                format!(
                    "'{}' ({}) and '{}' ({}) are different dates",
                    chosen.canonical(),
                    chosen_source.name,
                    input.value.canonical(),
                    input.source.name
                ),
                format!("kept '{}' from the more reliable source", chosen.canonical()),
                vec![
                    String::from("check whether the sources describe different editions"),
                    String::from("confirm the date against the copyright page"),
                ],
                disagreement,
                chosen_source.reliability,
                "date_distance",
                0.0,
            ));
        }

        self.capped(conflicts)
    }

    /// Array comparator: strict subsets are completeness differences,
    /// near-equal sets pass, divergent sets are mismatches, and mostly
    /// disjoint sets are outright source disagreement.
    pub fn detect_array_conflicts(
        &self,
        field: &str,
        chosen: &[String],
        chosen_source: &MetadataSource,
        inputs: &[Sourced<Vec<String>>],
    ) -> Vec<Conflict> {
        let chosen_set = normalized_set(chosen);
        let mut conflicts = Vec::new();

        for input in inputs {
            let input_set = normalized_set(&input.value);
            if input_set == chosen_set {
                continue;
            }

            let render = |items: &[String]| items.join(", ");
            if is_strict_subset(&input_set, &chosen_set) || is_strict_subset(&chosen_set, &input_set)
            {
                let missing = chosen_set.len().abs_diff(input_set.len());
                conflicts.push(Conflict::build(
                    ConflictKind::CompletenessDifference,
                    field,
                    array_values_pair(chosen, chosen_source, input),
                    format!(
                        "'{}' and '{}' agree where they overlap; one lists {missing} more entr{}",
                        render(chosen),
                        render(&input.value),
                        if missing == 1 { "y" } else { "ies" }
                    ),
                    String::from("kept the more complete list"),
                    vec![String::from("merge the union of both lists")],
                    0.1 + 0.05 * missing as f64,
                    chosen_source.reliability,
                    "subset",
                    1.0,
                ));
                continue;
            }

            let similarity = set_similarity(chosen, &input.value);
            let disagreement = 1.0 - similarity;
            if similarity < self.config.disagreement_floor {
                conflicts.push(Conflict::build(
                    ConflictKind::SourceDisagreement,
                    field,
                    array_values_pair(chosen, chosen_source, input),
                    format!(
                        "'{}' ({}) and '{}' ({}) barely overlap",
                        render(chosen),
                        chosen_source.name,
                        render(&input.value),
                        input.source.name
                    ),
                    String::from("kept the better-supported list"),
                    vec![String::from(
                        "the sources may describe different works; review manually",
                    )],
                    disagreement,
                    chosen_source.reliability,
                    "set_similarity",
                    self.config.disagreement_floor,
                ));
            } else if similarity < self.config.string_similarity_threshold {
                conflicts.push(Conflict::build(
                    ConflictKind::ValueMismatch,
                    field,
                    array_values_pair(chosen, chosen_source, input),
                    format!(
                        "'{}' and '{}' overlap only partially",
                        render(chosen),
                        render(&input.value)
                    ),
                    String::from("kept the better-supported list"),
                    vec![String::from("review the entries unique to each source")],
                    disagreement,
                    chosen_source.reliability,
                    "set_similarity",
                    self.config.string_similarity_threshold,
                ));
            }
        }

        self.capped(conflicts)
    }

    /// Numeric comparator with a relative-difference tolerance.
    pub fn detect_numeric_conflicts(
        &self,
        field: &str,
        chosen: f64,
        chosen_source: &MetadataSource,
        inputs: &[Sourced<f64>],
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for input in inputs {
            let difference = relative_difference(chosen, input.value);
            if difference <= self.config.numeric_tolerance {
                continue;
            }
            conflicts.push(Conflict::build(
                ConflictKind::ValueMismatch,
                field,
                vec![
                    ConflictingValue {
                        value: chosen.to_string(),
                        source: chosen_source.name.clone(),
                    },
                    ConflictingValue {
                        value: input.value.to_string(),
                        source: input.source.name.clone(),
                    },
                ],
                format!(
                    "{chosen} and {} differ by {:.0}%",
                    input.value,
                    difference * 100.0
                ),
                format!("kept {chosen} from the more reliable source"),
                vec![String::from("verify against the physical item")],
                difference,
                chosen_source.reliability,
                "relative_difference",
                self.config.numeric_tolerance,
            ));
        }

        self.capped(conflicts)
    }

    /// Aggregate per-field conflicts into one summary.
    pub fn analyze_all(&self, conflicts: &[Conflict]) -> ConflictSummary {
        let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_field: BTreeMap<String, usize> = BTreeMap::new();
        let mut auto_resolvable = Vec::new();
        let mut manual = Vec::new();
        let mut impact_sum = 0.0;

        for conflict in conflicts {
            *by_severity
                .entry(conflict.severity.as_str().to_string())
                .or_default() += 1;
            *by_kind
                .entry(conflict.kind.as_str().to_string())
                .or_default() += 1;
            *by_field.entry(conflict.field.clone()).or_default() += 1;
            impact_sum += conflict.impact.score;

            if conflict.auto_resolvable {
                auto_resolvable.push(conflict.clone());
            } else {
                manual.push(conflict.clone());
            }
        }

        let overall_score = if conflicts.is_empty() {
            0.0
        } else {
            impact_sum / conflicts.len() as f64
        };

        let mut recommendations = Vec::new();
        let critical = by_severity.get("critical").copied().unwrap_or(0);
        let major = by_severity.get("major").copied().unwrap_or(0);
        if critical > 0 {
            recommendations.push(format!(
                "{critical} critical conflict{} need manual review before applying",
                if critical == 1 { "" } else { "s" }
            ));
        }
        if major > 0 {
            recommendations.push(format!(
                "{major} major conflict{} should be reviewed",
                if major == 1 { "" } else { "s" }
            ));
        }
        if !auto_resolvable.is_empty() {
            recommendations.push(format!(
                "{} conflict{} can be auto-resolved by normalization rules",
                auto_resolvable.len(),
                if auto_resolvable.len() == 1 { "" } else { "s" }
            ));
        }
        if conflicts.is_empty() {
            recommendations.push(String::from("no conflicts detected; safe to auto-apply"));
        }

        ConflictSummary {
            total: conflicts.len(),
            by_severity,
            by_kind,
            by_field,
            auto_resolvable,
            manual,
            overall_score,
            recommendations,
        }
    }
}

/// Aggregated view over every field's conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
    pub by_field: BTreeMap<String, usize>,
    pub auto_resolvable: Vec<Conflict>,
    pub manual: Vec<Conflict>,
    /// Weighted mean of per-conflict impact scores.
    pub overall_score: f64,
    pub recommendations: Vec<String>,
}

fn values_pair(
    chosen: &str,
    chosen_source: &MetadataSource,
    input: &Sourced<String>,
) -> Vec<ConflictingValue> {
    vec![
        ConflictingValue {
            value: chosen.to_string(),
            source: chosen_source.name.clone(),
        },
        ConflictingValue {
            value: input.value.clone(),
            source: input.source.name.clone(),
        },
    ]
}

fn date_values_pair(
    chosen: &PublicationDate,
    chosen_source: &MetadataSource,
    input: &Sourced<PublicationDate>,
) -> Vec<ConflictingValue> {
    vec![
        ConflictingValue {
            value: chosen.canonical(),
            source: chosen_source.name.clone(),
        },
        ConflictingValue {
            value: input.value.canonical(),
            source: input.source.name.clone(),
        },
    ]
}

fn array_values_pair(
    chosen: &[String],
    chosen_source: &MetadataSource,
    input: &Sourced<Vec<String>>,
) -> Vec<ConflictingValue> {
    vec![
        ConflictingValue {
            value: chosen.join(", "),
            source: chosen_source.name.clone(),
        },
        ConflictingValue {
            value: input.value.join(", "),
            source: input.source.name.clone(),
        },
    ]
}

fn normalized_set(items: &[String]) -> std::collections::BTreeSet<String> {
    items
        .iter()
        .map(|item| crate::domain::record::normalize_for_key(item))
        .filter(|item| !item.is_empty())
        .collect()
}

fn is_strict_subset(
    a: &std::collections::BTreeSet<String>,
    b: &std::collections::BTreeSet<String>,
) -> bool {
    !a.is_empty() && a.len() < b.len() && a.is_subset(b)
}
