//! String and set similarity used by reconciliation and duplicate
//! screening. All scores are within [0, 1].

use crate::domain::record::normalize_for_key;

/// Edit-distance similarity over normalized text.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_for_key(a);
    let b = normalize_for_key(b);
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => strsim::normalized_levenshtein(&a, &b).clamp(0.0, 1.0),
    }
}

/// Similarity of two unordered string collections: the mean of each
/// element's best match in the other collection, in both directions.
pub fn set_similarity(a: &[String], b: &[String]) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let best_sum = |from: &[String], to: &[String]| -> f64 {
        from.iter()
            .map(|item| {
                to.iter()
                    .map(|other| string_similarity(item, other))
                    .fold(0.0, f64::max)
            })
            .sum::<f64>()
    };

    let total = best_sum(a, b) + best_sum(b, a);
    (total / (a.len() + b.len()) as f64).clamp(0.0, 1.0)
}

/// Relative difference of two numbers: 0 when equal, scaled by the larger
/// magnitude otherwise.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        return 0.0;
    }
    ((a - b).abs() / scale).min(1.0)
}
