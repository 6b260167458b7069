// crates/analytics-core/src/math.rs
//! Pure numerical helpers shared by the repositories and analyzers:
//! percentile, OLS trend slope, and Jaccard similarity. No I/O, no
//! analytics-types dependency — these operate on plain numbers and
//! strings so they can be unit- and property-tested in isolation.

use std::collections::HashSet;

/// Order-statistic percentile over a copy of `values`, sorted ascending.
/// `p` is in [0,100]. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Median convenience wrapper over `percentile`.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Ordinary-least-squares slope of `(x, y)` pairs. Zero when the
/// variance of `x` is zero (including the 0- and 1-point cases) so
/// callers never have to special-case a degenerate trend.
pub fn trend_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in points {
        numerator += (x - mean_x) * (y - mean_y);
        denominator += (x - mean_x).powi(2);
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Jaccard similarity over the word sets of two normalized strings:
/// `|A ∩ B| / |A ∪ B|`. Returns 0.0 when both sides are empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn percentile_of_empty_is_none() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn median_of_five_values() {
        let v = vec![40.0, 50.0, 60.0, 70.0, 80.0];
        assert_eq!(median(&v), Some(60.0));
    }

    #[test]
    fn trend_slope_increasing_is_positive() {
        let points: Vec<(f64, f64)> = vec![(1.0, 40.0), (2.0, 50.0), (3.0, 60.0), (4.0, 70.0), (5.0, 80.0)];
        assert!(trend_slope(&points) > 0.0);
    }

    #[test]
    fn trend_slope_zero_variance_is_zero() {
        let points = vec![(1.0, 1.0), (1.0, 2.0), (1.0, 3.0)];
        assert_eq!(trend_slope(&points), 0.0);
    }

    #[test]
    fn trend_slope_single_point_is_zero() {
        assert_eq!(trend_slope(&[(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn jaccard_identical_sets_is_one() {
        assert_eq!(jaccard_similarity("cap theorem", "cap theorem"), 1.0);
    }

    #[test]
    fn jaccard_disjoint_sets_is_zero() {
        assert_eq!(jaccard_similarity("cap theorem", "rust ownership"), 0.0);
    }

    #[test]
    fn jaccard_both_empty_is_zero() {
        assert_eq!(jaccard_similarity("", ""), 0.0);
    }

    proptest! {
        #[test]
        fn percentile_is_bounded_by_min_and_max(mut xs in proptest::collection::vec(-1000.0f64..1000.0, 1..50)) {
            xs.retain(|x| x.is_finite());
            prop_assume!(!xs.is_empty());
            let lo = xs.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if let Some(p50) = percentile(&xs, 50.0) {
                prop_assert!(p50 >= lo - 1e-9 && p50 <= hi + 1e-9);
            }
        }

        #[test]
        fn jaccard_similarity_is_symmetric(a in "[a-z ]{0,20}", b in "[a-z ]{0,20}") {
            prop_assert!((jaccard_similarity(&a, &b) - jaccard_similarity(&b, &a)).abs() < 1e-12);
        }

        #[test]
        fn jaccard_similarity_is_bounded(a in "[a-z ]{0,20}", b in "[a-z ]{0,20}") {
            let s = jaccard_similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
