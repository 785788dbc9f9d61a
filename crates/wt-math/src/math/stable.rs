//! Numerically stable primitives for log2-domain probability math.
//!
//! The emission tables and transition estimates carry probabilities in
//! log base 2 throughout; these helpers keep normalization and composition
//! out of linear space where many small bin probabilities would underflow.

/// Stable log2(sum(2^values)).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log2_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp2();
    }
    max + sum.log2()
}

/// Stable log2(2^a + 2^b).
pub fn log2_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (1.0 + (-diff).exp2()).log2()
}

/// Normalize a vector of non-negative counts to a distribution and return
/// its log2 probabilities.
///
/// Returns `None` if the counts sum to zero (nothing to normalize), which
/// callers report as degenerate training data. A zero count maps to
/// NEG_INFINITY; callers that must avoid -inf bins smooth before calling.
pub fn normalize_counts_log2(counts: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(counts.iter().map(|c| (c / total).log2()).collect())
}

/// Index of the maximum value, or `None` for an empty slice.
///
/// Ties resolve to the lowest index so results are reproducible.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
