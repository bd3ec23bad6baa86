//! Determinism utilities: stable ordering for float data.
//!
//! This module is **I/O-free**. It provides:
//! - A total order for `f64` (via `total_cmp`) used by every sort in the engine
//! - The canonical ranking order for correlation-style impact scores
//! - Order statistics over an already-sorted slice

use core::cmp::Ordering;

/* -------------------------------------------------------------------------- */
/*                               Stable Ordering                              */
/* -------------------------------------------------------------------------- */

/// Sorted copy of `xs` (ascending, total order; input untouched).
pub fn sorted_copy(xs: &[f64]) -> Vec<f64> {
    let mut out = xs.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Ranking order for impact scores:
/// `|score|` descending, `None` (no signal) last, then label ascending.
pub fn cmp_impact(a: Option<f64>, a_label: &str, b: Option<f64>, b_label: &str) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.abs().total_cmp(&x.abs()).then_with(|| a_label.cmp(b_label)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a_label.cmp(b_label),
    }
}

/* -------------------------------------------------------------------------- */
/*                              Order statistics                               */
/* -------------------------------------------------------------------------- */

/// Linear-interpolated quantile of an ascending slice; `p` is clamped to [0, 1].
/// Returns 0.0 for an empty slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    let pos = p * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = pos - lo as f64;
    (sorted[lo] + (sorted[hi] - sorted[lo]) * w).max(sorted[lo]).min(sorted[hi])
}
