//! Descriptive statistics over simulated margins.
//!
//! Contract:
//! - `MarginDistribution` owns the raw margins (trial order) and one sorted copy built at
//!   construction; nothing sorts the raw array in place.
//! - `pearson` returns `None` (no signal) for fewer than two points or zero variance.
//! - The histogram is a display artifact: nothing else reads it.

use serde::{Deserialize, Serialize};

use cf_core::determinism::{quantile_sorted, sorted_copy};
use cf_core::variables::WinRule;

pub const HISTOGRAM_MIN_BINS: usize = 12;
pub const HISTOGRAM_MAX_BINS: usize = 80;

#[derive(Clone, Debug, PartialEq)]
pub struct MarginDistribution {
    raw: Vec<f64>,
    sorted: Vec<f64>,
}

impl MarginDistribution {
    pub fn new(raw: Vec<f64>) -> Self {
        let sorted = sorted_copy(&raw);
        Self { raw, sorted }
    }

    #[inline]
    pub fn raw(&self) -> &[f64] {
        &self.raw
    }

    #[inline]
    pub fn sorted(&self) -> &[f64] {
        &self.sorted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[inline]
    pub fn quantile(&self, p: f64) -> f64 {
        quantile_sorted(&self.sorted, p)
    }

    pub fn all_finite(&self) -> bool {
        self.raw.iter().all(|m| m.is_finite())
    }

    /// Fraction of trials that win under `rule` after adding `shift` to every margin.
    pub fn win_fraction(&self, rule: WinRule, shift: f64) -> f64 {
        if self.raw.is_empty() {
            return 0.0;
        }
        let wins = self.raw.iter().filter(|&&m| rule.wins(m + shift)).count();
        wins as f64 / self.raw.len() as f64
    }
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation.
pub fn stdev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    var.max(0.0).sqrt()
}

/// Pearson correlation of two equal-length series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 || ys.len() != n {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if !(sxx > 0.0 && syy > 0.0) {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub range_lo: f64,
    pub range_hi: f64,
    pub bins: Vec<HistogramBin>,
}

/// Bin count for `n` trials: round(√n) clamped to [12, 80].
pub fn histogram_bin_count(n: usize) -> usize {
    ((n as f64).sqrt().round() as usize).clamp(HISTOGRAM_MIN_BINS, HISTOGRAM_MAX_BINS)
}

/// Histogram over the p1–p99 range; values outside it land in the edge bins.
/// `None` for an empty or non-finite distribution.
pub fn histogram(dist: &MarginDistribution) -> Option<Histogram> {
    if dist.is_empty() || !dist.all_finite() {
        return None;
    }
    let lo = dist.quantile(0.01);
    let hi = dist.quantile(0.99);
    let bins = histogram_bin_count(dist.len());
    let mut counts = vec![0u32; bins];

    let width = (hi - lo) / bins as f64;
    for &m in dist.raw() {
        let idx = if width > 0.0 {
            let k = ((m - lo) / width).floor();
            if k < 0.0 { 0 } else { (k as usize).min(bins - 1) }
        } else {
            0
        };
        counts[idx] += 1;
    }

    let out = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lo: lo + width * i as f64,
            hi: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count,
        })
        .collect();
    Some(Histogram { range_lo: lo, range_hi: hi, bins: out })
}
