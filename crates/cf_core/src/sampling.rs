//! Triangular distribution parameters and inverse-CDF sampling.
//!
//! Contract:
//! - `RateSpec` always satisfies `min <= mode <= max` (checked by `new`,
//!   enforced by reordering in `normalized`).
//! - `tri_sample` consumes exactly **one** uniform draw per call, including the
//!   degenerate `max == min` case, so trial streams stay aligned.

use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::rng::unit_f64;

/// Triangular(min, mode, max).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateSpec {
    pub min: f64,
    pub mode: f64,
    pub max: f64,
}

impl RateSpec {
    /// Checked constructor: finite values in non-decreasing order.
    pub fn new(min: f64, mode: f64, max: f64) -> Result<Self, CoreError> {
        if !(min.is_finite() && mode.is_finite() && max.is_finite()) || min > mode || mode > max {
            return Err(CoreError::InvalidRateSpec { min, mode, max });
        }
        Ok(Self { min, mode, max })
    }

    /// Reorder three values into (smallest, median, largest).
    pub fn normalized(a: f64, b: f64, c: f64) -> Self {
        let lo = a.min(b).min(c);
        let hi = a.max(b).max(c);
        // median of three without sorting
        let mid = a.max(b).min(a.min(b).max(c));
        Self { min: lo, mode: mid, max: hi }
    }

    /// Degenerate spec that always samples `v`.
    pub fn fixed(v: f64) -> Self {
        Self { min: v, mode: v, max: v }
    }

    /// Clamp all three points into `[lo, hi]` and restore ordering.
    pub fn clamped(&self, lo: f64, hi: f64) -> Self {
        Self::normalized(self.min.clamp(lo, hi), self.mode.clamp(lo, hi), self.max.clamp(lo, hi))
    }

    /// Multiply every point by `k` (k >= 0 keeps ordering).
    pub fn scaled(&self, k: f64) -> Self {
        Self::normalized(self.min * k, self.mode * k, self.max * k)
    }

    /// Move the whole spec so that its mode lands on `mode`.
    pub fn recentered(&self, mode: f64) -> Self {
        let d = mode - self.mode;
        Self { min: self.min + d, mode, max: self.max + d }
    }

    /// Analytic mean `(min + mode + max) / 3`.
    pub fn mean(&self) -> f64 {
        (self.min + self.mode + self.max) / 3.0
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn sample<R: RngCore + ?Sized>(&self, rng: &mut R) -> f64 {
        tri_sample(self.min, self.mode, self.max, rng)
    }
}

/// One triangular draw via the inverse CDF. Callers must not pass `max < min`.
pub fn tri_sample<R: RngCore + ?Sized>(min: f64, mode: f64, max: f64, rng: &mut R) -> f64 {
    let u = unit_f64(rng);
    let span = max - min;
    if span <= 0.0 {
        return mode;
    }
    let c = (mode - min) / span;
    let x = if u < c {
        min + (u * span * (mode - min)).sqrt()
    } else {
        max - ((1.0 - u) * span * (max - mode)).sqrt()
    };
    // rounding can step one ulp outside the support
    x.max(min).min(max)
}
