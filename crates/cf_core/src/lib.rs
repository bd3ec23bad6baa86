//! cf_core — Core types, scenario configuration, ordering helpers, and seeded RNG.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`cf_algo`, `cf_pipeline`, `cf_io`, `cf_cli`).
//!
//! - Structural errors: `CoreError`
//! - Seeded PRNG (string seed → Mulberry32 stream) with an entropy fallback
//! - Triangular distribution parameters (`RateSpec`) and inverse-CDF sampling
//! - Scenario configuration with enumerated option sets (`variables`)
//! - Deterministic ordering helpers for float data

#![forbid(unsafe_code)]

pub mod determinism;
pub mod rng;
pub mod sampling;
pub mod variables;

pub mod errors {
    use thiserror::Error;

    /// Structural configuration errors. These reject a call outright; statistical
    /// degeneracy (zero capacity, zero variance) is never reported through here.
    #[derive(Clone, Debug, PartialEq, Error)]
    pub enum CoreError {
        #[error("runs must be >= 1")]
        InvalidRuns,
        #[error("non-finite value: {0}")]
        NonFinite(&'static str),
        #[error("domain out of range: {0}")]
        DomainOutOfRange(&'static str),
        #[error("invalid rate spec: min={min} mode={mode} max={max}")]
        InvalidRateSpec { min: f64, mode: f64, max: f64 },
        #[error("invalid range: {0}")]
        InvalidRange(&'static str),
    }

    /// Reject NaN/±inf with the field name attached.
    #[inline]
    pub fn ensure_finite(v: f64, field: &'static str) -> Result<f64, CoreError> {
        if v.is_finite() { Ok(v) } else { Err(CoreError::NonFinite(field)) }
    }
}

pub use errors::CoreError;
pub use rng::{make_rng, Mulberry32, SimRng};
pub use sampling::{tri_sample, RateSpec};
