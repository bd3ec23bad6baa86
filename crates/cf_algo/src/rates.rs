//! Rate-spec builder: scenario inputs → six triangular `RateSpec`s.
//!
//! Contract:
//! - Volatility mode: each spec is `(mode·(1−w), mode, mode·(1+w))` with `w` the tier
//!   width (0.10 / 0.20 / 0.30) plus the universe widening, if any.
//! - Explicit mode: caller-supplied specs (rates in percent) are taken as-is.
//! - Every spec is clamped into its domain (rates ∈ [0, 1], throughput and volunteer
//!   multiplier ∈ (0, ∞)) and re-normalized so `min <= mode <= max` holds after clamping.
//! - A non-positive base throughput disables that channel (`fixed(0)`); the field model
//!   then reports no capacity when neither channel is usable.
//! - Universe/retention adjustment at retention 1.0 is the strict identity.

use serde::{Deserialize, Serialize};

use cf_core::sampling::RateSpec;
use cf_core::variables::{FieldInputs, RateOverrides, Uncertainty, UniverseAdjustment, UniverseComposition};

/// Smallest throughput / multiplier kept for an enabled channel.
pub const MIN_THROUGHPUT: f64 = 1e-6;
/// Retention factors below this are clamped up.
pub const RETENTION_FLOOR: f64 = 0.60;
/// Spread widening at the retention floor (absolute, added to the tier width).
pub const MAX_EXTRA_WIDTH: f64 = 0.05;
/// Largest absolute change the universe layer may apply to turnout reliability.
pub const TURNOUT_SHIFT_CAP: f64 = 0.05;

// (dem, rep, npa, other)
const PERSUASION_MULTIPLIERS: [f64; 4] = [0.85, 0.70, 1.15, 1.00];
const TURNOUT_MULTIPLIERS: [f64; 4] = [1.04, 1.03, 0.92, 0.96];

/// The six sampled specs, in draw order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateSpecs {
    pub contact_rate: RateSpec,
    pub persuasion_rate: RateSpec,
    pub turnout_reliability: RateSpec,
    pub doors_per_hour: RateSpec,
    pub calls_per_hour: RateSpec,
    pub volunteer_mult: RateSpec,
}

/// Result of the universe/retention layer on the two affected base rates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniverseAdjusted {
    pub retention_factor: f64,
    pub sr_adj: f64,
    pub tr_adj: f64,
    pub extra_width: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateSpecBundle {
    pub specs: RateSpecs,
    pub universe: Option<UniverseAdjusted>,
}

/// Composition-weighted (persuasion, turnout) multipliers; neutral when no weights are given.
pub fn composition_multipliers(c: &UniverseComposition) -> (f64, f64) {
    let w = [c.dem_pct, c.rep_pct, c.npa_pct, c.other_pct].map(|x| if x.is_finite() { x.max(0.0) } else { 0.0 });
    let total: f64 = w.iter().sum();
    if total <= 0.0 {
        return (1.0, 1.0);
    }
    let mut pm = 0.0;
    let mut tm = 0.0;
    for i in 0..4 {
        pm += w[i] / total * PERSUASION_MULTIPLIERS[i];
        tm += w[i] / total * TURNOUT_MULTIPLIERS[i];
    }
    (pm, tm)
}

/// Apply the universe/retention layer to a support rate and turnout reliability
/// (both fractions). Retention 1.0 (or a disabled layer) returns the inputs bit-for-bit.
pub fn universe_adjust(sr: f64, tr: f64, adj: &UniverseAdjustment) -> UniverseAdjusted {
    let r = if adj.retention_factor.is_finite() {
        adj.retention_factor.clamp(RETENTION_FLOOR, 1.0)
    } else {
        1.0
    };
    if !adj.enabled || r >= 1.0 {
        return UniverseAdjusted { retention_factor: 1.0, sr_adj: sr, tr_adj: tr, extra_width: 0.0 };
    }

    // 0 at full retention, 1 at the floor
    let k = (1.0 - r) / (1.0 - RETENTION_FLOOR);
    let (pm, tm) = composition_multipliers(&adj.composition);

    let sr_adj = (sr * (1.0 + (pm - 1.0) * k)).clamp(0.0, 1.0);
    let shift = (tr * (tm - 1.0) * k).clamp(-TURNOUT_SHIFT_CAP, TURNOUT_SHIFT_CAP);
    let tr_adj = (tr + shift).clamp(0.0, 1.0);

    UniverseAdjusted { retention_factor: r, sr_adj, tr_adj, extra_width: MAX_EXTRA_WIDTH * k }
}

/// Build the six specs for one simulation call.
pub fn build_rate_specs(
    field: &FieldInputs,
    uncertainty: &Uncertainty,
    universe: Option<&UniverseAdjustment>,
) -> RateSpecBundle {
    match uncertainty {
        Uncertainty::Volatility { level } => build_from_volatility(field, level.width(), universe),
        Uncertainty::Explicit { overrides } => build_from_overrides(overrides, universe),
    }
}

fn build_from_volatility(field: &FieldInputs, width: f64, universe: Option<&UniverseAdjustment>) -> RateSpecBundle {
    let contact = pct(field.contact_rate_pct);
    let mut sr = pct(field.support_rate_pct);
    let mut tr = pct(field.turnout_reliability_pct);
    let mut extra = 0.0;

    // only the two universe-adjusted rates pick up the retention widening
    let adjusted = universe.map(|u| universe_adjust(sr, tr, u));
    if let Some(a) = &adjusted {
        sr = a.sr_adj;
        tr = a.tr_adj;
        extra = a.extra_width;
    }

    let w = width;
    let specs = RateSpecs {
        contact_rate: rate_domain(around(contact, w)),
        persuasion_rate: rate_domain(widen(around(sr, w), extra)),
        turnout_reliability: rate_domain(widen(around(tr, w), extra)),
        doors_per_hour: throughput_domain(field.doors_per_hour, around(field.doors_per_hour, w)),
        calls_per_hour: throughput_domain(field.calls_per_hour, around(field.calls_per_hour, w)),
        volunteer_mult: throughput_domain(field.volunteer_mult, around(field.volunteer_mult, w)),
    };
    RateSpecBundle { specs, universe: adjusted }
}

fn build_from_overrides(o: &RateOverrides, universe: Option<&UniverseAdjustment>) -> RateSpecBundle {
    let mut persuasion = o.support_rate_pct.scaled(0.01);
    let mut turnout = o.turnout_reliability_pct.scaled(0.01);

    let adjusted = universe.map(|u| universe_adjust(persuasion.mode, turnout.mode, u));
    if let Some(a) = &adjusted {
        if a.retention_factor < 1.0 {
            if persuasion.mode > 0.0 {
                persuasion = persuasion.scaled(a.sr_adj / persuasion.mode);
            }
            turnout = turnout.recentered(a.tr_adj);
            persuasion = widen(persuasion, a.extra_width);
            turnout = widen(turnout, a.extra_width);
        }
    }

    let specs = RateSpecs {
        contact_rate: rate_domain(o.contact_rate_pct.scaled(0.01)),
        persuasion_rate: rate_domain(persuasion),
        turnout_reliability: rate_domain(turnout),
        doors_per_hour: throughput_domain(o.doors_per_hour.mode, o.doors_per_hour),
        calls_per_hour: throughput_domain(o.calls_per_hour.mode, o.calls_per_hour),
        volunteer_mult: throughput_domain(o.volunteer_mult.mode, o.volunteer_mult),
    };
    RateSpecBundle { specs, universe: adjusted }
}

#[inline]
fn pct(v: f64) -> f64 {
    v / 100.0
}

#[inline]
fn around(mode: f64, w: f64) -> RateSpec {
    RateSpec::normalized(mode * (1.0 - w), mode, mode * (1.0 + w))
}

#[inline]
fn widen(s: RateSpec, extra: f64) -> RateSpec {
    let d = s.mode.abs() * extra;
    RateSpec::normalized(s.min - d, s.mode, s.max + d)
}

#[inline]
fn rate_domain(s: RateSpec) -> RateSpec {
    s.clamped(0.0, 1.0)
}

fn throughput_domain(base: f64, s: RateSpec) -> RateSpec {
    if !(base > 0.0) {
        return RateSpec::fixed(0.0);
    }
    s.clamped(MIN_THROUGHPUT, f64::MAX)
}
