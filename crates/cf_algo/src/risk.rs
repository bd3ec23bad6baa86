//! Risk/confidence analytics over a margin distribution.
//!
//! Contract:
//! - Pure function of `(margins, win_probability, win_rule)`; two calls on equal inputs
//!   produce equal envelopes.
//! - Percentile ordering, target-shift monotonicity and shock-loss monotonicity are
//!   checked and reported in `MonotonicChecks`, never panicked on.
//! - Non-finite or empty input yields a zeroed envelope with `monotonic_checks.ok = false`.

use serde::{Deserialize, Serialize};

use cf_core::variables::WinRule;

use crate::stats::{mean, stdev, MarginDistribution};

pub const SHOCKS: [f64; 3] = [10.0, 25.0, 50.0];
pub const TARGET_WIN_PROBS: [f64; 4] = [0.60, 0.70, 0.80, 0.90];
const EPS_FRACTION: f64 = 0.10;
const MIN_CLIFF_BAND: f64 = 0.5;

/// Qualitative advisor grade, a pure function of p10 and p50.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskGrade {
    #[serde(rename = "Safe")]
    Safe,
    #[serde(rename = "Favored, tail risk")]
    FavoredTailRisk,
    #[serde(rename = "Toss-up")]
    TossUp,
    #[serde(rename = "Unfavored")]
    Unfavored,
}

impl RiskGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskGrade::Safe => "Safe",
            RiskGrade::FavoredTailRisk => "Favored, tail risk",
            RiskGrade::TossUp => "Toss-up",
            RiskGrade::Unfavored => "Unfavored",
        }
    }
}

pub fn grade_from_percentiles(p10: f64, p50: f64) -> RiskGrade {
    if p10 >= 0.0 {
        RiskGrade::Safe
    } else if p50 >= 0.0 {
        RiskGrade::FavoredTailRisk
    } else if -p50 <= 0.5 * (p50 - p10) {
        RiskGrade::TossUp
    } else {
        RiskGrade::Unfavored
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakEven {
    /// Margin lift that moves the median to zero.
    pub shift_to_p50: f64,
    /// Margin lift that moves p10 to zero.
    pub shift_to_p10: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetShift {
    pub target_win_probability: f64,
    pub required_shift: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShockLoss {
    pub shock: f64,
    pub win_probability: f64,
    pub loss: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskBlock {
    pub margin_of_safety: f64,
    pub downside_mass: f64,
    pub expected_shortfall_10: f64,
    pub break_even: BreakEven,
    pub target_shifts: Vec<TargetShift>,
    pub shock_losses: Vec<ShockLoss>,
    pub fragility_index: f64,
    pub cliff_risk: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonotonicChecks {
    pub ok: bool,
    pub finite_inputs: bool,
    pub percentiles_ordered: bool,
    pub target_shifts_monotone: bool,
    pub shock_losses_monotone: bool,
    pub issues: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    /// Win fraction recomputed from the margins under the rule.
    pub realized_win_probability: f64,
    pub monotonic_checks: MonotonicChecks,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceEnvelope {
    pub win_probability: f64,
    pub win_rule: WinRule,
    pub percentiles: Percentiles,
    pub risk: RiskBlock,
    pub diagnostics: Diagnostics,
    pub grade: RiskGrade,
}

/// Convenience wrapper for a bare margin slice.
pub fn analyze_margins(margins: &[f64], win_probability: f64, rule: WinRule) -> ConfidenceEnvelope {
    confidence_envelope(&MarginDistribution::new(margins.to_vec()), win_probability, rule)
}

pub fn confidence_envelope(dist: &MarginDistribution, win_probability: f64, rule: WinRule) -> ConfidenceEnvelope {
    if dist.is_empty() {
        return zeroed(rule, 0, true, "empty margin distribution");
    }
    if !dist.all_finite() || !win_probability.is_finite() {
        return zeroed(rule, dist.len(), false, "non-finite input");
    }

    let sorted = dist.sorted();
    let n = sorted.len();
    let percentiles = Percentiles {
        p10: dist.quantile(0.10),
        p50: dist.quantile(0.50),
        p90: dist.quantile(0.90),
    };

    let sd = stdev(dist.raw());
    let realized = dist.win_fraction(rule, 0.0);

    // worst ⌈10%⌉
    let k = ((n as f64) * 0.10).ceil().max(1.0) as usize;
    let expected_shortfall_10 = mean(&sorted[..k.min(n)]);

    let break_even = BreakEven {
        shift_to_p50: (-percentiles.p50).max(0.0),
        shift_to_p10: (-percentiles.p10).max(0.0),
    };

    let target_shifts: Vec<TargetShift> = TARGET_WIN_PROBS
        .iter()
        .map(|&t| TargetShift { target_win_probability: t, required_shift: (-dist.quantile(1.0 - t)).max(0.0) })
        .collect();

    let shock_losses: Vec<ShockLoss> = SHOCKS
        .iter()
        .map(|&s| {
            let w = dist.win_fraction(rule, -s);
            ShockLoss { shock: s, win_probability: w, loss: (realized - w).max(0.0) }
        })
        .collect();

    let eps = if sd > 0.0 { EPS_FRACTION * sd } else { 1.0 };
    let fragility_index = (dist.win_fraction(rule, eps) - dist.win_fraction(rule, -eps)) / (2.0 * eps);

    let band = (EPS_FRACTION * sd).max(MIN_CLIFF_BAND);
    let cliff_risk = dist.raw().iter().filter(|m| m.abs() <= band).count() as f64 / n as f64;

    let checks = run_checks(&percentiles, &target_shifts, &shock_losses);

    ConfidenceEnvelope {
        win_probability,
        win_rule: rule,
        grade: grade_from_percentiles(percentiles.p10, percentiles.p50),
        percentiles,
        risk: RiskBlock {
            margin_of_safety: percentiles.p10,
            downside_mass: 1.0 - realized,
            expected_shortfall_10,
            break_even,
            target_shifts,
            shock_losses,
            fragility_index,
            cliff_risk,
        },
        diagnostics: Diagnostics {
            n,
            min: sorted[0],
            max: sorted[n - 1],
            mean: mean(dist.raw()),
            stdev: sd,
            realized_win_probability: realized,
            monotonic_checks: checks,
        },
    }
}

fn run_checks(p: &Percentiles, targets: &[TargetShift], shocks: &[ShockLoss]) -> MonotonicChecks {
    let mut issues = Vec::new();
    let percentiles_ordered = p.p10 <= p.p50 && p.p50 <= p.p90;
    if !percentiles_ordered {
        issues.push(format!("percentiles out of order: p10={} p50={} p90={}", p.p10, p.p50, p.p90));
    }
    let target_shifts_monotone = targets.windows(2).all(|w| w[0].required_shift <= w[1].required_shift);
    if !target_shifts_monotone {
        issues.push("target shifts not monotone in target probability".to_string());
    }
    let shock_losses_monotone = shocks.windows(2).all(|w| w[0].loss <= w[1].loss);
    if !shock_losses_monotone {
        issues.push("shock losses not monotone in shock size".to_string());
    }
    MonotonicChecks {
        ok: issues.is_empty(),
        finite_inputs: true,
        percentiles_ordered,
        target_shifts_monotone,
        shock_losses_monotone,
        issues,
    }
}

fn zeroed(rule: WinRule, n: usize, finite: bool, issue: &str) -> ConfidenceEnvelope {
    let pct = Percentiles { p10: 0.0, p50: 0.0, p90: 0.0 };
    ConfidenceEnvelope {
        win_probability: 0.0,
        win_rule: rule,
        percentiles: pct,
        risk: RiskBlock {
            margin_of_safety: 0.0,
            downside_mass: 0.0,
            expected_shortfall_10: 0.0,
            break_even: BreakEven { shift_to_p50: 0.0, shift_to_p10: 0.0 },
            target_shifts: TARGET_WIN_PROBS
                .iter()
                .map(|&t| TargetShift { target_win_probability: t, required_shift: 0.0 })
                .collect(),
            shock_losses: SHOCKS.iter().map(|&s| ShockLoss { shock: s, win_probability: 0.0, loss: 0.0 }).collect(),
            fragility_index: 0.0,
            cliff_risk: 0.0,
        },
        diagnostics: Diagnostics {
            n,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            stdev: 0.0,
            realized_win_probability: 0.0,
            monotonic_checks: MonotonicChecks {
                ok: false,
                finite_inputs: finite,
                percentiles_ordered: true,
                target_shifts_monotone: true,
                shock_losses_monotone: true,
                issues: vec![issue.to_string()],
            },
        },
        // no usable distribution: never grade it as favorable
        grade: RiskGrade::Unfavored,
    }
}
