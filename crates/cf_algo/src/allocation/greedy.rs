//! Greedy marginal-value allocation across tactics.
//!
//! Contract:
//! - Tactics are validated before anything is allocated; a malformed tactic rejects the
//!   whole call (`AllocError`).
//! - Each pick takes one step of `step` attempts from the tactic with the best marginal
//!   score (Δvotes/Δcost for budget, Δvotes for capacity). The final pick of a tactic may
//!   be partial when its cap, the budget or the capacity leaves less than a full step.
//! - Only picks with positive Δvotes are taken. Ties keep input order.
//! - Decay tiers scale the yield of attempts beyond each threshold; they never move a cap.
//! - Σcost ≤ budget·(1+ε), Σattempts ≤ capacity·(1+ε), attempts_i ≤ cap_i.
//! - `budget <= 0` or `capacity <= 0` ⇒ empty plan.
//! - A step so small that filling the limits would take more than `MAX_PICKS` picks is
//!   rejected up front (`AllocError::StepTooSmall`); a plan is never cut short.
//!
//! Determinism:
//! - No RNG; iteration is over the input slice in order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use cf_core::variables::{DecayTier, Tactic, ValueBasis};

/// Relative slack on budget/capacity checks.
pub const LIMIT_EPSILON: f64 = 1e-9;
/// Hard stop on the number of picks in one call.
pub const MAX_PICKS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocError {
    #[error("tactic #{0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate tactic id: {0}")]
    DuplicateId(String),
    #[error("tactic {0}: cost per attempt must be finite and >= 0")]
    InvalidCost(String),
    #[error("tactic {0}: max_attempts must be finite and >= 0")]
    InvalidCap(String),
    #[error("tactic {0}: net votes per attempt must be finite")]
    InvalidValue(String),
    #[error("tactic {0}: decay thresholds must increase and multipliers be >= 0")]
    InvalidDecayTier(String),
    #[error("tactic {0}: zero cost with no cap leaves the budget unbounded")]
    Unbounded(String),
    #[error("step must be finite and > 0")]
    InvalidStep,
    #[error("step too small: about {0} picks needed, limit is 1000000")]
    StepTooSmall(u64),
    #[error("{0} must be finite")]
    InvalidLimit(&'static str),
    #[error("timeline: {0}")]
    InvalidTimeline(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Maximize votes per unit cost under a budget.
    Budget,
    /// Maximize votes under an attempt capacity.
    Capacity,
}

/// Which limit stopped the greedy loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    Budget,
    Capacity,
    Caps,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationTotals {
    pub attempts: f64,
    pub cost: f64,
    pub net_votes: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub tactic_id: String,
    pub attempts: f64,
    pub cost: f64,
    pub net_votes: f64,
    /// `None` when the step costs nothing under a budget objective.
    pub score: Option<f64>,
    pub cumulative_attempts: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub objective: Objective,
    pub allocation: BTreeMap<String, f64>,
    pub totals: AllocationTotals,
    pub trace: Vec<TraceEntry>,
    pub binding: Binding,
}

/// Upper limits for one greedy run. `None` = unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Limits {
    pub budget: Option<f64>,
    pub capacity: Option<f64>,
}

/// Budget mode: maximize Σ votes subject to Σ cost ≤ budget (and an optional capacity).
pub fn optimize_mix_budget(
    tactics: &[Tactic],
    budget: f64,
    capacity: Option<f64>,
    step: f64,
    basis: ValueBasis,
) -> Result<AllocationPlan, AllocError> {
    let caps: Vec<Option<f64>> = tactics.iter().map(|t| t.max_attempts).collect();
    optimize_greedy(tactics, &caps, Limits { budget: Some(budget), capacity }, Objective::Budget, step, basis)
}

/// Capacity mode: maximize Σ votes subject to Σ attempts ≤ capacity.
pub fn optimize_mix_capacity(
    tactics: &[Tactic],
    capacity: f64,
    step: f64,
    basis: ValueBasis,
) -> Result<AllocationPlan, AllocError> {
    let caps: Vec<Option<f64>> = tactics.iter().map(|t| t.max_attempts).collect();
    optimize_greedy(tactics, &caps, Limits { budget: None, capacity: Some(capacity) }, Objective::Capacity, step, basis)
}

/// Check every tactic; first failure wins (input order).
pub fn validate_tactics(tactics: &[Tactic]) -> Result<(), AllocError> {
    let mut seen = BTreeSet::new();
    for (i, t) in tactics.iter().enumerate() {
        if t.id.trim().is_empty() {
            return Err(AllocError::EmptyId(i));
        }
        if !seen.insert(t.id.as_str()) {
            return Err(AllocError::DuplicateId(t.id.clone()));
        }
        if !(t.cost_per_attempt.is_finite() && t.cost_per_attempt >= 0.0) {
            return Err(AllocError::InvalidCost(t.id.clone()));
        }
        if let Some(c) = t.max_attempts {
            if !(c.is_finite() && c >= 0.0) {
                return Err(AllocError::InvalidCap(t.id.clone()));
            }
        }
        let adjusted_ok = t.turnout_adjusted_net_votes_per_attempt.map_or(true, f64::is_finite);
        if !t.net_votes_per_attempt.is_finite() || !adjusted_ok {
            return Err(AllocError::InvalidValue(t.id.clone()));
        }
        if !tiers_valid(&t.decay_tiers) {
            return Err(AllocError::InvalidDecayTier(t.id.clone()));
        }
    }
    Ok(())
}

fn tiers_valid(tiers: &[DecayTier]) -> bool {
    let mut prev = 0.0f64;
    for (i, t) in tiers.iter().enumerate() {
        let thr_ok = t.threshold_attempts.is_finite() && t.threshold_attempts >= 0.0;
        let increasing = i == 0 || t.threshold_attempts > prev;
        if !(thr_ok && increasing && t.multiplier.is_finite() && t.multiplier >= 0.0) {
            return false;
        }
        prev = t.threshold_attempts;
    }
    true
}

/// Attempt-weighted yield of the interval `[from, to)` under the decay tiers.
pub fn decayed_attempts(tiers: &[DecayTier], from: f64, to: f64) -> f64 {
    let overlap = |lo: f64, hi: f64| (to.min(hi) - from.max(lo)).max(0.0);
    let mut total = 0.0;
    let mut seg_start = 0.0;
    let mut mult = 1.0;
    for t in tiers {
        total += overlap(seg_start, t.threshold_attempts) * mult;
        seg_start = t.threshold_attempts;
        mult = t.multiplier;
    }
    total + overlap(seg_start, f64::INFINITY) * mult
}

#[derive(Clone, Copy)]
struct Candidate {
    idx: usize,
    attempts: f64,
    cost: f64,
    votes: f64,
    key: f64,
}

/// Shared greedy loop. `caps[i]` replaces `tactics[i].max_attempts` (the timeline layer
/// passes intersected caps here).
pub fn optimize_greedy(
    tactics: &[Tactic],
    caps: &[Option<f64>],
    limits: Limits,
    objective: Objective,
    step: f64,
    basis: ValueBasis,
) -> Result<AllocationPlan, AllocError> {
    validate_tactics(tactics)?;
    if !(step.is_finite() && step > 0.0) {
        return Err(AllocError::InvalidStep);
    }
    if limits.budget.is_some_and(|b| !b.is_finite()) {
        return Err(AllocError::InvalidLimit("budget"));
    }
    if limits.capacity.is_some_and(|c| !c.is_finite()) {
        return Err(AllocError::InvalidLimit("capacity"));
    }
    let cap_of = |i: usize| caps.get(i).copied().flatten().map(|c| c.max(0.0));
    let zero_limit = limits.budget.is_some_and(|b| b <= 0.0) || limits.capacity.is_some_and(|c| c <= 0.0);
    if !zero_limit && objective == Objective::Budget && limits.capacity.is_none() {
        for (i, t) in tactics.iter().enumerate() {
            if t.cost_per_attempt == 0.0 && cap_of(i).is_none() && t.value_per_attempt(basis) > 0.0 {
                return Err(AllocError::Unbounded(t.id.clone()));
            }
        }
    }

    if !zero_limit {
        let picks = pick_bound(tactics, &cap_of, limits, step, basis);
        if picks > MAX_PICKS as f64 {
            return Err(AllocError::StepTooSmall(picks.min(u64::MAX as f64) as u64));
        }
    }

    let mut alloc = vec![0.0f64; tactics.len()];
    let mut totals = AllocationTotals::default();
    let mut trace = Vec::new();

    let min_room = LIMIT_EPSILON * step.max(1.0);

    if !zero_limit {
        let mut picks = 0usize;
        loop {
            if picks >= MAX_PICKS {
                return Err(AllocError::StepTooSmall(picks as u64));
            }
            let mut best: Option<Candidate> = None;
            for (i, t) in tactics.iter().enumerate() {
                let mut room = step;
                if let Some(c) = cap_of(i) {
                    room = room.min(c - alloc[i]);
                }
                if let Some(b) = limits.budget {
                    if t.cost_per_attempt > 0.0 {
                        room = room.min((b - totals.cost) / t.cost_per_attempt);
                    }
                }
                if let Some(c) = limits.capacity {
                    room = room.min(c - totals.attempts);
                }
                if room <= min_room {
                    continue;
                }
                let votes = t.value_per_attempt(basis) * decayed_attempts(&t.decay_tiers, alloc[i], alloc[i] + room);
                if !(votes > 0.0) {
                    continue;
                }
                let cost = room * t.cost_per_attempt;
                let key = match objective {
                    Objective::Budget if cost > 0.0 => votes / cost,
                    Objective::Budget => f64::INFINITY,
                    Objective::Capacity => votes,
                };
                if best.map_or(true, |b| key > b.key) {
                    best = Some(Candidate { idx: i, attempts: room, cost, votes, key });
                }
            }
            let Some(c) = best else { break };

            alloc[c.idx] += c.attempts;
            totals.attempts += c.attempts;
            totals.cost += c.cost;
            totals.net_votes += c.votes;
            trace.push(TraceEntry {
                tactic_id: tactics[c.idx].id.clone(),
                attempts: c.attempts,
                cost: c.cost,
                net_votes: c.votes,
                score: c.key.is_finite().then_some(c.key),
                cumulative_attempts: totals.attempts,
            });
            picks += 1;
        }
    }

    let binding = classify_binding(&totals, limits);
    debug!(
        ?objective,
        picks = trace.len(),
        attempts = totals.attempts,
        cost = totals.cost,
        net_votes = totals.net_votes,
        ?binding,
        "greedy allocation complete"
    );

    Ok(AllocationPlan {
        objective,
        allocation: tactics.iter().zip(&alloc).map(|(t, a)| (t.id.clone(), *a)).collect(),
        totals,
        trace,
        binding,
    })
}

/// Upper bound on the picks one run can take: full steps over the largest reachable
/// attempt total, plus at most one partial pick per tactic cap, budget and capacity.
fn pick_bound(
    tactics: &[Tactic],
    cap_of: &dyn Fn(usize) -> Option<f64>,
    limits: Limits,
    step: f64,
    basis: ValueBasis,
) -> f64 {
    let reachable: f64 = tactics
        .iter()
        .enumerate()
        .filter(|(_, t)| t.value_per_attempt(basis) > 0.0)
        .map(|(i, t)| {
            let mut most = cap_of(i).unwrap_or(f64::INFINITY);
            if let Some(b) = limits.budget {
                if t.cost_per_attempt > 0.0 {
                    most = most.min(b / t.cost_per_attempt);
                }
            }
            most
        })
        .sum();
    let attempts = limits.capacity.map_or(reachable, |c| reachable.min(c));
    (attempts / step).ceil() + 2.0 * tactics.len() as f64 + 2.0
}

fn classify_binding(totals: &AllocationTotals, limits: Limits) -> Binding {
    let near = |used: f64, limit: f64| limit <= 0.0 || used >= limit * (1.0 - 1e-6);
    if limits.budget.is_some_and(|b| near(totals.cost, b)) {
        Binding::Budget
    } else if limits.capacity.is_some_and(|c| near(totals.attempts, c)) {
        Binding::Capacity
    } else {
        Binding::Caps
    }
}
