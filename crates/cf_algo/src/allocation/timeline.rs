//! Timeline-constrained allocation.
//!
//! Contract:
//! - Ceiling per tactic = weekly hours × attempts/hour × effective weeks, where effective
//!   weeks discount a linear staffing ramp at the start of the span and turnout tactics
//!   only count the last `gotv_window_weeks`. Tactics without a throughput entry carry no
//!   timeline ceiling.
//! - Caps fed to the greedy loop = min(ceiling, max_attempts), `None` = uncapped.
//! - `MaximizeNetVotes` delegates to one budget-mode greedy run.
//! - `MinCostToGoal` checks the goal at the saturation budget (Σ cost × cap over capped
//!   tactics), then bisects integer budgets (≤ 30 probes) for the cheapest plan meeting
//!   it. An unreachable goal returns the best-effort plan with `goal_feasible = false`.
//!
//! Determinism:
//! - Probes run sequentially in bisection order; caps are recomputed on every call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use cf_core::variables::{Tactic, TacticKind, TimelineInputs, TimelineObjective};

use super::greedy::{optimize_greedy, AllocError, AllocationPlan, Limits, Objective};

pub const MAX_PROBES: usize = 30;
/// Relative tolerance for "this limit is saturated".
pub const BINDING_TOLERANCE: f64 = 0.001;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineCaps {
    pub enabled: bool,
    pub active_weeks: f64,
    pub weekly_hours: f64,
    /// Active weeks net of the staffing ramp.
    pub effective_weeks: f64,
    /// Effective weeks inside the GOTV window.
    pub gotv_effective_weeks: f64,
    pub max_attempts_by_tactic: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingReport {
    pub budget: bool,
    pub capacity: bool,
    /// Tactics held at a timeline ceiling tighter than their own cap.
    pub timeline_tactics: Vec<String>,
    /// Tactics held at their own `max_attempts`.
    pub cap_tactics: Vec<String>,
}

impl BindingReport {
    /// e.g. `"budget; timeline: doors, phones"`, or `"none"`.
    pub fn to_text(&self) -> String {
        let mut parts = Vec::new();
        if self.budget {
            parts.push("budget".to_string());
        }
        if self.capacity {
            parts.push("capacity".to_string());
        }
        if !self.timeline_tactics.is_empty() {
            parts.push(format!("timeline: {}", self.timeline_tactics.join(", ")));
        }
        if !self.cap_tactics.is_empty() {
            parts.push(format!("caps: {}", self.cap_tactics.join(", ")));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineMeta {
    pub goal_feasible: bool,
    pub goal_net_votes: Option<f64>,
    pub max_achievable_net_votes: f64,
    pub remaining_gap_net_votes: f64,
    pub budget_used: f64,
    pub probes: usize,
    pub binding_constraints: String,
    pub binding_obj: BindingReport,
    pub caps: TimelineCaps,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineResult {
    pub plan: AllocationPlan,
    pub meta: TimelineMeta,
}

fn non_negative(v: f64, what: &str) -> Result<f64, AllocError> {
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(AllocError::InvalidTimeline(format!("{what} must be finite and >= 0")))
    }
}

/// Per-tactic attempt ceilings from staffing, throughput and weeks.
pub fn compute_timeline_caps(inp: &TimelineInputs, tactics: &[Tactic]) -> Result<TimelineCaps, AllocError> {
    let active = non_negative(inp.active_weeks, "active_weeks")?;
    let ramp = non_negative(inp.ramp_weeks, "ramp_weeks")?.min(active);
    let hours = non_negative(inp.weekly_hours(), "weekly hours")?;
    let window = match inp.gotv_window_weeks {
        Some(w) => non_negative(w, "gotv_window_weeks")?.min(active),
        None => active,
    };

    let effective_weeks = active - ramp / 2.0;
    // ramp weeks that fall inside the window: [active - window, ramp)
    let window_start = active - window;
    let ramp_loss = if ramp > 0.0 && window_start < ramp {
        (ramp - window_start).powi(2) / (2.0 * ramp)
    } else {
        0.0
    };
    let gotv_effective_weeks = (window - ramp_loss).max(0.0);

    let mut by_tactic = BTreeMap::new();
    if inp.enabled {
        for t in tactics {
            let Some(&aph) = inp.attempts_per_hour.get(&t.id) else { continue };
            let aph = non_negative(aph, "attempts_per_hour")?;
            let weeks = match t.kind {
                TacticKind::Persuasion => effective_weeks,
                TacticKind::Turnout => gotv_effective_weeks,
            };
            by_tactic.insert(t.id.clone(), hours * aph * weeks);
        }
    }

    Ok(TimelineCaps {
        enabled: inp.enabled,
        active_weeks: active,
        weekly_hours: hours,
        effective_weeks,
        gotv_effective_weeks,
        max_attempts_by_tactic: by_tactic,
    })
}

/// min(timeline ceiling, own cap) per tactic, in input order.
pub fn intersect_caps(tactics: &[Tactic], caps: &TimelineCaps) -> Vec<Option<f64>> {
    tactics
        .iter()
        .map(|t| match (caps.max_attempts_by_tactic.get(&t.id), t.max_attempts) {
            (Some(&c), Some(m)) => Some(c.min(m)),
            (Some(&c), None) => Some(c),
            (None, m) => m,
        })
        .collect()
}

#[inline]
fn saturated(used: f64, limit: f64) -> bool {
    used >= limit * (1.0 - BINDING_TOLERANCE)
}

pub fn detect_binding(
    plan: &AllocationPlan,
    tactics: &[Tactic],
    caps: &TimelineCaps,
    budget: Option<f64>,
    capacity: Option<f64>,
) -> BindingReport {
    let mut report = BindingReport {
        budget: budget.is_some_and(|b| saturated(plan.totals.cost, b)),
        capacity: capacity.is_some_and(|c| saturated(plan.totals.attempts, c)),
        ..BindingReport::default()
    };
    for t in tactics {
        let used = plan.allocation.get(&t.id).copied().unwrap_or(0.0);
        let ceiling = caps.max_attempts_by_tactic.get(&t.id).copied();
        match (ceiling, t.max_attempts) {
            (Some(c), m) if m.map_or(true, |m| c <= m) => {
                if saturated(used, c) {
                    report.timeline_tactics.push(t.id.clone());
                }
            }
            (_, Some(m)) => {
                if saturated(used, m) {
                    report.cap_tactics.push(t.id.clone());
                }
            }
            _ => {}
        }
    }
    report
}

/// Resolve the timeline objective.
pub fn optimize_timeline(tactics: &[Tactic], inp: &TimelineInputs) -> Result<TimelineResult, AllocError> {
    let caps = compute_timeline_caps(inp, tactics)?;
    let eff = intersect_caps(tactics, &caps);
    let greedy = |budget: f64, capacity: Option<f64>| {
        optimize_greedy(tactics, &eff, Limits { budget: Some(budget), capacity }, Objective::Budget, inp.step, inp.value_basis)
    };

    let result = match inp.objective {
        TimelineObjective::MaximizeNetVotes { budget, capacity, goal_net_votes } => {
            let plan = greedy(budget, capacity)?;
            let achieved = plan.totals.net_votes;
            let gap = goal_net_votes.map_or(0.0, |g| (g - achieved).max(0.0));
            let binding = detect_binding(&plan, tactics, &caps, Some(budget), capacity);
            TimelineResult {
                meta: TimelineMeta {
                    goal_feasible: goal_net_votes.map_or(true, |g| meets(achieved, g)),
                    goal_net_votes,
                    max_achievable_net_votes: achieved,
                    remaining_gap_net_votes: gap,
                    budget_used: plan.totals.cost,
                    probes: 1,
                    binding_constraints: binding.to_text(),
                    binding_obj: binding,
                    caps,
                },
                plan,
            }
        }
        TimelineObjective::MinCostToGoal { goal_net_votes } => {
            let goal = goal_net_votes;
            if !goal.is_finite() {
                return Err(AllocError::InvalidTimeline("goal_net_votes must be finite".into()));
            }
            let upper: f64 = tactics
                .iter()
                .zip(&eff)
                .filter_map(|(t, c)| c.map(|c| t.cost_per_attempt * c))
                .sum();

            let ceiling_plan = greedy(upper, None)?;
            let best = ceiling_plan.totals.net_votes;
            let mut probes = 1;

            let (plan, budget, feasible) = if !meets(best, goal) {
                (ceiling_plan, upper, false)
            } else {
                let mut lo = 0.0f64;
                let mut hi = upper;
                let mut hi_plan = ceiling_plan;
                if meets(0.0, goal) {
                    hi = 0.0;
                    hi_plan = greedy(0.0, None)?;
                    probes += 1;
                }
                while hi - lo > 1.0 && probes < MAX_PROBES {
                    let mid = ((lo + hi) / 2.0).floor();
                    let p = greedy(mid, None)?;
                    probes += 1;
                    let ok = meets(p.totals.net_votes, goal);
                    trace!(budget = mid, net_votes = p.totals.net_votes, ok, "min-cost probe");
                    if ok {
                        hi = mid;
                        hi_plan = p;
                    } else {
                        lo = mid;
                    }
                }
                (hi_plan, hi, true)
            };

            let binding = detect_binding(&plan, tactics, &caps, Some(budget), None);
            TimelineResult {
                meta: TimelineMeta {
                    goal_feasible: feasible,
                    goal_net_votes: Some(goal),
                    max_achievable_net_votes: best,
                    remaining_gap_net_votes: (goal - best).max(0.0),
                    budget_used: plan.totals.cost,
                    probes,
                    binding_constraints: binding.to_text(),
                    binding_obj: binding,
                    caps,
                },
                plan,
            }
        }
    };

    debug!(
        goal_feasible = result.meta.goal_feasible,
        net_votes = result.plan.totals.net_votes,
        budget_used = result.meta.budget_used,
        probes = result.meta.probes,
        binding = %result.meta.binding_constraints,
        "timeline optimization complete"
    );
    Ok(result)
}

#[inline]
fn meets(achieved: f64, goal: f64) -> bool {
    achieved >= goal - 1e-9 * goal.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::variables::ValueBasis;

    fn tactic(id: &str, kind: TacticKind, cost: f64, value: f64, cap: Option<f64>) -> Tactic {
        Tactic {
            id: id.into(),
            kind,
            cost_per_attempt: cost,
            net_votes_per_attempt: value,
            turnout_adjusted_net_votes_per_attempt: None,
            max_attempts: cap,
            decay_tiers: vec![],
        }
    }

    fn inputs(objective: TimelineObjective) -> TimelineInputs {
        let mut aph = BTreeMap::new();
        aph.insert("doors".to_string(), 10.0);
        aph.insert("gotv".to_string(), 20.0);
        TimelineInputs {
            enabled: true,
            staff_count: 1.0,
            staff_hours_per_week: 10.0,
            volunteer_count: 0.0,
            volunteer_hours_per_week: 0.0,
            active_weeks: 4.0,
            ramp_weeks: 0.0,
            gotv_window_weeks: Some(1.0),
            attempts_per_hour: aph,
            objective,
            step: 25.0,
            value_basis: ValueBasis::NetVotes,
        }
    }

    fn tactics() -> Vec<Tactic> {
        vec![
            tactic("doors", TacticKind::Persuasion, 1.0, 0.05, None),
            tactic("gotv", TacticKind::Turnout, 0.5, 0.02, Some(150.0)),
            tactic("mail", TacticKind::Persuasion, 2.0, 0.01, Some(50.0)),
        ]
    }

    #[test]
    fn ceilings_follow_hours_and_window() {
        let caps = compute_timeline_caps(&inputs(TimelineObjective::MinCostToGoal { goal_net_votes: 1.0 }), &tactics()).unwrap();
        assert_eq!(caps.max_attempts_by_tactic["doors"], 400.0);
        assert_eq!(caps.max_attempts_by_tactic["gotv"], 200.0);
        assert!(!caps.max_attempts_by_tactic.contains_key("mail"));

        let eff = intersect_caps(&tactics(), &caps);
        assert_eq!(eff, vec![Some(400.0), Some(150.0), Some(50.0)]);
    }

    #[test]
    fn ramp_discounts_effective_weeks() {
        let mut inp = inputs(TimelineObjective::MinCostToGoal { goal_net_votes: 1.0 });
        inp.ramp_weeks = 2.0;
        inp.gotv_window_weeks = Some(3.0);
        let caps = compute_timeline_caps(&inp, &tactics()).unwrap();
        assert_eq!(caps.effective_weeks, 3.0);
        // window starts at week 1; ramp covers [1, 2) at half strength on average
        assert_eq!(caps.gotv_effective_weeks, 2.75);
    }

    #[test]
    fn maximize_respects_timeline_ceilings() {
        let inp = inputs(TimelineObjective::MaximizeNetVotes { budget: 10_000.0, capacity: None, goal_net_votes: Some(20.0) });
        let r = optimize_timeline(&tactics(), &inp).unwrap();
        assert_eq!(r.plan.allocation["doors"], 400.0);
        assert_eq!(r.plan.allocation["gotv"], 150.0);
        assert_eq!(r.plan.allocation["mail"], 50.0);
        assert!(r.meta.goal_feasible);
        assert!(r.meta.binding_obj.timeline_tactics.contains(&"doors".to_string()));
        assert!(r.meta.binding_obj.cap_tactics.contains(&"gotv".to_string()));
        assert!(!r.meta.binding_obj.budget);
    }

    #[test]
    fn min_cost_finds_cheapest_budget() {
        let inp = inputs(TimelineObjective::MinCostToGoal { goal_net_votes: 10.0 });
        let r = optimize_timeline(&tactics(), &inp).unwrap();
        assert!(r.meta.goal_feasible);
        assert!(r.plan.totals.net_votes >= 10.0 - 1e-9);
        // doors alone: 200 attempts at cost 1.0
        assert!((r.meta.budget_used - 200.0).abs() < 1.0 + 1e-9);
        assert!(r.meta.probes <= MAX_PROBES);
        assert_eq!(r.meta.remaining_gap_net_votes, 0.0);
    }

    #[test]
    fn unreachable_goal_reports_gap() {
        let inp = inputs(TimelineObjective::MinCostToGoal { goal_net_votes: 1000.0 });
        let r = optimize_timeline(&tactics(), &inp).unwrap();
        assert!(!r.meta.goal_feasible);
        // 400*0.05 + 150*0.02 + 50*0.01
        assert!((r.meta.max_achievable_net_votes - 23.5).abs() < 1e-9);
        assert!((r.meta.remaining_gap_net_votes - 976.5).abs() < 1e-9);
    }

    #[test]
    fn binding_text() {
        let b = BindingReport {
            budget: true,
            capacity: false,
            timeline_tactics: vec!["doors".into(), "phones".into()],
            cap_tactics: vec![],
        };
        assert_eq!(b.to_text(), "budget; timeline: doors, phones");
        assert_eq!(BindingReport::default().to_text(), "none");
    }

    #[test]
    fn disabled_timeline_adds_no_ceilings() {
        let mut inp = inputs(TimelineObjective::MinCostToGoal { goal_net_votes: 1.0 });
        inp.enabled = false;
        let caps = compute_timeline_caps(&inp, &tactics()).unwrap();
        assert!(caps.max_attempts_by_tactic.is_empty());
    }

    #[test]
    fn negative_throughput_rejected() {
        let mut inp = inputs(TimelineObjective::MinCostToGoal { goal_net_votes: 1.0 });
        inp.attempts_per_hour.insert("doors".into(), -1.0);
        assert!(matches!(compute_timeline_caps(&inp, &tactics()), Err(AllocError::InvalidTimeline(_))));
    }
}
