//! crates/cf_pipeline/src/validate.rs
//! Structural & semantic validation of a scenario before any computation.
//! Deterministic outputs; no RNG.
//!
//! Errors block the run (structurally invalid configuration). Warnings describe
//! configurations that run but degenerate (no capacity, unseeded, clamped retention)
//! and are echoed into the summary.

use cf_algo::allocation::{validate_tactics, AllocError};
use cf_core::sampling::RateSpec;
use cf_core::variables::{
    FieldInputs, LiftPerContact, OptimizerMode, RateOverrides, Scenario, TimelineInputs, TimelineObjective,
    TurnoutModel, Uncertainty, UniverseAdjustment,
};
use serde::{Deserialize, Serialize};

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding. `path` is a dotted pointer into the scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub path: String,
    pub message: String,
}

/// Deterministic report: pass = (no Error); ordering of issues is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// `"CODE at path: message"` for the first error, or `"ok"`.
    pub fn summary(&self) -> String {
        match self.errors().next() {
            Some(i) => {
                let more = self.errors().count() - 1;
                if more > 0 {
                    format!("{} at {}: {} (+{more} more)", i.code, i.path, i.message)
                } else {
                    format!("{} at {}: {}", i.code, i.path, i.message)
                }
            }
            None => "ok".to_string(),
        }
    }
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn error(&mut self, code: &'static str, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue { severity: Severity::Error, code, path: path.into(), message: message.into() });
    }

    fn warn(&mut self, code: &'static str, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue { severity: Severity::Warning, code, path: path.into(), message: message.into() });
    }

    fn finite(&mut self, v: f64, path: &str) -> bool {
        if v.is_finite() {
            true
        } else {
            self.error("NON_FINITE", path, "value must be a finite number");
            false
        }
    }

    fn pct(&mut self, v: f64, path: &str) {
        if self.finite(v, path) && !(0.0..=100.0).contains(&v) {
            self.error("PCT_RANGE", path, format!("{v} is outside 0–100"));
        }
    }

    fn spec(&mut self, s: &RateSpec, path: &str) {
        if RateSpec::new(s.min, s.mode, s.max).is_err() {
            self.error("RATE_SPEC_ORDER", path, "expected finite min <= mode <= max");
        }
    }
}

/// Top-level entry point.
pub fn validate_scenario(s: &Scenario) -> ValidationReport {
    let mut out = Issues::default();

    check_simulation(s, &mut out);
    check_field(&s.field, s.simulation.weeks, &mut out);
    if let Uncertainty::Explicit { overrides } = &s.uncertainty {
        check_overrides(overrides, &mut out);
    }
    if let Some(u) = &s.universe {
        check_universe(u, &mut out);
    }
    if let Some(tm) = &s.simulation.turnout_model {
        check_turnout(tm, &mut out);
    }
    check_tactics(s, &mut out);
    if let Some(t) = &s.timeline {
        check_timeline(t, s, &mut out);
    }

    let mut issues = out.0;
    sort_issues_stably(&mut issues);
    ValidationReport { pass: !issues.iter().any(|i| i.severity == Severity::Error), issues }
}

fn check_simulation(s: &Scenario, out: &mut Issues) {
    let sim = &s.simulation;
    if sim.runs == 0 {
        out.error("SIM_RUNS", "simulation.runs", "runs must be >= 1");
    }
    if out.finite(sim.need_votes, "simulation.need_votes") && sim.need_votes < 0.0 {
        out.warn("NEED_NEGATIVE", "simulation.need_votes", "negative vote need: every trial starts ahead");
    }
    out.finite(sim.weeks, "simulation.weeks");
    if sim.seed_str().is_none() {
        out.warn("SEED_ABSENT", "simulation.seed", "no seed: results are not reproducible");
    }
}

fn check_field(f: &FieldInputs, weeks: f64, out: &mut Issues) {
    out.pct(f.door_share_pct, "field.door_share_pct");
    out.pct(f.contact_rate_pct, "field.contact_rate_pct");
    out.pct(f.support_rate_pct, "field.support_rate_pct");
    out.pct(f.turnout_reliability_pct, "field.turnout_reliability_pct");
    let counts = [
        (f.org_count, "field.org_count"),
        (f.org_hours_per_week, "field.org_hours_per_week"),
        (f.volunteer_mult, "field.volunteer_mult"),
        (f.doors_per_hour, "field.doors_per_hour"),
        (f.calls_per_hour, "field.calls_per_hour"),
    ];
    let mut all_finite = true;
    for (v, path) in counts {
        if !out.finite(v, path) {
            all_finite = false;
        } else if v < 0.0 {
            out.error("NEGATIVE", path, "must be >= 0");
        }
    }
    if !all_finite || !weeks.is_finite() {
        return;
    }

    let share = (f.door_share_pct / 100.0).clamp(0.0, 1.0);
    let throughput = share * f.doors_per_hour + (1.0 - share) * f.calls_per_hour;
    let zero = [
        (weeks, "simulation.weeks"),
        (f.org_count, "field.org_count"),
        (f.org_hours_per_week, "field.org_hours_per_week"),
        (f.volunteer_mult, "field.volunteer_mult"),
        (throughput, "field.doors_per_hour"),
    ]
    .into_iter()
    .find(|(v, _)| *v <= 0.0);
    if let Some((_, path)) = zero {
        out.warn("CAPACITY_ZERO", path, "no attempt capacity: every trial yields zero votes");
    }
}

fn check_overrides(o: &RateOverrides, out: &mut Issues) {
    out.spec(&o.contact_rate_pct, "uncertainty.overrides.contact_rate_pct");
    out.spec(&o.support_rate_pct, "uncertainty.overrides.support_rate_pct");
    out.spec(&o.turnout_reliability_pct, "uncertainty.overrides.turnout_reliability_pct");
    out.spec(&o.doors_per_hour, "uncertainty.overrides.doors_per_hour");
    out.spec(&o.calls_per_hour, "uncertainty.overrides.calls_per_hour");
    out.spec(&o.volunteer_mult, "uncertainty.overrides.volunteer_mult");
}

fn check_universe(u: &UniverseAdjustment, out: &mut Issues) {
    let c = &u.composition;
    for (v, path) in [
        (c.dem_pct, "universe.composition.dem_pct"),
        (c.rep_pct, "universe.composition.rep_pct"),
        (c.npa_pct, "universe.composition.npa_pct"),
        (c.other_pct, "universe.composition.other_pct"),
    ] {
        if out.finite(v, path) && v < 0.0 {
            out.error("NEGATIVE", path, "composition share must be >= 0");
        }
    }
    let r = u.retention_factor;
    if out.finite(r, "universe.retention_factor") && !(0.6..=1.0).contains(&r) {
        out.warn("RETENTION_CLAMPED", "universe.retention_factor", format!("{r} clamped into 0.6–1.0"));
    }
}

fn check_turnout(tm: &TurnoutModel, out: &mut Issues) {
    out.pct(tm.baseline_turnout_pct, "simulation.turnout_model.baseline_turnout_pct");
    for (v, path) in [
        (tm.target_universe_size, "simulation.turnout_model.target_universe_size"),
        (tm.max_lift_pp, "simulation.turnout_model.max_lift_pp"),
    ] {
        if out.finite(v, path) && v < 0.0 {
            out.error("NEGATIVE", path, "must be >= 0");
        }
    }
    match &tm.lift_per_contact {
        LiftPerContact::Fixed { pp } => {
            out.finite(*pp, "simulation.turnout_model.lift_per_contact.pp");
        }
        LiftPerContact::Sampled { spec } => out.spec(spec, "simulation.turnout_model.lift_per_contact.spec"),
    }
}

fn check_tactics(s: &Scenario, out: &mut Issues) {
    if let Err(e) = validate_tactics(&s.tactics) {
        let path = match &e {
            AllocError::EmptyId(i) => format!("tactics[{i}]"),
            AllocError::DuplicateId(id)
            | AllocError::InvalidCost(id)
            | AllocError::InvalidCap(id)
            | AllocError::InvalidValue(id)
            | AllocError::InvalidDecayTier(id)
            | AllocError::Unbounded(id) => format!("tactics.{id}"),
            _ => "tactics".to_string(),
        };
        out.error("TACTIC_INVALID", path, e.to_string());
    }
    for t in &s.tactics {
        if t.net_votes_per_attempt.is_finite() && t.net_votes_per_attempt <= 0.0 {
            out.warn("TACTIC_NO_VALUE", format!("tactics.{}", t.id), "never allocated: no positive value");
        }
    }

    if let Some(opt) = &s.optimizer {
        if s.tactics.is_empty() {
            out.warn("TACTICS_EMPTY", "tactics", "optimizer configured without tactics");
        }
        if !(opt.step.is_finite() && opt.step > 0.0) {
            out.error("STEP", "optimizer.step", "step must be finite and > 0");
        }
        let limits = match &opt.mode {
            OptimizerMode::Budget { budget, capacity } => {
                let mut v = vec![(*budget, "optimizer.budget")];
                v.extend(capacity.map(|c| (c, "optimizer.capacity")));
                v
            }
            OptimizerMode::Capacity { capacity } => vec![(*capacity, "optimizer.capacity")],
        };
        for (v, path) in limits {
            if out.finite(v, path) && v < 0.0 {
                out.warn("LIMIT_NEGATIVE", path, "negative limit: the plan will be empty");
            }
        }
    }
}

fn check_timeline(t: &TimelineInputs, s: &Scenario, out: &mut Issues) {
    for (v, path) in [
        (t.staff_count, "timeline.staff_count"),
        (t.staff_hours_per_week, "timeline.staff_hours_per_week"),
        (t.volunteer_count, "timeline.volunteer_count"),
        (t.volunteer_hours_per_week, "timeline.volunteer_hours_per_week"),
        (t.active_weeks, "timeline.active_weeks"),
        (t.ramp_weeks, "timeline.ramp_weeks"),
    ] {
        if out.finite(v, path) && v < 0.0 {
            out.error("NEGATIVE", path, "must be >= 0");
        }
    }
    if let Some(w) = t.gotv_window_weeks {
        if out.finite(w, "timeline.gotv_window_weeks") && w < 0.0 {
            out.error("NEGATIVE", "timeline.gotv_window_weeks", "must be >= 0");
        }
    }
    if !(t.step.is_finite() && t.step > 0.0) {
        out.error("STEP", "timeline.step", "step must be finite and > 0");
    }
    for (id, &aph) in &t.attempts_per_hour {
        let path = format!("timeline.attempts_per_hour.{id}");
        if out.finite(aph, &path) && aph < 0.0 {
            out.error("NEGATIVE", path.clone(), "must be >= 0");
        }
        if !s.tactics.iter().any(|x| &x.id == id) {
            out.warn("UNKNOWN_TACTIC", path, "no tactic with this id");
        }
    }
    match t.objective {
        TimelineObjective::MaximizeNetVotes { budget, .. } => {
            out.finite(budget, "timeline.budget");
        }
        TimelineObjective::MinCostToGoal { goal_net_votes } => {
            out.finite(goal_net_votes, "timeline.goal_net_votes");
        }
    }
}

/// Deterministic sort of issues (code, then path, then message) for byte-identical runs.
fn sort_issues_stably(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        a.code
            .cmp(b.code)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::scenario;

    #[test]
    fn baseline_scenario_passes() {
        let r = validate_scenario(&scenario());
        assert!(r.pass, "{:?}", r.issues);
        assert_eq!(r.summary(), "ok");
    }

    #[test]
    fn zero_runs_and_bad_pct_are_errors() {
        let mut s = scenario();
        s.simulation.runs = 0;
        s.field.support_rate_pct = 140.0;
        let r = validate_scenario(&s);
        assert!(!r.pass);
        let codes: Vec<&str> = r.errors().map(|i| i.code).collect();
        assert_eq!(codes, vec!["PCT_RANGE", "SIM_RUNS"]);
        assert!(r.summary().starts_with("PCT_RANGE at field.support_rate_pct"));
    }

    #[test]
    fn zero_capacity_is_only_a_warning() {
        let mut s = scenario();
        s.simulation.weeks = 0.0;
        let r = validate_scenario(&s);
        assert!(r.pass);
        assert!(r.warnings().any(|i| i.code == "CAPACITY_ZERO" && i.path == "simulation.weeks"));
    }

    #[test]
    fn malformed_tactic_blocks() {
        let mut s = scenario();
        s.tactics[1].cost_per_attempt = -2.0;
        let r = validate_scenario(&s);
        assert!(!r.pass);
        let e = r.errors().next().unwrap();
        assert_eq!(e.code, "TACTIC_INVALID");
        assert_eq!(e.path, format!("tactics.{}", s.tactics[1].id));
    }

    #[test]
    fn issue_order_is_stable() {
        let mut s = scenario();
        s.simulation.seed = None;
        s.field.contact_rate_pct = f64::NAN;
        s.simulation.runs = 0;
        let a = validate_scenario(&s);
        let b = validate_scenario(&s);
        assert_eq!(a, b);
        let codes: Vec<&str> = a.issues.iter().map(|i| i.code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }
}
