//! Forecast determinism and golden-snapshot idempotence over a JSON scenario.

use cf_core::variables::{Lever, Scenario};
use cf_io::{parse_scenario, snapshot_digest};
use cf_pipeline::{run_forecast, run_optimizer, run_surface, run_timeline, SurfaceRequest};

const SCENARIO: &str = r#"{
    "simulation": {
        "runs": 2000, "seed": "golden-1", "need_votes": 500, "weeks": 8,
        "turnout_model": {
            "baseline_turnout_pct": 55, "target_universe_size": 20000,
            "lift_per_contact": { "kind": "fixed", "pp": 3.0 },
            "max_lift_pp": 8
        }
    },
    "field": {
        "org_count": 3, "org_hours_per_week": 25, "volunteer_mult": 1.4,
        "door_share_pct": 60, "doors_per_hour": 16, "calls_per_hour": 22,
        "contact_rate_pct": 21, "support_rate_pct": 56, "turnout_reliability_pct": 78
    },
    "uncertainty": { "mode": "volatility", "level": "high" },
    "universe": {
        "composition": { "dem_pct": 40, "rep_pct": 25, "npa_pct": 30, "other_pct": 5 },
        "retention_factor": 0.8
    },
    "tactics": [
        { "id": "doors",  "cost_per_attempt": 1.0, "net_votes_per_attempt": 0.05, "max_attempts": 2000 },
        { "id": "phones", "cost_per_attempt": 2.5, "net_votes_per_attempt": 0.12 },
        { "id": "mail",   "cost_per_attempt": 0.5, "net_votes_per_attempt": 0.01,
          "decay_tiers": [ { "threshold_attempts": 500, "multiplier": 0.5 } ] }
    ],
    "optimizer": { "mode": "budget", "budget": 2500, "step": 25 },
    "timeline": {
        "staff_count": 2, "staff_hours_per_week": 30, "volunteer_count": 10, "volunteer_hours_per_week": 4,
        "active_weeks": 6, "ramp_weeks": 2,
        "attempts_per_hour": { "doors": 12, "phones": 25 },
        "objective": "maximize_net_votes", "budget": 4000
    }
}"#;

fn scenario() -> Scenario {
    parse_scenario(SCENARIO.as_bytes()).unwrap()
}

#[test]
fn same_seed_same_summary_bytes() {
    let s = scenario();
    let a = run_forecast(&s).unwrap();
    let b = run_forecast(&s).unwrap();
    assert_eq!(a, b);
    assert!(a.deterministic);
    assert_eq!(snapshot_digest(&a).unwrap(), snapshot_digest(&b).unwrap());
}

#[test]
fn different_seeds_diverge() {
    let mut s = scenario();
    let a = run_forecast(&s).unwrap();
    s.simulation.seed = Some("golden-2".into());
    let b = run_forecast(&s).unwrap();
    assert_ne!(a.mean, b.mean);
    assert_ne!(snapshot_digest(&a).unwrap(), snapshot_digest(&b).unwrap());
}

#[test]
fn degenerate_capacity_is_seed_independent() {
    let mut s = scenario();
    s.field.org_count = 0.0;
    let a = run_forecast(&s).unwrap();
    s.simulation.seed = Some("other".into());
    let b = run_forecast(&s).unwrap();
    assert!(a.degenerate_capacity && b.degenerate_capacity);
    assert_eq!(a.envelope, b.envelope);
    assert_eq!(a.median, -500.0);
}

#[test]
fn turnout_envelope_present_and_ordered() {
    let f = run_forecast(&scenario()).unwrap();
    let t = f.turnout_envelope.expect("turnout model enabled");
    assert!(t.percentiles.p10 <= t.percentiles.p50 && t.percentiles.p50 <= t.percentiles.p90);
    assert!(f.turnout_adjusted_win_probability.is_some());
    assert!(f.universe.is_some());
}

#[test]
fn unseeded_runs_are_flagged() {
    let mut s = scenario();
    s.simulation.seed = None;
    s.simulation.runs = 200;
    let f = run_forecast(&s).unwrap();
    assert!(!f.deterministic);
    assert!(f.warnings.iter().any(|w| w.code == "SEED_ABSENT"));
}

#[test]
fn seeds_are_taken_verbatim() {
    let mut s = scenario();
    s.simulation.runs = 300;
    s.simulation.seed = Some("   ".into());
    let a = run_forecast(&s).unwrap();
    let b = run_forecast(&s).unwrap();
    assert!(a.deterministic);
    assert_eq!(snapshot_digest(&a).unwrap(), snapshot_digest(&b).unwrap());

    s.simulation.seed = Some("x".into());
    let plain = run_forecast(&s).unwrap();
    s.simulation.seed = Some(" x".into());
    let padded = run_forecast(&s).unwrap();
    assert_ne!(plain.mean, padded.mean);
}

#[test]
fn surface_and_plans_are_idempotent() {
    let mut s = scenario();
    s.simulation.runs = 300;
    let req = SurfaceRequest {
        lever: Lever::VolunteerMultiplier,
        start: 0.8,
        end: 2.0,
        steps: 7,
        target_win_probability: 0.7,
    };
    let d1 = snapshot_digest(&run_surface(&s, &req).unwrap()).unwrap();
    let d2 = snapshot_digest(&run_surface(&s, &req).unwrap()).unwrap();
    assert_eq!(d1, d2);

    let p1 = run_optimizer(&s).unwrap();
    let p2 = run_optimizer(&s).unwrap();
    assert_eq!(snapshot_digest(&p1).unwrap(), snapshot_digest(&p2).unwrap());
    assert!(p1.totals.cost <= 2500.0 + 1e-9);
    assert!(p1.allocation.get("doors").copied().unwrap_or(0.0) <= 2000.0);

    let t1 = run_timeline(&s).unwrap();
    let t2 = run_timeline(&s).unwrap();
    assert_eq!(snapshot_digest(&t1).unwrap(), snapshot_digest(&t2).unwrap());
}
