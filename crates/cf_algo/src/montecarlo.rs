//! Monte Carlo engine: N trials over the six sampled rates.
//!
//! Contract:
//! - Per trial the draw order is fixed: contact, persuasion, turnout reliability,
//!   doors/hour, calls/hour, volunteer multiplier, then (only for a sampled lift) the
//!   lift per contact. The same seed therefore yields the same trials everywhere.
//! - attempts = capacity (0 when the field model has none) → conversations ×contact →
//!   supporters ×persuasion → votes ×turnout reliability; margin = votes − need.
//! - With an enabled turnout model, a second margin adds `universe × avg_lift / 100`.
//! - Result buffers are pre-sized to `runs`; the sorted margins are built once.
//!
//! Determinism:
//! - All randomness flows from the caller's `SimRng`; nothing ambient is read.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cf_core::determinism::cmp_impact;
use cf_core::errors::CoreError;
use cf_core::rng::SimRng;
use cf_core::variables::{FieldInputs, LiftPerContact, SimulationConfig, TurnoutModel};

use crate::field::{CapacityInputs, FieldModel, LiftInputs};
use crate::rates::RateSpecs;
use crate::stats::{histogram, pearson, Histogram, MarginDistribution};

pub const LABEL_CONTACT: &str = "Contact rate";
pub const LABEL_PERSUASION: &str = "Persuasion rate";
pub const LABEL_TURNOUT: &str = "Turnout reliability";
pub const LABEL_DOORS: &str = "Doors per hour";
pub const LABEL_CALLS: &str = "Calls per hour";
pub const LABEL_VOLUNTEER: &str = "Volunteer multiplier";

/// One column per sampled rate, indexed by trial.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleSet {
    pub contact_rate: Vec<f64>,
    pub persuasion_rate: Vec<f64>,
    pub turnout_reliability: Vec<f64>,
    pub doors_per_hour: Vec<f64>,
    pub calls_per_hour: Vec<f64>,
    pub volunteer_mult: Vec<f64>,
}

impl SampleSet {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            contact_rate: Vec::with_capacity(n),
            persuasion_rate: Vec::with_capacity(n),
            turnout_reliability: Vec::with_capacity(n),
            doors_per_hour: Vec::with_capacity(n),
            calls_per_hour: Vec::with_capacity(n),
            volunteer_mult: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.contact_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contact_rate.is_empty()
    }

    /// (label, column) pairs in draw order.
    pub fn columns(&self) -> [(&'static str, &[f64]); 6] {
        [
            (LABEL_CONTACT, self.contact_rate.as_slice()),
            (LABEL_PERSUASION, self.persuasion_rate.as_slice()),
            (LABEL_TURNOUT, self.turnout_reliability.as_slice()),
            (LABEL_DOORS, self.doors_per_hour.as_slice()),
            (LABEL_CALLS, self.calls_per_hour.as_slice()),
            (LABEL_VOLUNTEER, self.volunteer_mult.as_slice()),
        ]
    }
}

/// Correlation of one sampled rate with the margin. `r = None` means no signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityImpact {
    pub label: String,
    pub r: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct SimulationOutcome {
    pub runs: u32,
    pub deterministic: bool,
    pub samples: SampleSet,
    pub margins: MarginDistribution,
    pub win_probability: f64,
    pub turnout_margins: Option<MarginDistribution>,
    pub turnout_win_probability: Option<f64>,
    /// Every trial produced zero attempts.
    pub degenerate_capacity: bool,
    pub histogram: Option<Histogram>,
    pub sensitivity: Vec<SensitivityImpact>,
}

/// Run `cfg.runs` trials.
pub fn run_simulation<M: FieldModel + ?Sized>(
    cfg: &SimulationConfig,
    field: &FieldInputs,
    specs: &RateSpecs,
    model: &M,
    rng: &mut SimRng,
) -> Result<SimulationOutcome, CoreError> {
    cfg.validate()?;
    let n = cfg.runs as usize;
    let turnout = cfg.turnout_model.as_ref().filter(|t| t.enabled);
    let door_share = (field.door_share_pct / 100.0).clamp(0.0, 1.0);

    let mut samples = SampleSet::with_capacity(n);
    let mut margins = Vec::with_capacity(n);
    let mut t_margins = turnout.map(|_| Vec::with_capacity(n));
    let mut zero_capacity_trials = 0usize;

    for _ in 0..n {
        let cr = specs.contact_rate.sample(rng);
        let sr = specs.persuasion_rate.sample(rng);
        let tr = specs.turnout_reliability.sample(rng);
        let dph = specs.doors_per_hour.sample(rng);
        let cph = specs.calls_per_hour.sample(rng);
        let vm = specs.volunteer_mult.sample(rng);

        let attempts = model
            .capacity_contacts(&CapacityInputs {
                weeks: cfg.weeks,
                org_count: field.org_count,
                hours_per_week: field.org_hours_per_week,
                volunteer_mult: vm,
                door_share,
                doors_per_hour: dph,
                calls_per_hour: cph,
            })
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(0.0);
        if attempts == 0.0 {
            zero_capacity_trials += 1;
        }

        let conversations = attempts * cr;
        let votes = conversations * sr * tr;
        let margin = votes - cfg.need_votes;
        margins.push(margin);

        if let (Some(tm), Some(out)) = (turnout, t_margins.as_mut()) {
            let added = turnout_votes(tm, conversations, model, rng);
            out.push(margin + added);
        }

        samples.contact_rate.push(cr);
        samples.persuasion_rate.push(sr);
        samples.turnout_reliability.push(tr);
        samples.doors_per_hour.push(dph);
        samples.calls_per_hour.push(cph);
        samples.volunteer_mult.push(vm);
    }

    let sensitivity = rank_sensitivity(&samples, &margins);
    let margins = MarginDistribution::new(margins);
    let win_probability = margins.win_fraction(cfg.win_rule, 0.0);

    let turnout_margins = t_margins.map(MarginDistribution::new);
    let turnout_win_probability = turnout_margins.as_ref().map(|d| d.win_fraction(cfg.win_rule, 0.0));

    let degenerate_capacity = zero_capacity_trials == n;
    if degenerate_capacity {
        warn!(runs = n, "no attempt capacity in any trial; every margin equals -need_votes");
    }

    let histogram = if cfg.include_histogram { histogram(&margins) } else { None };

    debug!(
        runs = n,
        seeded = rng.is_deterministic(),
        win_probability,
        p50 = margins.quantile(0.5),
        "simulation complete"
    );

    Ok(SimulationOutcome {
        runs: cfg.runs,
        deterministic: rng.is_deterministic(),
        samples,
        margins,
        win_probability,
        turnout_margins,
        turnout_win_probability,
        degenerate_capacity,
        histogram,
        sensitivity,
    })
}

fn turnout_votes<M: FieldModel + ?Sized>(tm: &TurnoutModel, contacts: f64, model: &M, rng: &mut SimRng) -> f64 {
    let per = match &tm.lift_per_contact {
        LiftPerContact::Fixed { pp } => *pp,
        LiftPerContact::Sampled { spec } => spec.sample(rng),
    };
    let lift = model.avg_lift_pp(&LiftInputs {
        baseline_turnout_pct: tm.baseline_turnout_pct,
        lift_per_contact_pp: per,
        max_lift_pp: tm.max_lift_pp,
        contacts,
        universe_size: tm.target_universe_size,
        use_diminishing: tm.use_diminishing,
    });
    let added = tm.target_universe_size * lift / 100.0;
    if added.is_finite() { added.max(0.0) } else { 0.0 }
}

/// Pearson r of each sampled rate against the margins; |r| descending, no-signal last,
/// ties by label.
pub fn rank_sensitivity(samples: &SampleSet, margins: &[f64]) -> Vec<SensitivityImpact> {
    let mut out: Vec<SensitivityImpact> = samples
        .columns()
        .iter()
        .map(|(label, col)| SensitivityImpact { label: (*label).to_string(), r: pearson(col, margins) })
        .collect();
    out.sort_by(|a, b| cmp_impact(a.r, &a.label, b.r, &b.label));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::StandardFieldModel;
    use crate::rates::build_rate_specs;
    use cf_core::rng::make_rng;
    use cf_core::sampling::RateSpec;
    use cf_core::variables::{Uncertainty, Volatility, WinRule};

    fn cfg(runs: u32) -> SimulationConfig {
        SimulationConfig {
            runs,
            seed: Some("mc".into()),
            need_votes: 150.0,
            weeks: 6.0,
            include_margins: false,
            include_histogram: true,
            turnout_model: None,
            win_rule: WinRule::AtLeastZero,
        }
    }

    fn field() -> FieldInputs {
        FieldInputs {
            org_count: 2.0,
            org_hours_per_week: 20.0,
            volunteer_mult: 1.2,
            door_share_pct: 50.0,
            doors_per_hour: 15.0,
            calls_per_hour: 20.0,
            contact_rate_pct: 20.0,
            support_rate_pct: 55.0,
            turnout_reliability_pct: 80.0,
        }
    }

    fn run(c: &SimulationConfig, f: &FieldInputs, seed: &str) -> SimulationOutcome {
        let specs = build_rate_specs(f, &Uncertainty::Volatility { level: Volatility::Med }, None).specs;
        let mut rng = make_rng(Some(seed));
        run_simulation(c, f, &specs, &StandardFieldModel, &mut rng).unwrap()
    }

    #[test]
    fn same_seed_same_margins() {
        let a = run(&cfg(500), &field(), "x");
        let b = run(&cfg(500), &field(), "x");
        assert_eq!(a.margins.raw(), b.margins.raw());
        assert_eq!(a.sensitivity, b.sensitivity);
        assert!(a.deterministic);
    }

    #[test]
    fn different_seeds_differ() {
        let a = run(&cfg(200), &field(), "x");
        let b = run(&cfg(200), &field(), "y");
        assert_ne!(a.margins.raw(), b.margins.raw());
    }

    #[test]
    fn zero_weeks_is_degenerate_not_error() {
        let mut c = cfg(100);
        c.weeks = 0.0;
        let out = run(&c, &field(), "z");
        assert!(out.degenerate_capacity);
        assert!(out.margins.raw().iter().all(|&m| m == -150.0));
        assert_eq!(out.win_probability, 0.0);
        // margins carry no variance, so nothing correlates
        assert!(out.sensitivity.iter().all(|s| s.r.is_none()));
    }

    #[test]
    fn zero_runs_rejected() {
        let specs = build_rate_specs(&field(), &Uncertainty::default(), None).specs;
        let mut rng = make_rng(Some("r"));
        let err = run_simulation(&cfg(0), &field(), &specs, &StandardFieldModel, &mut rng).unwrap_err();
        assert_eq!(err, CoreError::InvalidRuns);
    }

    #[test]
    fn turnout_model_adds_non_negative_votes() {
        let mut c = cfg(300);
        c.turnout_model = Some(TurnoutModel {
            enabled: true,
            baseline_turnout_pct: 55.0,
            target_universe_size: 5000.0,
            lift_per_contact: LiftPerContact::Sampled { spec: RateSpec { min: 5.0, mode: 8.0, max: 12.0 } },
            max_lift_pp: 6.0,
            use_diminishing: true,
        });
        let out = run(&c, &field(), "t");
        let tm = out.turnout_margins.as_ref().unwrap();
        for (a, b) in out.margins.raw().iter().zip(tm.raw()) {
            assert!(b >= a);
        }
        assert!(out.turnout_win_probability.unwrap() >= out.win_probability);
    }

    #[test]
    fn sampled_lift_draw_follows_rate_draws() {
        // Plain margins do not depend on whether the lift draw happens after them.
        let base = run(&cfg(50), &field(), "order");
        let mut c = cfg(50);
        c.turnout_model = Some(TurnoutModel {
            enabled: true,
            baseline_turnout_pct: 55.0,
            target_universe_size: 5000.0,
            lift_per_contact: LiftPerContact::Fixed { pp: 8.0 },
            max_lift_pp: 6.0,
            use_diminishing: false,
        });
        let fixed = run(&c, &field(), "order");
        assert_eq!(base.margins.raw(), fixed.margins.raw());
    }

    #[test]
    fn sensitivity_ranks_all_six_rates() {
        let out = run(&cfg(2000), &field(), "rank");
        assert_eq!(out.sensitivity.len(), 6);
        let rs: Vec<f64> = out.sensitivity.iter().filter_map(|s| s.r).map(f64::abs).collect();
        assert!(rs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn histogram_optional() {
        let mut c = cfg(100);
        c.include_histogram = false;
        assert!(run(&c, &field(), "h").histogram.is_none());
        assert!(run(&cfg(100), &field(), "h").histogram.is_some());
    }
}
