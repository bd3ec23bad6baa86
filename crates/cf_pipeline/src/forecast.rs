//! FORECAST — scenario → rate specs → Monte Carlo → envelope → summary.
//!
//! Deterministic assembly only: no I/O and no hashing here. The caller decides
//! whether to serialize and digest the summary.

use serde::Serialize;
use tracing::debug;

use cf_algo::field::{FieldModel, StandardFieldModel};
use cf_algo::montecarlo::{run_simulation, SensitivityImpact, SimulationOutcome};
use cf_algo::rates::{build_rate_specs, RateSpecs, UniverseAdjusted};
use cf_algo::risk::{confidence_envelope, ConfidenceEnvelope};
use cf_algo::stats::{mean, stdev, Histogram};
use cf_core::rng::make_rng;
use cf_core::variables::{Scenario, WinRule};

use crate::label::{label_for, RiskLabel};
use crate::validate::{validate_scenario, ValidationIssue};
use crate::PipelineError;

/// Raw margins in trial order plus the ascending copy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarginsOut {
    pub raw: Vec<f64>,
    pub sorted: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub runs: u32,
    pub seed: Option<String>,
    pub deterministic: bool,
    pub win_rule: WinRule,
    pub need_votes: f64,

    pub win_probability: f64,
    pub turnout_adjusted_win_probability: Option<f64>,
    pub median: f64,
    pub p5: f64,
    pub p95: f64,
    pub mean: f64,
    pub stdev: f64,

    pub envelope: ConfidenceEnvelope,
    pub turnout_envelope: Option<ConfidenceEnvelope>,
    pub histogram: Option<Histogram>,
    pub sensitivity: Vec<SensitivityImpact>,
    pub label: RiskLabel,

    pub degenerate_capacity: bool,
    pub rate_specs: RateSpecs,
    pub universe: Option<UniverseAdjusted>,
    pub warnings: Vec<ValidationIssue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub margins: Option<MarginsOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnout_margins: Option<MarginsOut>,
}

/// Validate, then forecast with the standard field model.
pub fn run_forecast(s: &Scenario) -> Result<ForecastSummary, PipelineError> {
    run_forecast_with(s, &StandardFieldModel)
}

pub fn run_forecast_with<M: FieldModel + ?Sized>(s: &Scenario, model: &M) -> Result<ForecastSummary, PipelineError> {
    let report = validate_scenario(s);
    if !report.pass {
        return Err(PipelineError::Validation(report));
    }
    let bundle = build_rate_specs(&s.field, &s.uncertainty, s.universe.as_ref());
    let mut rng = make_rng(s.simulation.seed_str());
    let outcome = run_simulation(&s.simulation, &s.field, &bundle.specs, model, &mut rng)?;

    let warnings = report.warnings().cloned().collect();
    let summary = build_summary(s, outcome, bundle.specs, bundle.universe, warnings);
    debug!(
        win_probability = summary.win_probability,
        grade = summary.label.value.as_str(),
        "forecast built"
    );
    Ok(summary)
}

/// Compose the summary from a finished simulation.
pub fn build_summary(
    s: &Scenario,
    out: SimulationOutcome,
    rate_specs: RateSpecs,
    universe: Option<UniverseAdjusted>,
    warnings: Vec<ValidationIssue>,
) -> ForecastSummary {
    let rule = s.simulation.win_rule;
    let envelope = confidence_envelope(&out.margins, out.win_probability, rule);
    let turnout_envelope = match (&out.turnout_margins, out.turnout_win_probability) {
        (Some(d), Some(wp)) => Some(confidence_envelope(d, wp, rule)),
        _ => None,
    };
    let label = label_for(&envelope, out.degenerate_capacity);

    let include = s.simulation.include_margins;
    let margins = include.then(|| MarginsOut { raw: out.margins.raw().to_vec(), sorted: out.margins.sorted().to_vec() });
    let turnout_margins = out
        .turnout_margins
        .as_ref()
        .filter(|_| include)
        .map(|d| MarginsOut { raw: d.raw().to_vec(), sorted: d.sorted().to_vec() });

    ForecastSummary {
        runs: out.runs,
        seed: s.simulation.seed_str().map(str::to_string),
        deterministic: out.deterministic,
        win_rule: rule,
        need_votes: s.simulation.need_votes,
        win_probability: out.win_probability,
        turnout_adjusted_win_probability: out.turnout_win_probability,
        median: out.margins.quantile(0.5),
        p5: out.margins.quantile(0.05),
        p95: out.margins.quantile(0.95),
        mean: mean(out.margins.raw()),
        stdev: stdev(out.margins.raw()),
        envelope,
        turnout_envelope,
        histogram: out.histogram,
        sensitivity: out.sensitivity,
        label,
        degenerate_capacity: out.degenerate_capacity,
        rate_specs,
        universe,
        warnings,
        margins,
        turnout_margins,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::scenario;

    #[test]
    fn seeded_forecast_repeats() {
        let s = scenario();
        let a = run_forecast(&s).unwrap();
        let b = run_forecast(&s).unwrap();
        assert_eq!(a, b);
        assert!(a.deterministic);
        assert!(a.margins.is_none());
    }

    #[test]
    fn margins_only_on_request() {
        let mut s = scenario();
        s.simulation.include_margins = true;
        let f = run_forecast(&s).unwrap();
        let m = f.margins.unwrap();
        assert_eq!(m.raw.len(), s.simulation.runs as usize);
        assert!(m.sorted.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn zero_capacity_degenerates_softly() {
        let mut s = scenario();
        s.field.org_hours_per_week = 0.0;
        let f = run_forecast(&s).unwrap();
        assert!(f.degenerate_capacity);
        assert_eq!(f.win_probability, 0.0);
        assert_eq!(f.median, -s.simulation.need_votes);
        assert!(f.warnings.iter().any(|w| w.code == "CAPACITY_ZERO"));
    }

    #[test]
    fn invalid_scenario_rejected() {
        let mut s = scenario();
        s.field.contact_rate_pct = -5.0;
        assert!(matches!(run_forecast(&s), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn percentiles_ordered() {
        let f = run_forecast(&scenario()).unwrap();
        assert!(f.p5 <= f.median && f.median <= f.p95);
        let p = f.envelope.percentiles;
        assert!(p.p10 <= p.p50 && p.p50 <= p.p90);
    }
}
