//! SURFACE — sweep one lever across a range and classify the win-probability curve.
//!
//! Each step patches a single lever (everything else at baseline), rebuilds the rate
//! specs and re-runs the engine with a fresh generator from the same seed, so steps
//! differ only by the lever. Classification is delegated to `cf_algo::surface` and
//! depends on the `(lever_value, win_probability)` sequence alone.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cf_algo::field::StandardFieldModel;
use cf_algo::montecarlo::run_simulation;
use cf_algo::rates::build_rate_specs;
use cf_algo::surface::{analyze_surface, SurfaceAnalysis, DEFAULT_SAFE_TARGET, MIN_SURFACE_STEPS};
use cf_core::rng::make_rng;
use cf_core::variables::{Lever, Scenario, Uncertainty};

use crate::validate::validate_scenario;
use crate::PipelineError;

fn default_target() -> f64 {
    DEFAULT_SAFE_TARGET
}

/// Lever values use scenario units: percent for the three rates, raw for the multiplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRequest {
    pub lever: Lever,
    pub start: f64,
    pub end: f64,
    pub steps: usize,
    #[serde(default = "default_target")]
    pub target_win_probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurfacePoint {
    pub lever_value: f64,
    pub win_probability: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurfaceReport {
    pub lever: Lever,
    pub lever_label: String,
    pub runs_per_step: u32,
    pub points: Vec<SurfacePoint>,
    pub analysis: SurfaceAnalysis,
}

/// Evenly spaced lever values, endpoints included.
pub fn lever_values(start: f64, end: f64, steps: usize) -> Vec<f64> {
    let last = (steps.max(2) - 1) as f64;
    (0..steps)
        .map(|i| if i + 1 == steps { end } else { start + (end - start) * i as f64 / last })
        .collect()
}

/// Copy of `s` with `lever` set to `value`.
pub fn patch_lever(s: &Scenario, lever: Lever, value: f64) -> Scenario {
    let mut out = s.clone();
    match lever {
        Lever::VolunteerMultiplier => out.field.volunteer_mult = value,
        Lever::SupportRate => out.field.support_rate_pct = value,
        Lever::ContactRate => out.field.contact_rate_pct = value,
        Lever::TurnoutReliability => out.field.turnout_reliability_pct = value,
    }
    if let Uncertainty::Explicit { overrides } = &mut out.uncertainty {
        let spec = match lever {
            Lever::VolunteerMultiplier => &mut overrides.volunteer_mult,
            Lever::SupportRate => &mut overrides.support_rate_pct,
            Lever::ContactRate => &mut overrides.contact_rate_pct,
            Lever::TurnoutReliability => &mut overrides.turnout_reliability_pct,
        };
        *spec = spec.recentered(value);
    }
    out
}

pub fn run_surface(s: &Scenario, req: &SurfaceRequest) -> Result<SurfaceReport, PipelineError> {
    if req.steps < MIN_SURFACE_STEPS {
        return Err(PipelineError::Surface(format!("steps must be >= {MIN_SURFACE_STEPS}, got {}", req.steps)));
    }
    if !(req.start.is_finite() && req.end.is_finite()) {
        return Err(PipelineError::Surface("lever range must be finite".into()));
    }
    if !(0.0..=1.0).contains(&req.target_win_probability) {
        return Err(PipelineError::Surface("target win probability must lie in 0–1".into()));
    }
    let report = validate_scenario(s);
    if !report.pass {
        return Err(PipelineError::Validation(report));
    }

    let mut sim = s.simulation.clone();
    sim.include_histogram = false;

    let mut points = Vec::with_capacity(req.steps);
    for value in lever_values(req.start, req.end, req.steps) {
        let patched = patch_lever(s, req.lever, value);
        let bundle = build_rate_specs(&patched.field, &patched.uncertainty, patched.universe.as_ref());
        let mut rng = make_rng(sim.seed_str());
        let out = run_simulation(&sim, &patched.field, &bundle.specs, &StandardFieldModel, &mut rng)?;
        points.push(SurfacePoint {
            lever_value: value,
            win_probability: out.win_probability,
            p10: out.margins.quantile(0.10),
            p50: out.margins.quantile(0.50),
            p90: out.margins.quantile(0.90),
        });
    }

    let curve: Vec<(f64, f64)> = points.iter().map(|p| (p.lever_value, p.win_probability)).collect();
    let analysis = analyze_surface(&curve, req.target_win_probability);
    debug!(
        lever = req.lever.label(),
        steps = req.steps,
        cliffs = analysis.cliffs.len(),
        "surface sweep complete"
    );

    Ok(SurfaceReport {
        lever: req.lever,
        lever_label: req.lever.label().to_string(),
        runs_per_step: sim.runs,
        points,
        analysis,
    })
}
