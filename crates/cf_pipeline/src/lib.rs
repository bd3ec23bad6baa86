//! cf_pipeline — deterministic orchestration (validate → specs → simulate → analyze → label;
//! surface sweep; allocation and timeline planning).
//! This crate stays I/O-free; JSON, hashing and files live in `cf_io`, math in `cf_algo`.

#![forbid(unsafe_code)]

use thiserror::Error;

use cf_algo::allocation::AllocError;
use cf_core::errors::CoreError;

pub mod forecast;
pub mod label;
pub mod plan;
pub mod surface;
pub mod validate;

pub use forecast::{run_forecast, run_forecast_with, ForecastSummary, MarginsOut};
pub use label::{label_for, RiskLabel};
pub use plan::{run_optimizer, run_timeline};
pub use surface::{run_surface, SurfacePoint, SurfaceReport, SurfaceRequest};
pub use validate::{validate_scenario, Severity, ValidationIssue, ValidationReport};

/// Single error surface for the pipeline orchestration.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {}", .0.summary())]
    Validation(ValidationReport),
    #[error("config: {0}")]
    Config(#[from] CoreError),
    #[error("allocate: {0}")]
    Allocate(#[from] AllocError),
    #[error("surface: {0}")]
    Surface(String),
    #[error("scenario has no `{0}` section")]
    Missing(&'static str),
}

#[cfg(test)]
pub(crate) mod testkit {
    use std::collections::BTreeMap;

    use cf_core::variables::*;

    pub fn scenario() -> Scenario {
        let mut aph = BTreeMap::new();
        aph.insert("doors".to_string(), 10.0);
        aph.insert("phones".to_string(), 20.0);
        Scenario {
            simulation: SimulationConfig {
                runs: 1000,
                seed: Some("pipeline".into()),
                need_votes: 420.0,
                weeks: 6.0,
                include_margins: false,
                include_histogram: true,
                turnout_model: None,
                win_rule: WinRule::AtLeastZero,
            },
            field: FieldInputs {
                org_count: 2.0,
                org_hours_per_week: 20.0,
                volunteer_mult: 1.2,
                door_share_pct: 50.0,
                doors_per_hour: 15.0,
                calls_per_hour: 20.0,
                contact_rate_pct: 20.0,
                support_rate_pct: 55.0,
                turnout_reliability_pct: 80.0,
            },
            uncertainty: Uncertainty::Volatility { level: Volatility::Med },
            universe: None,
            tactics: vec![
                tactic("doors", 1.0, 0.05),
                tactic("phones", 2.5, 0.12),
                tactic("mail", 0.5, 0.01),
            ],
            optimizer: Some(OptimizerRequest {
                mode: OptimizerMode::Budget { budget: 250.0, capacity: None },
                step: 25.0,
                value_basis: ValueBasis::NetVotes,
            }),
            timeline: Some(TimelineInputs {
                enabled: true,
                staff_count: 1.0,
                staff_hours_per_week: 10.0,
                volunteer_count: 0.0,
                volunteer_hours_per_week: 0.0,
                active_weeks: 4.0,
                ramp_weeks: 0.0,
                gotv_window_weeks: None,
                attempts_per_hour: aph,
                objective: TimelineObjective::MinCostToGoal { goal_net_votes: 5.0 },
                step: 25.0,
                value_basis: ValueBasis::NetVotes,
            }),
        }
    }

    fn tactic(id: &str, cost: f64, value: f64) -> Tactic {
        Tactic {
            id: id.into(),
            kind: TacticKind::Persuasion,
            cost_per_attempt: cost,
            net_votes_per_attempt: value,
            turnout_adjusted_net_votes_per_attempt: None,
            max_attempts: None,
            decay_tiers: vec![],
        }
    }
}
