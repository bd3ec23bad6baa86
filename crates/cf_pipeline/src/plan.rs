//! PLAN — allocation and timeline planning from a scenario's optimizer/timeline sections.

use tracing::debug;

use cf_algo::allocation::{optimize_mix_budget, optimize_mix_capacity, optimize_timeline, AllocationPlan, TimelineResult};
use cf_core::variables::{OptimizerMode, Scenario};

use crate::PipelineError;

/// Run the greedy allocator configured under `optimizer`.
pub fn run_optimizer(s: &Scenario) -> Result<AllocationPlan, PipelineError> {
    let req = s.optimizer.as_ref().ok_or(PipelineError::Missing("optimizer"))?;
    let plan = match req.mode {
        OptimizerMode::Budget { budget, capacity } => {
            optimize_mix_budget(&s.tactics, budget, capacity, req.step, req.value_basis)?
        }
        OptimizerMode::Capacity { capacity } => optimize_mix_capacity(&s.tactics, capacity, req.step, req.value_basis)?,
    };
    debug!(tactics = s.tactics.len(), binding = ?plan.binding, "optimizer plan built");
    Ok(plan)
}

/// Run the timeline-constrained optimizer configured under `timeline`.
pub fn run_timeline(s: &Scenario) -> Result<TimelineResult, PipelineError> {
    let t = s.timeline.as_ref().ok_or(PipelineError::Missing("timeline"))?;
    Ok(optimize_timeline(&s.tactics, t)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::scenario;
    use cf_algo::allocation::{AllocError, Binding};
    use cf_core::variables::{OptimizerRequest, ValueBasis};

    #[test]
    fn budget_plan_from_scenario() {
        let s = scenario();
        let p = run_optimizer(&s).unwrap();
        assert!(p.totals.cost <= 250.0 + 1e-9);
        assert_eq!(p.trace[0].tactic_id, "doors");
        assert_eq!(p.binding, Binding::Budget);
    }

    #[test]
    fn capacity_mode_from_scenario() {
        let mut s = scenario();
        s.optimizer = Some(OptimizerRequest {
            mode: OptimizerMode::Capacity { capacity: 0.0 },
            step: 25.0,
            value_basis: ValueBasis::NetVotes,
        });
        let p = run_optimizer(&s).unwrap();
        assert_eq!(p.totals.attempts, 0.0);
        assert_eq!(p.totals.cost, 0.0);
    }

    #[test]
    fn missing_sections_reported() {
        let mut s = scenario();
        s.optimizer = None;
        s.timeline = None;
        assert!(matches!(run_optimizer(&s), Err(PipelineError::Missing("optimizer"))));
        assert!(matches!(run_timeline(&s), Err(PipelineError::Missing("timeline"))));
    }

    #[test]
    fn malformed_tactic_surfaces_as_allocation_error() {
        let mut s = scenario();
        s.tactics[0].max_attempts = Some(f64::NAN);
        assert!(matches!(run_optimizer(&s), Err(PipelineError::Allocate(AllocError::InvalidCap(_)))));
    }

    #[test]
    fn timeline_from_scenario() {
        let r = run_timeline(&scenario()).unwrap();
        assert!(r.meta.goal_feasible);
        assert!(r.meta.caps.max_attempts_by_tactic.contains_key("doors"));
    }
}
