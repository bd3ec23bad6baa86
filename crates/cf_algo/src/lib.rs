// crates/cf_algo/src/lib.rs
#![forbid(unsafe_code)]

// ----------------------------- Forecasting ------------------------------------------

pub mod field;
pub mod montecarlo;
pub mod rates;
pub mod risk;
pub mod stats;
pub mod surface;

pub use field::{compute_avg_lift_pp, compute_capacity_contacts, FieldModel, StandardFieldModel};
pub use montecarlo::{run_simulation, SampleSet, SensitivityImpact, SimulationOutcome};
pub use rates::{build_rate_specs, universe_adjust, RateSpecBundle, RateSpecs, UniverseAdjusted};
pub use risk::{analyze_margins, confidence_envelope, grade_from_percentiles, ConfidenceEnvelope, RiskGrade};
pub use stats::{Histogram, MarginDistribution};
pub use surface::{analyze_surface, SurfaceAnalysis};

// ----------------------------- Allocation (public surface) ---------------------------

pub mod allocation {
    // File modules (actual implementations)
    pub mod greedy;
    pub mod timeline;

    pub use greedy::{
        optimize_greedy, optimize_mix_budget, optimize_mix_capacity, validate_tactics, AllocError,
        AllocationPlan, AllocationTotals, Binding, Limits, Objective, TraceEntry,
    };
    pub use timeline::{
        compute_timeline_caps, optimize_timeline, BindingReport, TimelineCaps, TimelineMeta, TimelineResult,
    };
}

pub use allocation::{AllocError, AllocationPlan, TimelineResult};
