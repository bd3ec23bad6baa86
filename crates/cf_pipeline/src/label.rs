//! Advisor label: grade + human reason from an envelope.
//!
//! The grade comes straight from `cf_algo::risk::grade_from_percentiles`; this stage
//! only phrases it. Presentation-only: nothing downstream reads the text.

use serde::Serialize;

use cf_algo::risk::{ConfidenceEnvelope, RiskGrade};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskLabel {
    pub grade: RiskGrade,
    pub value: String,
    pub reason: String,
}

pub fn label_for(env: &ConfidenceEnvelope, degenerate_capacity: bool) -> RiskLabel {
    let p = env.percentiles;
    let reason = if !env.diagnostics.monotonic_checks.ok && !env.diagnostics.monotonic_checks.finite_inputs {
        "margin distribution unusable (non-finite values)".to_string()
    } else if degenerate_capacity {
        format!("no attempt capacity: every trial misses by {:.0} votes", -p.p50)
    } else {
        match env.grade {
            RiskGrade::Safe => format!("p10 margin {:.0} is at or above zero", p.p10),
            RiskGrade::FavoredTailRisk => {
                format!("median margin {:.0} ahead, but p10 at {:.0}", p.p50, p.p10)
            }
            RiskGrade::TossUp => format!(
                "median {:.0} behind, within half the p10–p50 spread ({:.0})",
                -p.p50,
                0.5 * (p.p50 - p.p10)
            ),
            RiskGrade::Unfavored => format!(
                "median {:.0} behind; break-even needs +{:.0} votes",
                -p.p50, env.risk.break_even.shift_to_p50
            ),
        }
    };
    RiskLabel { grade: env.grade, value: env.grade.as_str().to_string(), reason }
}
