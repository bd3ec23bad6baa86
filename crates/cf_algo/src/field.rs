//! Field model: attempt capacity and GOTV turnout lift.
//!
//! The engine treats both functions as collaborators behind `FieldModel`, so a caller
//! can swap in its own capacity or lift curve without touching the trial loop.
//!
//! Contract:
//! - `capacity_contacts` returns `None` when the program cannot produce attempts
//!   (non-positive weeks, organizers, hours, multiplier, or blended throughput).
//! - `avg_lift_pp` is bounded by `min(max_lift_pp, 100 − baseline)` and never negative.

/// Inputs for one capacity evaluation. `door_share` is a fraction in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapacityInputs {
    pub weeks: f64,
    pub org_count: f64,
    pub hours_per_week: f64,
    pub volunteer_mult: f64,
    pub door_share: f64,
    pub doors_per_hour: f64,
    pub calls_per_hour: f64,
}

/// Inputs for one average-lift evaluation. Percentages are 0–100.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiftInputs {
    pub baseline_turnout_pct: f64,
    pub lift_per_contact_pp: f64,
    pub max_lift_pp: f64,
    pub contacts: f64,
    pub universe_size: f64,
    pub use_diminishing: bool,
}

pub trait FieldModel {
    fn capacity_contacts(&self, inp: &CapacityInputs) -> Option<f64>;
    fn avg_lift_pp(&self, inp: &LiftInputs) -> f64;
}

/// Linear capacity, linear-or-saturating lift.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardFieldModel;

impl FieldModel for StandardFieldModel {
    fn capacity_contacts(&self, inp: &CapacityInputs) -> Option<f64> {
        compute_capacity_contacts(inp)
    }

    fn avg_lift_pp(&self, inp: &LiftInputs) -> f64 {
        compute_avg_lift_pp(inp)
    }
}

#[inline]
fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// weeks × organizers × hours × volunteer multiplier × blended attempts/hour.
pub fn compute_capacity_contacts(inp: &CapacityInputs) -> Option<f64> {
    if !(positive(inp.weeks)
        && positive(inp.org_count)
        && positive(inp.hours_per_week)
        && positive(inp.volunteer_mult))
    {
        return None;
    }
    let share = if inp.door_share.is_finite() { inp.door_share.clamp(0.0, 1.0) } else { 0.0 };
    let dph = if inp.doors_per_hour.is_finite() { inp.doors_per_hour.max(0.0) } else { 0.0 };
    let cph = if inp.calls_per_hour.is_finite() { inp.calls_per_hour.max(0.0) } else { 0.0 };
    let per_hour = share * dph + (1.0 - share) * cph;
    if !positive(per_hour) {
        return None;
    }
    let cap = inp.weeks * inp.org_count * inp.hours_per_week * inp.volunteer_mult * per_hour;
    cap.is_finite().then_some(cap)
}

/// Average turnout lift over the universe, in percentage points.
pub fn compute_avg_lift_pp(inp: &LiftInputs) -> f64 {
    let headroom = (100.0 - inp.baseline_turnout_pct).max(0.0);
    let ceiling = inp.max_lift_pp.max(0.0).min(headroom);
    if !(ceiling > 0.0) || !positive(inp.universe_size) || !(inp.contacts > 0.0) {
        return 0.0;
    }
    let per = inp.lift_per_contact_pp.max(0.0);
    let raw = inp.contacts / inp.universe_size * per;
    let lift = if inp.use_diminishing {
        ceiling * (1.0 - (-raw / ceiling).exp())
    } else {
        raw.min(ceiling)
    };
    if lift.is_finite() { lift.clamp(0.0, ceiling) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap() -> CapacityInputs {
        CapacityInputs {
            weeks: 8.0,
            org_count: 2.0,
            hours_per_week: 10.0,
            volunteer_mult: 1.5,
            door_share: 0.5,
            doors_per_hour: 20.0,
            calls_per_hour: 30.0,
        }
    }

    #[test]
    fn capacity_blends_channels() {
        // 8 * 2 * 10 * 1.5 * 25
        assert_eq!(compute_capacity_contacts(&cap()), Some(6000.0));
    }

    #[test]
    fn capacity_none_on_missing_inputs() {
        let mut c = cap();
        c.weeks = 0.0;
        assert_eq!(compute_capacity_contacts(&c), None);

        let mut c = cap();
        c.doors_per_hour = 0.0;
        c.calls_per_hour = 0.0;
        assert_eq!(compute_capacity_contacts(&c), None);

        let mut c = cap();
        c.org_count = f64::NAN;
        assert_eq!(compute_capacity_contacts(&c), None);
    }

    #[test]
    fn door_only_program_ignores_calls() {
        let mut c = cap();
        c.door_share = 1.0;
        c.calls_per_hour = 0.0;
        assert_eq!(compute_capacity_contacts(&c), Some(8.0 * 2.0 * 10.0 * 1.5 * 20.0));
    }

    fn lift(contacts: f64, diminishing: bool) -> f64 {
        compute_avg_lift_pp(&LiftInputs {
            baseline_turnout_pct: 50.0,
            lift_per_contact_pp: 10.0,
            max_lift_pp: 5.0,
            contacts,
            universe_size: 10_000.0,
            use_diminishing: diminishing,
        })
    }

    #[test]
    fn linear_lift_caps_at_ceiling() {
        assert!((lift(1000.0, false) - 1.0).abs() < 1e-12);
        assert_eq!(lift(100_000.0, false), 5.0);
        assert_eq!(lift(0.0, false), 0.0);
    }

    #[test]
    fn diminishing_lift_stays_below_linear() {
        let d = lift(1000.0, true);
        assert!(d > 0.0 && d < 1.0);
        assert!(lift(1e9, true) <= 5.0);
    }

    #[test]
    fn lift_respects_turnout_headroom() {
        let l = compute_avg_lift_pp(&LiftInputs {
            baseline_turnout_pct: 98.0,
            lift_per_contact_pp: 10.0,
            max_lift_pp: 5.0,
            contacts: 1e6,
            universe_size: 100.0,
            use_diminishing: false,
        });
        assert_eq!(l, 2.0);
    }
}
