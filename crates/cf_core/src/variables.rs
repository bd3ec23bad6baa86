//! variables.rs — Scenario configuration, enumerated option sets, safe defaults.
//!
//! Every component receives one of these explicit structs instead of a loose
//! bag of optional fields. Wire names are snake_case; enum tokens are explicit.
//! Percentages are 0–100 on the wire and converted to [0, 1] by the rate builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, CoreError};
use crate::sampling::RateSpec;

/// ------------ Macros ------------

/// Define a serde'd enum with explicit wire tokens.
macro_rules! serde_enum {
    ($(#[$meta:meta])* $name:ident => { $($variant:ident = $token:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }
    };
}

/// ------------ Canonical enums (wire tokens explicit) ------------

serde_enum!(
    /// Spread tier applied around each base rate.
    Volatility => {
        Low  = "low",
        Med  = "med",
        High = "high"
    }
);

serde_enum!(
    /// How a trial margin is turned into a win indicator.
    WinRule => {
        AtLeastZero      = "at_least_zero",
        StrictlyPositive = "strictly_positive"
    }
);

serde_enum!(
    /// Lever swept by the sensitivity surface.
    Lever => {
        VolunteerMultiplier = "volunteer_multiplier",
        SupportRate         = "support_rate",
        ContactRate         = "contact_rate",
        TurnoutReliability  = "turnout_reliability"
    }
);

serde_enum!(
    /// Persuasion tactics spend the full active span; turnout tactics only the GOTV window.
    TacticKind => {
        Persuasion = "persuasion",
        Turnout    = "turnout"
    }
);

serde_enum!(
    /// Which per-attempt value the optimizer maximizes.
    ValueBasis => {
        NetVotes        = "net_votes",
        TurnoutAdjusted = "turnout_adjusted"
    }
);

impl Volatility {
    /// Relative half-width of the triangular spread around the mode.
    pub fn width(self) -> f64 {
        match self {
            Volatility::Low => 0.10,
            Volatility::Med => 0.20,
            Volatility::High => 0.30,
        }
    }
}

impl Default for Volatility {
    fn default() -> Self { Volatility::Med }
}

impl WinRule {
    #[inline]
    pub fn wins(self, margin: f64) -> bool {
        match self {
            WinRule::AtLeastZero => margin >= 0.0,
            WinRule::StrictlyPositive => margin > 0.0,
        }
    }
}

impl Default for WinRule {
    fn default() -> Self { WinRule::AtLeastZero }
}

impl Lever {
    pub fn label(self) -> &'static str {
        match self {
            Lever::VolunteerMultiplier => "Volunteer multiplier",
            Lever::SupportRate => "Support rate",
            Lever::ContactRate => "Contact rate",
            Lever::TurnoutReliability => "Turnout reliability",
        }
    }
}

impl Default for TacticKind {
    fn default() -> Self { TacticKind::Persuasion }
}

impl Default for ValueBasis {
    fn default() -> Self { ValueBasis::NetVotes }
}

/// ------------ Simulation ------------

fn default_true() -> bool { true }
fn default_step() -> f64 { 25.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of trials (>= 1).
    pub runs: u32,
    /// Empty/absent ⇒ entropy-seeded, non-reproducible run.
    #[serde(default)]
    pub seed: Option<String>,
    /// Persuasion need: votes required to win.
    pub need_votes: f64,
    pub weeks: f64,
    #[serde(default)]
    pub include_margins: bool,
    #[serde(default = "default_true")]
    pub include_histogram: bool,
    #[serde(default)]
    pub turnout_model: Option<TurnoutModel>,
    #[serde(default)]
    pub win_rule: WinRule,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.runs == 0 {
            return Err(CoreError::InvalidRuns);
        }
        ensure_finite(self.need_votes, "need_votes")?;
        ensure_finite(self.weeks, "weeks")?;
        if let Some(tm) = &self.turnout_model {
            tm.validate()?;
        }
        Ok(())
    }

    /// Seed exactly as given, if non-empty.
    pub fn seed_str(&self) -> Option<&str> {
        self.seed.as_deref().filter(|s| !s.is_empty())
    }
}

/// Field program inputs (base values; uncertainty is layered on top).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInputs {
    pub org_count: f64,
    pub org_hours_per_week: f64,
    pub volunteer_mult: f64,
    /// Share of attempts made at the door (rest by phone), 0–100.
    pub door_share_pct: f64,
    pub doors_per_hour: f64,
    pub calls_per_hour: f64,
    pub contact_rate_pct: f64,
    pub support_rate_pct: f64,
    pub turnout_reliability_pct: f64,
}

impl FieldInputs {
    pub fn validate(&self) -> Result<(), CoreError> {
        ensure_finite(self.org_count, "org_count")?;
        ensure_finite(self.org_hours_per_week, "org_hours_per_week")?;
        ensure_finite(self.volunteer_mult, "volunteer_mult")?;
        ensure_finite(self.door_share_pct, "door_share_pct")?;
        ensure_finite(self.doors_per_hour, "doors_per_hour")?;
        ensure_finite(self.calls_per_hour, "calls_per_hour")?;
        ensure_finite(self.contact_rate_pct, "contact_rate_pct")?;
        ensure_finite(self.support_rate_pct, "support_rate_pct")?;
        ensure_finite(self.turnout_reliability_pct, "turnout_reliability_pct")?;
        Ok(())
    }
}

/// Either a single volatility tier or explicit per-rate triangular specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Uncertainty {
    Volatility { level: Volatility },
    Explicit { overrides: RateOverrides },
}

impl Default for Uncertainty {
    fn default() -> Self {
        Uncertainty::Volatility { level: Volatility::default() }
    }
}

/// Explicit specs. Rate fields are in percent (0–100); throughput and multiplier are raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOverrides {
    pub contact_rate_pct: RateSpec,
    pub support_rate_pct: RateSpec,
    pub turnout_reliability_pct: RateSpec,
    pub doors_per_hour: RateSpec,
    pub calls_per_hour: RateSpec,
    pub volunteer_mult: RateSpec,
}

/// Universe composition shares (any non-negative scale; normalized by their sum).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UniverseComposition {
    #[serde(default)]
    pub dem_pct: f64,
    #[serde(default)]
    pub rep_pct: f64,
    #[serde(default)]
    pub npa_pct: f64,
    #[serde(default)]
    pub other_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseAdjustment {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub composition: UniverseComposition,
    /// 1.0 = full retention (strict identity); clamped to [0.6, 1.0].
    pub retention_factor: f64,
}

/// Lift per GOTV contact, in turnout percentage points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiftPerContact {
    Fixed { pp: f64 },
    Sampled { spec: RateSpec },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoutModel {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub baseline_turnout_pct: f64,
    pub target_universe_size: f64,
    pub lift_per_contact: LiftPerContact,
    pub max_lift_pp: f64,
    #[serde(default)]
    pub use_diminishing: bool,
}

impl TurnoutModel {
    pub fn validate(&self) -> Result<(), CoreError> {
        ensure_finite(self.baseline_turnout_pct, "turnout_model.baseline_turnout_pct")?;
        ensure_finite(self.target_universe_size, "turnout_model.target_universe_size")?;
        ensure_finite(self.max_lift_pp, "turnout_model.max_lift_pp")?;
        match &self.lift_per_contact {
            LiftPerContact::Fixed { pp } => {
                ensure_finite(*pp, "turnout_model.lift_per_contact")?;
            }
            LiftPerContact::Sampled { spec } => {
                RateSpec::new(spec.min, spec.mode, spec.max)?;
            }
        }
        Ok(())
    }
}

/// ------------ Tactics & optimizer ------------

/// Yield multiplier applied to attempts beyond `threshold_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayTier {
    pub threshold_attempts: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tactic {
    pub id: String,
    #[serde(default)]
    pub kind: TacticKind,
    pub cost_per_attempt: f64,
    pub net_votes_per_attempt: f64,
    #[serde(default)]
    pub turnout_adjusted_net_votes_per_attempt: Option<f64>,
    /// `None` = no cap.
    #[serde(default)]
    pub max_attempts: Option<f64>,
    #[serde(default)]
    pub decay_tiers: Vec<DecayTier>,
}

impl Tactic {
    /// Per-attempt value under the chosen basis (turnout-adjusted falls back to net).
    pub fn value_per_attempt(&self, basis: ValueBasis) -> f64 {
        match basis {
            ValueBasis::NetVotes => self.net_votes_per_attempt,
            ValueBasis::TurnoutAdjusted => self
                .turnout_adjusted_net_votes_per_attempt
                .unwrap_or(self.net_votes_per_attempt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OptimizerMode {
    Budget {
        budget: f64,
        #[serde(default)]
        capacity: Option<f64>,
    },
    Capacity { capacity: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerRequest {
    #[serde(flatten)]
    pub mode: OptimizerMode,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default)]
    pub value_basis: ValueBasis,
}

/// ------------ Timeline ------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "objective", rename_all = "snake_case")]
pub enum TimelineObjective {
    MaximizeNetVotes {
        budget: f64,
        #[serde(default)]
        capacity: Option<f64>,
        #[serde(default)]
        goal_net_votes: Option<f64>,
    },
    MinCostToGoal { goal_net_votes: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineInputs {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub staff_count: f64,
    #[serde(default)]
    pub staff_hours_per_week: f64,
    #[serde(default)]
    pub volunteer_count: f64,
    #[serde(default)]
    pub volunteer_hours_per_week: f64,
    pub active_weeks: f64,
    /// Linear ramp from zero to full staffing at the start of the span.
    #[serde(default)]
    pub ramp_weeks: f64,
    /// Turnout tactics only run in the last `gotv_window_weeks`; `None` = whole span.
    #[serde(default)]
    pub gotv_window_weeks: Option<f64>,
    /// Throughput per tactic id. Tactics without an entry are not timeline-bound.
    #[serde(default)]
    pub attempts_per_hour: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub objective: TimelineObjective,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default)]
    pub value_basis: ValueBasis,
}

impl TimelineInputs {
    /// Combined staff + volunteer hours per week.
    pub fn weekly_hours(&self) -> f64 {
        self.staff_count * self.staff_hours_per_week
            + self.volunteer_count * self.volunteer_hours_per_week
    }
}

/// ------------ Scenario (top-level document) ------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub simulation: SimulationConfig,
    pub field: FieldInputs,
    #[serde(default)]
    pub uncertainty: Uncertainty,
    #[serde(default)]
    pub universe: Option<UniverseAdjustment>,
    #[serde(default)]
    pub tactics: Vec<Tactic>,
    #[serde(default)]
    pub optimizer: Option<OptimizerRequest>,
    #[serde(default)]
    pub timeline: Option<TimelineInputs>,
}
