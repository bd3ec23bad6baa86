//! Sensitivity-surface classification.
//!
//! Works purely on the `(lever_value, win_probability)` sequence, in sweep order;
//! the sweep itself (re-running the engine per step) lives in the pipeline.
//!
//! Rules, with Δᵢ = wpᵢ₊₁ − wpᵢ, med = median |Δ|, peak = max |Δ|:
//! - cliff: |Δ| > max(3·med, 0.02) and |Δ| ≥ 0.5·peak
//! - diminishing zone: ≥ `MIN_DIMINISHING_RUN` consecutive Δ with |Δ| < max(0.002, 0.25·peak)
//! - safe zone: longest contiguous run of points with wp ≥ target (first wins ties)
//! - fragility point: Δ ≤ −max(0.03, 2·med)

use serde::{Deserialize, Serialize};

use cf_core::determinism::{quantile_sorted, sorted_copy};

pub const DEFAULT_SAFE_TARGET: f64 = 0.70;
pub const MIN_SURFACE_STEPS: usize = 5;
/// Consecutive flat steps needed before a run counts as a diminishing-return zone.
pub const MIN_DIMINISHING_RUN: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cliff {
    pub from_value: f64,
    pub to_value: f64,
    pub delta: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueZone {
    pub start_value: f64,
    pub end_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub start_value: f64,
    pub end_value: f64,
    pub points: usize,
    pub min_win_probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FragilityPoint {
    pub from_value: f64,
    pub at_value: f64,
    pub drop: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAnalysis {
    pub target_win_probability: f64,
    pub median_abs_delta: f64,
    pub peak_abs_delta: f64,
    pub cliffs: Vec<Cliff>,
    pub diminishing_zones: Vec<ValueZone>,
    pub safe_zone: Option<SafeZone>,
    pub fragility_points: Vec<FragilityPoint>,
}

/// Classify a swept curve. `points` are `(lever_value, win_probability)` in sweep order.
pub fn analyze_surface(points: &[(f64, f64)], target: f64) -> SurfaceAnalysis {
    let deltas: Vec<f64> = points.windows(2).map(|w| w[1].1 - w[0].1).collect();
    let abs_sorted = sorted_copy(&deltas.iter().map(|d| d.abs()).collect::<Vec<_>>());
    let med = quantile_sorted(&abs_sorted, 0.5);
    let peak = abs_sorted.last().copied().unwrap_or(0.0);

    let cliff_floor = (3.0 * med).max(0.02);
    let cliffs = deltas
        .iter()
        .enumerate()
        .filter(|(_, d)| d.abs() > cliff_floor && d.abs() >= 0.5 * peak)
        .map(|(i, &d)| Cliff { from_value: points[i].0, to_value: points[i + 1].0, delta: d })
        .collect();

    let flat = 0.002f64.max(0.25 * peak);
    let mut diminishing_zones = Vec::new();
    let mut run_start: Option<usize> = None;
    for i in 0..=deltas.len() {
        let is_flat = i < deltas.len() && deltas[i].abs() < flat;
        match (is_flat, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if i - s >= MIN_DIMINISHING_RUN {
                    diminishing_zones.push(ValueZone { start_value: points[s].0, end_value: points[i].0 });
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let drop_floor = 0.03f64.max(2.0 * med);
    let fragility_points = deltas
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d <= -drop_floor)
        .map(|(i, &d)| FragilityPoint { from_value: points[i].0, at_value: points[i + 1].0, drop: -d })
        .collect();

    SurfaceAnalysis {
        target_win_probability: target,
        median_abs_delta: med,
        peak_abs_delta: peak,
        cliffs,
        diminishing_zones,
        safe_zone: largest_safe_zone(points, target),
        fragility_points,
    }
}

fn largest_safe_zone(points: &[(f64, f64)], target: f64) -> Option<SafeZone> {
    let mut best: Option<(usize, usize)> = None;
    let mut start: Option<usize> = None;
    for i in 0..=points.len() {
        let ok = i < points.len() && points[i].1 >= target;
        match (ok, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                let len = i - s;
                if best.map_or(true, |(bs, be)| len > be - bs) {
                    best = Some((s, i));
                }
                start = None;
            }
            _ => {}
        }
    }
    best.map(|(s, e)| SafeZone {
        start_value: points[s].0,
        end_value: points[e - 1].0,
        points: e - s,
        min_win_probability: points[s..e].iter().map(|p| p.1).fold(f64::INFINITY, f64::min),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(wps: &[f64]) -> Vec<(f64, f64)> {
        wps.iter().enumerate().map(|(i, &w)| (45.0 + i as f64 * 2.5, w)).collect()
    }

    #[test]
    fn detects_single_cliff() {
        let pts = curve(&[0.10, 0.11, 0.12, 0.60, 0.61, 0.62]);
        let a = analyze_surface(&pts, DEFAULT_SAFE_TARGET);
        assert_eq!(a.cliffs.len(), 1);
        assert_eq!(a.cliffs[0].from_value, 50.0);
        assert_eq!(a.cliffs[0].to_value, 52.5);
        assert!(a.safe_zone.is_none());
    }

    #[test]
    fn flat_runs_become_diminishing_zones() {
        let pts = curve(&[0.50, 0.70, 0.90, 0.901, 0.902, 0.903]);
        let a = analyze_surface(&pts, DEFAULT_SAFE_TARGET);
        assert_eq!(a.diminishing_zones, vec![ValueZone { start_value: 50.0, end_value: 57.5 }]);
    }

    #[test]
    fn single_flat_step_is_not_a_zone() {
        let pts = curve(&[0.10, 0.30, 0.301, 0.50, 0.70, 0.90]);
        let a = analyze_surface(&pts, DEFAULT_SAFE_TARGET);
        assert!(a.diminishing_zones.is_empty());
    }

    #[test]
    fn largest_safe_zone_wins() {
        let pts = curve(&[0.72, 0.65, 0.75, 0.80, 0.85, 0.60]);
        let z = analyze_surface(&pts, 0.70).safe_zone.unwrap();
        assert_eq!(z.points, 3);
        assert_eq!(z.start_value, 50.0);
        assert_eq!(z.end_value, 55.0);
        assert_eq!(z.min_win_probability, 0.75);
    }

    #[test]
    fn drops_flagged_as_fragility() {
        let pts = curve(&[0.80, 0.81, 0.82, 0.70, 0.71]);
        let a = analyze_surface(&pts, DEFAULT_SAFE_TARGET);
        assert_eq!(a.fragility_points.len(), 1);
        assert_eq!(a.fragility_points[0].at_value, 52.5);
    }

    #[test]
    fn analysis_is_reproducible_from_sequence() {
        let pts = curve(&[0.2, 0.3, 0.35, 0.7, 0.72, 0.73]);
        assert_eq!(analyze_surface(&pts, 0.7), analyze_surface(&pts, 0.7));
    }
}
