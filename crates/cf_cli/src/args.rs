// crates/cf_cli/src/args.rs
//
// Offline CLI argument surface: subcommands, shared flags, path checks.
// - Scenario paths must be local files (no scheme:// of any kind)
// - Output directory is normalized to an absolute path, created on write
// - Seed/runs/include-margins override the scenario's simulation block

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};

use cf_core::variables::{Lever, Scenario};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "cf",
    disable_help_subcommand = true,
    about = "Offline, deterministic campaign forecast engine"
)]
pub struct Cli {
    /// More log output on stderr (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only errors on stderr; no headline.
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Monte Carlo forecast and write summary.json.
    Simulate {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        sim: SimOverrides,
        /// Include raw and sorted margins in the summary.
        #[arg(long)]
        include_margins: bool,
    },
    /// Sweep one lever and write surface.json.
    Surface {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        sim: SimOverrides,
        /// volunteer_multiplier | support_rate | contact_rate | turnout_reliability
        #[arg(long, value_parser = parse_lever)]
        lever: Lever,
        #[arg(long, allow_negative_numbers = true)]
        start: f64,
        #[arg(long, allow_negative_numbers = true)]
        end: f64,
        #[arg(long, default_value_t = 9)]
        steps: usize,
        /// Win probability the safe zone must hold.
        #[arg(long, default_value_t = 0.70)]
        target: f64,
    },
    /// Greedy allocation from the scenario's `optimizer` block; writes plan.json.
    Optimize {
        #[command(flatten)]
        io: IoArgs,
    },
    /// Timeline-constrained allocation from the `timeline` block; writes timeline.json.
    Timeline {
        #[command(flatten)]
        io: IoArgs,
    },
    /// Load and validate the scenario only; prints the report.
    Validate {
        /// Scenario JSON path.
        #[arg(long)]
        scenario: PathBuf,
    },
}

#[derive(Debug, ClapArgs, Clone)]
pub struct IoArgs {
    /// Scenario JSON path.
    #[arg(long)]
    pub scenario: PathBuf,
    /// Output directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

#[derive(Debug, ClapArgs, Clone, Default)]
pub struct SimOverrides {
    /// Seed override; an empty string gives an entropy-seeded run.
    #[arg(long)]
    pub seed: Option<String>,
    /// Trial count override.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub runs: Option<u32>,
}

impl SimOverrides {
    pub fn apply(&self, s: &mut Scenario) {
        if let Some(seed) = &self.seed {
            s.simulation.seed = Some(seed.clone());
        }
        if let Some(runs) = self.runs {
            s.simulation.runs = runs;
        }
    }
}

/// Errors surfaced by argument checks. Messages are short and stable.
#[derive(Debug)]
pub enum CliError {
    NonLocalPath(String),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            CliError::NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Lever tokens are the scenario wire tokens.
pub fn parse_lever(s: &str) -> Result<Lever, String> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_string()))
        .map_err(|_| format!("unknown lever `{s}`"))
}

impl Command {
    pub fn scenario_path(&self) -> &Path {
        match self {
            Command::Simulate { io, .. }
            | Command::Surface { io, .. }
            | Command::Optimize { io }
            | Command::Timeline { io } => &io.scenario,
            Command::Validate { scenario } => scenario,
        }
    }

    pub fn out_dir(&self) -> Option<&Path> {
        match self {
            Command::Simulate { io, .. }
            | Command::Surface { io, .. }
            | Command::Optimize { io }
            | Command::Timeline { io } => Some(&io.out),
            Command::Validate { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Simulate { .. } => "simulate",
            Command::Surface { .. } => "surface",
            Command::Optimize { .. } => "optimize",
            Command::Timeline { .. } => "timeline",
            Command::Validate { .. } => "validate",
        }
    }
}

/// Post-parse checks: local paths only, scenario must exist.
pub fn check_paths(cli: &Cli) -> Result<(), CliError> {
    if let Some(out) = cli.command.out_dir() {
        ensure_local_path(out)?;
    }
    ensure_local_exists(cli.command.scenario_path())
}

#[inline]
fn has_scheme(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.contains("://") || lower.starts_with("http:") || lower.starts_with("https:") || lower.starts_with("file:")
}

#[inline]
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    match p.to_str() {
        Some(s) if has_scheme(s) => Err(CliError::NonLocalPath(s.to_string())),
        _ => Ok(()),
    }
}

fn ensure_local_exists(p: &Path) -> Result<(), CliError> {
    ensure_local_path(p)?;
    match fs::metadata(p) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(CliError::NotFound(format!("--scenario {}", p.display()))),
    }
}

/// Absolute form of `p`; falls back to CWD-relative when it does not exist yet.
pub fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lever_tokens() {
        assert_eq!(parse_lever("support_rate").unwrap(), Lever::SupportRate);
        assert_eq!(parse_lever(" volunteer_multiplier ").unwrap(), Lever::VolunteerMultiplier);
        assert!(parse_lever("charisma").is_err());
    }

    #[test]
    fn ensure_local_path_rejects_schemes() {
        assert!(ensure_local_path(Path::new("http://x")).is_err());
        assert!(ensure_local_path(Path::new("file://C:/x.json")).is_err());
        assert!(ensure_local_path(Path::new("/tmp/scenario.json")).is_ok());
    }

    #[test]
    fn surface_flags_parse() {
        let cli = Cli::try_parse_from([
            "cf", "surface", "--scenario", "s.json", "--lever", "contact_rate", "--start", "10", "--end", "30",
            "--steps", "5", "--runs", "100",
        ])
        .unwrap();
        match cli.command {
            Command::Surface { lever, steps, sim, target, .. } => {
                assert_eq!(lever, Lever::ContactRate);
                assert_eq!(steps, 5);
                assert_eq!(sim.runs, Some(100));
                assert_eq!(target, 0.70);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_runs_rejected_by_parser() {
        assert!(Cli::try_parse_from(["cf", "simulate", "--scenario", "s.json", "--runs", "0"]).is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut s: Scenario = serde_json::from_str(
            r#"{"simulation":{"runs":10,"need_votes":1,"weeks":1},
                "field":{"org_count":1,"org_hours_per_week":1,"volunteer_mult":1,"door_share_pct":50,
                         "doors_per_hour":1,"calls_per_hour":1,"contact_rate_pct":1,"support_rate_pct":1,
                         "turnout_reliability_pct":1}}"#,
        )
        .unwrap();
        SimOverrides { seed: Some("abc".into()), runs: Some(42) }.apply(&mut s);
        assert_eq!(s.simulation.seed.as_deref(), Some("abc"));
        assert_eq!(s.simulation.runs, 42);
    }

    #[test]
    fn normalize_path_returns_absolute() {
        assert!(normalize_path(Path::new("does/not/exist")).is_absolute());
    }
}
