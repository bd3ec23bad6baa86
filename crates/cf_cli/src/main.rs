// crates/cf_cli/src/main.rs
//
// Exit codes, typed error mapping, logging setup and the subcommand runners.
// Every runner: load scenario → apply overrides → pipeline → canonical artifact
// (atomic write) → print "<artifact> <sha256>" on stdout.

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 2;
    pub const IO: i32 = 4;
    pub const ENGINE: i32 = 5;
}

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use args::{check_paths, normalize_path, Cli, Command};
use cf_core::variables::Scenario;
use cf_io::{canonical_json, hasher, loader, IoError};
use cf_pipeline::{validate_scenario, PipelineError, SurfaceRequest};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Bad flags, malformed scenario JSON, failed scenario validation
    Validation(String),
    /// Read/write/path/limit failures
    Io(String),
    /// Structural engine failures (bad tactics, invalid surface request)
    Engine(String),
}

impl MainError {
    fn code(&self) -> i32 {
        match self {
            MainError::Validation(_) => exitcodes::VALIDATION,
            MainError::Io(_) => exitcodes::IO,
            MainError::Engine(_) => exitcodes::ENGINE,
        }
    }

    fn message(&self) -> &str {
        match self {
            MainError::Validation(m) | MainError::Io(m) | MainError::Engine(m) => m,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let _ = e.print();
            let rc = if e.use_stderr() { exitcodes::VALIDATION } else { exitcodes::OK };
            return ExitCode::from(rc as u8);
        }
    };
    init_tracing(&cli);

    let rc = match run(&cli) {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("cf: error: {}", e.message());
            e.code()
        }
    };
    ExitCode::from(rc as u8)
}

/// Stderr subscriber; `RUST_LOG` wins over the flag-derived level.
fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if cli.json_logs {
        tracing_subscriber::registry().with(env_filter).with(layer.json()).try_init().ok();
    } else {
        tracing_subscriber::registry().with(env_filter).with(layer).try_init().ok();
    }
}

fn run(cli: &Cli) -> Result<(), MainError> {
    check_paths(cli).map_err(|e| match e {
        args::CliError::NotFound(_) => MainError::Io(e.to_string()),
        args::CliError::NonLocalPath(_) => MainError::Validation(e.to_string()),
    })?;
    let mut scenario = loader::load_scenario(&normalize_path(cli.command.scenario_path())).map_err(map_io_err)?;
    info!(command = cli.command.name(), "scenario loaded");

    match &cli.command {
        Command::Validate { .. } => run_validate(&scenario, cli.quiet),
        Command::Simulate { io, sim, include_margins } => {
            sim.apply(&mut scenario);
            if *include_margins {
                scenario.simulation.include_margins = true;
            }
            let summary = cf_pipeline::run_forecast(&scenario).map_err(map_pipeline_err)?;
            for w in &summary.warnings {
                tracing::warn!(code = w.code, path = %w.path, "{}", w.message);
            }
            if !cli.quiet {
                eprintln!(
                    "simulate: win probability {:.3} ({}): {}",
                    summary.win_probability, summary.label.value, summary.label.reason
                );
            }
            emit(&io.out, "summary.json", &summary)
        }
        Command::Surface { io, sim, lever, start, end, steps, target } => {
            sim.apply(&mut scenario);
            let req = SurfaceRequest {
                lever: *lever,
                start: *start,
                end: *end,
                steps: *steps,
                target_win_probability: *target,
            };
            let report = cf_pipeline::run_surface(&scenario, &req).map_err(map_pipeline_err)?;
            if !cli.quiet {
                eprintln!(
                    "surface: {} over {} steps, {} cliff(s)",
                    report.lever_label,
                    report.points.len(),
                    report.analysis.cliffs.len()
                );
            }
            emit(&io.out, "surface.json", &report)
        }
        Command::Optimize { io } => {
            let plan = cf_pipeline::run_optimizer(&scenario).map_err(map_pipeline_err)?;
            if !cli.quiet {
                eprintln!(
                    "optimize: {:.0} attempts, cost {:.2}, net votes {:.2}",
                    plan.totals.attempts, plan.totals.cost, plan.totals.net_votes
                );
            }
            emit(&io.out, "plan.json", &plan)
        }
        Command::Timeline { io } => {
            let result = cf_pipeline::run_timeline(&scenario).map_err(map_pipeline_err)?;
            if !cli.quiet {
                eprintln!(
                    "timeline: goal feasible {}, binding {}",
                    result.meta.goal_feasible,
                    result.meta.binding_constraints
                );
            }
            emit(&io.out, "timeline.json", &result)
        }
    }
}

/// Prints the validation report on stdout; failing reports exit 2.
fn run_validate(s: &Scenario, quiet: bool) -> Result<(), MainError> {
    let report = validate_scenario(s);
    let bytes = canonical_json::to_canonical_bytes(&report).map_err(map_io_err)?;
    println!("{}", String::from_utf8_lossy(&bytes));
    if !report.pass {
        return Err(MainError::Validation(report.summary()));
    }
    if !quiet {
        eprintln!("validate: scenario OK ({} warning(s))", report.warnings().count());
    }
    Ok(())
}

fn emit<T: Serialize>(out_dir: &Path, name: &str, value: &T) -> Result<(), MainError> {
    let path = normalize_path(out_dir).join(name);
    let bytes = canonical_json::write_canonical_file(value, &path).map_err(map_io_err)?;
    let digest = hasher::sha256_hex(&bytes);
    info!(artifact = name, digest = hasher::short(&digest, 12), "artifact written");
    println!("{name} {digest}");
    Ok(())
}

fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::Json { pointer, msg } => MainError::Validation(format!("json {pointer}: {msg}")),
        IoError::Path(m) => MainError::Io(format!("path: {m}")),
        IoError::Limit(m) => MainError::Io(format!("limit: {m}")),
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Validation(_) | PipelineError::Missing(_) => MainError::Validation(e.to_string()),
        PipelineError::Config(_) | PipelineError::Allocate(_) | PipelineError::Surface(_) => {
            MainError::Engine(e.to_string())
        }
    }
}
