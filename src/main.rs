//! TMLE-RS - targeted estimation runner
//!
//! Simulates a dataset with a known effect, then estimates it with TMLE,
//! the one-step estimator and the naive plug-in.
//!
//! # Usage
//!
//! ```bash
//! # Default scenario (binary outcome, one confounded treatment)
//! cargo run --release
//!
//! # Interaction effect of two treatments, JSON output
//! cargo run --release -- --scenario continuous_interaction --n 5000 --json
//!
//! # Print the effective configuration
//! cargo run --release -- print-config
//! ```
//!
//! # Environment Variables
//!
//! - `TMLE_CONFIG`: Path to a TOML config file (default: ./tmle.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use tmle::config::TmleConfig;
use tmle::simulation::{simulate, Scenario};
use tmle::targeting::{naive_plugin_estimate, ose, tmle, QueryReport, Tail};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "tmle-rs")]
#[command(about = "Targeted and one-step estimation on simulated data")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides TMLE_CONFIG and ./tmle.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Data-generating scenario: binary_confounded or continuous_interaction
    #[arg(long)]
    scenario: Option<Scenario>,

    /// Number of simulated observations
    #[arg(long)]
    n: Option<usize>,

    /// RNG seed for the simulated dataset
    #[arg(long)]
    seed: Option<u64>,

    /// P-value alternative: both, left or right
    #[arg(long)]
    tail: Option<Tail>,

    /// Fit the fluctuation on the indicator with inverse-density weights
    #[arg(long)]
    weighted_fluctuation: bool,

    /// Print the reports as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "TMLE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print the effective configuration as TOML and exit
    PrintConfig,
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Serialize)]
struct RunSummary {
    scenario: Scenario,
    n: usize,
    seed: u64,
    estimand: String,
    truth: f64,
    naive: f64,
    epsilon: f64,
    tmle: QueryReport,
    ose: QueryReport,
}

fn print_report(name: &str, report: &QueryReport, truth: f64) {
    println!(
        "  {name:<6} {:>9.4}  (se {:.4}, 95% CI [{:.4}, {:.4}], p = {:.3e}, bias {:+.4})",
        report.estimate,
        report.stderror,
        report.confint.0,
        report.confint.1,
        report.pvalue,
        report.estimate - truth
    );
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  {}  [{}; n = {}, seed = {}]", summary.estimand, summary.scenario, summary.n, summary.seed);
    println!("  truth  {:>9.4}", summary.truth);
    println!("  naive  {:>9.4}  (bias {:+.4})", summary.naive, summary.naive - summary.truth);
    print_report("tmle", &summary.tmle, summary.truth);
    print_report("ose", &summary.ose, summary.truth);
    println!("  fluctuation epsilon = {:.6}", summary.epsilon);
    println!();
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn load_config(path: Option<&PathBuf>) -> Result<TmleConfig> {
    match path {
        Some(path) => TmleConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(TmleConfig::load()),
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let mut config = load_config(args.config.as_ref())?;
    if let Some(scenario) = args.scenario {
        config.simulation.scenario = scenario;
    }
    if let Some(n) = args.n {
        config.simulation.n = n;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(tail) = args.tail {
        config.estimation.tail = tail;
    }
    if args.weighted_fluctuation {
        config.estimation.weighted_fluctuation = true;
    }
    config.validate()?;

    if let Some(SubCommand::PrintConfig) = args.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let sim = &config.simulation;
    info!(scenario = %sim.scenario, n = sim.n, seed = sim.seed, "Simulating dataset");
    let simulated = simulate(sim.scenario, sim.n, sim.seed)
        .context("Failed to simulate dataset")?;

    let options = config.estimation_options();
    let mut fitter = config.nuisance_fitter(&simulated.estimand.treatments());
    let (targeted, fluctuation) = tmle(&mut fitter, &simulated.estimand, &simulated.dataset, &options)
        .context("TMLE failed")?;
    let (one_step, _) = ose(&mut fitter, &simulated.estimand, &simulated.dataset, &options)
        .context("OSE failed")?;
    let naive = naive_plugin_estimate(&mut fitter, &simulated.estimand, &simulated.dataset, &options)
        .context("Naive plug-in failed")?;

    let tail = config.estimation.tail;
    let summary = RunSummary {
        scenario: sim.scenario,
        n: sim.n,
        seed: sim.seed,
        estimand: simulated.estimand.to_string(),
        truth: simulated.truth,
        naive,
        epsilon: fluctuation.epsilon(),
        tmle: targeted.report(tail)?,
        ose: one_step.report(tail)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}
