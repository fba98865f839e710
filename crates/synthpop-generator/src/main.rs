//! Synthetic population generator binary.
//!
//! Loads configuration, the module rule tables and the demographic tables,
//! then simulates the requested number of patients on a worker pool and
//! writes `patients.csv` and `timelines.csv`.
//!
//! # Startup Sequence
//!
//! 1. Parse command-line arguments
//! 2. Initialize structured logging (tracing)
//! 3. Load configuration from `synthpop-config.yaml` and apply overrides
//! 4. Resolve run options (seed, workers, reference date)
//! 5. Load tables and generate the population
//! 6. Report the run summary
//!
//! # Exit Codes
//!
//! - `0`: the run completed (skipped patients are reported, not fatal)
//! - `1`: the run aborted on a patient failure or an output error
//! - `2`: configuration or input tables were rejected before generation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use synthpop_core::GeneratorConfig;
use synthpop_generator::{GeneratorError, RunOptions, RunSummary, StopFlag};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_ABORTED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

/// Filter used with `--debug`: amendment traces from every crate.
const DEBUG_FILTER: &str =
    "info,synthpop_core=debug,synthpop_demographics=debug,synthpop_generator=debug";

#[derive(Parser, Debug)]
#[command(name = "synthpop-generator")]
#[command(about = "Generate synthetic patients with per-age-range health timelines")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "synthpop-config.yaml")]
    config: PathBuf,

    /// Number of patients to generate (overrides the config file)
    #[arg(short, long)]
    population: Option<u32>,

    /// Base random seed (overrides the config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Print each generated patient
    #[arg(long)]
    display: bool,

    /// Log every amendment and draw
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    // 1. Parse arguments.
    let args = Args::parse();

    // 2. Initialize structured logging.
    let filter = if args.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("synthpop-generator starting");

    // 3. Load configuration.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!(
        config = %args.config.display(),
        population = config.generate.population_size,
        modules = config.modules.len(),
        age_ranges = config.age_ranges.len(),
        span = ?config.simulation.span,
        on_patient_error = ?config.simulation.on_patient_error,
        "Configuration loaded"
    );

    // 4. Resolve run options.
    let mut options = RunOptions::from_config(&config);
    options.display = args.display;
    if config.generate.seed.is_none() {
        info!(base_seed = options.base_seed, "No seed configured, drew a fresh one");
    }

    // 5. Load tables and generate.
    let stop = StopFlag::new();
    let summary = match synthpop_generator::run(&config, &options, &stop) {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "generation failed");
            return exit_code(&e);
        }
    };

    // 6. Report.
    report(&summary)
}

/// Load configuration from the `--config` path, falling back to defaults if
/// the file does not exist, then apply command-line overrides.
fn load_config(args: &Args) -> Result<GeneratorConfig, GeneratorError> {
    let mut config = if args.config.exists() {
        GeneratorConfig::from_file(&args.config)?
    } else {
        info!(config = %args.config.display(), "Config file not found, using defaults");
        let mut config = GeneratorConfig {
            base_dir: Path::new(".").to_path_buf(),
            ..GeneratorConfig::default()
        };
        config.apply_env_overrides()?;
        config
    };

    if let Some(population) = args.population {
        config.generate.population_size = population;
    }
    if let Some(seed) = args.seed {
        config.generate.seed = Some(seed);
    }
    if let Some(workers) = args.workers {
        config.generate.workers = Some(workers);
    }
    config.validate()?;
    Ok(config)
}

fn exit_code(error: &GeneratorError) -> ExitCode {
    match error {
        GeneratorError::Config { .. } | GeneratorError::Demographics { .. } => {
            ExitCode::from(EXIT_CONFIG)
        }
        GeneratorError::Pool { .. }
        | GeneratorError::Output { .. }
        | GeneratorError::Write { .. } => ExitCode::from(EXIT_ABORTED),
    }
}

fn report(summary: &RunSummary) -> ExitCode {
    if summary.aborted {
        if let Some(failure) = &summary.first_error {
            error!(
                generated = summary.generated,
                failed = summary.failed,
                error = %failure,
                "Run aborted"
            );
        }
        return ExitCode::from(EXIT_ABORTED);
    }
    if let Some(failure) = &summary.first_error {
        warn!(
            failed = summary.failed,
            first_error = %failure,
            "Some patients were skipped"
        );
    }
    info!(generated = summary.generated, "synthpop-generator finished");
    ExitCode::SUCCESS
}
