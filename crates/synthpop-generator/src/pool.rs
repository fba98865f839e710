//! Parallel population generation.
//!
//! Patients are independent, so patient indices are a parallel iterator on a
//! fixed-size rayon pool. Workers send finished patients (or their failures)
//! over a bounded crossbeam channel to the calling thread, which is the only
//! writer. A full channel blocks the workers, so a slow writer holds back
//! generation instead of letting results pile up.
//!
//! # Reproducibility
//!
//! Patient `i` draws everything (identifier, demographics, timeline) from
//! its own `ChaCha8Rng` seeded with `base_seed + i`. The same base seed
//! therefore yields the same patients regardless of worker count or
//! completion order; only the order of output rows may differ.
//!
//! # Cancellation
//!
//! A [`StopFlag`] is checked before each patient starts. Once it is raised no new
//! patient is started; patients already in flight finish and are written.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{Local, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use synthpop_core::config::{IdScheme, PatientErrorPolicy};
use synthpop_core::{EngineOptions, GeneratorConfig, PatientOrchestrator};
use synthpop_demographics::{DemographicSampler, IdGenerator, NhiGenerator, NumericIdGenerator};
use synthpop_types::{Patient, PatientId};
use tracing::{debug, info, warn};

use crate::error::{GeneratorError, PatientError, PatientFailure};
use crate::inputs::GenerationInputs;
use crate::output::{CsvSink, RecordSink};

/// Finished patients buffered per worker before workers wait on the writer.
const CHANNEL_SLOTS_PER_WORKER: usize = 16;

/// Shared coarse cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// A lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop starting new patients.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Resolved settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Number of patients to generate.
    pub population: u32,
    /// Seed of patient 0; patient `i` uses `base_seed + i`.
    pub base_seed: u64,
    /// Worker threads.
    pub workers: usize,
    /// Identifier format.
    pub id_scheme: IdScheme,
    /// Date ages are computed against.
    pub reference_date: NaiveDate,
    /// Timeline engine switches.
    pub engine: EngineOptions,
    /// What a failed patient does to the run.
    pub on_patient_error: PatientErrorPolicy,
    /// Print each written patient on stdout.
    pub display: bool,
}

impl RunOptions {
    /// Resolve options from configuration, filling the unset ones: a fresh
    /// random seed, one worker per available core, and today's date.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        let generate = &config.generate;
        Self {
            population: generate.population_size,
            base_seed: generate.seed.unwrap_or_else(|| rand::rng().random()),
            workers: generate.workers.unwrap_or_else(default_workers),
            id_scheme: generate.id_scheme,
            reference_date: generate
                .reference_date
                .unwrap_or_else(|| Local::now().date_naive()),
            engine: EngineOptions::from(&config.simulation),
            on_patient_error: config.simulation.on_patient_error,
            display: false,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Patients written to the sink.
    pub generated: u64,
    /// Patients that failed.
    pub failed: u64,
    /// The first failure received, if any.
    pub first_error: Option<PatientFailure>,
    /// Whether a failure stopped the run under the `abort_run` policy.
    pub aborted: bool,
}

/// Identifier generator selected by [`IdScheme`].
#[derive(Debug, Clone, Copy)]
pub enum PatientIds {
    /// NHI-style identifiers.
    Nhi(NhiGenerator),
    /// Seven-digit numeric identifiers.
    Numeric(NumericIdGenerator),
}

impl From<IdScheme> for PatientIds {
    fn from(scheme: IdScheme) -> Self {
        match scheme {
            IdScheme::Nhi => Self::Nhi(NhiGenerator),
            IdScheme::Numeric => Self::Numeric(NumericIdGenerator),
        }
    }
}

impl IdGenerator for PatientIds {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> PatientId {
        match self {
            Self::Nhi(ids) => ids.generate(rng),
            Self::Numeric(ids) => ids.generate(rng),
        }
    }
}

enum Outcome {
    Generated(Patient),
    Failed(PatientFailure),
}

/// Generate patient `index` of a run.
///
/// Depends only on the inputs, the options and `index`.
///
/// # Errors
///
/// Returns [`PatientError`] if demographic sampling or the timeline fails.
pub fn generate_patient(
    inputs: &GenerationInputs,
    options: &RunOptions,
    index: u64,
) -> Result<Patient, PatientError> {
    let mut rng = ChaCha8Rng::seed_from_u64(options.base_seed.wrapping_add(index));
    let id = PatientIds::from(options.id_scheme).generate(&mut rng);
    let demographics = DemographicSampler::new(&inputs.demographics, &inputs.deprivation)
        .sample(options.reference_date, &mut rng)?;
    let orchestrator = PatientOrchestrator::new(&inputs.rules, &inputs.age_ranges, options.engine);
    Ok(orchestrator.generate(id, demographics, &mut rng)?)
}

/// Generate the population on a worker pool, writing each finished patient
/// to `sink` from the calling thread.
///
/// Failed patients are counted and logged. Under
/// [`PatientErrorPolicy::AbortRun`] the first failure raises `stop`.
///
/// # Errors
///
/// Returns [`GeneratorError::Pool`] if the pool cannot start, or the first
/// sink error. Patient failures are reported in the [`RunSummary`] instead.
pub fn run_population<S: RecordSink + ?Sized>(
    inputs: &GenerationInputs,
    options: &RunOptions,
    sink: &mut S,
    stop: &StopFlag,
) -> Result<RunSummary, GeneratorError> {
    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .thread_name(|i| format!("synthpop-worker-{i}"))
        .build()?;
    let capacity = options
        .workers
        .saturating_mul(CHANNEL_SLOTS_PER_WORKER)
        .max(1);
    let (tx, rx) = crossbeam_channel::bounded::<Outcome>(capacity);

    info!(
        population = options.population,
        workers = options.workers,
        base_seed = options.base_seed,
        reference_date = %options.reference_date,
        "generation starting"
    );

    let mut summary = RunSummary::default();
    let mut write_error = None;

    pool.in_place_scope(|scope| {
        // Indices are split lazily across the pool, so outstanding work stays
        // near the worker count whatever the population size.
        scope.spawn(move |_| {
            (0..u64::from(options.population))
                .into_par_iter()
                .for_each_with(tx, |tx, index| {
                    if stop.is_stop_requested() {
                        return;
                    }
                    let outcome = match generate_patient(inputs, options, index) {
                        Ok(patient) => Outcome::Generated(patient),
                        Err(error) => Outcome::Failed(PatientFailure { index, error }),
                    };
                    if tx.send(outcome).is_err() {
                        debug!(patient = index, "writer gone, result dropped");
                    }
                });
        });

        for outcome in &rx {
            match outcome {
                Outcome::Generated(patient) => {
                    if write_error.is_some() {
                        continue;
                    }
                    if let Err(e) = sink.write_patient(&patient) {
                        stop.request_stop();
                        write_error = Some(e);
                        continue;
                    }
                    summary.generated = summary.generated.saturating_add(1);
                    if options.display {
                        println!("{patient}");
                    }
                }
                Outcome::Failed(failure) => {
                    summary.failed = summary.failed.saturating_add(1);
                    warn!(patient = failure.index, error = %failure.error, "patient failed");
                    if options.on_patient_error == PatientErrorPolicy::AbortRun && !summary.aborted
                    {
                        stop.request_stop();
                        summary.aborted = true;
                    }
                    if summary.first_error.is_none() {
                        summary.first_error = Some(failure);
                    }
                }
            }
        }
    });

    if let Some(e) = write_error {
        return Err(e);
    }
    sink.finish()?;

    info!(
        generated = summary.generated,
        failed = summary.failed,
        aborted = summary.aborted,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "generation finished"
    );
    Ok(summary)
}

/// Load inputs, open the CSV output configured in `config`, and generate
/// the population into it.
///
/// # Errors
///
/// Returns [`GeneratorError`] if an input table cannot be loaded, the output
/// cannot be created, or the run fails as in [`run_population`].
pub fn run(
    config: &GeneratorConfig,
    options: &RunOptions,
    stop: &StopFlag,
) -> Result<RunSummary, GeneratorError> {
    let inputs = GenerationInputs::load(config)?;
    let directory = config.resolve(&config.output.directory);
    let mut sink = CsvSink::create(&directory, inputs.rules.module_names())?;
    info!(directory = %directory.display(), "output opened");
    run_population(&inputs, options, &mut sink, stop)
}
