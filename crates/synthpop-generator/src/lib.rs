//! Population generation around the simulation core.
//!
//! Loads the input tables named by the configuration, runs patients on a
//! worker pool, and streams finished patients to an output sink.
//!
//! # Modules
//!
//! - [`error`] -- [`GeneratorError`] and per-patient failures
//! - [`inputs`] -- Rule tables and demographic tables shared by all workers
//! - [`output`] -- The [`RecordSink`] trait and the CSV writer
//! - [`pool`] -- Seeded per-patient tasks on a rayon pool

pub mod error;
pub mod inputs;
pub mod output;
pub mod pool;

pub use error::{GeneratorError, PatientError, PatientFailure};
pub use inputs::GenerationInputs;
pub use output::{CsvSink, MemorySink, RecordSink};
pub use pool::{RunOptions, RunSummary, StopFlag, generate_patient, run, run_population};
