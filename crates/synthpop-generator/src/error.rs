//! Error types for the generator.
//!
//! [`GeneratorError`] covers everything that stops a run: configuration,
//! input tables, the worker pool and the output files. [`PatientError`] is a
//! single patient's failure; whether it stops the run is decided by the
//! configured error policy.

use std::path::PathBuf;

use synthpop_core::{ConfigError, SimulationError};
use synthpop_demographics::DemographicsError;

/// Top-level error for a generation run.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Configuration or rule table loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// A demographic or deprivation table could not be loaded.
    #[error("demographics error: {source}")]
    Demographics {
        /// The underlying demographics error.
        #[from]
        source: DemographicsError,
    },

    /// The worker pool could not be started.
    #[error("worker pool error: {source}")]
    Pool {
        /// The underlying pool build error.
        #[from]
        source: rayon::ThreadPoolBuildError,
    },

    /// An output file or directory could not be created.
    #[error("failed to create {path}: {source}")]
    Output {
        /// The path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing an output record failed.
    #[error("failed to write output: {source}")]
    Write {
        /// The underlying CSV error.
        #[from]
        source: csv::Error,
    },
}

/// Why one patient could not be generated.
#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    /// Demographic sampling failed.
    #[error(transparent)]
    Demographics(#[from] DemographicsError),

    /// Timeline simulation failed.
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// A failed patient and its position in the run.
#[derive(Debug, thiserror::Error)]
#[error("patient {index}: {error}")]
pub struct PatientFailure {
    /// Zero-based patient index (its seed offset).
    pub index: u64,
    /// What went wrong.
    #[source]
    pub error: PatientError,
}
