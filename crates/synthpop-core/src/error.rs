//! Error types for the simulation core.
//!
//! Two families exist, mirroring when they can occur:
//!
//! - [`ConfigError`] -- raised while loading the configuration file or the
//!   rule tables, before any patient is generated. Always fatal for the run.
//! - [`SimulationError`] -- raised while simulating one patient. Fatal for
//!   that patient only; the caller decides whether the run continues.

use std::path::PathBuf;

use synthpop_types::AgeRangeError;

use crate::amend::AmendError;
use crate::sampler::SampleError;

/// Errors raised while loading configuration or rule tables.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`GeneratorConfig`].
    ///
    /// [`GeneratorConfig`]: crate::config::GeneratorConfig
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// A rule table could not be read as CSV.
    #[error("module {module}: malformed CSV: {source}")]
    Csv {
        /// Module whose table failed.
        module: String,
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// The configured age-range sequence is invalid.
    #[error("invalid age ranges: {source}")]
    AgeRanges {
        /// The underlying age-range error.
        #[from]
        source: AgeRangeError,
    },

    /// A rule table has no `type` column.
    #[error("module {module}: missing required column {column:?}")]
    MissingColumn {
        /// Module whose table failed.
        module: String,
        /// The missing column name.
        column: &'static str,
    },

    /// A rule table declares no state columns.
    #[error("module {module}: no state columns declared")]
    NoStates {
        /// Module whose table failed.
        module: String,
    },

    /// The same state is declared twice.
    #[error("module {module}: duplicate state {state:?}")]
    DuplicateState {
        /// Module whose table failed.
        module: String,
        /// The repeated state.
        state: String,
    },

    /// A row's `type` cell is not a known row kind.
    #[error("module {module}, row {row}: unknown row type {kind:?}")]
    UnknownRowKind {
        /// Module whose table failed.
        module: String,
        /// One-based data row number.
        row: usize,
        /// The unrecognised type text.
        kind: String,
    },

    /// A row does not carry one weight per state.
    #[error("module {module}, row {row}: expected {expected} weights, found {found}")]
    WeightCount {
        /// Module whose table failed.
        module: String,
        /// One-based data row number.
        row: usize,
        /// Number of declared states.
        expected: usize,
        /// Number of weights on the row.
        found: usize,
    },

    /// A weight is not a finite, non-negative number.
    #[error("module {module}, row {row}: invalid weight {value:?}")]
    InvalidWeight {
        /// Module whose table failed.
        module: String,
        /// One-based data row number.
        row: usize,
        /// The offending cell text.
        value: String,
    },

    /// A probability row has no positive weight and cannot be normalized.
    #[error("module {module}, row {row}: {kind} row has no positive weight")]
    ZeroRow {
        /// Module whose table failed.
        module: String,
        /// The probability row kind.
        kind: &'static str,
        /// One-based data row number.
        row: usize,
    },

    /// A modifier row has no variable to test.
    #[error("module {module}, row {row}: modifier row has no variable")]
    MissingVariable {
        /// Module whose table failed.
        module: String,
        /// One-based data row number.
        row: usize,
    },

    /// A `>`/`<` comparator threshold is not an integer.
    #[error("module {module}, row {row}: numeric comparator threshold {value:?} is not an integer")]
    InvalidThreshold {
        /// Module whose table failed.
        module: String,
        /// One-based data row number.
        row: usize,
        /// The offending value cell.
        value: String,
    },

    /// An initial-probability row has no age-range label.
    #[error("module {module}, row {row}: initial probability row has no age range")]
    MissingAgeRange {
        /// Module whose table failed.
        module: String,
        /// One-based data row number.
        row: usize,
    },

    /// A required row kind is absent.
    #[error("module {module}: no {kind} rows")]
    MissingRowKind {
        /// Module whose table failed.
        module: String,
        /// The absent row kind.
        kind: &'static str,
    },

    /// A matrix row kind does not have one row per state.
    #[error("module {module}: expected {expected} {kind} rows, found {found}")]
    MatrixShape {
        /// Module whose table failed.
        module: String,
        /// The matrix row kind.
        kind: &'static str,
        /// Number of declared states.
        expected: usize,
        /// Number of rows present.
        found: usize,
    },

    /// No initial-probability row matches an age range.
    #[error("module {module}: no initial probability row for age range {age_range:?}")]
    NoInitialRow {
        /// Module whose table was queried.
        module: String,
        /// The requested label.
        age_range: String,
    },

    /// More than one initial-probability row matches an age range.
    #[error("module {module}: multiple initial probability rows for age range {age_range:?}")]
    AmbiguousInitialRow {
        /// Module whose table failed.
        module: String,
        /// The duplicated label.
        age_range: String,
    },

    /// An initial-probability row names an age range that is not configured.
    #[error("module {module}: initial probability row for unknown age range {age_range:?}")]
    UnknownAgeRange {
        /// Module whose table failed.
        module: String,
        /// The unknown label.
        age_range: String,
    },

    /// Two configured modules share a name.
    #[error("duplicate module name {module:?}")]
    DuplicateModule {
        /// The repeated module name.
        module: String,
    },

    /// A configuration value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors raised while simulating a single patient.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Amending a module's probabilities failed.
    #[error("module {module} at age range {age_range}: {source}")]
    Amend {
        /// The module being evaluated.
        module: String,
        /// The age range being simulated.
        age_range: String,
        /// The underlying amendment error.
        source: AmendError,
    },

    /// Drawing a module state failed.
    #[error("module {module} at age range {age_range}: {source}")]
    Sample {
        /// The module being evaluated.
        module: String,
        /// The age range being simulated.
        age_range: String,
        /// The underlying sampling error.
        source: SampleError,
    },

    /// The patient's starting age range is not in the configured sequence.
    #[error("starting age range {age_range:?} is not configured")]
    UnknownAgeRange {
        /// The unknown label.
        age_range: String,
    },

    /// A rule table lookup failed during simulation.
    #[error("rule table error: {source}")]
    Rules {
        /// The underlying table error.
        #[from]
        source: ConfigError,
    },
}
