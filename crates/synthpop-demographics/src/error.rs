//! Error types for the `synthpop-demographics` crate.

use std::path::PathBuf;

use rand::distr::weighted::Error as WeightError;

/// Errors raised while loading demographic tables or sampling from them.
#[derive(Debug, thiserror::Error)]
pub enum DemographicsError {
    /// A table file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A table is not well-formed CSV.
    #[error("malformed CSV: {source}")]
    Csv {
        /// The underlying CSV error.
        #[from]
        source: csv::Error,
    },

    /// A required column is absent.
    #[error("missing required column {column:?}")]
    MissingColumn {
        /// The missing column name.
        column: String,
    },

    /// A count or score cell is not a usable number.
    #[error("row {row}, column {column:?}: invalid number {value:?}")]
    InvalidNumber {
        /// One-based data row number.
        row: usize,
        /// The column of the bad cell.
        column: String,
        /// The offending cell text.
        value: String,
    },

    /// A table has no data rows.
    #[error("{table} table has no rows")]
    Empty {
        /// Which table.
        table: &'static str,
    },

    /// A selection found nothing to choose from.
    #[error("no {what} to choose for {key}")]
    NoCandidates {
        /// What was being selected.
        what: &'static str,
        /// The selection key (region, area, ...).
        key: String,
    },

    /// The candidate weights cannot define a distribution.
    #[error("cannot choose {what}: {source}")]
    InvalidWeights {
        /// What was being selected.
        what: &'static str,
        /// The underlying distribution error.
        source: WeightError,
    },

    /// A date of birth cannot be placed relative to the reference date.
    #[error("age range {age_range} cannot be dated from {reference}")]
    DateOutOfRange {
        /// The selected age range.
        age_range: String,
        /// The reference date.
        reference: chrono::NaiveDate,
    },
}
