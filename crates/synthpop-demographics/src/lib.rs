//! Demographic sampling, deprivation matching, and patient identifiers.
//!
//! Everything a patient needs before the timeline engine runs: where they
//! live, who they are, how old they are, how deprived their area is, and
//! what they are called.
//!
//! # Modules
//!
//! - [`deprivation`] -- Area deprivation scores with a mean fallback.
//! - [`error`] -- [`DemographicsError`].
//! - [`ids`] -- NHI and numeric identifier generators.
//! - [`sampler`] -- Weighted demographic draws.
//! - [`table`] -- The population count table the sampler draws from.

pub mod deprivation;
pub mod error;
pub mod ids;
pub mod sampler;
pub mod table;

pub use deprivation::DeprivationTable;
pub use error::DemographicsError;
pub use ids::{IdGenerator, NhiGenerator, NumericIdGenerator, validate_nhi};
pub use sampler::DemographicSampler;
pub use table::{DemographicRow, DemographicsTable};
