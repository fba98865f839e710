//! Shared read-only inputs of a run.

use synthpop_core::{GeneratorConfig, RuleBook};
use synthpop_demographics::{DemographicsTable, DeprivationTable};
use synthpop_types::AgeRanges;
use tracing::info;

use crate::error::GeneratorError;

/// Everything loaded from disk before the first patient: the age-range
/// sequence, the module rule tables and the demographic tables.
///
/// Shared by reference with every worker and never modified.
#[derive(Debug, Clone)]
pub struct GenerationInputs {
    /// The ordered age-range sequence.
    pub age_ranges: AgeRanges,
    /// Module rule tables in configured order.
    pub rules: RuleBook,
    /// Population counts to sample demographics from.
    pub demographics: DemographicsTable,
    /// Deprivation score per area.
    pub deprivation: DeprivationTable,
}

impl GenerationInputs {
    /// Load every table named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Config`] for a bad rule table and
    /// [`GeneratorError::Demographics`] for a bad demographic or deprivation
    /// table.
    pub fn load(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let age_ranges = config.age_ranges.clone();
        let rules = RuleBook::load(&config.modules, |path| config.resolve(path), &age_ranges)?;

        let demographics_path = config.resolve(&config.data.demographics);
        let demographics = DemographicsTable::from_path(&demographics_path, &age_ranges)?;
        info!(
            path = %demographics_path.display(),
            groups = demographics.rows().len(),
            "demographic table loaded"
        );

        let deprivation_path = config.resolve(&config.data.deprivation);
        let deprivation =
            DeprivationTable::from_path(&deprivation_path, &config.data.deprivation_column)?;
        info!(
            path = %deprivation_path.display(),
            areas = deprivation.len(),
            mean = deprivation.mean(),
            "deprivation table loaded"
        );

        Ok(Self {
            age_ranges,
            rules,
            demographics,
            deprivation,
        })
    }
}
