//! The ordered collection of every configured module's rule table.
//!
//! Module order is configuration order, which is also evaluation order
//! within an age range and column order in the output. A module is
//! addressed by a [`ModuleHandle`] (its position), never by re-scanning
//! names during simulation.

use std::path::{Path, PathBuf};

use synthpop_types::AgeRanges;
use tracing::info;

use crate::config::ModuleSource;
use crate::error::ConfigError;
use crate::rules::RuleTable;

/// Stable index of a module within a [`RuleBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleHandle(usize);

impl ModuleHandle {
    /// Position of the module in evaluation order.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Immutable, validated rule tables for all modules.
///
/// Built once before generation and shared read-only by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBook {
    tables: Vec<RuleTable>,
}

impl RuleBook {
    /// Assemble a rule book from already loaded tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateModule`] if two tables share a module
    /// name, or [`ConfigError::UnknownAgeRange`] if a table has an initial
    /// probability row for a label that is not in `age_ranges`.
    pub fn new(tables: Vec<RuleTable>, age_ranges: &AgeRanges) -> Result<Self, ConfigError> {
        for (i, table) in tables.iter().enumerate() {
            if tables.iter().take(i).any(|t| t.module() == table.module()) {
                return Err(ConfigError::DuplicateModule {
                    module: table.module().to_owned(),
                });
            }
            if let Some(label) = table
                .initial_age_ranges()
                .find(|label| !age_ranges.contains(label))
            {
                return Err(ConfigError::UnknownAgeRange {
                    module: table.module().to_owned(),
                    age_range: label.to_owned(),
                });
            }
        }
        Ok(Self { tables })
    }

    /// Load every configured module's table, resolving relative paths with
    /// `resolve`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised by a table or by
    /// [`RuleBook::new`].
    pub fn load<F>(
        sources: &[ModuleSource],
        resolve: F,
        age_ranges: &AgeRanges,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&Path) -> PathBuf,
    {
        let tables = sources
            .iter()
            .map(|source| {
                let path = resolve(&source.path);
                let table = RuleTable::from_path(&source.name, &path)?;
                info!(
                    module = %source.name,
                    path = %path.display(),
                    states = table.states().len(),
                    "rule table loaded"
                );
                Ok(table)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(tables, age_ranges)
    }

    /// Table behind a handle.
    pub fn get(&self, handle: ModuleHandle) -> Option<&RuleTable> {
        self.tables.get(handle.0)
    }

    /// Handle of a module by name.
    pub fn handle(&self, module: &str) -> Option<ModuleHandle> {
        self.tables
            .iter()
            .position(|t| t.module() == module)
            .map(ModuleHandle)
    }

    /// Tables with their handles, in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleHandle, &RuleTable)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, table)| (ModuleHandle(i), table))
    }

    /// Module names in evaluation order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(RuleTable::module)
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no module is configured.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
