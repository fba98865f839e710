//! Configuration loading and typed config structures for the generator.
//!
//! The canonical configuration lives in `synthpop-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, a loader
//! that reads and validates the file, and environment overrides for the
//! values operators most often change between runs.
//!
//! The loaded [`GeneratorConfig`] is immutable and passed by reference into
//! the orchestrator and the engine; nothing in the simulation reads ambient
//! process state.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use synthpop_types::AgeRanges;

use crate::error::ConfigError;

/// Environment variable overriding `generate.population_size`.
pub const POPULATION_SIZE_ENV: &str = "SYNTHPOP_POPULATION_SIZE";

/// Environment variable overriding `generate.seed`.
pub const SEED_ENV: &str = "SYNTHPOP_SEED";

/// Top-level generator configuration.
///
/// Mirrors the structure of `synthpop-config.yaml`. All fields have
/// defaults, so an empty file is a valid (if not very useful) config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GeneratorConfig {
    /// Population size, seeding, and identifier settings.
    #[serde(default)]
    pub generate: GenerateConfig,

    /// Demographic and deprivation input tables.
    #[serde(default)]
    pub data: DataConfig,

    /// The ordered age-range sequence (youngest first).
    #[serde(default)]
    pub age_ranges: AgeRanges,

    /// Simulated modules, in output column order.
    #[serde(default)]
    pub modules: Vec<ModuleSource>,

    /// Output location.
    #[serde(default)]
    pub output: OutputConfig,

    /// Engine behaviour switches.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl GeneratorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Relative paths inside the file are resolved against the file's
    /// directory. Environment variables override YAML values:
    /// - `SYNTHPOP_POPULATION_SIZE` overrides `generate.population_size`
    /// - `SYNTHPOP_SEED` overrides `generate.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if an override or value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&contents)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// No environment overrides are applied and relative paths resolve
    /// against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to a value that
    /// does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Override values using `lookup` in place of the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a looked-up value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(POPULATION_SIZE_ENV) {
            self.generate.population_size =
                value.trim().parse().map_err(|_e| ConfigError::Invalid {
                    field: "generate.population_size",
                    reason: format!("{POPULATION_SIZE_ENV}={value:?} is not a count"),
                })?;
        }
        if let Some(value) = lookup(SEED_ENV) {
            self.generate.seed = Some(value.trim().parse().map_err(|_e| ConfigError::Invalid {
                field: "generate.seed",
                reason: format!("{SEED_ENV}={value:?} is not an unsigned integer"),
            })?);
        }
        Ok(())
    }

    /// Check values that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero worker count, or
    /// [`ConfigError::DuplicateModule`] if two modules share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generate.workers == Some(0) {
            return Err(ConfigError::Invalid {
                field: "generate.workers",
                reason: String::from("must be at least 1"),
            });
        }
        for (i, module) in self.modules.iter().enumerate() {
            if module.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "modules.name",
                    reason: String::from("module names must not be empty"),
                });
            }
            if self.modules.iter().take(i).any(|m| m.name == module.name) {
                return Err(ConfigError::DuplicateModule {
                    module: module.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve a configured path against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Population size, seeding, and identifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateConfig {
    /// Number of patients to produce.
    #[serde(default = "default_population_size")]
    pub population_size: u32,

    /// Base random seed. Patient *i* is simulated with `seed + i`; without
    /// a seed every run draws a fresh one.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Worker threads (defaults to the available parallelism).
    #[serde(default)]
    pub workers: Option<usize>,

    /// Identifier format for generated patients.
    #[serde(default)]
    pub id_scheme: IdScheme,

    /// Date ages and dates of birth are computed against (defaults to today).
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            seed: None,
            workers: None,
            id_scheme: IdScheme::default(),
            reference_date: None,
        }
    }
}

/// Identifier format for generated patients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// New Zealand National Health Index style: `ABC1234` with check digit.
    #[default]
    Nhi,
    /// Seven random decimal digits.
    Numeric,
}

/// Demographic and deprivation input tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataConfig {
    /// Population counts by region, area, ethnicity, gender and age range.
    #[serde(default = "default_demographics_path")]
    pub demographics: PathBuf,

    /// Deprivation score per area.
    #[serde(default = "default_deprivation_path")]
    pub deprivation: PathBuf,

    /// Name of the score column in the deprivation table.
    #[serde(default = "default_deprivation_column")]
    pub deprivation_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            demographics: default_demographics_path(),
            deprivation: default_deprivation_path(),
            deprivation_column: default_deprivation_column(),
        }
    }
}

/// One simulated module and the rule table that drives it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleSource {
    /// Module name; also its output column and context variable name.
    pub name: String,
    /// Path of the module's CSV rule table.
    pub path: PathBuf,
}

/// Output location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `patients.csv` and `timelines.csv`.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Which age ranges a patient timeline covers.
    #[serde(default)]
    pub span: TimelineSpan,

    /// Whether static modifiers also personalise each module's transition
    /// matrix once, when the patient's module state is created.
    #[serde(default = "default_true")]
    pub static_modifiers_amend_transitions: bool,

    /// What a failed patient does to the rest of the run.
    #[serde(default)]
    pub on_patient_error: PatientErrorPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            span: TimelineSpan::default(),
            static_modifiers_amend_transitions: true,
            on_patient_error: PatientErrorPolicy::default(),
        }
    }
}

/// Which age ranges a patient timeline covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineSpan {
    /// From the starting age range (inclusive) to the oldest range.
    #[default]
    FromStart,
    /// From the youngest range up to the starting age range (inclusive):
    /// the patient's lived history.
    UpToStart,
}

impl TimelineSpan {
    /// Indices of the visited age ranges, given
    /// `start_index = position(starting age range) + 1` and the number of
    /// configured ranges.
    pub fn bounds(self, start_index: usize, len: usize) -> core::ops::Range<usize> {
        match self {
            Self::FromStart => start_index.saturating_sub(1).min(len)..len,
            Self::UpToStart => 0..start_index.min(len),
        }
    }
}

/// What a failed patient does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientErrorPolicy {
    /// Report the failure, drop the patient, keep generating.
    #[default]
    SkipPatient,
    /// Stop submitting patients and fail the run.
    AbortRun,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_population_size() -> u32 {
    10
}

fn default_demographics_path() -> PathBuf {
    PathBuf::from("data/nz/demographics.csv")
}

fn default_deprivation_path() -> PathBuf {
    PathBuf::from("data/nz/deprivation.csv")
}

fn default_deprivation_column() -> String {
    String::from("NZDep2018")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
generate:
  population_size: 250
  seed: 42
  workers: 3
  id_scheme: numeric
  reference_date: 2024-06-30

data:
  demographics: tables/demo.csv
  deprivation: tables/dep.csv
  deprivation_column: Score

age_ranges: [0_17, 18_64, 65_]

modules:
  - name: smoking
    path: modules/smoking.csv
  - name: diabetes
    path: modules/diabetes.csv

output:
  directory: out

simulation:
  span: up_to_start
  static_modifiers_amend_transitions: false
  on_patient_error: abort_run
";
        let config = GeneratorConfig::parse(yaml).unwrap();
        assert_eq!(config.generate.population_size, 250);
        assert_eq!(config.generate.seed, Some(42));
        assert_eq!(config.generate.workers, Some(3));
        assert_eq!(config.generate.id_scheme, IdScheme::Numeric);
        assert_eq!(
            config.generate.reference_date,
            NaiveDate::from_ymd_opt(2024, 6, 30)
        );
        assert_eq!(config.data.deprivation_column, "Score");
        assert_eq!(config.age_ranges.len(), 3);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[1].name, "diabetes");
        assert_eq!(config.output.directory, PathBuf::from("out"));
        assert_eq!(config.simulation.span, TimelineSpan::UpToStart);
        assert!(!config.simulation.static_modifiers_amend_transitions);
        assert_eq!(
            config.simulation.on_patient_error,
            PatientErrorPolicy::AbortRun
        );
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = GeneratorConfig::parse("generate:\n  population_size: 7\n").unwrap();
        assert_eq!(config.generate.population_size, 7);
        // Everything else uses defaults
        assert_eq!(config.age_ranges, AgeRanges::standard());
        assert_eq!(config.generate.id_scheme, IdScheme::Nhi);
        assert_eq!(config.simulation, SimulationConfig::default());
        assert!(config.modules.is_empty());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = GeneratorConfig::parse("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn reject_unordered_age_ranges() {
        assert!(matches!(
            GeneratorConfig::parse("age_ranges: [5_9, 0_4]\n"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn overrides_replace_yaml_values() {
        let mut config = GeneratorConfig::parse("generate:\n  population_size: 7\n").unwrap();
        let vars: BTreeMap<&str, &str> = [(POPULATION_SIZE_ENV, "1000"), (SEED_ENV, "9")]
            .into_iter()
            .collect();
        config
            .apply_overrides(|name| vars.get(name).map(|v| (*v).to_owned()))
            .unwrap();
        assert_eq!(config.generate.population_size, 1000);
        assert_eq!(config.generate.seed, Some(9));
    }

    #[test]
    fn bad_override_is_reported() {
        let mut config = GeneratorConfig::default();
        let result = config.apply_overrides(|name| {
            (name == POPULATION_SIZE_ENV).then(|| String::from("lots"))
        });
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "generate.population_size",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_duplicates_and_zero_workers() {
        let duplicate = GeneratorConfig::parse(
            "modules:\n  - {name: smoking, path: a.csv}\n  - {name: smoking, path: b.csv}\n",
        )
        .unwrap();
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::DuplicateModule { .. })
        ));

        let zero = GeneratorConfig::parse("generate:\n  workers: 0\n").unwrap();
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let mut config = GeneratorConfig::default();
        config.base_dir = PathBuf::from("/etc/synthpop");
        assert_eq!(
            config.resolve(Path::new("data/x.csv")),
            PathBuf::from("/etc/synthpop/data/x.csv")
        );
        assert_eq!(
            config.resolve(Path::new("/abs/x.csv")),
            PathBuf::from("/abs/x.csv")
        );
    }

    #[test]
    fn span_bounds() {
        // start_index is position + 1: "10_14" sits at position 2.
        assert_eq!(TimelineSpan::FromStart.bounds(3, 18), 2..18);
        assert_eq!(TimelineSpan::UpToStart.bounds(3, 18), 0..3);
        assert_eq!(TimelineSpan::FromStart.bounds(18, 18), 17..18);
        assert_eq!(TimelineSpan::UpToStart.bounds(30, 18), 0..18);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("synthpop-config.yaml");
        if path.exists() {
            let config = GeneratorConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
