//! Rule tables, probability amendment, and the patient timeline engine.
//!
//! This crate owns the trajectory simulation: for one patient it walks the
//! configured age ranges and, for every module, selects a state from
//! probability tables re-weighted by the patient's fixed attributes and by
//! the module states already produced in the current and previous age range.
//!
//! It performs no output and reads files only when asked to load
//! configuration or rule tables.
//!
//! # Modules
//!
//! - [`amend`] -- Conditional multiply-then-renormalize of vectors and
//!   matrices.
//! - [`config`] -- Configuration loading from `synthpop-config.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- [`ConfigError`] and [`SimulationError`].
//! - [`module_state`] -- Per-patient, per-module carried state.
//! - [`orchestrator`] -- Demographics in, complete patient out.
//! - [`rulebook`] -- The ordered set of module rule tables.
//! - [`rules`] -- One module's rule table, decoded from CSV.
//! - [`sampler`] -- Weighted categorical draws.
//! - [`timeline`] -- The age-range loop.

pub mod amend;
pub mod config;
pub mod error;
pub mod module_state;
pub mod orchestrator;
pub mod rulebook;
pub mod rules;
pub mod sampler;
pub mod timeline;

pub use config::GeneratorConfig;
pub use error::{ConfigError, SimulationError};
pub use module_state::ModuleState;
pub use orchestrator::PatientOrchestrator;
pub use rulebook::{ModuleHandle, RuleBook};
pub use rules::RuleTable;
pub use timeline::{EngineOptions, TimelineEngine};
