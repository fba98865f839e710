//! Shared type definitions for the synthetic population generator.
//!
//! This crate is the single source of truth for the data that flows between
//! the simulation core, the demographic samplers, and the output writers.
//! It performs no I/O and holds no randomness.
//!
//! # Modules
//!
//! - [`age`] -- Age-range labels and the ordered age-range sequence
//! - [`context`] -- Flat variable maps used to evaluate modifier conditions
//! - [`ids`] -- Patient identifier wrapper
//! - [`patient`] -- Demographics, timeline records, and the finished patient

pub mod age;
pub mod context;
pub mod ids;
pub mod patient;

// Re-export all public types at crate root for convenience.
pub use age::{AgeRange, AgeRangeError, AgeRanges, OPEN_ENDED_MAX_AGE};
pub use context::{AGE_RANGE_KEY, Context};
pub use ids::PatientId;
pub use patient::{Demographics, Patient, TimelineRecord};
