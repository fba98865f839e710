//! Patients, their demographic attributes and their timelines.
//!
//! A [`Patient`] is created once per generation request. Its timeline is
//! filled by the simulation engine, one [`TimelineRecord`] per visited age
//! range in chronological order, and is never modified afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::age::AgeRange;
use crate::context::Context;
use crate::ids::PatientId;

/// Demographic attributes fixed at patient creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    /// Region (e.g. a health district).
    pub region: String,
    /// Area within the region.
    pub area: String,
    /// Ethnicity group.
    pub ethnicity: String,
    /// Gender as labelled in the demographic table.
    pub gender: String,
    /// The patient's current (starting) age range.
    pub age_range: AgeRange,
    /// Date of birth.
    pub dob: NaiveDate,
    /// Age in whole years at the generation reference date.
    pub age: u32,
    /// Deprivation score of the patient's area.
    pub deprivation_level: i64,
}

impl Demographics {
    /// Build the static context used for one-time amendments.
    ///
    /// Variable names match the column names of the patient output so that
    /// rule tables can refer to any attribute that is persisted.
    pub fn to_context(&self, id: &PatientId) -> Context {
        let mut context = Context::new();
        context.insert("id", id.as_str());
        context.insert("region", self.region.as_str());
        context.insert("area", self.area.as_str());
        context.insert("ethnicity", self.ethnicity.as_str());
        context.insert("gender", self.gender.as_str());
        context.insert("age_range", self.age_range.label());
        context.insert("dob", self.dob.to_string());
        context.insert("age", self.age.to_string());
        context.insert("deprivation_level", self.deprivation_level.to_string());
        context
    }
}

/// The resolved module states for one age range.
///
/// `states` is aligned with the configured module order. `None` marks a
/// module that has not been initialized yet for this patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRecord {
    /// Age-range label this record belongs to.
    pub age_range: String,
    /// One entry per module, in module order.
    pub states: Vec<Option<String>>,
}

impl TimelineRecord {
    /// State of the module at `index`, if it has been resolved.
    pub fn state(&self, index: usize) -> Option<&str> {
        self.states.get(index).and_then(Option::as_deref)
    }
}

/// A fully generated patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    /// Patient identifier.
    pub id: PatientId,
    /// Fixed demographic attributes.
    pub demographics: Demographics,
    /// Timeline records in chronological order.
    pub timeline: Vec<TimelineRecord>,
}

impl Patient {
    /// Timeline record for an age-range label.
    pub fn record(&self, age_range: &str) -> Option<&TimelineRecord> {
        self.timeline.iter().find(|r| r.age_range == age_range)
    }
}

impl core::fmt::Display for Patient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let d = &self.demographics;
        write!(
            f,
            "Patient: {}, {}, {}, {}, {}, {}, {}, {}",
            self.id, d.region, d.area, d.ethnicity, d.gender, d.age_range, d.dob, d.deprivation_level
        )
    }
}
