//! Patient assembly: demographics in, complete patient out.
//!
//! The orchestrator holds no module-specific logic. It turns demographic
//! attributes into the static context, locates the starting age range, and
//! hands both to the [`TimelineEngine`].

use rand::Rng;
use synthpop_types::{AgeRanges, Demographics, Patient, PatientId};
use tracing::debug;

use crate::error::SimulationError;
use crate::rulebook::RuleBook;
use crate::timeline::{EngineOptions, TimelineEngine};

/// Produces complete patients from externally sampled demographics.
#[derive(Debug, Clone, Copy)]
pub struct PatientOrchestrator<'a> {
    engine: TimelineEngine<'a>,
}

impl<'a> PatientOrchestrator<'a> {
    /// Create an orchestrator over shared rules and age ranges.
    pub const fn new(
        rules: &'a RuleBook,
        age_ranges: &'a AgeRanges,
        options: EngineOptions,
    ) -> Self {
        Self {
            engine: TimelineEngine::new(rules, age_ranges, options),
        }
    }

    /// The underlying timeline engine.
    pub const fn engine(&self) -> &TimelineEngine<'a> {
        &self.engine
    }

    /// One past the position of `age_range` in the configured sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownAgeRange`] if the label is not
    /// configured.
    pub fn start_index(&self, age_range: &str) -> Result<usize, SimulationError> {
        self.engine
            .age_ranges()
            .position(age_range)
            .map(|position| position.saturating_add(1))
            .ok_or_else(|| SimulationError::UnknownAgeRange {
                age_range: age_range.to_owned(),
            })
    }

    /// Simulate one patient.
    ///
    /// The patient is returned whole or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] if the starting age range is unknown or
    /// any module fails.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        id: PatientId,
        demographics: Demographics,
        rng: &mut R,
    ) -> Result<Patient, SimulationError> {
        let static_context = demographics.to_context(&id);
        let start_index = self.start_index(demographics.age_range.label())?;
        let timeline = self.engine.run(start_index, &static_context, rng)?;
        debug!(
            patient = %id,
            age_range = %demographics.age_range,
            records = timeline.len(),
            "patient simulated"
        );
        Ok(Patient {
            id,
            demographics,
            timeline,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use synthpop_types::AgeRange;

    use super::*;
    use crate::rules::RuleTable;

    const SMOKING: &str = "\
type,variable,value,Never,Current
InitialProbability,,0_4,1,0
InitialProbability,,15_19,0.6,0.4
TransitionProbability,,,0.9,0.1
TransitionProbability,,,0.2,0.8
StaticModifier,gender,Female,1,0.5
DynamicModifier,deprivation_level,>5,1,1.5
";

    fn demographics(age_range: &str) -> Demographics {
        Demographics {
            region: String::from("Auckland"),
            area: String::from("Otara"),
            ethnicity: String::from("Pacific"),
            gender: String::from("Female"),
            age_range: AgeRange::parse(age_range).unwrap(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            age: 34,
            deprivation_level: 9,
        }
    }

    fn book(ranges: &AgeRanges) -> RuleBook {
        RuleBook::new(
            vec![RuleTable::from_reader("smoking", SMOKING.as_bytes()).unwrap()],
            ranges,
        )
        .unwrap()
    }

    #[test]
    fn generates_complete_patient() {
        let ranges = AgeRanges::standard();
        let book = book(&ranges);
        let orchestrator = PatientOrchestrator::new(&book, &ranges, EngineOptions::default());
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let patient = orchestrator
            .generate(PatientId::from("ZZZ0016"), demographics("30_34"), &mut rng)
            .unwrap();
        assert_eq!(patient.id.as_str(), "ZZZ0016");
        assert_eq!(patient.timeline.len(), 12);
        assert_eq!(patient.timeline.first().unwrap().age_range, "30_34");
        // No initial row between 30_34 and 85_, so smoking never starts.
        assert!(patient.timeline.iter().all(|r| r.state(0).is_none()));
    }

    #[test]
    fn start_index_is_one_past_position() {
        let ranges = AgeRanges::standard();
        let book = book(&ranges);
        let orchestrator = PatientOrchestrator::new(&book, &ranges, EngineOptions::default());
        assert_eq!(orchestrator.start_index("0_4").unwrap(), 1);
        assert_eq!(orchestrator.start_index("85_").unwrap(), 18);
        assert!(matches!(
            orchestrator.start_index("3_7"),
            Err(SimulationError::UnknownAgeRange { .. })
        ));
    }

    #[test]
    fn unconfigured_starting_age_range_fails_the_patient() {
        let ranges = AgeRanges::from_labels(&["0_4", "5_9"]).unwrap();
        let book = RuleBook::new(
            vec![
                RuleTable::from_reader(
                    "smoking",
                    "type,value,Never,Current\n\
                     InitialProbability,0_4,1,0\n\
                     TransitionProbability,,1,0\n\
                     TransitionProbability,,0,1\n"
                        .as_bytes(),
                )
                .unwrap(),
            ],
            &ranges,
        )
        .unwrap();
        let orchestrator = PatientOrchestrator::new(&book, &ranges, EngineOptions::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = orchestrator.generate(PatientId::from("A"), demographics("30_34"), &mut rng);
        assert!(matches!(
            result,
            Err(SimulationError::UnknownAgeRange { .. })
        ));
    }

    #[test]
    fn same_seed_same_patient() {
        let ranges = AgeRanges::standard();
        let book = book(&ranges);
        let orchestrator = PatientOrchestrator::new(&book, &ranges, EngineOptions::default());
        let generate = |seed| {
            orchestrator
                .generate(
                    PatientId::from("ABC1235"),
                    demographics("0_4"),
                    &mut ChaCha8Rng::seed_from_u64(seed),
                )
                .unwrap()
        };
        assert_eq!(generate(3), generate(3));
        let patient = generate(3);
        assert_eq!(patient.timeline.len(), 18);
        assert_eq!(patient.timeline.first().unwrap().state(0), Some("Never"));
    }
}
