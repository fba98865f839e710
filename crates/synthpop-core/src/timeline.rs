//! The per-patient age-range loop.
//!
//! For each visited age range, in chronological order:
//!
//! 1. Start a *current* context holding only the age-range label.
//! 2. Step every module in rule-book order. A freshly selected state is
//!    inserted into the current context at once, so later modules in the
//!    same age range see it.
//! 3. Record the resolved states.
//! 4. The current context becomes the *previous* one.
//!
//! Dynamic modifiers therefore see the current age range first and fall
//! back to the previous one, which is how circular cross-module
//! dependencies resolve: a module later in the order reads this step's
//! value, a module earlier in the order reads last step's.

use core::ops::Range;

use rand::Rng;
use synthpop_types::{AgeRanges, Context, TimelineRecord};
use tracing::debug;

use crate::config::{SimulationConfig, TimelineSpan};
use crate::error::SimulationError;
use crate::module_state::ModuleState;
use crate::rulebook::RuleBook;

/// Engine switches taken from [`SimulationConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Which age ranges a timeline covers.
    pub span: TimelineSpan,
    /// Whether static modifiers also amend each module's transition matrix.
    pub static_modifiers_amend_transitions: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl From<&SimulationConfig> for EngineOptions {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            span: config.span,
            static_modifiers_amend_transitions: config.static_modifiers_amend_transitions,
        }
    }
}

/// Runs one patient's timeline across the configured age ranges.
#[derive(Debug, Clone, Copy)]
pub struct TimelineEngine<'a> {
    rules: &'a RuleBook,
    age_ranges: &'a AgeRanges,
    options: EngineOptions,
}

impl<'a> TimelineEngine<'a> {
    /// Create an engine over shared rules and age ranges.
    pub const fn new(
        rules: &'a RuleBook,
        age_ranges: &'a AgeRanges,
        options: EngineOptions,
    ) -> Self {
        Self {
            rules,
            age_ranges,
            options,
        }
    }

    /// The rule book.
    pub const fn rules(&self) -> &'a RuleBook {
        self.rules
    }

    /// The age-range sequence.
    pub const fn age_ranges(&self) -> &'a AgeRanges {
        self.age_ranges
    }

    /// Indices of the age ranges visited for a patient whose starting age
    /// range sits at `start_index - 1`.
    pub fn visited_range(&self, start_index: usize) -> Range<usize> {
        self.options.span.bounds(start_index, self.age_ranges.len())
    }

    /// Fresh module states for one patient, in rule-book order.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] if a static modifier fails on a
    /// transition matrix.
    pub fn module_states(
        &self,
        static_context: &Context,
    ) -> Result<Vec<ModuleState<'a>>, SimulationError> {
        self.rules
            .iter()
            .map(|(handle, table)| {
                ModuleState::new(
                    handle,
                    table,
                    static_context,
                    self.options.static_modifiers_amend_transitions,
                )
            })
            .collect()
    }

    /// Simulate the timeline and return one record per visited age range.
    ///
    /// # Errors
    ///
    /// Returns the first [`SimulationError`] raised by any module; no
    /// partial timeline is returned.
    pub fn run<R: Rng + ?Sized>(
        &self,
        start_index: usize,
        static_context: &Context,
        rng: &mut R,
    ) -> Result<Vec<TimelineRecord>, SimulationError> {
        let mut modules = self.module_states(static_context)?;
        let visited = self.visited_range(start_index);
        let mut timeline = Vec::with_capacity(visited.len());
        let mut previous: Option<Context> = None;

        for age_range in self
            .age_ranges
            .iter()
            .skip(visited.start)
            .take(visited.len())
        {
            let label = age_range.label();
            let mut current = Context::for_age_range(label);
            let mut states = Vec::with_capacity(modules.len());

            for module in &mut modules {
                let selected =
                    module.step(label, static_context, &current, previous.as_ref(), rng)?;
                if let Some(state) = selected {
                    current.insert(module.module(), state);
                }
                states.push(selected.map(str::to_owned));
            }

            debug!(age_range = label, ?states, "age range resolved");
            timeline.push(TimelineRecord {
                age_range: label.to_owned(),
                states,
            });
            previous = Some(current);
        }

        Ok(timeline)
    }
}
