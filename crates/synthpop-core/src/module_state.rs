//! Per-patient, per-module carried state.
//!
//! A module is a small state machine:
//!
//! ```text
//! Uninitialized --(initial row for this age range)--> Initialized(s)
//! Initialized(s) --(transition)--> Initialized(s')
//! ```
//!
//! While uninitialized, a step with no matching initial-probability row
//! yields no state and is not an error. Once initialized, every step applies
//! the dynamic modifiers to the module's own copy of the transition matrix,
//! draws from the row of the current state, then ages the matrix by the
//! decay rows for the next step.

use rand::Rng;
use synthpop_types::{AGE_RANGE_KEY, Context};
use tracing::debug;

use crate::amend::{self, AmendError, ProbabilityMatrix};
use crate::error::SimulationError;
use crate::rulebook::ModuleHandle;
use crate::rules::RuleTable;
use crate::sampler::{self, SampleError};

/// One module's state within one patient's run.
///
/// Owns an amended copy of the transition matrix; the rule table itself is
/// shared read-only.
#[derive(Debug, Clone)]
pub struct ModuleState<'r> {
    handle: ModuleHandle,
    table: &'r RuleTable,
    transition: ProbabilityMatrix,
    current: Option<usize>,
}

impl<'r> ModuleState<'r> {
    /// Create the state for one patient.
    ///
    /// With `amend_transitions`, the static modifiers are applied once to
    /// the transition matrix copy against `static_context`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Amend`] if a static modifier cannot be
    /// evaluated or rules out a whole row.
    pub fn new(
        handle: ModuleHandle,
        table: &'r RuleTable,
        static_context: &Context,
        amend_transitions: bool,
    ) -> Result<Self, SimulationError> {
        let mut transition = table.transition().clone();
        if amend_transitions {
            let age_range = static_context.get(AGE_RANGE_KEY).unwrap_or_default();
            amend::apply_to_matrix(
                &mut transition,
                table.static_modifiers(),
                static_context,
                None,
            )
            .map_err(|source| amend_error(table, age_range, source))?;
        }
        Ok(Self {
            handle,
            table,
            transition,
            current: None,
        })
    }

    /// Handle of the module in the rule book.
    pub const fn handle(&self) -> ModuleHandle {
        self.handle
    }

    /// Module name.
    pub fn module(&self) -> &'r str {
        self.table.module()
    }

    /// Ordered state list.
    pub fn states(&self) -> &'r [String] {
        self.table.states()
    }

    /// The transition matrix as it stands for the next step.
    pub const fn transition(&self) -> &ProbabilityMatrix {
        &self.transition
    }

    /// The decay matrix.
    pub fn decay(&self) -> &'r ProbabilityMatrix {
        self.table.decay()
    }

    /// Whether a first state has been drawn.
    pub const fn is_initialized(&self) -> bool {
        self.current.is_some()
    }

    /// The most recently selected state.
    pub fn current_state(&self) -> Option<&'r str> {
        let states = self.states();
        self.current
            .and_then(|index| states.get(index))
            .map(String::as_str)
    }

    /// The initial-probability vector for `age_range` after the static
    /// modifiers, or `None` if the table has no row for that age range.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Amend`] if a static modifier cannot be
    /// evaluated or rules out every state.
    pub fn initial_probabilities(
        &self,
        age_range: &str,
        static_context: &Context,
    ) -> Result<Option<Vec<f64>>, SimulationError> {
        if !self.table.has_initial(age_range) {
            return Ok(None);
        }
        let prior = self.table.initial_probabilities(age_range)?;
        let mut posterior = prior.to_vec();
        amend::apply_to_vector(
            &mut posterior,
            self.table.static_modifiers(),
            static_context,
            None,
        )
        .map_err(|source| amend_error(self.table, age_range, source))?;
        debug!(
            module = self.module(),
            age_range,
            ?prior,
            ?posterior,
            "initial probabilities"
        );
        Ok(Some(posterior))
    }

    /// Draw the first state if the table has an initial row for
    /// `age_range`. Returns the selected state, or `None` if the module
    /// stays uninitialized.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] if amendment or the draw fails.
    pub fn initialize<R: Rng + ?Sized>(
        &mut self,
        age_range: &str,
        static_context: &Context,
        rng: &mut R,
    ) -> Result<Option<&'r str>, SimulationError> {
        let Some(probabilities) = self.initial_probabilities(age_range, static_context)? else {
            return Ok(None);
        };
        let state = sampler::sample(self.states(), &probabilities, rng)
            .map_err(|source| sample_error(self.table, age_range, source))?;
        // States are unique, so the name identifies the drawn index.
        self.current = self.table.state_index(state);
        debug!(module = self.module(), age_range, state, "first state drawn");
        Ok(Some(state))
    }

    /// One Markov step from the current state: dynamic amendment, draw,
    /// then decay.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] if the module is not initialized, a
    /// modifier cannot be evaluated, a row cannot be renormalized, or the
    /// draw fails.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        age_range: &str,
        current: &Context,
        previous: Option<&Context>,
        rng: &mut R,
    ) -> Result<&'r str, SimulationError> {
        let Some(from) = self.current else {
            let index = self.table.states().len();
            return Err(sample_error(
                self.table,
                age_range,
                SampleError::MissingRow { index },
            ));
        };

        amend::apply_to_matrix(
            &mut self.transition,
            self.table.dynamic_modifiers(),
            current,
            previous,
        )
        .map_err(|source| amend_error(self.table, age_range, source))?;

        let next = sampler::transition(&self.transition, from, rng)
            .map_err(|source| sample_error(self.table, age_range, source))?;

        self.transition
            .amend_rowwise(self.table.decay())
            .map_err(|source| amend_error(self.table, age_range, source.into()))?;

        self.select(next, age_range)
    }

    /// Initialize or advance, whichever the module's state calls for.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] from [`ModuleState::initialize`] or
    /// [`ModuleState::advance`].
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        age_range: &str,
        static_context: &Context,
        current: &Context,
        previous: Option<&Context>,
        rng: &mut R,
    ) -> Result<Option<&'r str>, SimulationError> {
        if self.is_initialized() {
            self.advance(age_range, current, previous, rng).map(Some)
        } else {
            self.initialize(age_range, static_context, rng)
        }
    }

    fn select(&mut self, index: usize, age_range: &str) -> Result<&'r str, SimulationError> {
        let states = self.states();
        let state = states
            .get(index)
            .ok_or_else(|| sample_error(self.table, age_range, SampleError::MissingRow { index }))?;
        self.current = Some(index);
        debug!(module = self.module(), age_range, state = %state, "state selected");
        Ok(state)
    }
}

fn amend_error(table: &RuleTable, age_range: &str, source: AmendError) -> SimulationError {
    SimulationError::Amend {
        module: table.module().to_owned(),
        age_range: age_range.to_owned(),
        source,
    }
}

fn sample_error(table: &RuleTable, age_range: &str, source: SampleError) -> SimulationError {
    SimulationError::Sample {
        module: table.module().to_owned(),
        age_range: age_range.to_owned(),
        source,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    const TOLERANCE: f64 = 1e-3;

    const ABC: &str = "\
type,variable,value,A,B,C
InitialProbability,,0_4,0.2,0.3,0.5
InitialProbability,,5_9,1,0,0
TransitionProbability,,,0.5,0.3,0.2
TransitionProbability,,,0.2,0.6,0.2
TransitionProbability,,,0.1,0.1,0.8
TransitionDecay,,,1,2,1
TransitionDecay,,,1,1,1
TransitionDecay,,,1,1,1
StaticModifier,gender,F,2,1,1
";

    fn close(actual: &[f64], expected: &[f64]) -> bool {
        actual.len() == expected.len()
            && actual
                .iter()
                .zip(expected)
                .all(|(a, e)| (a - e).abs() < TOLERANCE)
    }

    fn table() -> RuleTable {
        RuleTable::from_reader("abc", ABC.as_bytes()).unwrap()
    }

    fn handle() -> ModuleHandle {
        crate::rulebook::RuleBook::new(vec![table()], &synthpop_types::AgeRanges::standard())
            .unwrap()
            .handle("abc")
            .unwrap()
    }

    fn attributes(gender: &str) -> Context {
        [("gender", gender), (AGE_RANGE_KEY, "0_4")].into_iter().collect()
    }

    #[test]
    fn static_modifier_amends_initial_vector() {
        let table = table();
        let state = ModuleState::new(handle(), &table, &attributes("F"), false).unwrap();
        let posterior = state
            .initial_probabilities("0_4", &attributes("F"))
            .unwrap()
            .unwrap();
        assert!(close(&posterior, &[0.333, 0.25, 0.417]), "{posterior:?}");
        let sum: f64 = posterior.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn false_static_condition_keeps_initial_vector() {
        let table = table();
        let state = ModuleState::new(handle(), &table, &attributes("M"), true).unwrap();
        let posterior = state
            .initial_probabilities("0_4", &attributes("M"))
            .unwrap()
            .unwrap();
        let bits: Vec<u64> = posterior.iter().map(|p| p.to_bits()).collect();
        let expected: Vec<u64> = [0.2_f64, 0.3, 0.5].iter().map(|p| p.to_bits()).collect();
        assert_eq!(bits, expected);
        assert_eq!(state.transition(), table.transition());
    }

    #[test]
    fn decay_ages_transition_row_after_draw() {
        let table = table();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut state = ModuleState::new(handle(), &table, &attributes("M"), true).unwrap();

        // The 5_9 initial row is certain to select A.
        let first = state.initialize("5_9", &attributes("M"), &mut rng).unwrap();
        assert_eq!(first, Some("A"));

        let current = Context::for_age_range("10_14");
        state.advance("10_14", &current, None, &mut rng).unwrap();
        // [0.5, 0.3, 0.2] x [1, 2, 1] = [0.5, 0.6, 0.2], renormalized by 1.3
        assert!(
            close(state.transition().row(0).unwrap(), &[0.385, 0.462, 0.154]),
            "{:?}",
            state.transition().row(0)
        );
        for row in state.transition().rows() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn static_modifiers_personalise_transitions_when_enabled() {
        let table = table();
        let state = ModuleState::new(handle(), &table, &attributes("F"), true).unwrap();
        // [0.5, 0.3, 0.2] x [2, 1, 1] -> [1.0, 0.3, 0.2] / 1.5
        assert!(close(
            state.transition().row(0).unwrap(),
            &[0.667, 0.2, 0.133]
        ));
    }

    #[test]
    fn missing_initial_row_leaves_module_uninitialized() {
        let table = table();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut state = ModuleState::new(handle(), &table, &attributes("F"), true).unwrap();
        let empty = Context::for_age_range("30_34");
        let selected = state
            .step("30_34", &attributes("F"), &empty, None, &mut rng)
            .unwrap();
        assert_eq!(selected, None);
        assert!(!state.is_initialized());
        assert_eq!(state.current_state(), None);
    }

    #[test]
    fn step_initializes_then_transitions() {
        let table = table();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut state = ModuleState::new(handle(), &table, &attributes("M"), true).unwrap();
        let static_context = attributes("M");

        let first = state
            .step("5_9", &static_context, &Context::for_age_range("5_9"), None, &mut rng)
            .unwrap();
        assert_eq!(first, Some("A"));

        let previous = Context::for_age_range("5_9");
        let second = state
            .step(
                "10_14",
                &static_context,
                &Context::for_age_range("10_14"),
                Some(&previous),
                &mut rng,
            )
            .unwrap();
        assert!(second.is_some());
        assert_eq!(state.current_state(), second);
    }

    #[test]
    fn initial_draw_sets_the_current_state() {
        let table = table();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut state = ModuleState::new(handle(), &table, &attributes("F"), true).unwrap();
            let drawn = state
                .initialize("0_4", &attributes("F"), &mut rng)
                .unwrap()
                .unwrap();
            assert!(table.states().iter().any(|s| s == drawn));
            assert_eq!(state.current_state(), Some(drawn));
            assert!(state.is_initialized());
        }
    }

    #[test]
    fn advance_before_initialize_is_an_error() {
        let table = table();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut state = ModuleState::new(handle(), &table, &attributes("M"), true).unwrap();
        let result = state.advance("0_4", &Context::new(), None, &mut rng);
        assert!(matches!(result, Err(SimulationError::Sample { .. })));
    }
}
