//! Weighted categorical draws.
//!
//! The same draw serves both first-observation selection (over an initial
//! probability vector) and Markov transitions (over the transition-matrix
//! row of the module's current state). Weights are relative; they do not
//! need to sum to one.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::{Error as WeightError, WeightedIndex};

use crate::amend::ProbabilityMatrix;

/// Errors raised by a draw.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// The weights cannot define a distribution (empty, all zero, negative
    /// or non-finite).
    #[error("cannot draw from weights: {source}")]
    InvalidWeights {
        /// The underlying distribution error.
        #[from]
        source: WeightError,
    },

    /// The weight vector does not line up with the state list.
    #[error("{weights} weights for {states} states")]
    LengthMismatch {
        /// Number of weights.
        weights: usize,
        /// Number of states.
        states: usize,
    },

    /// The transition matrix has no row for the current state.
    #[error("no transition row for state index {index}")]
    MissingRow {
        /// The current state's index.
        index: usize,
    },
}

/// Draw an index with probability proportional to `weights`.
///
/// # Errors
///
/// Returns [`SampleError::InvalidWeights`] if the weights sum to zero or
/// contain a negative or non-finite value.
pub fn sample_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<usize, SampleError> {
    let distribution = WeightedIndex::new(weights)?;
    Ok(distribution.sample(rng))
}

/// Draw one state with probability proportional to its weight.
///
/// # Errors
///
/// Returns [`SampleError::LengthMismatch`] if `weights` and `states` differ
/// in length, or [`SampleError::InvalidWeights`] for an unusable vector.
pub fn sample<'s, R: Rng + ?Sized>(
    states: &'s [String],
    weights: &[f64],
    rng: &mut R,
) -> Result<&'s str, SampleError> {
    if states.len() != weights.len() {
        return Err(SampleError::LengthMismatch {
            weights: weights.len(),
            states: states.len(),
        });
    }
    let index = sample_index(weights, rng)?;
    states
        .get(index)
        .map(String::as_str)
        .ok_or(SampleError::MissingRow { index })
}

/// First-order Markov step: draw the next state index from the matrix row
/// of the `current` state.
///
/// # Errors
///
/// Returns [`SampleError::MissingRow`] if `current` is out of range, or
/// [`SampleError::InvalidWeights`] if that row sums to zero.
pub fn transition<R: Rng + ?Sized>(
    matrix: &ProbabilityMatrix,
    current: usize,
    rng: &mut R,
) -> Result<usize, SampleError> {
    let row = matrix
        .row(current)
        .ok_or(SampleError::MissingRow { index: current })?;
    sample_index(row, rng)
}
