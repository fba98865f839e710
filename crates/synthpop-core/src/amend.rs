//! Probability amendment: conditional multiply-then-renormalize.
//!
//! A modifier row whose condition holds multiplies a probability vector
//! (or every row of a matrix) elementwise by its per-state factors, after
//! which each vector is divided by its own sum. A modifier whose condition
//! does not hold leaves its target untouched -- bit for bit, not merely
//! multiplied by ones.
//!
//! Conditions are resolved against the *current* context first and the
//! *previous* context second. A variable missing from both simply means the
//! modifier is not relevant yet.

use synthpop_types::Context;
use tracing::debug;

use crate::rules::{ComparisonError, Modifier};

/// A vector summed to zero (or to a non-finite value) after multiplication.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("probabilities sum to {sum} after amendment; every state was ruled out")]
pub struct NormalizationError {
    /// The offending sum.
    pub sum: f64,
}

/// Errors raised while applying modifiers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmendError {
    /// Renormalization failed.
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    /// A numeric condition met a non-integer value.
    #[error(transparent)]
    Comparison(#[from] ComparisonError),
}

/// A square matrix of non-negative weights; row *i* belongs to state *i*.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    rows: Vec<Vec<f64>>,
}

impl ProbabilityMatrix {
    /// Wrap rows that were validated by the rule table loader.
    pub const fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// An `n` x `n` matrix of ones (the identity multiplier).
    pub fn ones(n: usize) -> Self {
        Self {
            rows: vec![vec![1.0; n]; n],
        }
    }

    /// Row `index`.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Amend every row by the same multiplier vector.
    ///
    /// The matrix is left unchanged if any row fails to renormalize.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationError`] for the first row whose sum is zero.
    pub fn amend_uniform(&mut self, multipliers: &[f64]) -> Result<(), NormalizationError> {
        let amended = self
            .rows
            .iter()
            .map(|row| amend(row, multipliers))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows = amended;
        Ok(())
    }

    /// Amend row *i* by row *i* of `multipliers`.
    ///
    /// The matrix is left unchanged if any row fails to renormalize.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationError`] for the first row whose sum is zero.
    pub fn amend_rowwise(&mut self, multipliers: &Self) -> Result<(), NormalizationError> {
        let amended = self
            .rows
            .iter()
            .zip(&multipliers.rows)
            .map(|(row, factors)| amend(row, factors))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows = amended;
        Ok(())
    }
}

/// Multiply `probabilities` elementwise by `multipliers` and renormalize the
/// result to sum to one.
///
/// # Errors
///
/// Returns [`NormalizationError`] if the product sums to zero or to a
/// non-finite value.
pub fn amend(probabilities: &[f64], multipliers: &[f64]) -> Result<Vec<f64>, NormalizationError> {
    debug_assert_eq!(probabilities.len(), multipliers.len());
    let product: Vec<f64> = probabilities
        .iter()
        .zip(multipliers)
        .map(|(p, m)| p * m)
        .collect();
    let sum: f64 = product.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(NormalizationError { sum });
    }
    Ok(product.into_iter().map(|v| v / sum).collect())
}

/// Evaluate a modifier against the current context, falling back to the
/// previous one.
///
/// Returns the multipliers when the condition holds and `None` (the
/// identity) when it does not or when the variable is in neither context.
///
/// # Errors
///
/// Returns [`ComparisonError`] if a numeric comparator meets a non-integer
/// value.
pub fn evaluate_condition<'m>(
    modifier: &'m Modifier,
    current: &Context,
    previous: Option<&Context>,
) -> Result<Option<&'m [f64]>, ComparisonError> {
    let variable = modifier.condition.variable.as_str();
    let value = current
        .get(variable)
        .or_else(|| previous.and_then(|p| p.get(variable)));
    let Some(value) = value else {
        return Ok(None);
    };
    if modifier.condition.comparator.holds(variable, value)? {
        debug!(
            variable,
            value,
            condition = %modifier.condition.comparator,
            multipliers = ?modifier.multipliers,
            "modifier fired"
        );
        Ok(Some(&modifier.multipliers))
    } else {
        Ok(None)
    }
}

/// Apply every modifier, in order, to a probability vector.
///
/// Returns how many modifiers fired.
///
/// # Errors
///
/// Returns [`AmendError`] if a condition cannot be evaluated or a vector
/// cannot be renormalized.
pub fn apply_to_vector(
    probabilities: &mut Vec<f64>,
    modifiers: &[Modifier],
    current: &Context,
    previous: Option<&Context>,
) -> Result<usize, AmendError> {
    let mut fired = 0_usize;
    for modifier in modifiers {
        if let Some(multipliers) = evaluate_condition(modifier, current, previous)? {
            *probabilities = amend(probabilities, multipliers)?;
            fired = fired.saturating_add(1);
            debug!(posterior = ?probabilities, "amended probabilities");
        }
    }
    Ok(fired)
}

/// Apply every modifier, in order, to each row of a matrix.
///
/// Returns how many modifiers fired.
///
/// # Errors
///
/// Returns [`AmendError`] if a condition cannot be evaluated or a row
/// cannot be renormalized.
pub fn apply_to_matrix(
    matrix: &mut ProbabilityMatrix,
    modifiers: &[Modifier],
    current: &Context,
    previous: Option<&Context>,
) -> Result<usize, AmendError> {
    let mut fired = 0_usize;
    for modifier in modifiers {
        if let Some(multipliers) = evaluate_condition(modifier, current, previous)? {
            matrix.amend_uniform(multipliers)?;
            fired = fired.saturating_add(1);
            debug!(posterior = ?matrix.rows(), "amended transition matrix");
        }
    }
    Ok(fired)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::rules::{Comparator, Condition};

    const EPSILON: f64 = 1e-9;

    fn close(actual: &[f64], expected: &[f64], tolerance: f64) -> bool {
        actual.len() == expected.len()
            && actual
                .iter()
                .zip(expected)
                .all(|(a, e)| (a - e).abs() < tolerance)
    }

    fn modifier(variable: &str, value: &str, multipliers: &[f64]) -> Modifier {
        Modifier {
            condition: Condition {
                variable: variable.to_owned(),
                comparator: Comparator::parse(value).unwrap(),
            },
            multipliers: multipliers.to_vec(),
        }
    }

    #[test]
    fn amend_multiplies_and_renormalizes() {
        let amended = amend(&[0.2, 0.3, 0.5], &[2.0, 1.0, 1.0]).unwrap();
        assert!(close(&amended, &[0.4 / 1.2, 0.3 / 1.2, 0.5 / 1.2], EPSILON));
        let sum: f64 = amended.iter().sum();
        assert!((sum - 1.0).abs() < EPSILON);
    }

    #[test]
    fn amend_by_ones_is_renormalization_only() {
        let amended = amend(&[0.25, 0.25, 0.5], &[1.0, 1.0, 1.0]).unwrap();
        assert!(close(&amended, &[0.25, 0.25, 0.5], EPSILON));
    }

    #[test]
    fn amend_rejects_zeroed_vector() {
        let err = amend(&[0.0, 0.5], &[3.0, 0.0]).unwrap_err();
        assert!(err.sum.abs() < EPSILON);
    }

    #[test]
    fn failed_matrix_amendment_leaves_matrix_untouched() {
        let mut matrix = ProbabilityMatrix::new(vec![vec![0.5, 0.5], vec![1.0, 0.0]]);
        let before = matrix.clone();
        assert!(matrix.amend_uniform(&[0.0, 1.0]).is_err());
        assert_eq!(matrix, before);
    }

    #[test]
    fn rowwise_amendment_uses_matching_rows() {
        let mut matrix = ProbabilityMatrix::new(vec![vec![0.5, 0.3, 0.2], vec![0.1, 0.1, 0.8]]);
        let decay = ProbabilityMatrix::new(vec![vec![1.0, 2.0, 1.0], vec![1.0, 1.0, 1.0]]);
        matrix.amend_rowwise(&decay).unwrap();
        assert!(close(
            matrix.row(0).unwrap(),
            &[0.5 / 1.3, 0.6 / 1.3, 0.2 / 1.3],
            EPSILON
        ));
        assert!(close(matrix.row(1).unwrap(), &[0.1, 0.1, 0.8], EPSILON));
    }

    #[test]
    fn condition_prefers_current_context() {
        let m = modifier("smoking", "Current", &[1.0, 2.0]);
        let current: Context = [("smoking", "Never")].into_iter().collect();
        let previous: Context = [("smoking", "Current")].into_iter().collect();
        assert_eq!(evaluate_condition(&m, &current, Some(&previous)).unwrap(), None);
        assert_eq!(
            evaluate_condition(&m, &Context::new(), Some(&previous)).unwrap(),
            Some([1.0, 2.0].as_slice())
        );
    }

    #[test]
    fn absent_variable_is_identity() {
        let m = modifier("diabetes", "Type2", &[0.0, 5.0]);
        let current = Context::for_age_range("30_34");
        assert_eq!(evaluate_condition(&m, &current, None).unwrap(), None);

        let mut matrix = ProbabilityMatrix::new(vec![vec![0.7, 0.3], vec![0.1, 0.9]]);
        let before = matrix.clone();
        let fired = apply_to_matrix(&mut matrix, &[m], &current, Some(&Context::new())).unwrap();
        assert_eq!(fired, 0);
        assert_eq!(matrix, before);
    }

    #[test]
    fn false_condition_leaves_vector_bit_identical() {
        let m = modifier("gender", "F", &[2.0, 1.0, 1.0]);
        let attributes: Context = [("gender", "M")].into_iter().collect();
        let mut probabilities = vec![0.2, 0.3, 0.5];
        let fired = apply_to_vector(&mut probabilities, &[m], &attributes, None).unwrap();
        assert_eq!(fired, 0);
        let bits: Vec<u64> = probabilities.iter().map(|p| p.to_bits()).collect();
        let expected: Vec<u64> = [0.2_f64, 0.3, 0.5].iter().map(|p| p.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn modifiers_apply_in_order_and_accumulate() {
        let modifiers = [
            modifier("gender", "F", &[2.0, 1.0]),
            modifier("deprivation_level", ">5", &[1.0, 3.0]),
        ];
        let attributes: Context = [("gender", "F"), ("deprivation_level", "9")]
            .into_iter()
            .collect();
        let mut probabilities = vec![0.5, 0.5];
        let fired = apply_to_vector(&mut probabilities, &modifiers, &attributes, None).unwrap();
        assert_eq!(fired, 2);
        // [1.0, 0.5] -> [2/3, 1/3] -> [2/3, 1] -> [0.4, 0.6]
        assert!(close(&probabilities, &[0.4, 0.6], EPSILON));
    }

    #[test]
    fn non_numeric_value_for_numeric_condition_is_an_error() {
        let m = modifier("smoking", ">2", &[1.0, 1.0]);
        let current: Context = [("smoking", "Current")].into_iter().collect();
        let mut probabilities = vec![0.5, 0.5];
        assert!(matches!(
            apply_to_vector(&mut probabilities, &[m], &current, None),
            Err(AmendError::Comparison(_))
        ));
    }
}
