//! Log-domain state transition matrices.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::{ConstraintError, ShapeMismatchError, UnsupportedError};

/// Tolerance for the row-stochasticity check on `exp(log matrix)`.
pub(crate) const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// A substitution model as one-step transition probabilities, in log domain.
///
/// Entry `[i, j]` is the log probability of moving from state `i` to state
/// `j` over one time unit. Rows of the exponentiated matrix must lie on the
/// probability simplex; that is checked by
/// [`markov_log_prob`](crate::markov_log_prob) when validation is enabled.
///
/// The [`Piecewise`](StateTransition::Piecewise) form carries one matrix per
/// unit time interval `(-inf, 1], (1, 2], .., (T-1, inf)`. A grid with a
/// single interval is equivalent to [`Homogeneous`](StateTransition::Homogeneous);
/// longer grids are recognized but not implemented and fail evaluation with
/// [`UnsupportedError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateTransition {
    /// One `S x S` log matrix applied at every time step.
    Homogeneous(Array2<f64>),
    /// A `T x S x S` grid of log matrices over unit time intervals.
    Piecewise(Array3<f64>),
}

impl StateTransition {
    /// Create a homogeneous model, rejecting non-square input.
    ///
    /// # Errors
    ///
    /// [`ShapeMismatchError::NotSquare`] when rows and columns differ.
    pub fn homogeneous(log_matrix: Array2<f64>) -> Result<Self, ShapeMismatchError> {
        let transition = Self::Homogeneous(log_matrix);
        transition.check_square()?;
        Ok(transition)
    }

    /// Create a piecewise model, rejecting non-square or empty grids.
    ///
    /// # Errors
    ///
    /// [`ShapeMismatchError::NotSquare`] when the trailing dimensions
    /// differ, [`ShapeMismatchError::EmptyGrid`] for zero intervals.
    pub fn piecewise(log_matrices: Array3<f64>) -> Result<Self, ShapeMismatchError> {
        let transition = Self::Piecewise(log_matrices);
        transition.check_square()?;
        Ok(transition)
    }

    /// Number of states `S`.
    #[inline]
    pub fn num_states(&self) -> usize {
        match self {
            Self::Homogeneous(matrix) => matrix.nrows(),
            Self::Piecewise(grid) => grid.dim().1,
        }
    }

    /// Number of time intervals (1 for the homogeneous form).
    #[inline]
    pub fn num_intervals(&self) -> usize {
        match self {
            Self::Homogeneous(_) => 1,
            Self::Piecewise(grid) => grid.dim().0,
        }
    }

    /// Reconcile the matrix dimensions. Runs unconditionally at evaluation
    /// entry since the enum variants can be built directly.
    pub(crate) fn check_square(&self) -> Result<(), ShapeMismatchError> {
        let (intervals, rows, cols) = match self {
            Self::Homogeneous(matrix) => (1, matrix.nrows(), matrix.ncols()),
            Self::Piecewise(grid) => grid.dim(),
        };
        if intervals == 0 {
            return Err(ShapeMismatchError::EmptyGrid);
        }
        if rows != cols {
            return Err(ShapeMismatchError::NotSquare { rows, cols });
        }
        Ok(())
    }

    /// The single per-step log matrix of a time-homogeneous model.
    ///
    /// A one-interval grid collapses to its only matrix; longer grids are
    /// the unimplemented time-varying case.
    pub(crate) fn step_log_matrix(&self) -> Result<ArrayView2<f64>, UnsupportedError> {
        match self {
            Self::Homogeneous(matrix) => Ok(matrix.view()),
            Self::Piecewise(grid) if grid.dim().0 == 1 => Ok(grid.index_axis(Axis(0), 0)),
            Self::Piecewise(grid) => Err(UnsupportedError {
                intervals: grid.dim().0,
            }),
        }
    }

    /// Check that every row of the exponentiated matrices sums to one.
    pub(crate) fn validate_rows(&self) -> Result<(), ConstraintError> {
        match self {
            Self::Homogeneous(matrix) => check_rows(matrix.view(), 0),
            Self::Piecewise(grid) => {
                for (index, matrix) in grid.axis_iter(Axis(0)).enumerate() {
                    check_rows(matrix, index)?;
                }
                Ok(())
            }
        }
    }
}

fn check_rows(log_matrix: ArrayView2<f64>, matrix: usize) -> Result<(), ConstraintError> {
    for (row, log_probs) in log_matrix.rows().into_iter().enumerate() {
        let sum: f64 = log_probs.iter().map(|&v| v.exp()).sum();
        if sum.is_nan() || (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
            return Err(ConstraintError::RowNotStochastic { matrix, row, sum });
        }
    }
    Ok(())
}
