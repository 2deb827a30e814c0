//! Distribution-shaped wrapper around the tree likelihood.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::errors::LikelihoodError;
use crate::markov::likelihood::markov_log_prob;
use crate::markov::transition::StateTransition;
use crate::tree::Phylogeny;
use crate::validation::Validation;

/// Minimal interface of a batched distribution over observations.
///
/// Mirrors the usual probabilistic-programming contract: a batch of
/// distribution instances scores one event shape, with an explicit support
/// predicate. Scoring is fallible since models carry validated inputs.
pub trait Distribution {
    /// The observation type scored by [`log_prob`](Distribution::log_prob).
    type Value: ?Sized;

    /// Shape of the batch of distribution instances.
    fn batch_shape(&self) -> &[usize];

    /// Shape of a single observation.
    fn event_shape(&self) -> Vec<usize>;

    /// Whether a value lies in the support.
    fn in_support(&self, value: &Self::Value) -> bool;

    /// Log probability of a value, shaped like the batch.
    fn log_prob(&self, value: &Self::Value) -> Result<ArrayD<f64>, LikelihoodError>;
}

/// A half-open integer range `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerInterval {
    lower: usize,
    upper: usize,
}

impl IntegerInterval {
    /// Create the range `[lower, upper)`.
    #[inline]
    pub fn new(lower: usize, upper: usize) -> Self {
        Self { lower, upper }
    }

    /// Inclusive lower bound.
    #[inline]
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// Exclusive upper bound.
    #[inline]
    pub fn upper(&self) -> usize {
        self.upper
    }

    /// Whether `value` lies in the range.
    #[inline]
    pub fn contains(&self, value: usize) -> bool {
        self.lower <= value && value < self.upper
    }
}

/// Distribution over leaf state assignments of a timed tree.
///
/// Wraps a [`Phylogeny`] and a [`StateTransition`] as a distribution whose
/// events are one observed state per leaf; `log_prob` is the pruning
/// marginal likelihood of [`markov_log_prob`]. Carries no logic of its own
/// beyond argument validation at construction.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use phylomark::{Distribution, MarkovTree, Phylogeny, StateTransition, Validation};
///
/// let phylo = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
/// let transition = StateTransition::homogeneous(array![
///     [0.9_f64.ln(), 0.1_f64.ln()],
///     [0.1_f64.ln(), 0.9_f64.ln()],
/// ]).unwrap();
/// let model = MarkovTree::new(phylo, transition, Validation::Enabled).unwrap();
///
/// assert_eq!(model.event_shape(), vec![2]);
/// assert!(model.in_support(&[0, 1]));
/// assert!(!model.in_support(&[0, 2]));
///
/// let logp = model.log_prob(&[0, 1]).unwrap();
/// assert_eq!(logp.ndim(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovTree {
    phylogeny: Phylogeny,
    transition: StateTransition,
    validation: Validation,
}

impl MarkovTree {
    /// Wrap a phylogeny and substitution model as a distribution.
    ///
    /// Matrix dimensions are reconciled unconditionally; row-stochasticity
    /// is checked when `validation` is enabled. The validation mode is kept
    /// and reused by every [`log_prob`](Distribution::log_prob) call.
    ///
    /// # Errors
    ///
    /// [`ShapeMismatchError`](crate::errors::ShapeMismatchError) for
    /// malformed matrix dimensions and
    /// [`ConstraintError`](crate::errors::ConstraintError) for a
    /// non-stochastic row when validation is enabled.
    pub fn new(
        phylogeny: Phylogeny,
        transition: StateTransition,
        validation: Validation,
    ) -> Result<Self, LikelihoodError> {
        transition.check_square()?;
        if validation.is_enabled() {
            transition.validate_rows()?;
        }
        Ok(Self {
            phylogeny,
            transition,
            validation,
        })
    }

    /// The wrapped tree or batch of trees.
    #[inline]
    pub fn phylogeny(&self) -> &Phylogeny {
        &self.phylogeny
    }

    /// The wrapped substitution model.
    #[inline]
    pub fn transition(&self) -> &StateTransition {
        &self.transition
    }

    /// Number of states `S`.
    #[inline]
    pub fn num_states(&self) -> usize {
        self.transition.num_states()
    }

    /// Number of leaves per tree.
    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.phylogeny.num_leaves()
    }

    /// The per-leaf state support `[0, S)`.
    #[inline]
    pub fn support(&self) -> IntegerInterval {
        IntegerInterval::new(0, self.num_states())
    }
}

impl Distribution for MarkovTree {
    type Value = [usize];

    fn batch_shape(&self) -> &[usize] {
        self.phylogeny.batch_shape()
    }

    fn event_shape(&self) -> Vec<usize> {
        vec![self.phylogeny.num_leaves()]
    }

    fn in_support(&self, value: &[usize]) -> bool {
        let support = self.support();
        value.len() == self.num_leaves() && value.iter().all(|&state| support.contains(state))
    }

    fn log_prob(&self, value: &[usize]) -> Result<ArrayD<f64>, LikelihoodError> {
        markov_log_prob(&self.phylogeny, value, &self.transition, self.validation)
    }
}
