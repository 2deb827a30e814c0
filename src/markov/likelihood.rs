//! Marginal log-likelihood of leaf states under a Markov substitution model.
//!
//! The algorithm is pruning over the flat encoding: because node ids are
//! assigned in time order with the root at id 0, one reverse sweep over ids
//! visits every child before its parent. Each node keeps a row of
//! per-state log partial likelihoods; a child's row is pushed through the
//! elapsed-time transition operator and added onto its parent's row, and the
//! root row is marginalized with a log-sum-exp.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayD, ArrayView1, Axis, IxDyn};
use rayon::prelude::*;

use crate::errors::{ConstraintError, InvalidTimeError, LikelihoodError, ShapeMismatchError};
use crate::markov::linalg::{log_matrix_vector, log_sum_exp, matrix_power};
use crate::markov::transition::StateTransition;
use crate::tree::Phylogeny;
use crate::validation::Validation;

/// Slack when matching an elapsed time to a whole number of steps, absorbing
/// float error accumulated by cumulative branch lengths.
const TIME_TOLERANCE: f64 = 1e-6;

/// Per-evaluation cache of integer powers of the one-step matrix.
///
/// Edges of one tree frequently span the same number of steps; each distinct
/// power is computed once per evaluation and reused.
struct PowerCache {
    base: Array2<f64>,
    powers: HashMap<u64, Array2<f64>>,
}

impl PowerCache {
    fn new(base: Array2<f64>) -> Self {
        Self {
            base,
            powers: HashMap::new(),
        }
    }

    fn power(&mut self, steps: u64) -> &Array2<f64> {
        let base = &self.base;
        self.powers
            .entry(steps)
            .or_insert_with(|| matrix_power(base.view(), steps))
    }
}

/// Resolve the time span of an edge to a whole number of transition steps.
fn elapsed_steps(start: f64, end: f64) -> Result<u64, InvalidTimeError> {
    let elapsed = end - start;
    if elapsed < -TIME_TOLERANCE {
        return Err(InvalidTimeError::Negative {
            start,
            end,
            elapsed,
        });
    }
    let steps = elapsed.round();
    // The negated form also rejects NaN.
    if !((elapsed - steps).abs() <= TIME_TOLERANCE) {
        return Err(InvalidTimeError::NonIntegral { elapsed });
    }
    Ok(steps as u64)
}

/// Pruning pass over one tree lane.
fn log_prob_lane(
    times: ArrayView1<f64>,
    parents: ArrayView1<i64>,
    leaves: ArrayView1<usize>,
    leaf_state: &[usize],
    cache: &mut PowerCache,
    num_states: usize,
) -> Result<f64, LikelihoodError> {
    let num_nodes = times.len();
    let mut table = Array2::<f64>::zeros((num_nodes, num_states));

    // Leaf rows are the observation indicators; internal rows start at
    // log 1 and accumulate their children's messages.
    for (&leaf, &state) in leaves.iter().zip(leaf_state) {
        if state >= num_states {
            return Err(ConstraintError::StateOutOfRange { state, num_states }.into());
        }
        let mut row = table.row_mut(leaf);
        row.fill(f64::NEG_INFINITY);
        row[state] = 0.0;
    }

    for i in (1..num_nodes).rev() {
        let parent = parents[i] as usize;
        let steps = elapsed_steps(times[parent], times[i])?;
        let matrix = cache.power(steps);
        let message = log_matrix_vector(matrix.view(), table.row(i));
        table
            .row_mut(parent)
            .zip_mut_with(&message, |acc, &m| *acc += m);
    }

    Ok(log_sum_exp(table.row(0)))
}

/// Marginal log-likelihood of observed leaf states, for a single tree or a
/// batch of trees.
///
/// Internal-node states are summed out by pruning: partial likelihoods are
/// propagated from the leaves toward the root in log space, each edge
/// applying the one-step transition matrix raised to the edge's whole number
/// of elapsed time units. Batch lanes are independent and evaluated in
/// parallel.
///
/// Suitable for mutation and phylogeographic mugration models. The tree is
/// scored as given: state-dependent reproduction rates as in the structured
/// coalescent are not expressible here.
///
/// # Arguments
///
/// * `phylo` - The tree or batch of trees
/// * `leaf_state` - One observed state per leaf, ordered as
///   [`Phylogeny::leaves`] (leaf-name order when built by
///   [`Phylogeny::from_clade`]); shared by every tree of a batch
/// * `transition` - The log-domain substitution model
/// * `validation` - Whether to check row-stochasticity of the model
///
/// # Returns
///
/// An array shaped like the phylogeny's batch shape; 0-dimensional for a
/// single tree.
///
/// # Errors
///
/// [`ShapeMismatchError`] when the observation count or matrix dimensions
/// disagree, [`ConstraintError`] for an out-of-range observed state or (with
/// validation enabled) a non-stochastic transition row,
/// [`InvalidTimeError`] when an edge spans a negative or non-integral number
/// of time units, and [`UnsupportedError`](crate::errors::UnsupportedError)
/// for a time-varying transition grid.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use phylomark::{markov_log_prob, Phylogeny, StateTransition, Validation};
///
/// let phylo = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
/// let transition = StateTransition::homogeneous(array![
///     [0.9_f64.ln(), 0.1_f64.ln()],
///     [0.1_f64.ln(), 0.9_f64.ln()],
/// ]).unwrap();
///
/// let logp = markov_log_prob(&phylo, &[0, 0], &transition, Validation::Enabled).unwrap();
/// assert_eq!(logp.ndim(), 0);
/// ```
///
/// # References
///
/// Felsenstein, J. (1981). Evolutionary trees from DNA sequences: a maximum
/// likelihood approach. Journal of Molecular Evolution, 17(6), 368-376.
///
/// Vaughan, T., Kuhnert, D., Popinga, A., Welch, D., Drummond, A. (2014).
/// Efficient Bayesian inference under the structured coalescent.
/// Bioinformatics, 30(16), 2272-2279.
pub fn markov_log_prob(
    phylo: &Phylogeny,
    leaf_state: &[usize],
    transition: &StateTransition,
    validation: Validation,
) -> Result<ArrayD<f64>, LikelihoodError> {
    transition.check_square()?;
    let num_leaves = phylo.num_leaves();
    if leaf_state.len() != num_leaves {
        return Err(ShapeMismatchError::LeafStateLength {
            expected: num_leaves,
            actual: leaf_state.len(),
        }
        .into());
    }
    if validation.is_enabled() {
        transition.validate_rows()?;
    }
    let base = transition.step_log_matrix()?.mapv(f64::exp);
    let num_states = transition.num_states();

    let node_axis = Axis(phylo.times().ndim() - 1);
    let leaf_axis = Axis(phylo.leaves().ndim() - 1);
    let lanes: Vec<(ArrayView1<f64>, ArrayView1<i64>, ArrayView1<usize>)> = phylo
        .times()
        .lanes(node_axis)
        .into_iter()
        .zip(phylo.parents().lanes(node_axis))
        .zip(phylo.leaves().lanes(leaf_axis))
        .map(|((times, parents), leaves)| (times, parents, leaves))
        .collect();

    let results: Vec<f64> = lanes
        .into_par_iter()
        .map(|(times, parents, leaves)| {
            let mut cache = PowerCache::new(base.clone());
            log_prob_lane(times, parents, leaves, leaf_state, &mut cache, num_states)
        })
        .collect::<Result<Vec<f64>, LikelihoodError>>()?;

    let shaped = Array1::from_vec(results)
        .into_shape_with_order(IxDyn(phylo.batch_shape()))
        .expect("one result per batch lane");
    Ok(shaped)
}

/// Marginal log-likelihood of a single (unbatched) tree, as a scalar.
///
/// # Errors
///
/// [`ShapeMismatchError::Batched`] for a batched phylogeny, otherwise as
/// [`markov_log_prob`].
pub fn markov_log_prob_single(
    phylo: &Phylogeny,
    leaf_state: &[usize],
    transition: &StateTransition,
    validation: Validation,
) -> Result<f64, LikelihoodError> {
    if !phylo.batch_shape().is_empty() {
        return Err(ShapeMismatchError::Batched {
            batch_shape: phylo.batch_shape().to_vec(),
        }
        .into());
    }
    let result = markov_log_prob(phylo, leaf_state, transition, validation)?;
    Ok(result[IxDyn(&[])])
}
