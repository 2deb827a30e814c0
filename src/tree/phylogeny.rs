//! Flat tensor encoding of rooted binary timed trees.
//!
//! A [`Phylogeny`] stores a tree (or a batch of equally shaped trees) as
//! three parallel arrays indexed by node id: timestamps, parent pointers and
//! the leaf index list. Node ids are assigned in time order with the root at
//! id 0, so a single reverse sweep over ids visits children before parents.
//! That ordering is what the pruning likelihood in
//! [`markov`](crate::markov) relies on.

use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::errors::{PhylogenyError, ShapeMismatchError, StructuralError};

/// An immutable rooted binary timed tree, or a batch of them.
///
/// The encoding keeps three arrays whose trailing axis is the node axis:
///
/// - `times` (`B x N`): per-node timestamps, non-decreasing along the node
///   axis. Time flows forward, the root is earliest.
/// - `parents` (`B x N`): per-node parent ids; the root sits at id 0 and
///   carries the sentinel `-1`, every other node points at a strictly
///   smaller id.
/// - `leaves` (`B x L`): the ids of the `L = (N + 1) / 2` leaf nodes, in the
///   deterministic order produced by conversion (not necessarily ascending).
///
/// `B` is an arbitrary (possibly empty) leading batch shape shared by all
/// three arrays. A batch holds trees of identical shape whose times, parent
/// wiring and leaf sets may differ per element.
///
/// Instances are validated on construction and never mutated afterwards;
/// batch selection returns new values.
///
/// # Examples
///
/// ```
/// use phylomark::Phylogeny;
///
/// // Root at time 0.0 with two child leaves at time 1.0.
/// let phylo = Phylogeny::from_vecs(
///     vec![0.0, 1.0, 1.0],
///     vec![-1, 0, 0],
///     vec![1, 2],
/// ).unwrap();
///
/// assert_eq!(phylo.num_nodes(), 3);
/// assert_eq!(phylo.num_leaves(), 2);
/// assert!(phylo.batch_shape().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPhylogeny")]
pub struct Phylogeny {
    times: ArrayD<f64>,
    parents: ArrayD<i64>,
    leaves: ArrayD<usize>,
}

/// Field mirror used to re-run validation when deserializing.
#[derive(Deserialize)]
struct RawPhylogeny {
    times: ArrayD<f64>,
    parents: ArrayD<i64>,
    leaves: ArrayD<usize>,
}

impl TryFrom<RawPhylogeny> for Phylogeny {
    type Error = PhylogenyError;

    fn try_from(raw: RawPhylogeny) -> Result<Self, Self::Error> {
        Phylogeny::new(raw.times, raw.parents, raw.leaves)
    }
}

impl Phylogeny {
    /// Create a validated phylogeny from its component arrays.
    ///
    /// # Arguments
    ///
    /// * `times` - Node timestamps, shape `B x N`
    /// * `parents` - Parent ids with root sentinel `-1`, shape `B x N`
    /// * `leaves` - Leaf ids, shape `B x L` with `L = (N + 1) / 2`
    ///
    /// # Errors
    ///
    /// [`ShapeMismatchError`] when the arrays disagree on shape, and
    /// [`StructuralError`] when any lane of the batch violates an encoding
    /// invariant: `N` must be odd, times non-decreasing, the root first with
    /// sentinel `-1`, parents strictly earlier than their children, and the
    /// declared leaves exactly the childless nodes.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::{Array1, array};
    /// use phylomark::Phylogeny;
    ///
    /// let phylo = Phylogeny::new(
    ///     array![0.0, 1.0, 2.0, 3.0, 3.0].into_dyn(),
    ///     array![-1_i64, 0, 1, 1, 2].into_dyn(),
    ///     Array1::from_vec(vec![2_usize, 3, 4]).into_dyn(),
    /// );
    /// assert!(phylo.is_err()); // node 2 has a child: not a valid leaf
    /// ```
    pub fn new(
        times: ArrayD<f64>,
        parents: ArrayD<i64>,
        leaves: ArrayD<usize>,
    ) -> Result<Self, PhylogenyError> {
        check_shapes(&times, &parents, &leaves)?;
        check_structure(&times, &parents, &leaves)?;
        Ok(Self {
            times,
            parents,
            leaves,
        })
    }

    /// Create a phylogeny without running the structural checks.
    ///
    /// Array shapes are still reconciled (the encoding is unusable without
    /// agreeing shapes), everything else is trusted. Feeding a malformed
    /// encoding to downstream algorithms yields unspecified numerical
    /// results or panics, never memory unsafety.
    ///
    /// # Errors
    ///
    /// [`ShapeMismatchError`] when the arrays disagree on shape.
    pub fn new_unchecked(
        times: ArrayD<f64>,
        parents: ArrayD<i64>,
        leaves: ArrayD<usize>,
    ) -> Result<Self, ShapeMismatchError> {
        check_shapes(&times, &parents, &leaves)?;
        Ok(Self {
            times,
            parents,
            leaves,
        })
    }

    /// Create a validated single (unbatched) phylogeny from plain vectors.
    ///
    /// # Errors
    ///
    /// Same as [`Phylogeny::new`].
    pub fn from_vecs(
        times: Vec<f64>,
        parents: Vec<i64>,
        leaves: Vec<usize>,
    ) -> Result<Self, PhylogenyError> {
        Self::new(
            Array1::from_vec(times).into_dyn(),
            Array1::from_vec(parents).into_dyn(),
            Array1::from_vec(leaves).into_dyn(),
        )
    }

    /// Node timestamps, shape `B x N`.
    #[inline]
    pub fn times(&self) -> &ArrayD<f64> {
        &self.times
    }

    /// Parent ids, shape `B x N`, root sentinel `-1`.
    #[inline]
    pub fn parents(&self) -> &ArrayD<i64> {
        &self.parents
    }

    /// Leaf ids, shape `B x L`.
    #[inline]
    pub fn leaves(&self) -> &ArrayD<usize> {
        &self.leaves
    }

    /// Number of nodes `N` per tree.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.times.shape()[self.times.ndim() - 1]
    }

    /// Number of leaves `L = (N + 1) / 2` per tree.
    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.leaves.shape()[self.leaves.ndim() - 1]
    }

    /// The shared leading batch shape (empty for a single tree).
    #[inline]
    pub fn batch_shape(&self) -> &[usize] {
        let shape = self.times.shape();
        &shape[..shape.len() - 1]
    }

    /// Length of the first batch axis.
    ///
    /// # Panics
    ///
    /// Panics if the phylogeny is unbatched.
    pub fn len(&self) -> usize {
        let batch = self.batch_shape();
        assert!(!batch.is_empty(), "unbatched phylogeny has no length");
        batch[0]
    }

    /// Whether the first batch axis is empty.
    ///
    /// # Panics
    ///
    /// Panics if the phylogeny is unbatched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select one element along the first batch axis.
    ///
    /// A pure selection: no re-validation, no recomputation.
    ///
    /// # Panics
    ///
    /// Panics if the phylogeny is unbatched or `index` is out of bounds.
    pub fn index(&self, index: usize) -> Phylogeny {
        assert!(
            !self.batch_shape().is_empty(),
            "cannot index an unbatched phylogeny"
        );
        Phylogeny {
            times: self.times.index_axis(Axis(0), index).to_owned(),
            parents: self.parents.index_axis(Axis(0), index).to_owned(),
            leaves: self.leaves.index_axis(Axis(0), index).to_owned(),
        }
    }

    /// Iterate over the first batch axis.
    ///
    /// # Panics
    ///
    /// Panics if the phylogeny is unbatched.
    pub fn iter(&self) -> impl Iterator<Item = Phylogeny> + '_ {
        (0..self.len()).map(move |i| self.index(i))
    }

    /// Stack equally shaped phylogenies along a new leading batch axis.
    ///
    /// # Errors
    ///
    /// [`ShapeMismatchError::EmptyStack`] for an empty input and
    /// [`ShapeMismatchError::StackElement`] when an element's shape differs
    /// from the first.
    ///
    /// # Examples
    ///
    /// ```
    /// use phylomark::Phylogeny;
    ///
    /// let a = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
    /// let b = Phylogeny::from_vecs(vec![0.0, 1.0, 2.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
    ///
    /// let batch = Phylogeny::stack(&[a.clone(), b]).unwrap();
    /// assert_eq!(batch.batch_shape(), &[2]);
    /// assert_eq!(batch.index(0), a);
    /// ```
    pub fn stack(phylogenies: &[Phylogeny]) -> Result<Phylogeny, ShapeMismatchError> {
        let first = phylogenies.first().ok_or(ShapeMismatchError::EmptyStack)?;
        for (index, phylo) in phylogenies.iter().enumerate().skip(1) {
            if phylo.times.shape() != first.times.shape()
                || phylo.leaves.shape() != first.leaves.shape()
            {
                return Err(ShapeMismatchError::StackElement { index });
            }
        }

        let mut node_shape = Vec::with_capacity(first.times.ndim() + 1);
        node_shape.push(phylogenies.len());
        node_shape.extend_from_slice(first.times.shape());
        let mut leaf_shape = Vec::with_capacity(first.leaves.ndim() + 1);
        leaf_shape.push(phylogenies.len());
        leaf_shape.extend_from_slice(first.leaves.shape());

        let mut times = ArrayD::zeros(IxDyn(&node_shape));
        let mut parents = ArrayD::zeros(IxDyn(&node_shape));
        let mut leaves = ArrayD::zeros(IxDyn(&leaf_shape));
        for (i, phylo) in phylogenies.iter().enumerate() {
            times.index_axis_mut(Axis(0), i).assign(&phylo.times);
            parents.index_axis_mut(Axis(0), i).assign(&phylo.parents);
            leaves.index_axis_mut(Axis(0), i).assign(&phylo.leaves);
        }
        Ok(Phylogeny {
            times,
            parents,
            leaves,
        })
    }

    /// Number of lineages extant at each node's timestamp, shape `B x N`.
    ///
    /// Computed per lane as a signed indicator (every node contributes `+1`,
    /// overwritten to `-1` wherever a node appears as a parent) followed by
    /// a right-to-left cumulative sum. Leaves count `+1`, internal nodes and
    /// the root `-1`, so the running sum from the late end counts lineages
    /// alive at each time. Diagnostic only; the likelihood never reads it.
    ///
    /// # Examples
    ///
    /// ```
    /// use phylomark::Phylogeny;
    ///
    /// let phylo = Phylogeny::from_vecs(
    ///     vec![0.0, 1.0, 1.0, 2.0, 2.0],
    ///     vec![-1, 0, 0, 1, 1],
    ///     vec![2, 3, 4],
    /// ).unwrap();
    /// assert_eq!(phylo.num_lineages().as_slice().unwrap(), &[1, 2, 3, 2, 1]);
    /// ```
    pub fn num_lineages(&self) -> ArrayD<i64> {
        let axis = Axis(self.parents.ndim() - 1);
        let num_nodes = self.num_nodes();
        let mut counts = ArrayD::<i64>::zeros(self.parents.raw_dim());
        for (mut out, parents) in counts
            .lanes_mut(axis)
            .into_iter()
            .zip(self.parents.lanes(axis))
        {
            let mut sign = vec![1_i64; num_nodes];
            for i in 1..num_nodes {
                sign[parents[i] as usize] = -1;
            }
            let mut running = 0;
            for i in (0..num_nodes).rev() {
                running += sign[i];
                out[i] = running;
            }
        }
        counts
    }
}

fn check_shapes(
    times: &ArrayD<f64>,
    parents: &ArrayD<i64>,
    leaves: &ArrayD<usize>,
) -> Result<(), ShapeMismatchError> {
    if times.ndim() == 0 {
        return Err(ShapeMismatchError::MissingNodeAxis);
    }
    if parents.shape() != times.shape() {
        return Err(ShapeMismatchError::ParentsShape {
            expected: times.shape().to_vec(),
            actual: parents.shape().to_vec(),
        });
    }
    let node_axis = times.ndim() - 1;
    let num_nodes = times.shape()[node_axis];
    let mut expected = times.shape().to_vec();
    expected[node_axis] = (num_nodes + 1) / 2;
    if leaves.shape() != expected.as_slice() {
        return Err(ShapeMismatchError::LeavesShape {
            expected,
            actual: leaves.shape().to_vec(),
        });
    }
    Ok(())
}

fn check_structure(
    times: &ArrayD<f64>,
    parents: &ArrayD<i64>,
    leaves: &ArrayD<usize>,
) -> Result<(), StructuralError> {
    let num_nodes = times.shape()[times.ndim() - 1];
    if num_nodes % 2 == 0 {
        return Err(StructuralError::EvenNodeCount { num_nodes });
    }

    let node_axis = Axis(times.ndim() - 1);
    let leaf_axis = Axis(leaves.ndim() - 1);
    for ((time_lane, parent_lane), leaf_lane) in times
        .lanes(node_axis)
        .into_iter()
        .zip(parents.lanes(node_axis))
        .zip(leaves.lanes(leaf_axis))
    {
        // The negated form also rejects NaN timestamps.
        for i in 1..num_nodes {
            if !(time_lane[i - 1] <= time_lane[i]) {
                return Err(StructuralError::UnorderedTimes {
                    index: i,
                    time: time_lane[i],
                    previous: time_lane[i - 1],
                });
            }
        }

        if parent_lane[0] != -1 {
            return Err(StructuralError::RootNotFirst {
                parent: parent_lane[0],
            });
        }
        for i in 1..num_nodes {
            let parent = parent_lane[i];
            if parent < 0 || parent >= i as i64 {
                return Err(StructuralError::ParentNotEarlier { index: i, parent });
            }
        }

        let mut has_children = vec![false; num_nodes];
        for i in 1..num_nodes {
            has_children[parent_lane[i] as usize] = true;
        }
        let mut declared = vec![false; num_nodes];
        for &leaf in leaf_lane.iter() {
            if leaf >= num_nodes {
                return Err(StructuralError::LeafOutOfBounds {
                    index: leaf,
                    num_nodes,
                });
            }
            if declared[leaf] {
                return Err(StructuralError::DuplicateLeaf { index: leaf });
            }
            declared[leaf] = true;
        }
        for i in 0..num_nodes {
            match (declared[i], has_children[i]) {
                (true, true) => return Err(StructuralError::LeafHasChildren { index: i }),
                (false, false) => return Err(StructuralError::MissingLeaf { index: i }),
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn cherry() -> Phylogeny {
        Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 2]).unwrap()
    }

    #[test]
    fn test_new_accepts_valid_tree() {
        let phylo = cherry();
        assert_eq!(phylo.num_nodes(), 3);
        assert_eq!(phylo.num_leaves(), 2);
        assert_eq!(phylo.batch_shape(), &[] as &[usize]);
    }

    #[test]
    fn test_new_rejects_even_node_count() {
        let result = Phylogeny::from_vecs(vec![0.0, 1.0], vec![-1, 0], vec![1]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(StructuralError::EvenNodeCount {
                num_nodes: 2
            }))
        ));
    }

    #[test]
    fn test_new_rejects_unordered_times() {
        let result = Phylogeny::from_vecs(vec![0.0, 2.0, 1.0], vec![-1, 0, 0], vec![1, 2]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(
                StructuralError::UnorderedTimes { index: 2, .. }
            ))
        ));
    }

    #[test]
    fn test_new_rejects_nan_times() {
        let result = Phylogeny::from_vecs(vec![0.0, f64::NAN, 1.0], vec![-1, 0, 0], vec![1, 2]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(StructuralError::UnorderedTimes { .. }))
        ));
    }

    #[test]
    fn test_new_rejects_missing_root_sentinel() {
        let result = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![0, 0, 0], vec![1, 2]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(StructuralError::RootNotFirst {
                parent: 0
            }))
        ));
    }

    #[test]
    fn test_new_rejects_late_parent() {
        let result = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 2, 0], vec![1, 2]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(
                StructuralError::ParentNotEarlier {
                    index: 1,
                    parent: 2
                }
            ))
        ));
    }

    #[test]
    fn test_new_rejects_leaf_out_of_bounds() {
        let result = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 7]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(
                StructuralError::LeafOutOfBounds {
                    index: 7,
                    num_nodes: 3
                }
            ))
        ));
    }

    #[test]
    fn test_new_rejects_duplicate_leaf() {
        let result = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 1]);
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(StructuralError::DuplicateLeaf {
                index: 1
            }))
        ));
    }

    #[test]
    fn test_new_rejects_internal_node_declared_leaf() {
        // Node 1 is the parent of nodes 3 and 4 yet appears in the leaf list.
        let result = Phylogeny::from_vecs(
            vec![0.0, 1.0, 1.0, 2.0, 2.0],
            vec![-1, 0, 0, 1, 1],
            vec![1, 3, 4],
        );
        assert!(matches!(
            result,
            Err(PhylogenyError::Structural(
                StructuralError::LeafHasChildren { index: 1 }
            ))
        ));
    }

    #[test]
    fn test_new_rejects_shape_disagreement() {
        let result = Phylogeny::new(
            array![0.0, 1.0, 1.0].into_dyn(),
            array![-1_i64, 0].into_dyn(),
            Array1::from_vec(vec![1_usize, 2]).into_dyn(),
        );
        assert!(matches!(
            result,
            Err(PhylogenyError::Shape(ShapeMismatchError::ParentsShape { .. }))
        ));
    }

    #[test]
    fn test_new_unchecked_skips_structure() {
        // Unordered times would fail `new`; `new_unchecked` accepts them.
        let phylo = Phylogeny::new_unchecked(
            array![2.0, 1.0, 0.0].into_dyn(),
            array![-1_i64, 0, 0].into_dyn(),
            Array1::from_vec(vec![1_usize, 2]).into_dyn(),
        );
        assert!(phylo.is_ok());
    }

    #[test]
    fn test_single_node_tree_is_valid() {
        let phylo = Phylogeny::from_vecs(vec![1.0], vec![-1], vec![0]).unwrap();
        assert_eq!(phylo.num_nodes(), 1);
        assert_eq!(phylo.num_leaves(), 1);
    }

    #[test]
    fn test_leaf_count_relation() {
        let phylo = Phylogeny::from_vecs(
            vec![0.0, 1.0, 1.0, 2.0, 2.0],
            vec![-1, 0, 0, 1, 1],
            vec![2, 3, 4],
        )
        .unwrap();
        assert_eq!(phylo.num_nodes(), 2 * phylo.num_leaves() - 1);
    }

    #[test]
    fn test_stack_and_index_roundtrip() {
        let a = cherry();
        let b = Phylogeny::from_vecs(vec![0.0, 2.0, 3.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
        let batch = Phylogeny::stack(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(batch.batch_shape(), &[2]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.index(0), a);
        assert_eq!(batch.index(1), b);

        let collected: Vec<Phylogeny> = batch.iter().collect();
        assert_eq!(collected, vec![a, b]);
    }

    #[test]
    fn test_stack_rejects_empty() {
        assert!(matches!(
            Phylogeny::stack(&[]),
            Err(ShapeMismatchError::EmptyStack)
        ));
    }

    #[test]
    fn test_stack_rejects_mixed_shapes() {
        let a = cherry();
        let b = Phylogeny::from_vecs(
            vec![0.0, 1.0, 1.0, 2.0, 2.0],
            vec![-1, 0, 0, 1, 1],
            vec![2, 3, 4],
        )
        .unwrap();
        assert!(matches!(
            Phylogeny::stack(&[a, b]),
            Err(ShapeMismatchError::StackElement { index: 1 })
        ));
    }

    #[test]
    fn test_restack_of_parts_identity() {
        let a = cherry();
        let b = Phylogeny::from_vecs(vec![0.0, 2.0, 3.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
        let batch = Phylogeny::stack(&[a, b]).unwrap();

        let parts: Vec<Phylogeny> = batch.iter().collect();
        let restacked = Phylogeny::stack(&parts).unwrap();
        assert_eq!(restacked, batch);
    }

    #[test]
    fn test_num_lineages_cherry() {
        assert_eq!(cherry().num_lineages().as_slice().unwrap(), &[1, 2, 1]);
    }

    #[test]
    fn test_num_lineages_caterpillar() {
        // Root splits at time 0, node 1 splits again at time 1.
        let phylo = Phylogeny::from_vecs(
            vec![0.0, 1.0, 1.0, 2.0, 2.0],
            vec![-1, 0, 0, 1, 1],
            vec![2, 3, 4],
        )
        .unwrap();
        assert_eq!(phylo.num_lineages().as_slice().unwrap(), &[1, 2, 3, 2, 1]);
    }

    #[test]
    fn test_num_lineages_batched_matches_per_tree() {
        let a = cherry();
        let b = Phylogeny::from_vecs(vec![0.0, 2.0, 3.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
        let batch = Phylogeny::stack(&[a.clone(), b.clone()]).unwrap();

        let batched = batch.num_lineages();
        assert_eq!(
            batched.index_axis(Axis(0), 0).to_owned(),
            a.num_lineages()
        );
        assert_eq!(
            batched.index_axis(Axis(0), 1).to_owned(),
            b.num_lineages()
        );
    }

    #[test]
    #[should_panic(expected = "unbatched phylogeny has no length")]
    fn test_len_panics_unbatched() {
        let _ = cherry().len();
    }

    #[test]
    #[should_panic(expected = "cannot index an unbatched phylogeny")]
    fn test_index_panics_unbatched() {
        let _ = cherry().index(0);
    }
}
