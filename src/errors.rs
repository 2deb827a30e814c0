//! Error types for phylogeny construction and likelihood evaluation.
//!
//! Each error carries the offending values so callers can report what was
//! wrong without re-deriving it. Concrete types are grouped by the operation
//! that raises them into [`PhylogenyError`] and [`LikelihoodError`].

use thiserror::Error;

/// Violations of the structural invariants of a flat tree encoding.
///
/// Raised by [`Phylogeny::new`](crate::Phylogeny::new); each variant names
/// the invariant that failed and the first offending node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    /// A binary tree with L leaves has 2L - 1 nodes, always odd.
    #[error("Invalid node count: {num_nodes} (must be odd)")]
    EvenNodeCount { num_nodes: usize },

    /// Node times must be non-decreasing along the node axis.
    #[error("Unordered times at node {index}: {time} precedes {previous}")]
    UnorderedTimes {
        index: usize,
        time: f64,
        previous: f64,
    },

    /// The first node must be the root, marked with parent -1.
    #[error("Invalid root sentinel: parents[0] = {parent} (must be -1)")]
    RootNotFirst { parent: i64 },

    /// Every non-root node must reference a strictly earlier node.
    #[error("Invalid parent for node {index}: {parent} (must be in 0..{index})")]
    ParentNotEarlier { index: usize, parent: i64 },

    /// A declared leaf index past the end of the node axis.
    #[error("Leaf index {index} out of bounds (num_nodes = {num_nodes})")]
    LeafOutOfBounds { index: usize, num_nodes: usize },

    /// The same node declared as a leaf more than once.
    #[error("Duplicate leaf index: {index}")]
    DuplicateLeaf { index: usize },

    /// A declared leaf that has children.
    #[error("Node {index} is declared a leaf but has children")]
    LeafHasChildren { index: usize },

    /// A childless node missing from the declared leaves.
    #[error("Node {index} has no children but is not a declared leaf")]
    MissingLeaf { index: usize },
}

/// Array-shape disagreements, either between the pieces of a tree encoding
/// or between an encoding and the data evaluated against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeMismatchError {
    /// The times array needs at least a node axis.
    #[error("Times array has no node axis (0-dimensional)")]
    MissingNodeAxis,

    /// Parents must have exactly the shape of times.
    #[error("Parents shape {actual:?} does not match times shape {expected:?}")]
    ParentsShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Leaves must share the batch shape, with trailing length (N + 1) / 2.
    #[error("Leaves shape {actual:?} does not match expected {expected:?}")]
    LeavesShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Observed leaf states must be one per leaf.
    #[error("Leaf state length mismatch: {actual} observations for {expected} leaves")]
    LeafStateLength { expected: usize, actual: usize },

    /// A transition matrix must be square.
    #[error("Transition matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// A transition grid needs at least one interval.
    #[error("Transition grid has no intervals")]
    EmptyGrid,

    /// Stacking requires at least one phylogeny.
    #[error("Cannot stack an empty set of phylogenies")]
    EmptyStack,

    /// All stacked phylogenies must share one shape.
    #[error("Stacked phylogeny {index} has a different shape")]
    StackElement { index: usize },

    /// An operation restricted to unbatched trees received a batch.
    #[error("Expected an unbatched phylogeny, got batch shape {batch_shape:?}")]
    Batched { batch_shape: Vec<usize> },
}

/// The supplied root is not the earliest node of the converted tree.
///
/// Raised by [`Phylogeny::from_clade`](crate::Phylogeny::from_clade) when
/// another node sorts before the root in (time, name) order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Node '{node}' sorts before the supplied root")]
pub struct InvalidRootError {
    /// Name of the node that preceded the root.
    pub node: String,
}

/// Violations of the value constraints of the substitution model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    /// A transition-probability row must sum to one.
    #[error("Invalid row {row} of transition matrix {matrix}: probabilities sum to {sum} (must be 1.0)")]
    RowNotStochastic { matrix: usize, row: usize, sum: f64 },

    /// An observed state outside the state space.
    #[error("Observed state {state} out of range (num_states = {num_states})")]
    StateOutOfRange { state: usize, num_states: usize },
}

/// An edge whose elapsed time cannot be expressed as transition steps.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidTimeError {
    /// Child before parent.
    #[error("Negative elapsed time {elapsed} from time {start} to {end}")]
    Negative { start: f64, end: f64, elapsed: f64 },

    /// Elapsed time too far from a whole number of steps.
    #[error("Elapsed time {elapsed} is not a whole number of steps")]
    NonIntegral { elapsed: f64 },
}

/// Requested functionality that is recognized but not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Time-varying transition matrices are not supported (grid of {intervals} intervals)")]
pub struct UnsupportedError {
    /// Number of intervals in the rejected transition grid.
    pub intervals: usize,
}

/// Errors from constructing or converting a [`Phylogeny`](crate::Phylogeny).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhylogenyError {
    /// A structural invariant of the encoding failed.
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    /// The arrays disagree on shape.
    #[error("Shape mismatch: {0}")]
    Shape(#[from] ShapeMismatchError),

    /// The conversion root was not the earliest node.
    #[error("Invalid root: {0}")]
    InvalidRoot(#[from] InvalidRootError),
}

/// Errors from evaluating a likelihood.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LikelihoodError {
    /// Inputs disagree on shape.
    #[error("Shape mismatch: {0}")]
    Shape(#[from] ShapeMismatchError),

    /// The model violated a value constraint.
    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintError),

    /// An edge spans a non-integral or negative number of steps.
    #[error("Invalid time: {0}")]
    InvalidTime(#[from] InvalidTimeError),

    /// The requested model form is not implemented.
    #[error("Unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),
}
