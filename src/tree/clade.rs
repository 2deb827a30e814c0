//! Conversion from externally parsed tree structures.
//!
//! Parsers for Newick, NEXUS or other formats produce recursive node
//! structures. The [`Clade`] trait is the boundary this crate asks of them:
//! a node has a name, an optional branch length and children. Any such
//! structure converts into a [`Phylogeny`] with
//! [`Phylogeny::from_clade`]; [`SimpleClade`] is a ready-made owned
//! implementation for tests and hand-built trees.

use serde::{Deserialize, Serialize};

use crate::errors::{InvalidRootError, PhylogenyError};
use crate::tree::Phylogeny;

/// One node of an externally parsed tree.
///
/// Implementations only describe structure; all ordering and validation
/// happens during conversion.
pub trait Clade {
    /// Node name. Used for deterministic tie-breaking and leaf ordering, so
    /// leaf names should be unique within a tree.
    fn name(&self) -> &str;

    /// Branch length from the parent (for the root: from the origin of
    /// time). `None` defaults to one time unit; an explicit `0.0` is kept.
    fn branch_length(&self) -> Option<f64>;

    /// Child nodes, empty for a leaf.
    fn children(&self) -> Vec<&Self>;
}

/// A minimal owned tree implementing [`Clade`].
///
/// # Examples
///
/// ```
/// use phylomark::{Clade, SimpleClade};
///
/// let tree = SimpleClade::internal("root", None, vec![
///     SimpleClade::leaf("a", Some(1.0)),
///     SimpleClade::leaf("b", Some(2.0)),
/// ]);
/// assert_eq!(tree.children().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleClade {
    name: String,
    branch_length: Option<f64>,
    children: Vec<SimpleClade>,
}

impl SimpleClade {
    /// Create a leaf node.
    pub fn leaf(name: impl Into<String>, branch_length: Option<f64>) -> Self {
        Self {
            name: name.into(),
            branch_length,
            children: Vec::new(),
        }
    }

    /// Create an internal node with the given children.
    pub fn internal(
        name: impl Into<String>,
        branch_length: Option<f64>,
        children: Vec<SimpleClade>,
    ) -> Self {
        Self {
            name: name.into(),
            branch_length,
            children,
        }
    }
}

impl Clade for SimpleClade {
    fn name(&self) -> &str {
        &self.name
    }

    fn branch_length(&self) -> Option<f64> {
        self.branch_length
    }

    fn children(&self) -> Vec<&Self> {
        self.children.iter().collect()
    }
}

/// Sentinel parent index for the conversion root.
const NO_PARENT: usize = usize::MAX;

struct FlatClade<'a, C> {
    clade: &'a C,
    parent: usize,
    time: f64,
    num_children: usize,
}

impl Phylogeny {
    /// Convert an externally parsed tree into a validated [`Phylogeny`].
    ///
    /// Node times are cumulative branch lengths from the root; the root's
    /// own time is its own branch length (one time unit when absent). Nodes
    /// are ordered by `(time, name)` with a stable sort, so conversion is
    /// deterministic for identical input structure. Leaf ids are listed
    /// sorted by leaf name; observed states passed to the likelihood follow
    /// that order.
    ///
    /// # Errors
    ///
    /// [`InvalidRootError`](crate::errors::InvalidRootError) when some other
    /// node sorts before the supplied root (the root must be the earliest
    /// node), and any [`Phylogeny::new`] error for structure the encoding
    /// cannot hold, such as multifurcations or negative branch lengths.
    ///
    /// # Examples
    ///
    /// ```
    /// use phylomark::{Phylogeny, SimpleClade};
    ///
    /// let tree = SimpleClade::internal("root", None, vec![
    ///     SimpleClade::leaf("a", Some(1.0)),
    ///     SimpleClade::internal("inner", Some(2.0), vec![
    ///         SimpleClade::leaf("c", Some(1.0)),
    ///         SimpleClade::leaf("d", Some(1.0)),
    ///     ]),
    /// ]);
    ///
    /// let phylo = Phylogeny::from_clade(&tree).unwrap();
    /// assert_eq!(phylo.times().as_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0, 4.0]);
    /// assert_eq!(phylo.parents().as_slice().unwrap(), &[-1, 0, 0, 2, 2]);
    /// assert_eq!(phylo.leaves().as_slice().unwrap(), &[1, 3, 4]);
    /// ```
    pub fn from_clade<C: Clade>(root: &C) -> Result<Phylogeny, PhylogenyError> {
        // TODO: binarize multifurcating inputs instead of rejecting them in
        // validation.
        let root_time = root.branch_length().unwrap_or(1.0);
        let mut nodes: Vec<FlatClade<'_, C>> = Vec::new();
        let mut work: Vec<(&C, usize, f64)> = vec![(root, NO_PARENT, root_time)];
        while let Some((clade, parent, time)) = work.pop() {
            let children = clade.children();
            let id = nodes.len();
            nodes.push(FlatClade {
                clade,
                parent,
                time,
                num_children: children.len(),
            });
            for child in children.into_iter().rev() {
                let child_time = time + child.branch_length().unwrap_or(1.0);
                work.push((child, id, child_time));
            }
        }

        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(|&a, &b| {
            nodes[a]
                .time
                .total_cmp(&nodes[b].time)
                .then_with(|| nodes[a].clade.name().cmp(nodes[b].clade.name()))
        });
        if order[0] != 0 {
            return Err(InvalidRootError {
                node: nodes[order[0]].clade.name().to_string(),
            }
            .into());
        }
        let mut id_of = vec![0_usize; nodes.len()];
        for (new_id, &old) in order.iter().enumerate() {
            id_of[old] = new_id;
        }

        let times: Vec<f64> = order.iter().map(|&old| nodes[old].time).collect();
        let mut parents = Vec::with_capacity(nodes.len());
        parents.push(-1_i64);
        for &old in &order[1..] {
            parents.push(id_of[nodes[old].parent] as i64);
        }

        let mut leaf_olds: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&old| nodes[old].num_children == 0)
            .collect();
        leaf_olds.sort_by(|&a, &b| nodes[a].clade.name().cmp(nodes[b].clade.name()));
        let leaves: Vec<usize> = leaf_olds.into_iter().map(|old| id_of[old]).collect();

        Phylogeny::from_vecs(times, parents, leaves)
    }
}
