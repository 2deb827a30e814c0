//! Commonly used imports for convenience.
//!
//! This prelude module provides a convenient way to import the most commonly
//! used types and functions in the phylomark library.
//!
//! # Example
//!
//! ```
//! use phylomark::prelude::*;
//!
//! let phylo = Phylogeny::from_vecs(vec![0.0, 1.0, 1.0], vec![-1, 0, 0], vec![1, 2]).unwrap();
//! assert_eq!(phylo.num_leaves(), 2);
//! ```

pub use crate::errors;
pub use crate::tree::{Clade, Phylogeny, SimpleClade};
pub use crate::validation::Validation;

// Likelihood re-exports
pub use crate::markov::{
    markov_log_prob, markov_log_prob_single, Distribution, IntegerInterval, MarkovTree,
    StateTransition,
};
