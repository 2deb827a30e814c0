//! Phylomark: tensor-backed timed phylogenies and Markov-chain likelihoods.
//!
//! This library provides a compact batched encoding of rooted binary timed
//! trees and the pruning algorithm for the marginal log-likelihood of
//! observed leaf states under a Markov substitution model.

pub mod errors;
pub mod markov;
pub mod prelude;
pub mod tree;
pub mod validation;

// Re-export commonly used types for convenient external access.
//
// These types form the public, stable surface that most consumers of the
// library will use when scoring trees. Re-exporting them here makes them
// available as `phylomark::Phylogeny`, `phylomark::MarkovTree`, etc.
pub use errors::{LikelihoodError, PhylogenyError};
pub use markov::{
    markov_log_prob, markov_log_prob_single, Distribution, IntegerInterval, MarkovTree,
    StateTransition,
};
pub use tree::{Clade, Phylogeny, SimpleClade};
pub use validation::Validation;
