//! Markov substitution models and the pruning marginal likelihood.
//!
//! This module provides the log-domain transition model, the stabilized
//! log-space linear algebra it runs on, the pruning likelihood itself, and
//! a distribution-shaped wrapper for probabilistic-programming callers.

mod distribution;
mod likelihood;
mod linalg;
mod transition;

pub use distribution::{Distribution, IntegerInterval, MarkovTree};
pub use likelihood::{markov_log_prob, markov_log_prob_single};
pub use linalg::{log_matrix_vector, log_sum_exp, matrix_power};
pub use transition::StateTransition;
