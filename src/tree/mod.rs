//! Timed tree encoding and ingestion.
//!
//! This module provides the flat tensor encoding of rooted binary timed
//! trees and the conversion boundary for externally parsed tree structures.

mod clade;
mod phylogeny;

pub use clade::{Clade, SimpleClade};
pub use phylogeny::Phylogeny;
