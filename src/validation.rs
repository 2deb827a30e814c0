//! Toggle for expensive input validation.

use serde::{Deserialize, Serialize};

/// Controls whether expensive input checks run during likelihood evaluation
/// and model construction.
///
/// Checks that guard memory safety or the existence of a result (array
/// shapes, observed-state bounds, integral elapsed times) always run; this
/// toggle gates the rest, such as row-stochasticity of transition matrices.
/// With [`Validation::Disabled`], malformed input produces unspecified
/// numerical results rather than an error.
///
/// Passed explicitly at each call site instead of read from ambient state,
/// so two callers of the same data can make different choices.
///
/// # Examples
///
/// ```
/// use phylomark::Validation;
///
/// let mode = Validation::default();
/// assert!(mode.is_enabled());
/// assert!(!Validation::Disabled.is_enabled());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Validation {
    /// Run every check (the default).
    #[default]
    Enabled,
    /// Skip the gated checks; trusted inputs only.
    Disabled,
}

impl Validation {
    /// Whether gated checks should run.
    #[inline]
    pub fn is_enabled(self) -> bool {
        matches!(self, Validation::Enabled)
    }
}
