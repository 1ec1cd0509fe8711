//! Four-valued verdict logic
//!
//! Every reachability and compliance question in this crate is answered
//! with a [`TriState`] rather than a `bool`, because some rule sources are
//! symbolic network scopes that cannot be resolved without topology data
//! this evaluator does not have.
//!
//! The type carries a total order used by the external query layer for
//! relational comparisons:
//!
//! ```text
//! False < Unknown < NotApplicable < True
//! ```
//!
//! `Unknown` and `NotApplicable` are deliberately "less allowing" than
//! `True`. Their relative placement is fixed here by declaration order; only
//! `False < {Unknown, NotApplicable} < True` is relied upon by the
//! evaluation algorithms.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A four-valued verdict: definitely denied, indeterminate, not applicable,
/// or definitely allowed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    /// Definitely denied
    False,

    /// Cannot be determined from available data (e.g. a symbolic address
    /// that would require topology to resolve). Never an error, and never
    /// coerced to `True` or `False`.
    Unknown,

    /// The question does not apply to the engine that was asked (e.g. a
    /// per-port whitelist presented to a port-agnostic engine).
    NotApplicable,

    /// Definitely allowed
    True,
}

impl TriState {
    /// Convert a definite boolean answer into a verdict
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }

    /// Check if this verdict is definitely allowed
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Check if this verdict is definitely denied
    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::False)
    }

    /// Check if this verdict is indeterminate (`Unknown` or `NotApplicable`)
    #[must_use]
    pub const fn is_indeterminate(self) -> bool {
        matches!(self, Self::Unknown | Self::NotApplicable)
    }

    /// The less allowing of two verdicts
    ///
    /// Useful when a compound check is only as good as its weakest part.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        self.min(other)
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::False => write!(f, "false"),
            Self::Unknown => write!(f, "unknown"),
            Self::NotApplicable => write!(f, "not_applicable"),
            Self::True => write!(f, "true"),
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}
