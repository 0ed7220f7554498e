//! Error types for the path passes.
//!
//! File and persistence helpers report through `anyhow`; everything that
//! transforms geometry reports a [`PathError`].

use thiserror::Error;

/// Errors raised by the path passes and the job driving them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    /// A configuration value is outside its valid range.
    #[error("Invalid value for '{name}': {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A coordinate or numeric attribute is NaN or infinite.
    #[error("Non-finite {field}{}", .index.map(|i| format!(" at point {i}")).unwrap_or_default())]
    NonFinite {
        index: Option<usize>,
        field: &'static str,
    },

    /// Two consecutive passes do not correspond point for point.
    #[error("Pass {pass} has {found} points but the previous pass has {expected}")]
    PassLengthMismatch {
        pass: usize,
        expected: usize,
        found: usize,
    },

    /// A pass refers to a source point its predecessor never produced.
    #[error("Pass {pass} has source point {source_index} missing from the previous pass")]
    UnmatchedSourcePoint { pass: usize, source_index: usize },

    /// The first pass, or one past the end, has nothing to compare against.
    #[error("Pass {pass} has no predecessor in a history of {passes} passes")]
    NoPredecessor { pass: usize, passes: usize },
}

impl PathError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// Result type alias for path operations.
pub type PathResult<T> = Result<T, PathError>;
