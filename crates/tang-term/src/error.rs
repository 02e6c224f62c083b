//! Error types for tang-term.

use thiserror::Error;

/// Errors raised by the symbolic paths, the tape compiler and the interpreter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TermError {
    /// Symbolic differentiation reached a node that only has a relaxed
    /// numeric gradient (comparisons, logic, min/max, reification).
    #[error("symbolic derivative of {kind} is not supported")]
    NotDifferentiable { kind: &'static str },
    /// The node has no logical complement.
    #[error("cannot negate {kind}")]
    NotNegatable { kind: &'static str },
    /// A term from another builder, a non-variable used as a variable, or a
    /// cyclic graph.
    #[error("malformed term graph: {reason}")]
    MalformedGraph { reason: String },
    /// `evaluate` was called before any `compile`.
    #[error("no tape has been compiled")]
    NotCompiled,
    /// A caller-provided buffer has the wrong length.
    #[error("{what} has length {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid builder configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl TermError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedGraph {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TermError>;
