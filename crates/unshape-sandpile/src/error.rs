//! Error types for unshape-sandpile.

use std::fmt;
use thiserror::Error;

/// Why a cascade was abandoned before the grid settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsettledReason {
    /// The grid revisited a configuration seen earlier in the same cascade.
    Cycle {
        /// Iteration at which the repeated configuration was first seen.
        start: u64,
        /// Number of firings between the two sightings.
        length: u64,
    },
    /// The per-cascade firing budget ran out.
    FiringBudget(u64),
}

impl fmt::Display for UnsettledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { start, length } => {
                write!(f, "cycle of length {length} starting at iteration {start}")
            }
            Self::FiringBudget(budget) => write!(f, "firing budget of {budget} exhausted"),
        }
    }
}

/// Errors that can occur during sandpile operations.
#[derive(Debug, Error)]
pub enum SandpileError {
    /// Grid size must be at least 1.
    #[error("invalid grid size: {0}")]
    InvalidSize(usize),

    /// Cell coordinates outside the grid.
    #[error("cell ({row}, {col}) out of bounds for size {size}")]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Grid side length.
        size: usize,
    },

    /// Initial cell values do not fill the grid.
    #[error("expected {expected} cell values, got {actual}")]
    CellCountMismatch {
        /// Number of cells in the grid.
        expected: usize,
        /// Number of values provided.
        actual: usize,
    },

    /// History capacity must be at least 1.
    #[error("invalid history capacity: {0}")]
    InvalidCapacity(usize),

    /// The cascade cannot settle; the grid still holds unstable cells.
    #[error("cascade did not settle after {firings} firings: {reason}")]
    Unsettled {
        /// Firings performed by the abandoned cascade.
        firings: u64,
        /// What stopped the cascade.
        reason: UnsettledReason,
    },

    /// Malformed explosion log token.
    #[error("invalid log token {token:?}: {message}")]
    Parse {
        /// The offending token.
        token: String,
        /// What was wrong with it.
        message: String,
    },

    /// I/O error while reading or appending an explosion log.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for sandpile operations.
pub type Result<T> = std::result::Result<T, SandpileError>;
