//! Error types for traversal construction and execution.

use std::time::Duration;

use thiserror::Error;
use trellis_core::CoreError;

use crate::graph::GraphError;

/// Errors that can occur while building, rewriting or iterating a traversal.
///
/// Three conditions are distinguished at every pull boundary:
///
/// - [`Exhausted`](Self::Exhausted) is the normal end of data.
/// - [`Interrupted`](Self::Interrupted) is cooperative cancellation.
/// - Everything else is a genuine failure.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// The traversal has no more elements.
    #[error("no such element: traversal is exhausted")]
    Exhausted,

    /// Cancellation was observed at a pull boundary.
    #[error("traversal interrupted")]
    Interrupted,

    /// A structural mutation was attempted on a locked traversal.
    #[error("traversal is locked: cannot {operation}")]
    Locked {
        /// The rejected operation.
        operation: &'static str,
    },

    /// A strategy pass failed; the traversal was left unlocked.
    #[error("strategy {strategy} failed: {reason}")]
    StrategyFailed {
        /// Name of the failing strategy.
        strategy: String,
        /// Why it failed.
        reason: String,
    },

    /// Strategy ordering constraints cannot be satisfied.
    #[error("invalid strategy order: {0}")]
    StrategyOrder(String),

    /// A step failed while producing traversers.
    #[error("step {step} failed: {reason}")]
    Step {
        /// Identifier of the failing step.
        step: String,
        /// Why it failed.
        reason: String,
    },

    /// A step index was outside the pipeline.
    #[error("step index {index} out of bounds for a traversal of {len} steps")]
    StepIndex {
        /// The requested index.
        index: usize,
        /// The number of steps in the traversal.
        len: usize,
    },

    /// The bound graph failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Delegated execution failed.
    #[error("remote execution failed: {0}")]
    Remote(String),

    /// A side-effect lookup or merge failed.
    #[error("side effect error: {0}")]
    SideEffect(String),

    /// A promise did not complete in time.
    #[error("promise did not complete within {0:?}")]
    Timeout(Duration),

    /// The result of a promise was already retrieved.
    #[error("promise result already taken")]
    ResultTaken,

    /// A promise body panicked on its worker.
    #[error("promise body panicked: {0}")]
    Panicked(String),

    /// Bytecode or result encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A value-level operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TraversalError {
    /// Returns true if this is the normal end-of-data condition.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Returns true if this error reports cooperative cancellation.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Creates a step failure.
    #[must_use]
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Step { step: step.into(), reason: reason.into() }
    }

    /// Creates a side-effect failure.
    #[must_use]
    pub fn side_effect(reason: impl Into<String>) -> Self {
        Self::SideEffect(reason.into())
    }
}

/// Result type for traversal operations.
pub type TraversalResult<T> = Result<T, TraversalError>;
