//! Delegated execution.
//!
//! A [`RemoteConnection`] evaluates a traversal's [`Bytecode`] somewhere else
//! and answers with detached value+bulk results plus, optionally, a partial
//! side-effects store to merge. The transport is up to the implementation.

use std::fmt;

use crate::bytecode::Bytecode;
use crate::error::TraversalResult;
use crate::side_effects::SideEffectsSnapshot;
use crate::traverser::DetachedTraverser;

/// A stream of results computed elsewhere.
pub type DetachedStream = Box<dyn Iterator<Item = TraversalResult<DetachedTraverser>> + Send>;

/// Evaluates bytecode on behalf of a local traversal.
pub trait RemoteConnection: Send + Sync {
    /// Submits `bytecode` for evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Remote`](crate::TraversalError::Remote) if
    /// the submission fails.
    fn submit(&self, bytecode: &Bytecode) -> TraversalResult<RemoteResults>;
}

impl fmt::Debug for dyn RemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<RemoteConnection>")
    }
}

/// The answer of a [`RemoteConnection`].
pub struct RemoteResults {
    traversers: DetachedStream,
    side_effects: Option<SideEffectsSnapshot>,
}

impl RemoteResults {
    /// Wraps a stream of possibly failing results.
    #[must_use]
    pub fn new(traversers: DetachedStream) -> Self {
        Self { traversers, side_effects: None }
    }

    /// Wraps already materialized results.
    #[must_use]
    pub fn from_traversers<I>(traversers: I) -> Self
    where
        I: IntoIterator<Item = DetachedTraverser>,
        I::IntoIter: Send + 'static,
    {
        Self::new(Box::new(traversers.into_iter().map(Ok)))
    }

    /// Attaches a side-effects partial result.
    #[must_use]
    pub fn with_side_effects(mut self, side_effects: SideEffectsSnapshot) -> Self {
        self.side_effects = Some(side_effects);
        self
    }

    /// Returns the attached side-effects partial result.
    #[must_use]
    pub fn side_effects(&self) -> Option<&SideEffectsSnapshot> {
        self.side_effects.as_ref()
    }

    /// Splits into the result stream and the side-effects partial result.
    #[must_use]
    pub fn into_parts(self) -> (DetachedStream, Option<SideEffectsSnapshot>) {
        (self.traversers, self.side_effects)
    }
}

impl fmt::Debug for RemoteResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResults")
            .field("side_effects", &self.side_effects)
            .finish_non_exhaustive()
    }
}
