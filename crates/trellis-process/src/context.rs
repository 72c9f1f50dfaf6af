//! Per-pull execution context and cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{TraversalError, TraversalResult};
use crate::graph::{Graph, GraphError};
use crate::side_effects::SideEffects;
use crate::traverser::{RequirementSet, TraverserGenerator, TraverserRequirement};

/// A handle for cancelling traversal evaluation.
///
/// Clones share one flag, so a promise can stop a pull running on a worker
/// thread. Every pull checks the flag before touching a step.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether any clone has fired.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What a step sees of its owning traversal while producing a traverser.
///
/// Built by the traversal for every pull from disjoint borrows of its own
/// fields, so steps can read traversal state while the pipeline itself is
/// mutably borrowed.
pub struct StepContext<'a> {
    generator: &'a dyn TraverserGenerator,
    side_effects: &'a SideEffects,
    graph: Option<&'a Arc<dyn Graph>>,
    requirements: &'a RequirementSet,
    interrupt: Option<&'a CancellationToken>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        generator: &'a dyn TraverserGenerator,
        side_effects: &'a SideEffects,
        graph: Option<&'a Arc<dyn Graph>>,
        requirements: &'a RequirementSet,
        interrupt: Option<&'a CancellationToken>,
    ) -> Self {
        Self { generator, side_effects, graph, requirements, interrupt }
    }

    /// Returns the traverser generator selected for the traversal.
    #[must_use]
    pub fn generator(&self) -> &'a dyn TraverserGenerator {
        self.generator
    }

    /// Returns the traversal's side effects.
    #[must_use]
    pub fn side_effects(&self) -> &'a SideEffects {
        self.side_effects
    }

    /// Returns the bound graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoGraph`] if the traversal has no graph.
    pub fn graph(&self) -> TraversalResult<&'a Arc<dyn Graph>> {
        self.graph.ok_or(TraversalError::Graph(GraphError::NoGraph))
    }

    /// Returns the effective requirements of the traversal.
    #[must_use]
    pub fn requirements(&self) -> &'a RequirementSet {
        self.requirements
    }

    /// Returns true if the traversal requires `requirement`.
    #[must_use]
    pub fn requires(&self, requirement: TraverserRequirement) -> bool {
        self.requirements.contains(requirement)
    }

    /// Returns the installed cancellation token.
    #[must_use]
    pub fn interrupt(&self) -> Option<&'a CancellationToken> {
        self.interrupt
    }

    /// Fails with [`TraversalError::Interrupted`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Interrupted`] once the token is cancelled.
    #[inline]
    pub fn check_interrupt(&self) -> TraversalResult<()> {
        match self.interrupt {
            Some(token) if token.is_cancelled() => Err(TraversalError::Interrupted),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("generator", &self.generator.name())
            .field("requirements", &self.requirements)
            .field("graph", &self.graph.map(|g| g.name()))
            .field("interrupt", &self.interrupt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traverser::BulkGenerator;

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn context_checks_interrupt() {
        let side_effects = SideEffects::new();
        let requirements = RequirementSet::new().with(TraverserRequirement::Object);
        let token = CancellationToken::new();
        let ctx =
            StepContext::new(&BulkGenerator, &side_effects, None, &requirements, Some(&token));
        assert!(ctx.check_interrupt().is_ok());
        assert!(ctx.requires(TraverserRequirement::Object));
        assert!(matches!(ctx.graph(), Err(TraversalError::Graph(GraphError::NoGraph))));
        token.cancel();
        assert!(ctx.check_interrupt().unwrap_err().is_interrupted());
    }
}
