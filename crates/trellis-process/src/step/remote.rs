use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{StepBase, Starts, Step};
use crate::bytecode::Bytecode;
use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::remote::{DetachedStream, RemoteConnection};
use crate::traverser::Traverser;

/// Replays results computed by a [`RemoteConnection`].
///
/// On the first pull the step submits its bytecode, merges any side-effect
/// partial result into the traversal's store and then yields the detached
/// traversers as ordinary traversers.
pub struct RemoteStep {
    base: StepBase,
    connection: Arc<dyn RemoteConnection>,
    bytecode: Bytecode,
    results: Option<DetachedStream>,
    done: bool,
}

impl RemoteStep {
    /// Creates the step.
    #[must_use]
    pub fn new(connection: Arc<dyn RemoteConnection>, bytecode: Bytecode) -> Self {
        Self { base: StepBase::new(), connection, bytecode, results: None, done: false }
    }

    /// Returns the bytecode submitted to the connection.
    #[must_use]
    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }
}

impl Step for RemoteStep {
    fn name(&self) -> &'static str {
        "remote"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        _starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        if self.done {
            return Ok(None);
        }
        if self.results.is_none() {
            trace!(bytecode = %self.bytecode, "submitting traversal to remote connection");
            let (traversers, side_effects) = self.connection.submit(&self.bytecode)?.into_parts();
            if let Some(snapshot) = side_effects {
                ctx.side_effects().merge_snapshot(snapshot)?;
            }
            self.results = Some(traversers);
        }
        match self.results.as_mut().and_then(|results| results.next()) {
            Some(detached) => Ok(Some(Traverser::from(detached?))),
            None => {
                self.results = None;
                self.done = true;
                Ok(None)
            }
        }
    }

    fn reset(&mut self) {
        self.results = None;
        self.done = false;
    }

    fn clone_step(&self) -> Box<dyn Step> {
        let mut step = Self::new(Arc::clone(&self.connection), self.bytecode.clone());
        step.base = self.base.fresh();
        Box::new(step)
    }
}

impl fmt::Debug for RemoteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStep")
            .field("id", &self.base.id())
            .field("bytecode", &self.bytecode.to_string())
            .field("submitted", &self.results.is_some())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
