use super::{StepBase, Starts, Step};
use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::traverser::Traverser;

/// Passes every traverser through unchanged.
#[derive(Debug, Default)]
pub struct IdentityStep {
    base: StepBase,
}

impl IdentityStep {
    /// Creates the step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Step for IdentityStep {
    fn name(&self) -> &'static str {
        "identity"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        starts.next(ctx)
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self { base: self.base.fresh() })
    }
}
