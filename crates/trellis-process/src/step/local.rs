use std::collections::VecDeque;

use super::{StepBase, Starts, Step};
use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::traversal::Traversal;
use crate::traverser::{RequirementSet, Traverser, TraverserRequirement};

/// Evaluates a child traversal once per incoming traverser and emits
/// everything the child produces for it.
///
/// The child shares the parent's side effects and graph (unless it was
/// isolated) and observes the parent's cancellation token.
#[derive(Debug)]
pub struct LocalStep {
    base: StepBase,
    child: Traversal,
    buffer: VecDeque<Traverser>,
}

impl LocalStep {
    /// Creates the step around `child`.
    #[must_use]
    pub fn new(child: Traversal) -> Self {
        Self { base: StepBase::new(), child, buffer: VecDeque::new() }
    }

    /// Returns the child traversal.
    #[must_use]
    pub fn child(&self) -> &Traversal {
        &self.child
    }
}

impl Step for LocalStep {
    fn name(&self) -> &'static str {
        "local"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        loop {
            if let Some(traverser) = self.buffer.pop_front() {
                return Ok(Some(traverser));
            }
            let Some(mut traverser) = starts.next(ctx)? else {
                return Ok(None);
            };
            let carries_side_effects = traverser.side_effects().is_some();
            if carries_side_effects {
                traverser.set_side_effects(self.child.side_effects().clone());
            }
            self.child.reset();
            self.child.set_interrupt(ctx.interrupt().cloned());
            self.child.add_start(traverser);
            while let Some(mut output) = self.child.try_next_traverser()? {
                if carries_side_effects {
                    output.set_side_effects(ctx.side_effects().clone());
                }
                self.buffer.push_back(output);
            }
        }
    }

    fn requirements(&self) -> RequirementSet {
        RequirementSet::new().with(TraverserRequirement::Nested)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.child.reset();
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self {
            base: self.base.fresh(),
            child: self.child.clone(),
            buffer: VecDeque::new(),
        })
    }

    fn children(&self) -> Vec<&Traversal> {
        vec![&self.child]
    }

    fn children_mut(&mut self) -> Vec<&mut Traversal> {
        vec![&mut self.child]
    }

    fn set_id(&mut self, id: String) {
        self.child.set_parent(Some(id.clone()));
        self.base.id = id;
    }
}
