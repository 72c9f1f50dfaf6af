use std::collections::VecDeque;

use super::{StepBase, Starts, Step};
use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::graph::Direction;
use crate::traverser::Traverser;

/// Moves each traverser to the vertices adjacent to its value.
#[derive(Debug)]
pub struct ExpandStep {
    base: StepBase,
    direction: Direction,
    label: Option<String>,
    buffer: VecDeque<Traverser>,
}

impl ExpandStep {
    /// Creates the step.
    #[must_use]
    pub fn new(direction: Direction, label: Option<String>) -> Self {
        Self { base: StepBase::new(), direction, label, buffer: VecDeque::new() }
    }

    /// Returns the expansion direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the edge label filter.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Step for ExpandStep {
    fn name(&self) -> &'static str {
        self.direction.as_str()
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
            let Some(traverser) = starts.next(ctx)? else {
                return Ok(None);
            };
            let graph = ctx.graph()?;
            let adjacent =
                graph.adjacent(traverser.value(), self.direction, self.label.as_deref())?;
            self.buffer.extend(adjacent.into_iter().map(|vertex| traverser.split(vertex)));
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self {
            base: self.base.fresh(),
            direction: self.direction,
            label: self.label.clone(),
            buffer: VecDeque::new(),
        })
    }
}
