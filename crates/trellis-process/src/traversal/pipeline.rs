//! The ordered step arena and the recursive pull.

use std::collections::VecDeque;
use std::fmt;

use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::step::{Starts, Step};
use crate::traverser::Traverser;

/// A step installed in a traversal.
///
/// `previous` and `next` cache positions in the arena. They are derived from
/// the node order and rewritten by [`relink`] after every structural change.
pub(crate) struct StepNode {
    pub(crate) step: Box<dyn Step>,
    pub(crate) previous: Option<usize>,
    pub(crate) next: Option<usize>,
    pub(crate) peeked: Option<Traverser>,
}

impl StepNode {
    pub(crate) fn new(step: Box<dyn Step>) -> Self {
        Self { step, previous: None, next: None, peeked: None }
    }

    /// Clears runtime state, keeping configuration.
    pub(crate) fn reset(&mut self) {
        self.peeked = None;
        self.step.base_mut().clear();
        self.step.reset();
    }
}

impl fmt::Debug for StepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepNode")
            .field("step", &self.step)
            .field("previous", &self.previous)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

/// Rewrites the adjacency cache of every node from the arena order.
pub(crate) fn relink(nodes: &mut [StepNode]) {
    let len = nodes.len();
    for (index, node) in nodes.iter_mut().enumerate() {
        node.previous = index.checked_sub(1);
        node.next = (index + 1 < len).then_some(index + 1);
    }
}

/// Pulls one traverser out of the last node of `nodes`.
///
/// The last node pulls the nodes before it through [`Starts`]; the first
/// node pulls `head`. Cancellation is checked before every node pull.
pub(crate) fn pull(
    nodes: &mut [StepNode],
    head: &mut VecDeque<Traverser>,
    ctx: &StepContext<'_>,
) -> TraversalResult<Option<Traverser>> {
    ctx.check_interrupt()?;
    let Some((node, upstream)) = nodes.split_last_mut() else {
        return Ok(pop_head(head, ctx));
    };
    if let Some(traverser) = node.peeked.take() {
        return Ok(Some(traverser));
    }

    let buffered = std::mem::take(&mut node.step.base_mut().starts);
    let mut starts = Starts::new(buffered, upstream, head);
    let result = node.step.process_next(&mut starts, ctx);

    // Unconsumed starts go back in front of anything added meanwhile.
    let mut leftover = starts.buffered;
    let base = node.step.base_mut();
    leftover.append(&mut base.starts);
    base.starts = leftover;

    let Some(mut traverser) = result? else {
        return Ok(None);
    };
    traverser.set_step_id(base.id());
    traverser.add_labels(base.labels());
    base.record_produced();
    Ok(Some(traverser))
}

/// Takes the next injected traverser.
///
/// Injected traversers bypass the generator, so when it does not carry bulk
/// one unit is split off and the rest stays queued.
fn pop_head(head: &mut VecDeque<Traverser>, ctx: &StepContext<'_>) -> Option<Traverser> {
    let mut traverser = head.pop_front()?;
    let bulk = traverser.bulk();
    if bulk > 1 && !ctx.generator().supports_bulk() {
        let mut rest = traverser.clone();
        rest.set_bulk(bulk - 1);
        head.push_front(rest);
        traverser.set_bulk(1);
    }
    Some(traverser)
}

/// Pulls the node at the end of `nodes` without consuming the result.
pub(crate) fn peek(
    nodes: &mut [StepNode],
    head: &mut VecDeque<Traverser>,
    ctx: &StepContext<'_>,
) -> TraversalResult<bool> {
    if nodes.last().is_some_and(|node| node.peeked.is_some()) {
        return Ok(true);
    }
    let pulled = pull(nodes, head, ctx)?;
    let found = pulled.is_some();
    if let Some(node) = nodes.last_mut() {
        node.peeked = pulled;
    } else if let Some(traverser) = pulled {
        head.push_front(traverser);
    }
    Ok(found)
}
