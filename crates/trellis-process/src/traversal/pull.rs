//! The pull API of [`Traversal`].
//!
//! Every entry point applies strategies first (a no-op once locked) and
//! checks the installed cancellation token before touching the pipeline.
//! Exhaustion surfaces as [`TraversalError::Exhausted`] from the unguarded
//! calls and as an empty result from the guarded ones.

use std::collections::VecDeque;

use trellis_core::Value;

use super::pipeline::{self, StepNode};
use super::{Traversal, TraversalStream};
use crate::context::{CancellationToken, StepContext};
use crate::error::{TraversalError, TraversalResult};
use crate::traverser::Traverser;

impl Traversal {
    /// Returns true if a pull would currently produce a value.
    ///
    /// Pulls upstream as needed; the pulled traverser is kept for the next
    /// call to [`next`](Self::next), so repeated calls consume nothing.
    ///
    /// # Errors
    ///
    /// Returns step failures, strategy failures and cancellation.
    pub fn has_next(&mut self) -> TraversalResult<bool> {
        self.check_interrupt()?;
        if self.remaining > 0 {
            return Ok(true);
        }
        self.apply_strategies()?;
        let len = self.nodes.len();
        self.with_pipeline(len, pipeline::peek)
    }

    /// Returns the next value.
    ///
    /// A traverser with bulk `B` yields its value `B` times before the
    /// pipeline is pulled again.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Exhausted`] when no value is left, plus any
    /// step failure, strategy failure or cancellation.
    pub fn next(&mut self) -> TraversalResult<Value> {
        self.check_interrupt()?;
        if self.remaining == 0 {
            let traverser = self.pull_tail()?.ok_or(TraversalError::Exhausted)?;
            self.remaining = traverser.bulk();
            self.last = Some(traverser);
        }
        self.remaining -= 1;
        let value = if self.remaining == 0 {
            self.last.take().map(Traverser::into_value)
        } else {
            self.last.as_ref().map(|traverser| traverser.value().clone())
        };
        value.ok_or(TraversalError::Exhausted)
    }

    /// Returns the next value, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns every failure of [`next`](Self::next) except exhaustion.
    pub fn try_next(&mut self) -> TraversalResult<Option<Value>> {
        match self.next() {
            Ok(value) => Ok(Some(value)),
            Err(TraversalError::Exhausted) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Returns up to `n` values in order; fewer once exhausted.
    ///
    /// # Errors
    ///
    /// Returns every failure of [`next`](Self::next) except exhaustion.
    pub fn next_n(&mut self, n: usize) -> TraversalResult<Vec<Value>> {
        let mut values = Vec::new();
        while values.len() < n {
            match self.try_next()? {
                Some(value) => values.push(value),
                None => break,
            }
        }
        Ok(values)
    }

    /// Drains every remaining value into `container` and returns it.
    ///
    /// # Errors
    ///
    /// Returns every failure of [`next`](Self::next) except exhaustion.
    /// Values pulled before the failure stay in `container`.
    pub fn fill<'c, C>(&mut self, container: &'c mut C) -> TraversalResult<&'c mut C>
    where
        C: Extend<Value>,
    {
        while let Some(value) = self.try_next()? {
            container.extend(std::iter::once(value));
        }
        Ok(container)
    }

    /// Returns a lazy view that pulls this traversal.
    pub fn to_stream(&mut self) -> TraversalStream<'_> {
        TraversalStream::new(self)
    }

    /// Drains the traversal for its side effects.
    ///
    /// # Errors
    ///
    /// Returns every failure of [`next`](Self::next) except exhaustion.
    pub fn iterate(&mut self) -> TraversalResult<&mut Self> {
        while self.try_next_traverser()?.is_some() {}
        Ok(self)
    }

    /// Returns the next whole traverser, bulk and path included.
    ///
    /// If [`next`](Self::next) has already consumed part of a bulked
    /// traverser, the rest is returned with the remaining bulk.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Exhausted`] when nothing is left, plus any
    /// other failure of [`next`](Self::next).
    pub fn next_traverser(&mut self) -> TraversalResult<Traverser> {
        self.check_interrupt()?;
        let remaining = std::mem::take(&mut self.remaining);
        if let Some(mut traverser) = self.last.take() {
            if remaining > 0 {
                traverser.set_bulk(remaining);
                return Ok(traverser);
            }
        }
        self.pull_tail()?.ok_or(TraversalError::Exhausted)
    }

    /// Returns the next whole traverser, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns every failure of [`next_traverser`](Self::next_traverser)
    /// except exhaustion.
    pub fn try_next_traverser(&mut self) -> TraversalResult<Option<Traverser>> {
        match self.next_traverser() {
            Ok(traverser) => Ok(Some(traverser)),
            Err(TraversalError::Exhausted) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Returns true if the step at `index` would currently produce a
    /// traverser. The traverser is kept for whoever pulls that step next.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::StepIndex`] for an index outside the
    /// pipeline, plus any failure of [`has_next`](Self::has_next).
    pub fn step_has_next(&mut self, index: usize) -> TraversalResult<bool> {
        self.check_interrupt()?;
        self.apply_strategies()?;
        self.with_pipeline(index + 1, pipeline::peek)
    }

    /// Pulls one traverser directly out of the step at `index`.
    ///
    /// The traverser is consumed: steps downstream of `index` never see it.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::StepIndex`] for an index outside the
    /// pipeline and [`TraversalError::Exhausted`] once the step is exhausted.
    pub fn step_next(&mut self, index: usize) -> TraversalResult<Traverser> {
        self.check_interrupt()?;
        self.apply_strategies()?;
        self.with_pipeline(index + 1, pipeline::pull)?.ok_or(TraversalError::Exhausted)
    }

    pub(crate) fn check_interrupt(&self) -> TraversalResult<()> {
        if self.interrupt.as_ref().is_some_and(CancellationToken::is_cancelled) {
            Err(TraversalError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn pull_tail(&mut self) -> TraversalResult<Option<Traverser>> {
        self.apply_strategies()?;
        let len = self.nodes.len();
        self.with_pipeline(len, pipeline::pull)
    }

    /// Runs `f` over the first `end` nodes with a context borrowed from the
    /// rest of the traversal.
    fn with_pipeline<R>(
        &mut self,
        end: usize,
        f: impl FnOnce(
            &mut [StepNode],
            &mut VecDeque<Traverser>,
            &StepContext<'_>,
        ) -> TraversalResult<R>,
    ) -> TraversalResult<R> {
        let Self { nodes, head, generator, side_effects, graph, requirements, interrupt, .. } =
            self;
        let len = nodes.len();
        let index = end.saturating_sub(1);
        let nodes = nodes.get_mut(..end).ok_or(TraversalError::StepIndex { index, len })?;
        let ctx = StepContext::new(
            generator.as_ref(),
            side_effects,
            graph.as_ref(),
            requirements,
            interrupt.as_ref(),
        );
        f(nodes, head, &ctx)
    }
}
