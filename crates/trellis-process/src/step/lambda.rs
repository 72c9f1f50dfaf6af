//! Steps driven by user functions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use trellis_core::Value;

use super::{StepBase, Starts, Step};
use crate::context::StepContext;
use crate::error::{TraversalError, TraversalResult};
use crate::traverser::{RequirementSet, Traverser};

/// Maps a value to a new value.
pub type MapFn = Arc<dyn Fn(&Value) -> TraversalResult<Value> + Send + Sync>;

/// Decides whether a value passes.
pub type FilterFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Maps a value to any number of values.
pub type FlatMapFn = Arc<dyn Fn(&Value) -> TraversalResult<Vec<Value>> + Send + Sync>;

/// Attributes a value-level failure of a user function to its step.
fn blame(base: &StepBase, error: TraversalError) -> TraversalError {
    match error {
        TraversalError::Core(cause) => TraversalError::step(base.id(), cause.to_string()),
        other => other,
    }
}

/// Replaces each value with the result of a function.
///
/// Value errors raised by the function surface as [`TraversalError::Step`].
pub struct MapStep {
    base: StepBase,
    function: MapFn,
    requirements: RequirementSet,
}

impl MapStep {
    /// Creates the step.
    #[must_use]
    pub fn new(function: MapFn) -> Self {
        Self { base: StepBase::new(), function, requirements: RequirementSet::new() }
    }

    /// Declares requirements the function relies on.
    #[must_use]
    pub fn with_requirements(mut self, requirements: RequirementSet) -> Self {
        self.requirements = requirements;
        self
    }
}

impl Step for MapStep {
    fn name(&self) -> &'static str {
        "map"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        let Some(traverser) = starts.next(ctx)? else {
            return Ok(None);
        };
        let value = (self.function)(traverser.value()).map_err(|e| blame(&self.base, e))?;
        Ok(Some(traverser.split(value)))
    }

    fn requirements(&self) -> RequirementSet {
        self.requirements.clone()
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self {
            base: self.base.fresh(),
            function: Arc::clone(&self.function),
            requirements: self.requirements.clone(),
        })
    }
}

impl fmt::Debug for MapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStep").field("id", &self.base.id()).finish_non_exhaustive()
    }
}

/// Drops traversers whose value fails a predicate.
pub struct FilterStep {
    base: StepBase,
    predicate: FilterFn,
    fused: usize,
}

impl FilterStep {
    /// Creates the step.
    #[must_use]
    pub fn new(predicate: FilterFn) -> Self {
        Self { base: StepBase::new(), predicate, fused: 1 }
    }

    /// Returns a step that passes only what both `self` and `other` pass.
    ///
    /// The result keeps this step's id and the labels of both steps.
    #[must_use]
    pub fn fuse(&self, other: &Self) -> Self {
        let first = Arc::clone(&self.predicate);
        let second = Arc::clone(&other.predicate);
        let mut base = self.base.fresh();
        for label in other.base.labels() {
            base.labels.insert(label.clone());
        }
        Self {
            base,
            predicate: Arc::new(move |value: &Value| first(value) && second(value)),
            fused: self.fused + other.fused,
        }
    }

    /// Returns how many predicates this step evaluates.
    #[must_use]
    pub fn predicate_count(&self) -> usize {
        self.fused
    }
}

impl Step for FilterStep {
    fn name(&self) -> &'static str {
        "filter"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        while let Some(traverser) = starts.next(ctx)? {
            if (self.predicate)(traverser.value()) {
                return Ok(Some(traverser));
            }
        }
        Ok(None)
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self {
            base: self.base.fresh(),
            predicate: Arc::clone(&self.predicate),
            fused: self.fused,
        })
    }
}

impl fmt::Debug for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStep")
            .field("id", &self.base.id())
            .field("predicates", &self.fused)
            .finish_non_exhaustive()
    }
}

/// Replaces each value with zero or more values.
pub struct FlatMapStep {
    base: StepBase,
    function: FlatMapFn,
    current: Option<Traverser>,
    pending: VecDeque<Value>,
}

impl FlatMapStep {
    /// Creates the step.
    #[must_use]
    pub fn new(function: FlatMapFn) -> Self {
        Self { base: StepBase::new(), function, current: None, pending: VecDeque::new() }
    }
}

impl Step for FlatMapStep {
    fn name(&self) -> &'static str {
        "flat_map"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        loop {
            if let (Some(current), Some(value)) = (&self.current, self.pending.pop_front()) {
                return Ok(Some(current.split(value)));
            }
            let Some(traverser) = starts.next(ctx)? else {
                self.current = None;
                return Ok(None);
            };
            let values = (self.function)(traverser.value()).map_err(|e| blame(&self.base, e))?;
            self.pending = values.into();
            self.current = Some(traverser);
        }
    }

    fn reset(&mut self) {
        self.current = None;
        self.pending.clear();
    }

    fn clone_step(&self) -> Box<dyn Step> {
        let mut step = Self::new(Arc::clone(&self.function));
        step.base = self.base.fresh();
        Box::new(step)
    }
}

impl fmt::Debug for FlatMapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMapStep")
            .field("id", &self.base.id())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
