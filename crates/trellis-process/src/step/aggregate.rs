//! Writes traverser values into a named side effect.

use trellis_core::Value;

use super::{StepBase, Starts, Step};
use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::side_effects::{constant, MergeOperator, SideEffects, Supplier};
use crate::traverser::{RequirementSet, Traverser, TraverserRequirement};

/// What an [`AggregateStep`] records per traverser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    /// Appends the value once per unit of bulk.
    Store,
    /// Adds the bulk to a counter.
    Count,
    /// Adds the value times its bulk.
    Sum,
    /// Adds the value to a duplicate-free list.
    Set,
}

impl AggregateMode {
    /// Returns the name used in bytecode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Set => "set",
        }
    }

    fn registration(self) -> (Supplier, MergeOperator) {
        let (initial, operator) = match self {
            Self::Store => (Value::List(Vec::new()), MergeOperator::Append),
            Self::Count => (Value::Int(0), MergeOperator::Sum),
            Self::Sum => (Value::Null, MergeOperator::Sum),
            Self::Set => (Value::List(Vec::new()), MergeOperator::Union),
        };
        (constant(initial), operator)
    }

    fn contribution(self, traverser: &Traverser) -> TraversalResult<Value> {
        let bulk = traverser.bulk();
        Ok(match self {
            Self::Store => {
                let copies = usize::try_from(bulk).unwrap_or(usize::MAX);
                Value::List(std::iter::repeat(traverser.value().clone()).take(copies).collect())
            }
            Self::Count => Value::Int(i64::try_from(bulk).unwrap_or(i64::MAX)),
            Self::Sum => traverser.value().scale(bulk)?,
            Self::Set => Value::List(vec![traverser.value().clone()]),
        })
    }
}

/// Records each passing traverser into a side effect and emits it unchanged.
///
/// The key is registered on first use with a supplier and merge operator
/// matching the mode, unless the traversal already registered it. Writes go
/// through the traverser's own side-effects handle when it carries one.
#[derive(Debug)]
pub struct AggregateStep {
    base: StepBase,
    key: String,
    mode: AggregateMode,
}

impl AggregateStep {
    /// Creates the step.
    #[must_use]
    pub fn new(key: impl Into<String>, mode: AggregateMode) -> Self {
        Self { base: StepBase::new(), key: key.into(), mode }
    }

    /// Returns the side-effect key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the mode.
    #[must_use]
    pub fn mode(&self) -> AggregateMode {
        self.mode
    }

    fn record(&self, side_effects: &SideEffects, traverser: &Traverser) -> TraversalResult<()> {
        let (supplier, operator) = self.mode.registration();
        side_effects.register_if_absent(&self.key, || supplier, operator);
        side_effects.add(&self.key, &self.mode.contribution(traverser)?)
    }
}

impl Step for AggregateStep {
    fn name(&self) -> &'static str {
        "aggregate"
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
        let side_effects = traverser.side_effects().unwrap_or_else(|| ctx.side_effects());
        self.record(side_effects, &traverser)?;
        Ok(Some(traverser))
    }

    fn requirements(&self) -> RequirementSet {
        RequirementSet::new().with(TraverserRequirement::SideEffects)
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self { base: self.base.fresh(), key: self.key.clone(), mode: self.mode })
    }
}
