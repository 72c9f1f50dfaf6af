//! The source step that seeds a traversal.

use std::fmt;
use std::sync::Arc;

use trellis_core::Value;

use super::{StepBase, Starts, Step};
use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::traverser::{Traverser, TraverserRequirement};

/// Creates a fresh iterator over source values.
///
/// Called once per evaluation; [`reset`](Step::reset) calls it again.
pub type SourceFn = Arc<dyn Fn() -> Box<dyn Iterator<Item = Value> + Send> + Send + Sync>;

type Cursor = Box<dyn Iterator<Item = (Value, u64)> + Send>;

#[derive(Clone)]
enum Source {
    Values(Arc<Vec<(Value, u64)>>),
    Factory(SourceFn),
    Vertices,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Values(values) => f.debug_tuple("Values").field(&values.len()).finish(),
            Self::Factory(_) => f.write_str("Factory"),
            Self::Vertices => f.write_str("Vertices"),
        }
    }
}

/// Emits seed values as traversers shaped by the traversal's generator,
/// followed by any traversers injected from outside.
///
/// The source is opened lazily on the first pull. When the generator does
/// not support bulk, a seed with bulk `B` is emitted as `B` traversers.
pub struct StartStep {
    base: StepBase,
    source: Source,
    cursor: Option<Cursor>,
    pending: Option<(Value, u64)>,
    source_done: bool,
}

impl StartStep {
    fn with_source(source: Source) -> Self {
        Self { base: StepBase::new(), source, cursor: None, pending: None, source_done: false }
    }

    /// Seeds the given values, each with bulk 1.
    #[must_use]
    pub fn inject(values: impl IntoIterator<Item = Value>) -> Self {
        Self::inject_bulk(values.into_iter().map(|value| (value, 1)))
    }

    /// Seeds values with explicit multiplicities.
    #[must_use]
    pub fn inject_bulk(values: impl IntoIterator<Item = (Value, u64)>) -> Self {
        let values = values.into_iter().map(|(value, bulk)| (value, bulk.max(1))).collect();
        Self::with_source(Source::Values(Arc::new(values)))
    }

    /// Seeds values produced lazily by `factory`, which may be unbounded.
    #[must_use]
    pub fn from_fn(factory: SourceFn) -> Self {
        Self::with_source(Source::Factory(factory))
    }

    /// Seeds every vertex of the bound graph.
    #[must_use]
    pub fn vertices() -> Self {
        Self::with_source(Source::Vertices)
    }

    fn open(&self, ctx: &StepContext<'_>) -> TraversalResult<Cursor> {
        Ok(match &self.source {
            Source::Values(values) => {
                let values = Arc::clone(values);
                Box::new((0..values.len()).filter_map(move |i| values.get(i).cloned()))
            }
            Source::Factory(factory) => Box::new(factory().map(|value| (value, 1))),
            Source::Vertices => {
                Box::new(ctx.graph()?.vertices()?.into_iter().map(|vertex| (vertex, 1)))
            }
        })
    }

    fn emit_pending(&mut self, ctx: &StepContext<'_>) -> Option<Traverser> {
        let (value, bulk) = self.pending.take()?;
        let generator = ctx.generator();
        let mut traverser = if bulk > 1 && !generator.supports_bulk() {
            self.pending = Some((value.clone(), bulk - 1));
            generator.generate(value, 1)
        } else {
            generator.generate(value, bulk)
        };
        if ctx.requires(TraverserRequirement::SideEffects) {
            traverser.set_side_effects(ctx.side_effects().clone());
        }
        Some(traverser)
    }
}

impl Step for StartStep {
    fn name(&self) -> &'static str {
        "start"
    }

    step_boilerplate!();

    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>> {
        if let Some(traverser) = self.emit_pending(ctx) {
            return Ok(Some(traverser));
        }
        if !self.source_done {
            if self.cursor.is_none() {
                self.cursor = Some(self.open(ctx)?);
            }
            if let Some(seed) = self.cursor.as_mut().and_then(|cursor| cursor.next()) {
                self.pending = Some(seed);
                return Ok(self.emit_pending(ctx));
            }
            self.cursor = None;
            self.source_done = true;
        }
        starts.next(ctx)
    }

    fn reset(&mut self) {
        self.cursor = None;
        self.pending = None;
        self.source_done = false;
    }

    fn clone_step(&self) -> Box<dyn Step> {
        Box::new(Self {
            base: self.base.fresh(),
            source: self.source.clone(),
            cursor: None,
            pending: None,
            source_done: false,
        })
    }
}

impl fmt::Debug for StartStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartStep")
            .field("id", &self.base.id())
            .field("source", &self.source)
            .field("source_done", &self.source_done)
            .finish_non_exhaustive()
    }
}
