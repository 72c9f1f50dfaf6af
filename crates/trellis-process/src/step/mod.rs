//! Pipeline stages.
//!
//! A [`Step`] is a pull-based transformer of traversers, modeled on the
//! Volcano iterator: when the owning traversal pulls a step, the step pulls
//! its predecessor through [`Starts`] until it can produce a traverser or the
//! upstream is exhausted.
//!
//! Steps never hold references to their neighbours. The traversal owns the
//! pipeline as an ordered arena and hands each step a view of everything
//! upstream of it for the duration of one pull.

/// Implements the boilerplate accessors of [`Step`].
macro_rules! step_boilerplate {
    () => {
        fn base(&self) -> &$crate::step::StepBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::step::StepBase {
            &mut self.base
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

mod aggregate;
mod expand;
mod identity;
mod lambda;
mod local;
mod remote;
mod start;

use std::any::Any;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

pub use aggregate::{AggregateMode, AggregateStep};
pub use expand::ExpandStep;
pub use identity::IdentityStep;
pub use lambda::{FilterFn, FilterStep, FlatMapFn, FlatMapStep, MapFn, MapStep};
pub use local::LocalStep;
pub use remote::RemoteStep;
pub use start::{SourceFn, StartStep};

use crate::context::StepContext;
use crate::error::TraversalResult;
use crate::traversal::pipeline::{self, StepNode};
use crate::traversal::Traversal;
use crate::traverser::{RequirementSet, Traverser};

/// State shared by every step implementation.
#[derive(Debug, Default)]
pub struct StepBase {
    id: String,
    labels: BTreeSet<String>,
    pub(crate) starts: VecDeque<Traverser>,
    produced: u64,
}

impl StepBase {
    /// Creates a base with no id; the owning traversal assigns one.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a base with the same id and labels and no runtime state.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self { id: self.id.clone(), labels: self.labels.clone(), ..Self::default() }
    }

    /// Returns the step id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the labels.
    #[must_use]
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Returns the number of traversers this step has emitted.
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub(crate) fn record_produced(&mut self) {
        self.produced += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.starts.clear();
        self.produced = 0;
    }
}

/// One stage of a traversal pipeline.
pub trait Step: Send + fmt::Debug {
    /// Returns the step kind, used for generated ids and logs.
    fn name(&self) -> &'static str;

    /// Returns the common step state.
    fn base(&self) -> &StepBase;

    /// Returns the common step state mutably.
    fn base_mut(&mut self) -> &mut StepBase;

    /// Produces the next traverser, pulling `starts` as often as needed.
    ///
    /// Returns `Ok(None)` only when the upstream is exhausted and the step
    /// holds nothing further; never for a transient "not ready" state.
    ///
    /// # Errors
    ///
    /// Returns any failure of the step's own logic, of the graph, or a
    /// cancellation observed while pulling upstream.
    fn process_next(
        &mut self,
        starts: &mut Starts<'_>,
        ctx: &StepContext<'_>,
    ) -> TraversalResult<Option<Traverser>>;

    /// Returns the capabilities this step needs from its traversers.
    fn requirements(&self) -> RequirementSet {
        RequirementSet::new()
    }

    /// Discards internal buffering.
    fn reset(&mut self) {}

    /// Returns a copy with identical configuration and fresh state.
    fn clone_step(&self) -> Box<dyn Step>;

    /// Returns the traversals nested in this step.
    fn children(&self) -> Vec<&Traversal> {
        Vec::new()
    }

    /// Returns the traversals nested in this step mutably.
    fn children_mut(&mut self) -> Vec<&mut Traversal> {
        Vec::new()
    }

    /// Returns the step as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the step as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the step id.
    fn id(&self) -> &str {
        self.base().id()
    }

    /// Sets the step id.
    fn set_id(&mut self, id: String) {
        self.base_mut().id = id;
    }

    /// Returns the labels of this step.
    fn labels(&self) -> &BTreeSet<String> {
        self.base().labels()
    }

    /// Adds a label.
    fn add_label(&mut self, label: String) {
        self.base_mut().labels.insert(label);
    }

    /// Removes a label.
    fn remove_label(&mut self, label: &str) -> bool {
        self.base_mut().labels.remove(label)
    }

    /// Buffers a traverser to be consumed before anything upstream.
    fn add_start(&mut self, traverser: Traverser) {
        self.base_mut().starts.push_back(traverser);
    }

    /// Buffers several traversers in order.
    fn add_starts(&mut self, traversers: Vec<Traverser>) {
        self.base_mut().starts.extend(traversers);
    }
}

impl Clone for Box<dyn Step> {
    fn clone(&self) -> Self {
        self.clone_step()
    }
}

impl<'a> dyn Step + 'a {
    /// Downcasts to a concrete step type.
    #[must_use]
    pub fn downcast_ref<T: Step + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Returns true if this step is of type `T`.
    #[must_use]
    pub fn is<T: Step + 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// The input of a step during one pull.
///
/// Yields the step's own buffered starts first, then pulls the step
/// immediately upstream.
pub struct Starts<'a> {
    pub(crate) buffered: VecDeque<Traverser>,
    upstream: &'a mut [StepNode],
    head: &'a mut VecDeque<Traverser>,
}

impl<'a> Starts<'a> {
    pub(crate) fn new(
        buffered: VecDeque<Traverser>,
        upstream: &'a mut [StepNode],
        head: &'a mut VecDeque<Traverser>,
    ) -> Self {
        Self { buffered, upstream, head }
    }

    /// Returns the next input traverser, or `None` once upstream is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates failures of upstream steps and cancellation.
    pub fn next(&mut self, ctx: &StepContext<'_>) -> TraversalResult<Option<Traverser>> {
        if let Some(traverser) = self.buffered.pop_front() {
            return Ok(Some(traverser));
        }
        pipeline::pull(self.upstream, self.head, ctx)
    }
}

impl fmt::Debug for Starts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Starts")
            .field("buffered", &self.buffered.len())
            .field("upstream", &self.upstream.len())
            .field("head", &self.head.len())
            .finish()
    }
}
