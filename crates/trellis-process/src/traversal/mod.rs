//! The traversal: an ordered step pipeline plus everything it evaluates with.
//!
//! A [`Traversal`] is mutable until its strategies have been applied. The
//! first pull (or an explicit [`apply_strategies`](Traversal::apply_strategies))
//! runs every strategy once, selects a traverser generator from the union of
//! the step requirements and locks the traversal. After that the step
//! sequence and the strategy set reject mutation.
//!
//! A traversal is not safe for concurrent pulls; asynchronous callers go
//! through [`SharedTraversal`](crate::promise::SharedTraversal).

mod builder;
pub(crate) mod pipeline;
mod pull;
mod stream;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use trellis_core::Value;

pub use builder::TraversalBuilder;
pub use stream::TraversalStream;

use crate::bytecode::Bytecode;
use crate::config::{EngineConfig, TraverserConfig};
use crate::context::CancellationToken;
use crate::error::{TraversalError, TraversalResult};
use crate::graph::Graph;
use crate::side_effects::SideEffects;
use crate::step::Step;
use crate::strategy::TraversalStrategies;
use crate::traverser::{
    select_generator, BulkGenerator, RequirementSet, Traverser, TraverserGenerator,
    TraverserRequirement,
};
use pipeline::StepNode;

/// A pipeline of steps with its strategies, side effects and generator.
pub struct Traversal {
    nodes: Vec<StepNode>,
    head: VecDeque<Traverser>,
    strategies: TraversalStrategies,
    side_effects: SideEffects,
    generator: Arc<dyn TraverserGenerator>,
    requirements: RequirementSet,
    parent: Option<String>,
    graph: Option<Arc<dyn Graph>>,
    bytecode: Bytecode,
    traversers: TraverserConfig,
    isolated: bool,
    locked: bool,
    next_id: usize,
    last: Option<Traverser>,
    remaining: u64,
    interrupt: Option<CancellationToken>,
}

impl Traversal {
    /// Creates an empty root traversal with the standard strategies.
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategies(TraversalStrategies::standard())
    }

    /// Creates an empty root traversal with the given strategies.
    #[must_use]
    pub fn with_strategies(strategies: TraversalStrategies) -> Self {
        Self {
            nodes: Vec::new(),
            head: VecDeque::new(),
            strategies,
            side_effects: SideEffects::new(),
            generator: Arc::new(BulkGenerator),
            requirements: RequirementSet::new(),
            parent: None,
            graph: None,
            bytecode: Bytecode::new(),
            traversers: TraverserConfig::default(),
            isolated: false,
            locked: false,
            next_id: 0,
            last: None,
            remaining: 0,
            interrupt: None,
        }
    }

    /// Creates an empty traversal configured from `config`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let strategies = TraversalStrategies::from_config(&config.strategies);
        let mut traversal = Self::with_strategies(strategies);
        traversal.traversers = config.traversers;
        traversal
    }

    /// Creates an empty traversal meant to be nested in a step.
    ///
    /// It has no strategies of its own and inherits its parent's when the
    /// parent applies strategies.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::with_strategies(TraversalStrategies::new())
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the traversal has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the steps in pipeline order.
    pub fn steps(&self) -> impl Iterator<Item = &dyn Step> + '_ {
        self.nodes.iter().map(|node| node.step.as_ref())
    }

    /// Returns the step at `index`.
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&dyn Step> {
        self.nodes.get(index).map(|node| node.step.as_ref())
    }

    /// Returns the step at `index` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Locked`] once the traversal is locked and
    /// [`TraversalError::StepIndex`] for an index outside the pipeline.
    pub fn step_mut(&mut self, index: usize) -> TraversalResult<&mut dyn Step> {
        self.ensure_unlocked("modify a step")?;
        let len = self.nodes.len();
        match self.nodes.get_mut(index) {
            Some(node) => Ok(node.step.as_mut()),
            None => Err(TraversalError::StepIndex { index, len }),
        }
    }

    /// Returns the first step.
    #[must_use]
    pub fn start_step(&self) -> Option<&dyn Step> {
        self.step(0)
    }

    /// Returns the last step.
    #[must_use]
    pub fn end_step(&self) -> Option<&dyn Step> {
        self.nodes.last().map(|node| node.step.as_ref())
    }

    /// Returns the position of the step with id `id`.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.step.id() == id)
    }

    /// Returns the step with id `id`.
    #[must_use]
    pub fn step_by_id(&self, id: &str) -> Option<&dyn Step> {
        self.index_of(id).and_then(|index| self.step(index))
    }

    /// Returns the step before the one at `index`.
    #[must_use]
    pub fn previous_step(&self, index: usize) -> Option<&dyn Step> {
        self.nodes.get(index)?.previous.and_then(|previous| self.step(previous))
    }

    /// Returns the step after the one at `index`.
    #[must_use]
    pub fn next_step(&self, index: usize) -> Option<&dyn Step> {
        self.nodes.get(index)?.next.and_then(|next| self.step(next))
    }

    /// Inserts `step` at `index`.
    ///
    /// A step without an id receives one that is unique in this traversal.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Locked`] once the traversal is locked and
    /// [`TraversalError::StepIndex`] if `index` is past the end.
    pub fn add_step(&mut self, index: usize, step: Box<dyn Step>) -> TraversalResult<()> {
        self.ensure_unlocked("add a step")?;
        if index > self.nodes.len() {
            return Err(TraversalError::StepIndex { index, len: self.nodes.len() });
        }
        self.insert_node(index, step);
        Ok(())
    }

    /// Appends `step` to the end of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Locked`] once the traversal is locked.
    pub fn add_step_last(&mut self, step: Box<dyn Step>) -> TraversalResult<()> {
        self.add_step(self.nodes.len(), step)
    }

    /// Removes and returns the step at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Locked`] once the traversal is locked and
    /// [`TraversalError::StepIndex`] for an index outside the pipeline.
    pub fn remove_step(&mut self, index: usize) -> TraversalResult<Box<dyn Step>> {
        self.ensure_unlocked("remove a step")?;
        if index >= self.nodes.len() {
            return Err(TraversalError::StepIndex { index, len: self.nodes.len() });
        }
        let node = self.nodes.remove(index);
        pipeline::relink(&mut self.nodes);
        Ok(node.step)
    }

    /// Replaces the step at `index` and returns the old one.
    ///
    /// A replacement without an id takes over the old step's id; the old
    /// step's labels are carried over either way.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Locked`] once the traversal is locked and
    /// [`TraversalError::StepIndex`] for an index outside the pipeline.
    pub fn replace_step(
        &mut self,
        index: usize,
        mut step: Box<dyn Step>,
    ) -> TraversalResult<Box<dyn Step>> {
        self.ensure_unlocked("replace a step")?;
        let len = self.nodes.len();
        let node = self.nodes.get_mut(index).ok_or(TraversalError::StepIndex { index, len })?;
        if step.id().is_empty() {
            step.set_id(node.step.id().to_owned());
        }
        for label in node.step.labels().clone() {
            step.add_label(label);
        }
        let old = std::mem::replace(&mut node.step, step);
        node.peeked = None;
        self.adopt_children(index);
        Ok(old)
    }

    /// Appends a step without the lock check; used while building.
    pub(crate) fn push_step(&mut self, step: Box<dyn Step>) {
        let index = self.nodes.len();
        self.insert_node(index, step);
    }

    /// Adds a label to the last step; used while building.
    pub(crate) fn label_last(&mut self, label: String) {
        if let Some(node) = self.nodes.last_mut() {
            node.step.add_label(label);
        }
    }

    fn insert_node(&mut self, index: usize, mut step: Box<dyn Step>) {
        if step.id().is_empty() {
            step.set_id(self.generate_id(step.name()));
        }
        self.nodes.insert(index, StepNode::new(step));
        pipeline::relink(&mut self.nodes);
        self.adopt_children(index);
    }

    fn generate_id(&mut self, name: &str) -> String {
        loop {
            let id = format!("{name}#{}", self.next_id);
            self.next_id += 1;
            if self.index_of(&id).is_none() {
                return id;
            }
        }
    }

    /// Passes side effects, graph and parent id down to the children of the
    /// step at `index`.
    fn adopt_children(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        let parent = node.step.id().to_owned();
        for child in node.step.children_mut() {
            child.parent = Some(parent.clone());
            if !child.isolated {
                child.share_side_effects(&self.side_effects);
            }
            child.set_graph_inner(self.graph.clone());
        }
    }

    fn adopt_all_children(&mut self) {
        for index in 0..self.nodes.len() {
            self.adopt_children(index);
        }
    }

    fn share_side_effects(&mut self, side_effects: &SideEffects) {
        self.side_effects = side_effects.clone();
        self.adopt_all_children();
    }

    fn set_graph_inner(&mut self, graph: Option<Arc<dyn Graph>>) {
        self.graph = graph;
        for node in &mut self.nodes {
            for child in node.step.children_mut() {
                child.set_graph_inner(self.graph.clone());
            }
        }
    }

    fn ensure_unlocked(&self, operation: &'static str) -> TraversalResult<()> {
        if self.locked {
            Err(TraversalError::Locked { operation })
        } else {
            Ok(())
        }
    }

    /// Returns the side effects.
    #[must_use]
    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    /// Gives this traversal a private side-effects store.
    ///
    /// An isolated nested traversal no longer sees its parent's side effects.
    pub fn isolate(&mut self) {
        self.side_effects = self.side_effects.isolated();
        self.isolated = true;
        self.adopt_all_children();
    }

    /// Returns true if the traversal has a private side-effects store.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Returns the bound graph.
    #[must_use]
    pub fn graph(&self) -> Option<&Arc<dyn Graph>> {
        self.graph.as_ref()
    }

    /// Binds a graph. Nested traversals share it.
    pub fn set_graph(&mut self, graph: Arc<dyn Graph>) {
        self.set_graph_inner(Some(graph));
    }

    /// Returns the construction record.
    #[must_use]
    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    pub(crate) fn bytecode_mut(&mut self) -> &mut Bytecode {
        &mut self.bytecode
    }

    /// Returns the registered strategies.
    #[must_use]
    pub fn strategies(&self) -> &TraversalStrategies {
        &self.strategies
    }

    /// Returns the registered strategies mutably.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Locked`] once the traversal is locked.
    pub fn strategies_mut(&mut self) -> TraversalResult<&mut TraversalStrategies> {
        self.ensure_unlocked("change strategies")?;
        Ok(&mut self.strategies)
    }

    /// Returns the selected traverser generator.
    ///
    /// Before locking this is the default bulk generator.
    #[must_use]
    pub fn generator(&self) -> &dyn TraverserGenerator {
        self.generator.as_ref()
    }

    /// Returns the effective requirements computed when the traversal locked.
    #[must_use]
    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    /// Returns the id of the enclosing step of a nested traversal.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    /// Returns true if this traversal is not nested in a step.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns true once strategies have been applied.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Installs a cancellation token checked at every pull boundary and
    /// returns the previous one.
    pub fn set_interrupt(&mut self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        std::mem::replace(&mut self.interrupt, token)
    }

    /// Applies the strategies, selects the generator and locks.
    ///
    /// Calling this on a locked traversal does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::StrategyFailed`] or
    /// [`TraversalError::StrategyOrder`]. The pipeline is then restored to
    /// its state before the call and the traversal stays unlocked.
    pub fn apply_strategies(&mut self) -> TraversalResult<()> {
        if self.locked {
            return Ok(());
        }
        let snapshot: Vec<Box<dyn Step>> =
            self.nodes.iter().map(|node| node.step.clone_step()).collect();
        if let Err(error) = self.run_strategies() {
            self.nodes = snapshot.into_iter().map(StepNode::new).collect();
            pipeline::relink(&mut self.nodes);
            self.adopt_all_children();
            return Err(error);
        }

        self.requirements = self.collect_requirements();
        self.generator = select_generator(&self.requirements, self.traversers.force_path);
        self.locked = true;
        debug!(
            generator = self.generator.name(),
            requirements = ?self.requirements,
            steps = self.nodes.len(),
            root = self.is_root(),
            "traversal locked"
        );
        Ok(())
    }

    fn run_strategies(&mut self) -> TraversalResult<()> {
        for strategy in self.strategies.sorted()? {
            debug!(
                strategy = strategy.name(),
                category = ?strategy.category(),
                steps = self.nodes.len(),
                "applying traversal strategy"
            );
            strategy.apply(self).map_err(|error| {
                warn!(strategy = strategy.name(), %error, "traversal strategy failed");
                match error {
                    TraversalError::StrategyFailed { .. } => error,
                    other => TraversalError::StrategyFailed {
                        strategy: strategy.name().to_owned(),
                        reason: other.to_string(),
                    },
                }
            })?;
        }

        self.adopt_all_children();
        let strategies = self.strategies.clone();
        for node in &mut self.nodes {
            for child in node.step.children_mut() {
                if child.strategies.is_empty() {
                    child.strategies = strategies.clone();
                }
                child.traversers = self.traversers;
                child.apply_strategies()?;
            }
        }
        Ok(())
    }

    fn collect_requirements(&self) -> RequirementSet {
        let mut requirements = RequirementSet::new().with(TraverserRequirement::Object);
        for node in &self.nodes {
            requirements.union_with(&node.step.requirements());
            if !node.step.labels().is_empty() {
                requirements.insert(TraverserRequirement::LabeledPath);
            }
            let children = node.step.children();
            if !children.is_empty() {
                requirements.insert(TraverserRequirement::Nested);
            }
            for child in children {
                requirements.union_with(&child.collect_requirements());
            }
        }
        requirements
    }

    /// Injects a traverser at the head of the pipeline.
    ///
    /// The traverser keeps its shape. If the selected generator requires
    /// single bulk, it is pulled one unit at a time.
    pub fn add_start(&mut self, traverser: Traverser) {
        self.head.push_back(traverser);
    }

    /// Injects several traversers at the head of the pipeline.
    pub fn add_starts(&mut self, traversers: impl IntoIterator<Item = Traverser>) {
        self.head.extend(traversers);
    }

    /// Shapes `value` with the traversal's generator and injects it.
    ///
    /// # Errors
    ///
    /// Returns a strategy failure if the traversal was not yet locked and
    /// applying strategies failed.
    pub fn add_start_value(&mut self, value: impl Into<Value>) -> TraversalResult<()> {
        self.apply_strategies()?;
        let mut traverser = self.generator.generate(value.into(), 1);
        if self.requirements.contains(TraverserRequirement::SideEffects) {
            traverser.set_side_effects(self.side_effects.clone());
        }
        self.head.push_back(traverser);
        Ok(())
    }

    /// Clears all buffered state so the pipeline can be pulled afresh.
    ///
    /// Steps that read from a source restart it; injected starts are dropped.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        self.head.clear();
        self.last = None;
        self.remaining = 0;
    }
}

impl Default for Traversal {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Traversal {
    /// Copies the pipeline with fresh step state and deep-copied side effects.
    fn clone(&self) -> Self {
        let mut nodes: Vec<StepNode> =
            self.nodes.iter().map(|node| StepNode::new(node.step.clone_step())).collect();
        pipeline::relink(&mut nodes);
        let mut clone = Self {
            nodes,
            head: VecDeque::new(),
            strategies: self.strategies.clone(),
            side_effects: self.side_effects.deep_clone(),
            generator: Arc::clone(&self.generator),
            requirements: self.requirements.clone(),
            parent: self.parent.clone(),
            graph: self.graph.clone(),
            bytecode: self.bytecode.clone(),
            traversers: self.traversers,
            isolated: self.isolated,
            locked: self.locked,
            next_id: self.next_id,
            last: None,
            remaining: 0,
            interrupt: None,
        };
        clone.adopt_all_children();
        clone
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("steps", &self.nodes)
            .field("strategies", &self.strategies)
            .field("side_effects", &self.side_effects)
            .field("generator", &self.generator.name())
            .field("parent", &self.parent)
            .field("locked", &self.locked)
            .field("bytecode", &self.bytecode.to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{FilterStep, IdentityStep, LocalStep, MapStep, StartStep};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn identity() -> Box<dyn Step> {
        Box::new(IdentityStep::new())
    }

    #[test]
    fn ids_are_generated_and_unique() {
        let mut traversal = Traversal::anonymous();
        traversal.add_step_last(identity()).unwrap();
        traversal.add_step_last(identity()).unwrap();
        let ids: Vec<&str> = traversal.steps().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["identity#0", "identity#1"]);

        let mut named = IdentityStep::new();
        named.set_id("identity#2".to_owned());
        traversal.add_step_last(Box::new(named)).unwrap();
        traversal.add_step_last(identity()).unwrap();
        assert_eq!(traversal.step(3).map(Step::id), Some("identity#3"));
    }

    #[test]
    fn adjacency_follows_arena_order() {
        let mut traversal = Traversal::anonymous();
        for _ in 0..3 {
            traversal.add_step_last(identity()).unwrap();
        }
        assert!(traversal.previous_step(0).is_none());
        assert_eq!(traversal.next_step(0).map(Step::id), Some("identity#1"));
        traversal.remove_step(1).unwrap();
        assert_eq!(traversal.next_step(0).map(Step::id), Some("identity#2"));
        assert_eq!(traversal.previous_step(1).map(Step::id), Some("identity#0"));
        assert!(traversal.next_step(1).is_none());
        assert!(traversal.next_step(7).is_none());

        traversal.add_step(0, identity()).unwrap();
        assert_eq!(traversal.next_step(0).map(Step::id), Some("identity#0"));
        assert_eq!(traversal.index_of("identity#2"), Some(2));
        assert!(traversal.step_by_id("identity#1").is_none());
    }

    #[test]
    fn out_of_range_indices() {
        let mut traversal = Traversal::anonymous();
        assert!(matches!(
            traversal.add_step(1, identity()),
            Err(TraversalError::StepIndex { index: 1, len: 0 })
        ));
        assert!(traversal.remove_step(0).is_err());
        assert!(traversal.replace_step(0, identity()).is_err());
    }

    #[test]
    fn locked_traversal_rejects_mutation() {
        let mut traversal = Traversal::new();
        traversal.add_step_last(Box::new(StartStep::inject(ints(&[1])))).unwrap();
        traversal.apply_strategies().unwrap();
        assert!(traversal.is_locked());
        assert!(matches!(
            traversal.add_step_last(identity()),
            Err(TraversalError::Locked { .. })
        ));
        assert!(matches!(traversal.remove_step(0), Err(TraversalError::Locked { .. })));
        assert!(matches!(
            traversal.replace_step(0, identity()),
            Err(TraversalError::Locked { .. })
        ));
        assert!(traversal.step_mut(0).is_err());
        assert!(traversal.strategies_mut().is_err());
        // A second application is a no-op.
        traversal.apply_strategies().unwrap();
        assert_eq!(traversal.len(), 1);
    }

    #[test]
    fn replace_keeps_id_and_labels() {
        let mut traversal = Traversal::anonymous();
        traversal.add_step_last(identity()).unwrap();
        traversal.step_mut(0).unwrap().add_label("a".to_owned());
        let old = traversal
            .replace_step(0, Box::new(FilterStep::new(Arc::new(|_: &Value| true))))
            .unwrap();
        assert_eq!(old.name(), "identity");
        let step = traversal.step(0).unwrap();
        assert_eq!(step.id(), "identity#0");
        assert!(step.labels().contains("a"));
    }

    #[test]
    fn children_share_parent_state() {
        let mut child = Traversal::anonymous();
        child.add_step_last(identity()).unwrap();
        let mut parent = Traversal::new();
        parent.add_step_last(Box::new(LocalStep::new(child))).unwrap();

        let local = parent.step(0).unwrap();
        let child = local.children()[0];
        assert_eq!(child.parent(), Some(local.id()));
        assert!(!child.is_root());
        assert!(child.side_effects().ptr_eq(parent.side_effects()));
    }

    #[test]
    fn children_inherit_strategies() {
        let mut child = Traversal::anonymous();
        child.add_step_last(identity()).unwrap();
        let copy = |v: &Value| -> TraversalResult<Value> { Ok(v.clone()) };
        child.add_step_last(Box::new(MapStep::new(Arc::new(copy)))).unwrap();
        let mut parent = Traversal::new();
        parent.add_step_last(Box::new(StartStep::inject(ints(&[1])))).unwrap();
        parent.add_step_last(Box::new(LocalStep::new(child))).unwrap();
        parent.apply_strategies().unwrap();

        let child = parent.step(1).unwrap().children()[0];
        assert!(child.is_locked());
        assert_eq!(child.len(), 1);
        assert!(parent.requirements().contains(TraverserRequirement::Nested));
    }

    #[test]
    fn clone_is_independent() {
        let mut traversal = Traversal::new();
        traversal.add_step_last(Box::new(StartStep::inject(ints(&[1, 2])))).unwrap();
        traversal.side_effects().register(
            "k",
            crate::side_effects::constant(Value::Int(0)),
            crate::side_effects::MergeOperator::Sum,
        );
        let copy = traversal.clone();
        traversal.side_effects().add("k", &Value::Int(1)).unwrap();
        assert_eq!(copy.side_effects().get("k").unwrap(), Value::Int(0));
        assert_eq!(copy.len(), 1);
        assert_eq!(copy.step(0).map(Step::id), traversal.step(0).map(Step::id));
    }
}
