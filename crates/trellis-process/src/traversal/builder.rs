//! Fluent construction of traversals.

use std::sync::Arc;

use trellis_core::Value;

use super::Traversal;
use crate::config::EngineConfig;
use crate::error::TraversalResult;
use crate::graph::{Direction, Graph};
use crate::remote::RemoteConnection;
use crate::side_effects::{constant, MergeOperator};
use crate::step::{
    AggregateMode, AggregateStep, ExpandStep, FilterStep, FlatMapStep, IdentityStep, LocalStep,
    MapStep, SourceFn, StartStep, Step,
};
use crate::strategy::{RemoteStrategy, SideEffectStrategy, TraversalStrategies, TraversalStrategy};

/// Builds an unlocked [`Traversal`], recording every call as bytecode.
///
/// Configuration calls (`with_*`) become source instructions; pipeline calls
/// append a step and a step instruction.
///
/// ```ignore
/// let mut traversal = TraversalBuilder::new()
///     .inject([1, 2, 3].map(Value::from))
///     .filter(|v| v.as_int().is_some_and(|i| i > 1))
///     .build();
/// assert_eq!(traversal.next_n(10)?, vec![Value::Int(2), Value::Int(3)]);
/// ```
#[derive(Debug)]
pub struct TraversalBuilder {
    traversal: Traversal,
    side_effects: Option<SideEffectStrategy>,
}

impl TraversalBuilder {
    /// Starts a root traversal with the standard strategies.
    #[must_use]
    pub fn new() -> Self {
        Self::from_traversal(Traversal::new())
    }

    /// Starts a traversal meant to be nested in a step.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::from_traversal(Traversal::anonymous())
    }

    /// Starts a root traversal configured from `config`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::from_traversal(Traversal::from_config(config))
    }

    fn from_traversal(traversal: Traversal) -> Self {
        Self { traversal, side_effects: None }
    }

    /// Replaces the strategy set.
    #[must_use]
    pub fn with_strategies(mut self, strategies: TraversalStrategies) -> Self {
        let names = strategies.names().into_iter().map(Value::from).collect();
        self.traversal.bytecode_mut().add_source("withStrategies", names);
        self.traversal.strategies = strategies;
        self
    }

    /// Adds one strategy, replacing any with the same name.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn TraversalStrategy>) -> Self {
        self.traversal.bytecode_mut().add_source("withStrategies", vec![strategy.name().into()]);
        self.traversal.strategies.add(strategy);
        self
    }

    /// Removes a strategy by name.
    #[must_use]
    pub fn without_strategy(mut self, name: &str) -> Self {
        self.traversal.bytecode_mut().add_source("withoutStrategies", vec![name.into()]);
        self.traversal.strategies.remove(name);
        self
    }

    /// Binds a graph.
    #[must_use]
    pub fn with_graph(mut self, graph: Arc<dyn Graph>) -> Self {
        self.traversal.set_graph(graph);
        self
    }

    /// Registers a side-effect key with an initial value and merge operator.
    #[must_use]
    pub fn with_side_effect(
        mut self,
        key: impl Into<String>,
        initial: impl Into<Value>,
        operator: MergeOperator,
    ) -> Self {
        let key = key.into();
        let initial = initial.into();
        self.traversal
            .bytecode_mut()
            .add_source("withSideEffect", vec![key.clone().into(), initial.clone()]);
        let strategy = self.side_effects.take().unwrap_or_default();
        self.side_effects = Some(strategy.with(key, constant(initial), operator));
        self
    }

    /// Delegates evaluation to `connection`.
    #[must_use]
    pub fn with_remote(mut self, connection: Arc<dyn RemoteConnection>) -> Self {
        self.traversal.bytecode_mut().add_source("withRemote", Vec::new());
        self.traversal.strategies.add(Arc::new(RemoteStrategy::new(connection)));
        self
    }

    /// Gives the traversal a private side-effects store.
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.traversal.isolate();
        self
    }

    /// Seeds the given values.
    #[must_use]
    pub fn inject(self, values: impl IntoIterator<Item = Value>) -> Self {
        let values: Vec<Value> = values.into_iter().collect();
        let arguments = values.clone();
        self.push("inject", arguments, StartStep::inject(values))
    }

    /// Seeds values with explicit multiplicities.
    #[must_use]
    pub fn inject_bulk(self, values: impl IntoIterator<Item = (Value, u64)>) -> Self {
        let values: Vec<(Value, u64)> = values.into_iter().collect();
        let arguments = values
            .iter()
            .map(|(value, bulk)| {
                let bulk = i64::try_from(*bulk).unwrap_or(i64::MAX);
                Value::List(vec![value.clone(), Value::Int(bulk)])
            })
            .collect();
        self.push("injectBulk", arguments, StartStep::inject_bulk(values))
    }

    /// Seeds values produced lazily by `factory`; `name` identifies it in
    /// bytecode.
    #[must_use]
    pub fn source_fn(self, name: &str, factory: SourceFn) -> Self {
        self.push("source", vec![name.into()], StartStep::from_fn(factory))
    }

    /// Seeds every vertex of the bound graph.
    #[must_use]
    pub fn vertices(self) -> Self {
        self.push("V", Vec::new(), StartStep::vertices())
    }

    /// Maps each value.
    #[must_use]
    pub fn map<F>(self, function: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let step = MapStep::new(Arc::new(move |value: &Value| -> TraversalResult<Value> {
            Ok(function(value))
        }));
        self.push("map", Vec::new(), step)
    }

    /// Maps each value with a function that may fail.
    #[must_use]
    pub fn try_map<F>(self, function: F) -> Self
    where
        F: Fn(&Value) -> TraversalResult<Value> + Send + Sync + 'static,
    {
        self.push("map", Vec::new(), MapStep::new(Arc::new(function)))
    }

    /// Keeps values that pass `predicate`.
    #[must_use]
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.push("filter", Vec::new(), FilterStep::new(Arc::new(predicate)))
    }

    /// Replaces each value with any number of values.
    #[must_use]
    pub fn flat_map<F, I>(self, function: F) -> Self
    where
        F: Fn(&Value) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Value>,
    {
        let step = FlatMapStep::new(Arc::new(move |value: &Value| -> TraversalResult<Vec<Value>> {
            Ok(function(value).into_iter().collect())
        }));
        self.push("flatMap", Vec::new(), step)
    }

    /// Adds a pass-through step.
    #[must_use]
    pub fn identity(self) -> Self {
        self.push("identity", Vec::new(), IdentityStep::new())
    }

    /// Moves to adjacent vertices.
    #[must_use]
    pub fn expand(self, direction: Direction, label: Option<&str>) -> Self {
        let arguments = label.map(Value::from).into_iter().collect();
        let step = ExpandStep::new(direction, label.map(str::to_owned));
        self.push(direction.as_str(), arguments, step)
    }

    /// Moves along outgoing edges.
    #[must_use]
    pub fn out(self, label: Option<&str>) -> Self {
        self.expand(Direction::Out, label)
    }

    /// Moves along incoming edges.
    #[must_use]
    pub fn in_(self, label: Option<&str>) -> Self {
        self.expand(Direction::In, label)
    }

    /// Moves along edges in either direction.
    #[must_use]
    pub fn both(self, label: Option<&str>) -> Self {
        self.expand(Direction::Both, label)
    }

    /// Records values into the side effect `key`.
    #[must_use]
    pub fn aggregate(self, key: &str, mode: AggregateMode) -> Self {
        let arguments = vec![key.into(), mode.as_str().into()];
        self.push("aggregate", arguments, AggregateStep::new(key, mode))
    }

    /// Evaluates `child` once per traverser.
    #[must_use]
    pub fn local(self, child: Traversal) -> Self {
        let arguments = vec![Value::from(child.bytecode().to_string())];
        self.push("local", arguments, LocalStep::new(child))
    }

    /// Labels the last step.
    #[must_use]
    pub fn as_(mut self, label: &str) -> Self {
        self.traversal.bytecode_mut().add_step("as", vec![label.into()]);
        self.traversal.label_last(label.to_owned());
        self
    }

    /// Appends a custom step.
    #[must_use]
    pub fn step(self, operator: &str, step: Box<dyn Step>) -> Self {
        let mut builder = self;
        builder.traversal.bytecode_mut().add_step(operator, Vec::new());
        builder.traversal.push_step(step);
        builder
    }

    fn push(mut self, operator: &str, arguments: Vec<Value>, step: impl Step + 'static) -> Self {
        self.traversal.bytecode_mut().add_step(operator, arguments);
        self.traversal.push_step(Box::new(step));
        self
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(mut self) -> Traversal {
        if let Some(strategy) = self.side_effects.take() {
            self.traversal.strategies.add(Arc::new(strategy));
        }
        self.traversal
    }
}

impl Default for TraversalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_bytecode() {
        let traversal = TraversalBuilder::new()
            .with_side_effect("seen", Value::List(Vec::new()), MergeOperator::Append)
            .inject([Value::Int(1), Value::Int(2)])
            .out(Some("knows"))
            .as_("friend")
            .aggregate("seen", AggregateMode::Store)
            .build();
        assert_eq!(
            traversal.bytecode().to_string(),
            concat!(
                "[[withSideEffect(seen, [])], ",
                "[inject(1, 2), out(knows), as(friend), aggregate(seen, store)]]"
            )
        );
        assert_eq!(traversal.len(), 3);
        assert!(traversal.step(1).unwrap().labels().contains("friend"));
        assert!(traversal.strategies().contains(SideEffectStrategy::NAME));
    }

    #[test]
    fn strategies_can_be_removed() {
        let traversal = TraversalBuilder::new()
            .without_strategy(crate::strategy::FilterFusionStrategy::NAME)
            .identity()
            .build();
        assert!(!traversal.strategies().contains(crate::strategy::FilterFusionStrategy::NAME));
        assert_eq!(traversal.bytecode().source_instructions().len(), 1);
    }
}
