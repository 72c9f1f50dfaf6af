use std::fmt;
use std::sync::Arc;

use super::{StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::remote::RemoteConnection;
use crate::side_effects::{MergeOperator, Supplier};
use crate::step::RemoteStep;
use crate::traversal::Traversal;

/// Registers side-effect keys on the root traversal before evaluation.
#[derive(Clone, Default)]
pub struct SideEffectStrategy {
    entries: Vec<(String, Supplier, MergeOperator)>,
}

impl SideEffectStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "SideEffectStrategy";

    /// Creates a strategy with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key to register.
    #[must_use]
    pub fn with(
        mut self,
        key: impl Into<String>,
        supplier: Supplier,
        operator: MergeOperator,
    ) -> Self {
        self.entries.push((key.into(), supplier, operator));
        self
    }

    /// Returns the keys this strategy registers.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _, _)| key.as_str())
    }
}

impl fmt::Debug for SideEffectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.keys().collect();
        f.debug_struct("SideEffectStrategy").field("keys", &keys).finish()
    }
}

impl TraversalStrategy for SideEffectStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Decoration
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        if !traversal.is_root() {
            return Ok(());
        }
        for (key, supplier, operator) in &self.entries {
            traversal.side_effects().register(key.clone(), Arc::clone(supplier), operator.clone());
        }
        Ok(())
    }
}

/// Replaces the pipeline of the root traversal with a [`RemoteStep`] that
/// submits the traversal's bytecode to a connection.
#[derive(Clone)]
pub struct RemoteStrategy {
    connection: Arc<dyn RemoteConnection>,
}

impl RemoteStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "RemoteStrategy";

    /// Creates the strategy.
    #[must_use]
    pub fn new(connection: Arc<dyn RemoteConnection>) -> Self {
        Self { connection }
    }
}

impl TraversalStrategy for RemoteStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Decoration
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        if !traversal.is_root() || traversal.step(0).is_some_and(|s| s.is::<RemoteStep>()) {
            return Ok(());
        }
        while !traversal.is_empty() {
            traversal.remove_step(traversal.len() - 1)?;
        }
        let step = RemoteStep::new(Arc::clone(&self.connection), traversal.bytecode().clone());
        traversal.add_step(0, Box::new(step))
    }

    fn prior(&self) -> &[&'static str] {
        &[SideEffectStrategy::NAME]
    }
}
