//! One-time rewrite passes over an unlocked traversal.
//!
//! Before the first pull, a traversal sorts its [`TraversalStrategies`] and
//! applies each one exactly once. Sorting is deterministic:
//!
//! 1. By [`StrategyCategory`], in the fixed order decoration, optimization,
//!    provider, finalization, verification.
//! 2. Inside a category, by the `prior`/`posterior` constraints each
//!    strategy declares.
//! 3. Otherwise by registration order.
//!
//! # Example
//!
//! ```ignore
//! let mut strategies = TraversalStrategies::standard();
//! strategies.remove(FilterFusionStrategy::NAME);
//! let traversal = TraversalBuilder::new().with_strategies(strategies).inject(values).build();
//! ```

mod decoration;
mod optimization;
mod verification;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub use decoration::{RemoteStrategy, SideEffectStrategy};
pub use optimization::{FilterFusionStrategy, IdentityRemovalStrategy};
pub use verification::StandardVerificationStrategy;

use crate::config::StrategyConfig;
use crate::error::{TraversalError, TraversalResult};
use crate::traversal::Traversal;

/// The phase a strategy runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyCategory {
    /// Adds behavior the user asked for (side effects, remote execution).
    Decoration,
    /// Rewrites for speed without changing results.
    Optimization,
    /// Rewrites specific to a graph provider.
    Provider,
    /// Last adjustments before evaluation.
    Finalization,
    /// Rejects pipelines that cannot be evaluated.
    Verification,
}

/// A rewrite pass over an unlocked traversal.
pub trait TraversalStrategy: Send + Sync {
    /// Returns the unique name of the strategy.
    fn name(&self) -> &'static str;

    /// Returns the phase the strategy runs in.
    fn category(&self) -> StrategyCategory;

    /// Rewrites `traversal`.
    ///
    /// # Errors
    ///
    /// Any error aborts strategy application and leaves the traversal
    /// unlocked with its pre-application pipeline.
    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()>;

    /// Names of strategies that must run before this one.
    fn prior(&self) -> &[&'static str] {
        &[]
    }

    /// Names of strategies that must run after this one.
    fn posterior(&self) -> &[&'static str] {
        &[]
    }
}

impl fmt::Debug for dyn TraversalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name(), self.category())
    }
}

/// The strategies registered on a traversal.
#[derive(Clone, Default)]
pub struct TraversalStrategies {
    strategies: Vec<Arc<dyn TraversalStrategy>>,
}

impl TraversalStrategies {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the strategies every traversal gets by default.
    #[must_use]
    pub fn standard() -> Self {
        let mut strategies = Self::new();
        strategies
            .add(Arc::new(IdentityRemovalStrategy))
            .add(Arc::new(FilterFusionStrategy))
            .add(Arc::new(StandardVerificationStrategy));
        strategies
    }

    /// Returns the standard strategies minus those disabled in `config`.
    #[must_use]
    pub fn from_config(config: &StrategyConfig) -> Self {
        let mut strategies = Self::standard();
        for name in &config.disabled {
            strategies.remove(name);
        }
        strategies
    }

    /// Registers a strategy, replacing any strategy with the same name.
    pub fn add(&mut self, strategy: Arc<dyn TraversalStrategy>) -> &mut Self {
        self.remove(strategy.name());
        self.strategies.push(strategy);
        self
    }

    /// Removes the strategy named `name`. Returns true if one was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|s| s.name() != name);
        self.strategies.len() != before
    }

    /// Returns true if a strategy named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.strategies.iter().any(|s| s.name() == name)
    }

    /// Returns the strategy named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TraversalStrategy>> {
        self.strategies.iter().find(|s| s.name() == name)
    }

    /// Returns the number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if no strategy is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns the strategy names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Returns the strategies in application order.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::StrategyOrder`] if a constraint names a
    /// strategy in a category that runs on the wrong side, or if the
    /// constraints inside a category form a cycle.
    pub fn sorted(&self) -> TraversalResult<Vec<Arc<dyn TraversalStrategy>>> {
        let categories: HashMap<&str, StrategyCategory> =
            self.strategies.iter().map(|s| (s.name(), s.category())).collect();
        for strategy in &self.strategies {
            let category = strategy.category();
            for prior in strategy.prior() {
                if categories.get(prior).is_some_and(|c| *c > category) {
                    return Err(TraversalError::StrategyOrder(format!(
                        "{} must run after {prior}, which is in a later category",
                        strategy.name()
                    )));
                }
            }
            for posterior in strategy.posterior() {
                if categories.get(posterior).is_some_and(|c| *c < category) {
                    return Err(TraversalError::StrategyOrder(format!(
                        "{} must run before {posterior}, which is in an earlier category",
                        strategy.name()
                    )));
                }
            }
        }

        let mut groups: BTreeMap<StrategyCategory, Vec<&Arc<dyn TraversalStrategy>>> =
            BTreeMap::new();
        for strategy in &self.strategies {
            groups.entry(strategy.category()).or_default().push(strategy);
        }

        let mut sorted = Vec::with_capacity(self.strategies.len());
        for group in groups.into_values() {
            sorted.extend(sort_group(&group)?);
        }
        Ok(sorted)
    }
}

/// Orders one category with Kahn's algorithm, always taking the earliest
/// registered strategy whose predecessors have all been placed.
fn sort_group(
    group: &[&Arc<dyn TraversalStrategy>],
) -> TraversalResult<Vec<Arc<dyn TraversalStrategy>>> {
    let position: HashMap<&str, usize> =
        group.iter().enumerate().map(|(i, s)| (s.name(), i)).collect();
    let mut successors = vec![Vec::new(); group.len()];
    let mut in_degree = vec![0usize; group.len()];
    for (index, strategy) in group.iter().enumerate() {
        for prior in strategy.prior() {
            if let Some(&before) = position.get(prior) {
                successors[before].push(index);
                in_degree[index] += 1;
            }
        }
        for posterior in strategy.posterior() {
            if let Some(&after) = position.get(posterior) {
                successors[index].push(after);
                in_degree[after] += 1;
            }
        }
    }

    let mut placed = vec![false; group.len()];
    let mut order = Vec::with_capacity(group.len());
    while order.len() < group.len() {
        let Some(next) = (0..group.len()).find(|&i| !placed[i] && in_degree[i] == 0) else {
            let cycle: Vec<&str> =
                (0..group.len()).filter(|&i| !placed[i]).map(|i| group[i].name()).collect();
            return Err(TraversalError::StrategyOrder(format!(
                "cyclic constraints between {}",
                cycle.join(", ")
            )));
        };
        placed[next] = true;
        for &after in &successors[next] {
            in_degree[after] -= 1;
        }
        order.push(Arc::clone(group[next]));
    }
    Ok(order)
}

impl fmt::Debug for TraversalStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.strategies.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        category: StrategyCategory,
        prior: Vec<&'static str>,
        posterior: Vec<&'static str>,
    }

    impl Named {
        fn new(name: &'static str, category: StrategyCategory) -> Self {
            Self { name, category, prior: Vec::new(), posterior: Vec::new() }
        }
    }

    impl TraversalStrategy for Named {
        fn name(&self) -> &'static str {
            self.name
        }

        fn category(&self) -> StrategyCategory {
            self.category
        }

        fn apply(&self, _traversal: &mut Traversal) -> TraversalResult<()> {
            Ok(())
        }

        fn prior(&self) -> &[&'static str] {
            &self.prior
        }

        fn posterior(&self) -> &[&'static str] {
            &self.posterior
        }
    }

    fn order(strategies: &TraversalStrategies) -> Vec<&'static str> {
        strategies.sorted().unwrap().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn categories_run_in_fixed_order() {
        let mut strategies = TraversalStrategies::new();
        strategies
            .add(Arc::new(Named::new("verify", StrategyCategory::Verification)))
            .add(Arc::new(Named::new("final", StrategyCategory::Finalization)))
            .add(Arc::new(Named::new("optimize", StrategyCategory::Optimization)))
            .add(Arc::new(Named::new("provider", StrategyCategory::Provider)))
            .add(Arc::new(Named::new("decorate", StrategyCategory::Decoration)));
        assert_eq!(order(&strategies), vec!["decorate", "optimize", "provider", "final", "verify"]);
    }

    #[test]
    fn constraints_inside_a_category() {
        let mut a = Named::new("a", StrategyCategory::Optimization);
        a.prior.push("c");
        let b = Named::new("b", StrategyCategory::Optimization);
        let mut c = Named::new("c", StrategyCategory::Optimization);
        c.posterior.push("b");
        let mut strategies = TraversalStrategies::new();
        strategies.add(Arc::new(a)).add(Arc::new(b)).add(Arc::new(c));
        assert_eq!(order(&strategies), vec!["c", "a", "b"]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut a = Named::new("a", StrategyCategory::Optimization);
        a.prior.push("b");
        let mut b = Named::new("b", StrategyCategory::Optimization);
        b.prior.push("a");
        let mut strategies = TraversalStrategies::new();
        strategies.add(Arc::new(a)).add(Arc::new(b));
        assert!(matches!(strategies.sorted(), Err(TraversalError::StrategyOrder(_))));
    }

    #[test]
    fn cross_category_contradiction_is_rejected() {
        let mut early = Named::new("early", StrategyCategory::Decoration);
        early.prior.push("late");
        let mut strategies = TraversalStrategies::new();
        strategies
            .add(Arc::new(early))
            .add(Arc::new(Named::new("late", StrategyCategory::Verification)));
        assert!(strategies.sorted().is_err());
    }

    #[test]
    fn add_replaces_same_name() {
        let mut strategies = TraversalStrategies::standard();
        let before = strategies.len();
        strategies.add(Arc::new(FilterFusionStrategy));
        assert_eq!(strategies.len(), before);
        assert_eq!(strategies.names().last(), Some(&FilterFusionStrategy::NAME));
    }

    #[test]
    fn config_disables_by_name() {
        let config = StrategyConfig { disabled: vec![IdentityRemovalStrategy::NAME.to_owned()] };
        let strategies = TraversalStrategies::from_config(&config);
        assert!(!strategies.contains(IdentityRemovalStrategy::NAME));
        assert!(strategies.contains(FilterFusionStrategy::NAME));
    }
}
