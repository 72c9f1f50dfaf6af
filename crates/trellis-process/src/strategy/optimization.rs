use super::{StrategyCategory, TraversalStrategy};
use crate::error::TraversalResult;
use crate::step::{FilterStep, IdentityStep};
use crate::traversal::Traversal;

/// Removes unlabeled identity steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRemovalStrategy;

impl IdentityRemovalStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "IdentityRemovalStrategy";
}

impl TraversalStrategy for IdentityRemovalStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Optimization
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        let mut index = 0;
        while index < traversal.len() {
            let removable = traversal
                .step(index)
                .is_some_and(|s| s.is::<IdentityStep>() && s.labels().is_empty());
            if removable {
                traversal.remove_step(index)?;
            } else {
                index += 1;
            }
        }
        Ok(())
    }
}

/// Fuses runs of adjacent filter steps into one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterFusionStrategy;

impl FilterFusionStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "FilterFusionStrategy";
}

impl TraversalStrategy for FilterFusionStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Optimization
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        let mut index = 0;
        while index + 1 < traversal.len() {
            let filter_at =
                |i: usize| traversal.step(i).and_then(|s| s.downcast_ref::<FilterStep>());
            let fused = match (filter_at(index), filter_at(index + 1)) {
                (Some(first), Some(second)) => Some(first.fuse(second)),
                _ => None,
            };
            match fused {
                Some(step) => {
                    traversal.replace_step(index, Box::new(step))?;
                    traversal.remove_step(index + 1)?;
                }
                None => index += 1,
            }
        }
        Ok(())
    }

    fn prior(&self) -> &[&'static str] {
        &[IdentityRemovalStrategy::NAME]
    }
}
