use std::collections::HashSet;

use super::{StrategyCategory, TraversalStrategy};
use crate::error::{TraversalError, TraversalResult};
use crate::step::RemoteStep;
use crate::traversal::Traversal;

/// Rejects pipelines with duplicate step ids or a misplaced remote step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardVerificationStrategy;

impl StandardVerificationStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "StandardVerificationStrategy";

    fn fail(reason: String) -> TraversalError {
        TraversalError::StrategyFailed { strategy: Self::NAME.to_owned(), reason }
    }
}

impl TraversalStrategy for StandardVerificationStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Verification
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        let mut seen = HashSet::new();
        for (index, step) in traversal.steps().enumerate() {
            if !seen.insert(step.id()) {
                return Err(Self::fail(format!("duplicate step id {}", step.id())));
            }
            if index > 0 && step.is::<RemoteStep>() {
                return Err(Self::fail(format!(
                    "remote step {} must be the first step, found at {index}",
                    step.id()
                )));
            }
        }
        Ok(())
    }
}
