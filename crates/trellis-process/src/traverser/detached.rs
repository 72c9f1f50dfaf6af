//! Traversers materialized outside the live pipeline.

use serde::{Deserialize, Serialize};
use trellis_core::Value;

use super::Traverser;

/// A value and its multiplicity, computed elsewhere and replayed locally.
///
/// A detached traverser has no path and no step linkage. Converting it into
/// a [`Traverser`] yields a token the pull API treats exactly like one
/// produced by a local step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedTraverser {
    value: Value,
    bulk: u64,
}

impl DetachedTraverser {
    /// Creates a detached traverser. A bulk of zero is raised to one.
    #[must_use]
    pub fn new(value: impl Into<Value>, bulk: u64) -> Self {
        Self { value: value.into(), bulk: bulk.max(1) }
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the multiplicity.
    #[must_use]
    pub fn bulk(&self) -> u64 {
        self.bulk
    }

    /// Splits into value and bulk.
    #[must_use]
    pub fn into_parts(self) -> (Value, u64) {
        (self.value, self.bulk)
    }
}

impl From<DetachedTraverser> for Traverser {
    fn from(detached: DetachedTraverser) -> Self {
        let (value, bulk) = detached.into_parts();
        Traverser::new(value).with_bulk(bulk)
    }
}
