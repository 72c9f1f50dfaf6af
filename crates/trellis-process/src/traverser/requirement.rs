//! Capabilities that steps require traversers to carry.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A capability a step needs from the traversers flowing into it.
///
/// The effective requirement set of a traversal is the union across its
/// steps (including the steps of nested traversals) and decides which
/// [`TraverserGenerator`](super::TraverserGenerator) seeds the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraverserRequirement {
    /// The current value. Always present.
    Object,
    /// Multiplicity greater than one may be collapsed into a single traverser.
    Bulk,
    /// Every traverser must carry bulk 1.
    SingleBulk,
    /// Only objects that received a label are kept in the path.
    LabeledPath,
    /// Every object visited is kept in the path.
    Path,
    /// Traversers carry a handle to the side-effects store.
    SideEffects,
    /// The pipeline contains steps that own child traversals.
    Nested,
}

impl fmt::Display for TraverserRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Bulk => "bulk",
            Self::SingleBulk => "single_bulk",
            Self::LabeledPath => "labeled_path",
            Self::Path => "path",
            Self::SideEffects => "side_effects",
            Self::Nested => "nested",
        };
        f.write_str(name)
    }
}

/// An ordered set of [`TraverserRequirement`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementSet(BTreeSet<TraverserRequirement>);

impl RequirementSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a requirement.
    pub fn insert(&mut self, requirement: TraverserRequirement) -> &mut Self {
        self.0.insert(requirement);
        self
    }

    /// Returns this set with `requirement` added.
    #[must_use]
    pub fn with(mut self, requirement: TraverserRequirement) -> Self {
        self.0.insert(requirement);
        self
    }

    /// Adds every requirement of `other`.
    pub fn union_with(&mut self, other: &Self) {
        self.0.extend(other.0.iter().copied());
    }

    /// Returns true if `requirement` is present.
    #[must_use]
    pub fn contains(&self, requirement: TraverserRequirement) -> bool {
        self.0.contains(&requirement)
    }

    /// Returns true if path tracking of either kind is required.
    #[must_use]
    pub fn needs_path(&self) -> bool {
        self.contains(TraverserRequirement::Path)
            || self.contains(TraverserRequirement::LabeledPath)
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of requirements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the requirements in order.
    pub fn iter(&self) -> impl Iterator<Item = TraverserRequirement> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<TraverserRequirement> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = TraverserRequirement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<TraverserRequirement> for RequirementSet {
    fn extend<I: IntoIterator<Item = TraverserRequirement>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
