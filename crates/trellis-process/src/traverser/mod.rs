//! The token that flows through a step pipeline.
//!
//! A [`Traverser`] carries the current value, a bulk count and, when some
//! step asked for it, a [`Path`]. A traverser with bulk `B` stands for `B`
//! identical traversers; every consumer must treat it that way.

mod detached;
mod generator;
mod path;
mod requirement;

use std::collections::BTreeSet;

use trellis_core::Value;

pub use detached::DetachedTraverser;
pub use generator::{
    select_generator, BulkGenerator, LabeledPathGenerator, ObjectGenerator, PathGenerator,
    TraverserGenerator,
};
pub use path::Path;
pub use requirement::{RequirementSet, TraverserRequirement};

use crate::side_effects::SideEffects;

/// How a traverser records its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Every object visited is recorded.
    Full,
    /// Only objects that received a label are recorded.
    Labeled,
}

/// A unit of computation produced by one step and consumed by the next.
#[derive(Debug, Clone)]
pub struct Traverser {
    value: Value,
    bulk: u64,
    path: Option<(Path, PathMode)>,
    /// The last path object is the current value; labels extend it.
    recorded: bool,
    step_id: Option<String>,
    side_effects: Option<SideEffects>,
}

impl Traverser {
    /// Creates a traverser with bulk 1 and no path.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            bulk: 1,
            path: None,
            recorded: false,
            step_id: None,
            side_effects: None,
        }
    }

    /// Sets the bulk. Zero is raised to one.
    #[must_use]
    pub fn with_bulk(mut self, bulk: u64) -> Self {
        self.set_bulk(bulk);
        self
    }

    /// Enables path tracking with an initial path.
    #[must_use]
    pub fn with_path(mut self, path: Path, mode: PathMode) -> Self {
        self.path = Some((path, mode));
        self
    }

    /// Attaches a side-effects handle.
    #[must_use]
    pub fn with_side_effects(mut self, side_effects: SideEffects) -> Self {
        self.side_effects = Some(side_effects);
        self
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the traverser and returns its value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns the multiplicity.
    #[must_use]
    pub fn bulk(&self) -> u64 {
        self.bulk
    }

    /// Sets the multiplicity. Zero is raised to one.
    pub fn set_bulk(&mut self, bulk: u64) {
        self.bulk = bulk.max(1);
    }

    /// Returns the path if it is tracked.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref().map(|(path, _)| path)
    }

    /// Returns how the path is tracked, if at all.
    #[must_use]
    pub fn path_mode(&self) -> Option<PathMode> {
        self.path.as_ref().map(|(_, mode)| *mode)
    }

    /// Returns the id of the step that last emitted this traverser.
    #[must_use]
    pub fn step_id(&self) -> Option<&str> {
        self.step_id.as_deref()
    }

    /// Records the step that emitted this traverser.
    pub fn set_step_id(&mut self, id: impl Into<String>) {
        self.step_id = Some(id.into());
    }

    /// Returns the attached side-effects handle.
    #[must_use]
    pub fn side_effects(&self) -> Option<&SideEffects> {
        self.side_effects.as_ref()
    }

    /// Attaches a side-effects handle.
    pub fn set_side_effects(&mut self, side_effects: SideEffects) {
        self.side_effects = Some(side_effects);
    }

    /// Derives a traverser that carries `value` and keeps everything else.
    ///
    /// A fully tracked path is extended with the new value.
    #[must_use]
    pub fn split(&self, value: impl Into<Value>) -> Self {
        let value = value.into();
        let path = self.path.as_ref().map(|(path, mode)| {
            let mut path = path.clone();
            if *mode == PathMode::Full {
                path.extend(value.clone(), &BTreeSet::new());
            }
            (path, *mode)
        });
        Self {
            value,
            bulk: self.bulk,
            path,
            recorded: false,
            step_id: self.step_id.clone(),
            side_effects: self.side_effects.clone(),
        }
    }

    /// Records `labels` against the current value.
    ///
    /// With a full path the labels go on the most recent object. A labeled
    /// path appends the current value the first time it is labeled and
    /// extends that object afterwards, so consecutive labels on one value
    /// share one path object in both modes. Without path tracking this does
    /// nothing.
    pub fn add_labels(&mut self, labels: &BTreeSet<String>) {
        if labels.is_empty() {
            return;
        }
        if let Some((path, mode)) = &mut self.path {
            let current = match mode {
                PathMode::Full => true,
                PathMode::Labeled => self.recorded,
            };
            if current && !path.is_empty() {
                path.extend_labels(labels);
            } else {
                path.extend(self.value.clone(), labels);
                self.recorded = true;
            }
        }
    }

    /// Returns true if `other` can be folded into this traverser.
    #[must_use]
    pub fn can_merge(&self, other: &Self) -> bool {
        self.value == other.value && self.path() == other.path()
    }

    /// Folds the bulk of `other` into this traverser.
    pub fn merge(&mut self, other: &Self) {
        self.bulk = self.bulk.saturating_add(other.bulk);
    }

    /// Returns the value and bulk without path or linkage.
    #[must_use]
    pub fn detach(&self) -> DetachedTraverser {
        DetachedTraverser::new(self.value.clone(), self.bulk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn bulk_is_at_least_one() {
        let mut traverser = Traverser::new(1).with_bulk(0);
        assert_eq!(traverser.bulk(), 1);
        traverser.set_bulk(4);
        assert_eq!(traverser.bulk(), 4);
    }

    #[test]
    fn split_extends_full_path() {
        let traverser = PathGenerator::new(false).generate(Value::Int(1), 3);
        let child = traverser.split(2);
        assert_eq!(child.value(), &Value::Int(2));
        assert_eq!(child.bulk(), 3);
        assert_eq!(child.path().map(Path::objects), Some(&[Value::Int(1), Value::Int(2)][..]));
        assert_eq!(traverser.path().map(Path::len), Some(1));
    }

    #[test]
    fn split_keeps_labeled_path() {
        let mut traverser = LabeledPathGenerator::new(false).generate(Value::Int(1), 1);
        traverser.add_labels(&labels(&["a"]));
        let child = traverser.split(2);
        assert_eq!(child.path().map(Path::len), Some(1));
        assert_eq!(child.path().and_then(|p| p.get("a")), Some(&Value::Int(1)));
    }

    #[test]
    fn labels_attach_to_current_object() {
        let mut traverser = PathGenerator::new(false).generate(Value::Int(1), 1).split(2);
        traverser.add_labels(&labels(&["x"]));
        assert_eq!(traverser.path().and_then(|p| p.get("x")), Some(&Value::Int(2)));
        assert_eq!(traverser.path().map(Path::len), Some(2));

        let mut untracked = Traverser::new(1);
        untracked.add_labels(&labels(&["x"]));
        assert!(untracked.path().is_none());
    }

    #[test]
    fn labeled_path_records_current_value_once() {
        let mut traverser = LabeledPathGenerator::new(false).generate(Value::Int(1), 1);
        traverser.add_labels(&labels(&["a"]));
        traverser.add_labels(&labels(&["b"]));
        let path = traverser.path().expect("labeled path");
        assert_eq!(path.objects(), &[Value::Int(1)][..]);
        assert_eq!(path.labels()[0], labels(&["a", "b"]));

        let mut child = traverser.split(1);
        child.add_labels(&labels(&["c"]));
        assert_eq!(child.path().map(Path::len), Some(2));
    }

    #[test]
    fn merge_adds_bulk() {
        let mut a = Traverser::new("v").with_bulk(2);
        let b = Traverser::new("v").with_bulk(3);
        assert!(a.can_merge(&b));
        a.merge(&b);
        assert_eq!(a.bulk(), 5);
        assert!(!a.can_merge(&Traverser::new("w")));
    }

    #[test]
    fn detach_drops_path() {
        let traverser = PathGenerator::new(false).generate(Value::Int(9), 2);
        let detached = traverser.detach();
        assert_eq!(detached, DetachedTraverser::new(9, 2));
    }
}
