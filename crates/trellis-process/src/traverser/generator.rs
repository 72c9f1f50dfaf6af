//! Construction of initial traversers.
//!
//! After strategies run, the traversal computes the union of the requirements
//! its steps declare and calls [`select_generator`]. The chosen generator
//! shapes every seed value into a [`Traverser`] carrying exactly the
//! capabilities the pipeline needs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use trellis_core::Value;

use super::{Path, PathMode, RequirementSet, Traverser, TraverserRequirement};

/// Turns seed values into traversers.
pub trait TraverserGenerator: Send + Sync + fmt::Debug {
    /// Returns the generator name, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the requirements this generator satisfies.
    fn provided_requirements(&self) -> RequirementSet;

    /// Creates a traverser for `value` with the given multiplicity.
    fn generate(&self, value: Value, bulk: u64) -> Traverser;

    /// Returns false if every traverser must carry bulk 1. Sources then emit
    /// one traverser per unit of multiplicity.
    fn supports_bulk(&self) -> bool {
        true
    }
}

/// Value-only traversers with bulk fixed at one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectGenerator;

impl TraverserGenerator for ObjectGenerator {
    fn name(&self) -> &'static str {
        "object"
    }

    fn provided_requirements(&self) -> RequirementSet {
        [TraverserRequirement::Object, TraverserRequirement::SingleBulk].into_iter().collect()
    }

    fn generate(&self, value: Value, _bulk: u64) -> Traverser {
        Traverser::new(value)
    }

    fn supports_bulk(&self) -> bool {
        false
    }
}

/// Value and bulk, no path.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkGenerator;

impl TraverserGenerator for BulkGenerator {
    fn name(&self) -> &'static str {
        "bulk"
    }

    fn provided_requirements(&self) -> RequirementSet {
        [TraverserRequirement::Object, TraverserRequirement::Bulk].into_iter().collect()
    }

    fn generate(&self, value: Value, bulk: u64) -> Traverser {
        Traverser::new(value).with_bulk(bulk)
    }
}

/// Traversers whose path keeps only labeled objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabeledPathGenerator {
    single_bulk: bool,
}

impl LabeledPathGenerator {
    /// Creates the generator; `single_bulk` forces bulk 1.
    #[must_use]
    pub const fn new(single_bulk: bool) -> Self {
        Self { single_bulk }
    }
}

impl TraverserGenerator for LabeledPathGenerator {
    fn name(&self) -> &'static str {
        "labeled_path"
    }

    fn provided_requirements(&self) -> RequirementSet {
        let provided = RequirementSet::new()
            .with(TraverserRequirement::Object)
            .with(TraverserRequirement::LabeledPath);
        if self.single_bulk {
            provided.with(TraverserRequirement::SingleBulk)
        } else {
            provided.with(TraverserRequirement::Bulk)
        }
    }

    fn generate(&self, value: Value, bulk: u64) -> Traverser {
        let bulk = if self.single_bulk { 1 } else { bulk };
        Traverser::new(value).with_bulk(bulk).with_path(Path::new(), PathMode::Labeled)
    }

    fn supports_bulk(&self) -> bool {
        !self.single_bulk
    }
}

/// Traversers that record every object they visit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathGenerator {
    single_bulk: bool,
}

impl PathGenerator {
    /// Creates the generator; `single_bulk` forces bulk 1.
    #[must_use]
    pub const fn new(single_bulk: bool) -> Self {
        Self { single_bulk }
    }
}

impl TraverserGenerator for PathGenerator {
    fn name(&self) -> &'static str {
        "path"
    }

    fn provided_requirements(&self) -> RequirementSet {
        let provided = RequirementSet::new()
            .with(TraverserRequirement::Object)
            .with(TraverserRequirement::Path)
            .with(TraverserRequirement::LabeledPath);
        if self.single_bulk {
            provided.with(TraverserRequirement::SingleBulk)
        } else {
            provided.with(TraverserRequirement::Bulk)
        }
    }

    fn generate(&self, value: Value, bulk: u64) -> Traverser {
        let bulk = if self.single_bulk { 1 } else { bulk };
        let mut path = Path::new();
        path.extend(value.clone(), &BTreeSet::new());
        Traverser::new(value).with_bulk(bulk).with_path(path, PathMode::Full)
    }

    fn supports_bulk(&self) -> bool {
        !self.single_bulk
    }
}

/// Picks the cheapest generator that satisfies `requirements`.
///
/// Path tracking wins over everything else; `force_path` selects the full
/// path generator unconditionally.
#[must_use]
pub fn select_generator(
    requirements: &RequirementSet,
    force_path: bool,
) -> Arc<dyn TraverserGenerator> {
    let single_bulk = requirements.contains(TraverserRequirement::SingleBulk);
    if force_path || requirements.contains(TraverserRequirement::Path) {
        Arc::new(PathGenerator::new(single_bulk))
    } else if requirements.contains(TraverserRequirement::LabeledPath) {
        Arc::new(LabeledPathGenerator::new(single_bulk))
    } else if single_bulk {
        Arc::new(ObjectGenerator)
    } else {
        Arc::new(BulkGenerator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TraverserRequirement::*;

    fn satisfies(generator: &dyn TraverserGenerator, requirements: &RequirementSet) -> bool {
        let provided = generator.provided_requirements();
        requirements
            .iter()
            .filter(|r| *r != Nested && *r != SideEffects)
            .all(|r| provided.contains(r))
    }

    #[test]
    fn selection_by_requirements() {
        let cases = [
            (RequirementSet::new().with(Object), "bulk"),
            (RequirementSet::new().with(Object).with(SingleBulk), "object"),
            (RequirementSet::new().with(LabeledPath), "labeled_path"),
            (RequirementSet::new().with(Path).with(LabeledPath), "path"),
            (RequirementSet::new().with(Path).with(SingleBulk), "path"),
        ];
        for (requirements, expected) in cases {
            let generator = select_generator(&requirements, false);
            assert_eq!(generator.name(), expected);
            assert!(satisfies(generator.as_ref(), &requirements));
        }
    }

    #[test]
    fn force_path_overrides() {
        let generator = select_generator(&RequirementSet::new().with(Object), true);
        assert_eq!(generator.name(), "path");
    }

    #[test]
    fn object_generator_ignores_bulk() {
        let traverser = ObjectGenerator.generate(Value::Int(1), 5);
        assert_eq!(traverser.bulk(), 1);
        assert!(!ObjectGenerator.supports_bulk());
    }

    #[test]
    fn path_generator_seeds_path() {
        let traverser = PathGenerator::new(false).generate(Value::Int(1), 2);
        assert_eq!(traverser.bulk(), 2);
        assert_eq!(traverser.path().map(super::super::Path::len), Some(1));

        let labeled = LabeledPathGenerator::new(true).generate(Value::Int(1), 2);
        assert_eq!(labeled.bulk(), 1);
        assert_eq!(labeled.path().map(super::super::Path::len), Some(0));
    }
}
