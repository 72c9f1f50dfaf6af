use std::iter::FusedIterator;

use trellis_core::Value;

use super::Traversal;
use crate::error::TraversalResult;

/// A forward-only view over the values of a traversal.
///
/// Iterating pulls the traversal exactly as [`Traversal::try_next`] would.
/// The stream ends at exhaustion or after yielding the first error.
#[derive(Debug)]
pub struct TraversalStream<'a> {
    traversal: &'a mut Traversal,
    done: bool,
}

impl<'a> TraversalStream<'a> {
    pub(super) fn new(traversal: &'a mut Traversal) -> Self {
        Self { traversal, done: false }
    }
}

impl Iterator for TraversalStream<'_> {
    type Item = TraversalResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.traversal.try_next() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

impl FusedIterator for TraversalStream<'_> {}

impl<'a> IntoIterator for &'a mut Traversal {
    type Item = TraversalResult<Value>;
    type IntoIter = TraversalStream<'a>;

    fn into_iter(self) -> Self::IntoIter {
        TraversalStream::new(self)
    }
}
