//! Path history carried by path-tracking traversers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use trellis_core::Value;

/// The objects a traverser visited, each with the labels it was given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    objects: Vec<Value>,
    labels: Vec<BTreeSet<String>>,
}

impl Path {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the path has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the visited objects, oldest first.
    #[must_use]
    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    /// Returns the label sets, aligned with [`objects`](Self::objects).
    #[must_use]
    pub fn labels(&self) -> &[BTreeSet<String>] {
        &self.labels
    }

    /// Returns the most recent object.
    #[must_use]
    pub fn head(&self) -> Option<&Value> {
        self.objects.last()
    }

    /// Appends an object with the given labels.
    pub fn extend(&mut self, object: Value, labels: &BTreeSet<String>) {
        self.objects.push(object);
        self.labels.push(labels.clone());
    }

    /// Adds labels to the most recent object.
    pub fn extend_labels(&mut self, labels: &BTreeSet<String>) {
        if let Some(last) = self.labels.last_mut() {
            last.extend(labels.iter().cloned());
        }
    }

    /// Returns true if some object carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|set| set.contains(label))
    }

    /// Returns the most recent object labeled `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.labels
            .iter()
            .zip(&self.objects)
            .rev()
            .find_map(|(set, object)| set.contains(label).then_some(object))
    }

    /// Returns every object labeled `label`, oldest first.
    #[must_use]
    pub fn get_all(&self, label: &str) -> Vec<&Value> {
        self.labels
            .iter()
            .zip(&self.objects)
            .filter_map(|(set, object)| set.contains(label).then_some(object))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn extend_and_lookup() {
        let mut path = Path::new();
        path.extend(Value::Int(1), &labels(&["a"]));
        path.extend(Value::Int(2), &BTreeSet::new());
        path.extend_labels(&labels(&["b"]));
        path.extend(Value::Int(3), &labels(&["a"]));

        assert_eq!(path.len(), 3);
        assert_eq!(path.head(), Some(&Value::Int(3)));
        assert_eq!(path.get("a"), Some(&Value::Int(3)));
        assert_eq!(path.get("b"), Some(&Value::Int(2)));
        assert_eq!(path.get_all("a"), vec![&Value::Int(1), &Value::Int(3)]);
        assert!(path.get("c").is_none());
        assert!(path.has_label("b"));
    }

    #[test]
    fn extend_labels_on_empty_path_is_noop() {
        let mut path = Path::new();
        path.extend_labels(&labels(&["x"]));
        assert!(path.is_empty());
        assert!(!path.has_label("x"));
    }
}
