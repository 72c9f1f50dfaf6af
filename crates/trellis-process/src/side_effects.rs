//! Named, mergeable aggregation state shared by the steps of a traversal.
//!
//! A [`SideEffects`] handle is cheap to clone; clones share one store. Nested
//! traversals receive a clone of their parent's handle unless they are
//! isolated, so a write anywhere in the tree is visible to the root.
//!
//! Each key is registered with a supplier that produces its initial value the
//! first time the key is read, and a [`MergeOperator`] that combines values.
//! The operator is what makes partial stores from independent evaluations
//! mergeable without knowing how many partitions contributed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use trellis_core::Value;

use crate::error::{TraversalError, TraversalResult};

/// Produces the initial value of a side-effect key.
pub type Supplier = Arc<dyn Fn() -> Value + Send + Sync>;

/// A user-defined merge function.
pub type MergeFn = Arc<dyn Fn(&Value, &Value) -> TraversalResult<Value> + Send + Sync>;

/// A serializable view of the materialized values of a store.
pub type SideEffectsSnapshot = BTreeMap<String, Value>;

/// How two values of one side-effect key combine.
#[derive(Clone)]
pub enum MergeOperator {
    /// Numeric addition (and concatenation for strings and lists).
    Sum,
    /// List concatenation; a non-list operand is appended as one element.
    Append,
    /// List union preserving first-seen order.
    Union,
    /// The incoming value replaces the current one.
    Assign,
    /// Keeps the smaller value.
    Min,
    /// Keeps the larger value.
    Max,
    /// A user-supplied function.
    Custom(MergeFn),
}

impl MergeOperator {
    /// Returns the name of the operator.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Append => "append",
            Self::Union => "union",
            Self::Assign => "assign",
            Self::Min => "min",
            Self::Max => "max",
            Self::Custom(_) => "custom",
        }
    }

    /// Combines `current` with `incoming`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands cannot be combined by this operator.
    pub fn apply(&self, current: &Value, incoming: &Value) -> TraversalResult<Value> {
        match self {
            Self::Sum => Ok(current.checked_add(incoming)?),
            Self::Append => {
                let mut items = into_items(current);
                items.extend(into_items(incoming));
                Ok(Value::List(items))
            }
            Self::Union => {
                let mut items = into_items(current);
                for item in into_items(incoming) {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                Ok(Value::List(items))
            }
            Self::Assign => Ok(incoming.clone()),
            Self::Min => pick(current, incoming, Ordering::Less),
            Self::Max => pick(current, incoming, Ordering::Greater),
            Self::Custom(merge) => merge(current, incoming),
        }
    }
}

impl fmt::Debug for MergeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn into_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn pick(current: &Value, incoming: &Value, keep: Ordering) -> TraversalResult<Value> {
    if current.is_null() {
        return Ok(incoming.clone());
    }
    if incoming.is_null() {
        return Ok(current.clone());
    }
    match incoming.compare(current) {
        Some(ordering) if ordering == keep => Ok(incoming.clone()),
        Some(_) => Ok(current.clone()),
        None => Err(TraversalError::side_effect(format!(
            "cannot compare {} with {}",
            incoming.type_name(),
            current.type_name()
        ))),
    }
}

struct Entry {
    value: Option<Value>,
    supplier: Supplier,
    operator: MergeOperator,
    /// Bumped on every write of `value`.
    revision: u64,
}

impl Entry {
    fn new(supplier: Supplier, operator: MergeOperator) -> Self {
        Self { value: None, supplier, operator, revision: 0 }
    }

    fn materialize(&mut self) -> &mut Value {
        let supplier = &self.supplier;
        self.value.get_or_insert_with(|| supplier())
    }

    fn store(&mut self, value: Value) {
        self.value = Some(value);
        self.revision = self.revision.wrapping_add(1);
    }

    /// Same registration, no value.
    fn fresh(&self) -> Self {
        Self::new(Arc::clone(&self.supplier), self.operator.clone())
    }
}

/// A shared handle to a side-effects store.
#[derive(Clone, Default)]
pub struct SideEffects {
    inner: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl SideEffects {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key`, replacing any existing registration and value.
    pub fn register(&self, key: impl Into<String>, supplier: Supplier, operator: MergeOperator) {
        let key = key.into();
        let mut entries = self.inner.write();
        let revision = entries.get(&key).map_or(0, |old| old.revision.wrapping_add(1));
        entries.insert(key, Entry { revision, ..Entry::new(supplier, operator) });
    }

    /// Registers `key` unless it is already registered.
    ///
    /// Returns true if the key was newly registered.
    pub fn register_if_absent(
        &self,
        key: &str,
        supplier: impl FnOnce() -> Supplier,
        operator: MergeOperator,
    ) -> bool {
        if self.inner.read().contains_key(key) {
            return false;
        }
        let mut entries = self.inner.write();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_owned(), Entry::new(supplier(), operator));
        true
    }

    /// Returns true if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Returns the value of `key`, initializing it from its supplier on
    /// first access.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::SideEffect`] if `key` is not registered.
    pub fn get(&self, key: &str) -> TraversalResult<Value> {
        if let Some(value) = self.inner.read().get(key).and_then(|entry| entry.value.clone()) {
            return Ok(value);
        }
        let mut entries = self.inner.write();
        let entry = entries.get_mut(key).ok_or_else(|| unknown_key(key))?;
        Ok(entry.materialize().clone())
    }

    /// Replaces the value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::SideEffect`] if `key` is not registered.
    pub fn set(&self, key: &str, value: Value) -> TraversalResult<()> {
        let mut entries = self.inner.write();
        let entry = entries.get_mut(key).ok_or_else(|| unknown_key(key))?;
        entry.store(value);
        Ok(())
    }

    /// Merges `value` into the current value of `key` with the key's operator.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not registered or the merge fails.
    pub fn add(&self, key: &str, value: &Value) -> TraversalResult<()> {
        self.combine(key, value, None)
    }

    /// Merges `incoming` into `key`, adopting the key with `adopt` when it is
    /// not registered.
    ///
    /// The operator runs without the lock held, so a custom merge function may
    /// read this store. A write that lands while it runs causes a retry.
    fn combine(
        &self,
        key: &str,
        incoming: &Value,
        mut adopt: Option<(Supplier, MergeOperator)>,
    ) -> TraversalResult<()> {
        loop {
            let (current, operator, revision) = {
                let mut entries = self.inner.write();
                if let Some(entry) = entries.get_mut(key) {
                    (entry.materialize().clone(), entry.operator.clone(), entry.revision)
                } else {
                    let (supplier, operator) = adopt.take().ok_or_else(|| unknown_key(key))?;
                    let mut entry = Entry::new(supplier, operator);
                    entry.store(incoming.clone());
                    entries.insert(key.to_owned(), entry);
                    return Ok(());
                }
            };
            let merged = operator.apply(&current, incoming)?;
            let mut entries = self.inner.write();
            let entry = entries.get_mut(key).ok_or_else(|| unknown_key(key))?;
            if entry.revision == revision {
                entry.store(merged);
                return Ok(());
            }
        }
    }

    /// Removes `key` and returns its value if it had been materialized.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key).and_then(|entry| entry.value)
    }

    /// Returns the registered keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Returns the merge operator of `key`.
    #[must_use]
    pub fn operator(&self, key: &str) -> Option<MergeOperator> {
        self.inner.read().get(key).map(|entry| entry.operator.clone())
    }

    /// Merges every materialized value of `other` into this store.
    ///
    /// Keys unknown here are adopted along with their registration.
    ///
    /// # Errors
    ///
    /// Returns an error if a merge fails. Keys merged before the failure keep
    /// their merged values.
    pub fn merge_from(&self, other: &Self) -> TraversalResult<()> {
        if self.ptr_eq(other) {
            return Err(TraversalError::side_effect("cannot merge a store into itself"));
        }
        // Copied out so the two stores are never locked together.
        let incoming: Vec<_> = other
            .inner
            .read()
            .iter()
            .filter_map(|(key, theirs)| {
                let value = theirs.value.clone()?;
                Some((key.clone(), value, Arc::clone(&theirs.supplier), theirs.operator.clone()))
            })
            .collect();
        for (key, value, supplier, operator) in incoming {
            self.combine(&key, &value, Some((supplier, operator)))?;
        }
        Ok(())
    }

    /// Returns the materialized values of the store.
    #[must_use]
    pub fn snapshot(&self) -> SideEffectsSnapshot {
        self.inner
            .read()
            .iter()
            .filter_map(|(key, entry)| entry.value.clone().map(|value| (key.clone(), value)))
            .collect()
    }

    /// Merges a partial result into this store.
    ///
    /// Registered keys combine with their operator; unknown keys are adopted
    /// with [`MergeOperator::Assign`].
    ///
    /// # Errors
    ///
    /// Returns an error if a merge fails.
    pub fn merge_snapshot(&self, snapshot: SideEffectsSnapshot) -> TraversalResult<()> {
        for (key, value) in snapshot {
            self.combine(&key, &value, Some((constant(Value::Null), MergeOperator::Assign)))?;
        }
        Ok(())
    }

    /// Returns a new store with the same registrations and no values.
    #[must_use]
    pub fn isolated(&self) -> Self {
        let entries = self
            .inner
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.fresh()))
            .collect();
        Self { inner: Arc::new(RwLock::new(entries)) }
    }

    /// Returns an independent copy of the store, values included.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        let entries = self
            .inner
            .read()
            .iter()
            .map(|(key, entry)| {
                let copy = Entry { value: entry.value.clone(), ..entry.fresh() };
                (key.clone(), copy)
            })
            .collect();
        Self { inner: Arc::new(RwLock::new(entries)) }
    }

    /// Returns true if both handles point at the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns true if no key is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl fmt::Debug for SideEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.inner.read();
        let mut map = f.debug_map();
        for (key, entry) in entries.iter() {
            map.entry(key, &entry.value);
        }
        map.finish()
    }
}

fn unknown_key(key: &str) -> TraversalError {
    TraversalError::side_effect(format!("unknown side effect key: {key}"))
}

/// Returns a supplier that always produces `value`.
pub fn constant(value: Value) -> Supplier {
    Arc::new(move || value.clone())
}
