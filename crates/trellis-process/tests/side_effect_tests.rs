//! Integration tests for side effects shared across a traversal.

use std::sync::Arc;

use proptest::prelude::*;
use trellis_process::side_effects::constant;
use trellis_process::step::AggregateMode;
use trellis_process::{
    MergeOperator, SideEffects, Traversal, TraversalBuilder, TraversalResult, Value,
};

fn aggregate_all(values: &[i64]) -> Traversal {
    let mut traversal = TraversalBuilder::new()
        .inject(values.iter().copied().map(Value::Int))
        .aggregate("sum", AggregateMode::Sum)
        .aggregate("all", AggregateMode::Store)
        .aggregate("distinct", AggregateMode::Set)
        .aggregate("count", AggregateMode::Count)
        .build();
    traversal.iterate().expect("iterate");
    traversal
}

#[test]
fn test_declared_side_effect_is_visible_before_pulling() {
    let traversal = TraversalBuilder::new()
        .with_side_effect("seen", Value::Int(100), MergeOperator::Sum)
        .inject([Value::Int(1)])
        .aggregate("seen", AggregateMode::Sum)
        .build();
    let shared = traversal.side_effects().clone();

    let mut traversal = traversal;
    traversal.apply_strategies().expect("apply");
    assert_eq!(shared.get("seen").expect("registered"), Value::Int(100));

    traversal.iterate().expect("iterate");
    assert_eq!(shared.get("seen").expect("merged"), Value::Int(101));
}

#[test]
fn test_child_shares_parent_store() {
    let child = TraversalBuilder::anonymous().aggregate("inner", AggregateMode::Store).build();
    let mut traversal = TraversalBuilder::new()
        .inject([Value::from("a"), Value::from("b")])
        .local(child)
        .build();

    traversal.iterate().expect("iterate");
    let inner = traversal.side_effects().get("inner").expect("shared key");
    assert_eq!(inner, Value::List(vec![Value::from("a"), Value::from("b")]));
}

#[test]
fn test_isolated_child_keeps_its_own_store() {
    let child = TraversalBuilder::anonymous()
        .isolated()
        .aggregate("inner", AggregateMode::Count)
        .build();
    let mut traversal = TraversalBuilder::new()
        .inject([Value::Int(1), Value::Int(2)])
        .local(child)
        .aggregate("outer", AggregateMode::Count)
        .build();

    assert_eq!(traversal.next_n(5).expect("values").len(), 2);
    assert!(!traversal.side_effects().contains("inner"));
    assert_eq!(traversal.side_effects().get("outer").expect("outer"), Value::Int(2));

    let child = traversal.step(1).expect("local").children()[0];
    assert!(child.is_isolated());
    assert_eq!(child.side_effects().get("inner").expect("inner"), Value::Int(2));
}

#[test]
fn test_cloned_traversal_has_independent_store() {
    let original = TraversalBuilder::new()
        .with_side_effect("n", 0_i64, MergeOperator::Sum)
        .inject([Value::Int(5)])
        .aggregate("n", AggregateMode::Sum)
        .build();
    let mut copy = original.clone();
    copy.iterate().expect("iterate");

    assert_eq!(copy.side_effects().get("n").expect("n"), Value::Int(5));
    assert!(!original.side_effects().ptr_eq(copy.side_effects()));
    assert!(original.side_effects().snapshot().is_empty());
}

#[test]
fn test_custom_merge_operator() {
    let pick = |current: &Value, incoming: &Value| -> TraversalResult<Value> {
        let len = |v: &Value| v.as_str().map_or(0, str::len);
        Ok(if len(incoming) > len(current) { incoming.clone() } else { current.clone() })
    };
    let longest = MergeOperator::Custom(Arc::new(pick));
    let store = SideEffects::new();
    store.register("longest", constant(Value::from("")), longest);
    for word in ["a", "abc", "ab"] {
        store.add("longest", &Value::from(word)).expect("add");
    }
    assert_eq!(store.get("longest").expect("value"), Value::from("abc"));
}

proptest! {
    #[test]
    fn prop_partitioned_merge_matches_whole(
        values in proptest::collection::vec(-50_i64..50, 0..30),
        split in 0_usize..30,
    ) {
        let split = split.min(values.len());
        let whole = aggregate_all(&values);
        let left = aggregate_all(&values[..split]);
        let right = aggregate_all(&values[split..]);

        left.side_effects().merge_from(right.side_effects()).expect("merge");
        prop_assert_eq!(left.side_effects().snapshot(), whole.side_effects().snapshot());
    }

    #[test]
    fn prop_snapshot_merge_matches_store_merge(
        a in proptest::collection::vec(0_i64..10, 1..10),
        b in proptest::collection::vec(0_i64..10, 1..10),
    ) {
        let by_store = aggregate_all(&a);
        let by_snapshot = aggregate_all(&a);
        let other = aggregate_all(&b);

        by_store.side_effects().merge_from(other.side_effects()).expect("merge");
        by_snapshot
            .side_effects()
            .merge_snapshot(other.side_effects().snapshot())
            .expect("merge snapshot");
        prop_assert_eq!(by_store.side_effects().snapshot(), by_snapshot.side_effects().snapshot());
    }
}
