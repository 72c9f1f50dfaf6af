//! Integration tests for strategy application.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trellis_process::step::{FilterStep, IdentityStep, MapStep, StartStep};
use trellis_process::strategy::{FilterFusionStrategy, IdentityRemovalStrategy, StrategyCategory};
use trellis_process::{
    EngineConfig, Path, Step, Traversal, TraversalBuilder, TraversalError, TraversalResult,
    TraversalStrategies, TraversalStrategy, Value,
};

/// Drops the last step, then fails.
struct Breaking;

impl TraversalStrategy for Breaking {
    fn name(&self) -> &'static str {
        "Breaking"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Finalization
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        let last = traversal.len() - 1;
        traversal.remove_step(last)?;
        Err(TraversalError::step("breaking", "refused"))
    }
}

/// Counts how often it runs.
struct Counting(Arc<AtomicUsize>);

impl TraversalStrategy for Counting {
    fn name(&self) -> &'static str {
        "Counting"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Provider
    }

    fn apply(&self, _traversal: &mut Traversal) -> TraversalResult<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Routes strategy logs to the test output; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn even(v: &Value) -> bool {
    v.as_int().is_some_and(|i| i % 2 == 0)
}

fn small(v: &Value) -> bool {
    v.as_int().is_some_and(|i| i < 7)
}

#[test]
fn test_strategies_apply_once() {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut traversal = TraversalBuilder::new()
        .with_strategy(Arc::new(Counting(Arc::clone(&runs))))
        .inject([Value::Int(1), Value::Int(2)])
        .build();

    traversal.apply_strategies().expect("apply");
    traversal.apply_strategies().expect("apply again");
    traversal.next_n(5).expect("pull");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(traversal.is_locked());
}

#[test]
fn test_locked_traversal_rejects_mutation() {
    let mut traversal = TraversalBuilder::new().inject([Value::Int(1)]).build();
    traversal.apply_strategies().expect("apply");

    let error = traversal.add_step_last(Box::new(IdentityStep::new())).expect_err("locked");
    assert!(matches!(error, TraversalError::Locked { .. }));
    assert!(traversal.remove_step(0).is_err());
    assert!(traversal.strategies_mut().is_err());
    assert_eq!(traversal.len(), 1);
}

#[test]
fn test_failed_strategy_restores_pipeline() {
    init_tracing();
    let mut traversal = TraversalBuilder::new()
        .with_strategy(Arc::new(Breaking))
        .inject([Value::Int(1), Value::Int(2)])
        .map(|v| v.scale(3).unwrap_or(Value::Null))
        .build();
    let ids: Vec<String> = traversal.steps().map(|s| s.id().to_owned()).collect();

    let error = traversal.apply_strategies().expect_err("strategy fails");
    match &error {
        TraversalError::StrategyFailed { strategy, reason } => {
            assert_eq!(strategy, "Breaking");
            assert!(reason.contains("refused"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!traversal.is_locked());
    let restored: Vec<String> = traversal.steps().map(|s| s.id().to_owned()).collect();
    assert_eq!(restored, ids);

    // Still mutable, so the failing strategy can be dropped and the pipeline run.
    traversal.strategies_mut().expect("unlocked").remove("Breaking");
    assert_eq!(traversal.next_n(5).expect("pull"), vec![Value::Int(3), Value::Int(6)]);
}

#[test]
fn test_identity_removal_keeps_labeled_steps() {
    let mut traversal = TraversalBuilder::new()
        .inject([Value::Int(1)])
        .identity()
        .identity()
        .as_("kept")
        .build();

    traversal.apply_strategies().expect("apply");
    assert_eq!(traversal.len(), 2);
    assert!(traversal.end_step().is_some_and(|s| s.is::<IdentityStep>()));
    assert!(traversal.end_step().is_some_and(|s| s.labels().contains("kept")));
}

#[test]
fn test_adjacent_filters_are_fused() {
    let mut traversal = TraversalBuilder::new()
        .inject((1..=10).map(Value::Int))
        .filter(even)
        .identity()
        .filter(small)
        .build();
    let first_id = traversal.step(1).map(|s| s.id().to_owned());

    assert_eq!(traversal.next_n(10).expect("pull"), [2, 4, 6].map(Value::Int).to_vec());
    assert_eq!(traversal.len(), 2);
    let fused = traversal.step(1).and_then(|s| s.downcast_ref::<FilterStep>()).expect("filter");
    assert_eq!(fused.predicate_count(), 2);
    assert_eq!(traversal.step(1).map(|s| s.id().to_owned()), first_id);
}

#[test]
fn test_filter_fusion_keeps_labeled_paths() {
    let labeled_path = |config: &EngineConfig| -> (usize, Path) {
        let mut traversal = TraversalBuilder::from_config(config)
            .inject([Value::Int(1), Value::Int(2)])
            .filter(small)
            .as_("a")
            .filter(|v| v.as_int().is_some_and(|i| i > 1))
            .as_("b")
            .build();
        let traverser = traversal.next_traverser().expect("pull");
        (traversal.len(), traverser.path().cloned().expect("labeled path"))
    };

    let (fused_len, fused) = labeled_path(&EngineConfig::new());
    let unfused_config = EngineConfig::new().with_disabled_strategy(FilterFusionStrategy::NAME);
    let (unfused_len, unfused) = labeled_path(&unfused_config);

    assert_eq!((fused_len, unfused_len), (2, 3));
    assert_eq!(fused, unfused);
    assert_eq!(fused.objects(), &[Value::Int(2)][..]);
    assert_eq!(fused.get("a"), Some(&Value::Int(2)));
    assert_eq!(fused.get("b"), Some(&Value::Int(2)));
}

#[test]
fn test_disabled_strategy_is_skipped() {
    let config = EngineConfig::new().with_disabled_strategy(FilterFusionStrategy::NAME);
    let mut traversal = TraversalBuilder::from_config(&config)
        .inject((1..=10).map(Value::Int))
        .filter(even)
        .filter(small)
        .build();

    assert_eq!(traversal.next_n(10).expect("pull"), [2, 4, 6].map(Value::Int).to_vec());
    assert_eq!(traversal.len(), 3);
    assert!(traversal.strategies().contains(IdentityRemovalStrategy::NAME));
}

#[test]
fn test_contradictory_ordering_is_rejected() {
    struct Early;
    impl TraversalStrategy for Early {
        fn name(&self) -> &'static str {
            "Early"
        }
        fn category(&self) -> StrategyCategory {
            StrategyCategory::Decoration
        }
        fn apply(&self, _traversal: &mut Traversal) -> TraversalResult<()> {
            Ok(())
        }
        fn prior(&self) -> &[&'static str] {
            &[IdentityRemovalStrategy::NAME]
        }
    }

    let mut strategies = TraversalStrategies::standard();
    strategies.add(Arc::new(Early));
    let mut traversal = Traversal::with_strategies(strategies);
    traversal.add_step_last(Box::new(StartStep::inject([Value::Int(1)]))).expect("add");

    let error = traversal.apply_strategies().expect_err("order");
    assert!(matches!(error, TraversalError::StrategyOrder(_)));
    assert!(!traversal.is_locked());
}

#[test]
fn test_step_editing_before_lock() {
    let mut traversal = Traversal::new();
    traversal.add_step_last(Box::new(StartStep::inject([Value::Int(5)]))).expect("add");
    let double = |v: &Value| -> TraversalResult<Value> { Ok(v.scale(2)?) };
    traversal.add_step_last(Box::new(MapStep::new(Arc::new(double)))).expect("add");
    traversal.add_step(1, Box::new(IdentityStep::new())).expect("insert");

    let ids: Vec<&str> = traversal.steps().map(Step::id).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(traversal.index_of(ids[1]), Some(1));
    assert!(traversal.previous_step(1).is_some_and(|s| s.is::<StartStep>()));
    assert!(traversal.next_step(1).is_some_and(|s| s.is::<MapStep>()));
    assert!(traversal.previous_step(0).is_none());
    assert!(traversal.add_step(7, Box::new(IdentityStep::new())).is_err());

    assert_eq!(traversal.next().expect("pull"), Value::Int(10));
}
