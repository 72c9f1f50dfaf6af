//! Integration tests for steps that read a bound graph.

use std::sync::Arc;

use trellis_process::graph::GraphResult;
use trellis_process::{Direction, Graph, GraphError, TraversalBuilder, TraversalError, Value};

/// A small adjacency-list graph keyed by integer ids.
struct EdgeList {
    edges: Vec<(i64, &'static str, i64)>,
}

impl EdgeList {
    fn modern() -> Self {
        Self {
            edges: vec![
                (1, "knows", 2),
                (1, "knows", 4),
                (1, "created", 3),
                (4, "created", 5),
                (4, "created", 3),
                (6, "created", 3),
            ],
        }
    }
}

impl Graph for EdgeList {
    fn name(&self) -> &str {
        "edge-list"
    }

    fn vertices(&self) -> GraphResult<Vec<Value>> {
        Ok((1..=6).map(Value::Int).collect())
    }

    fn adjacent(
        &self,
        vertex: &Value,
        direction: Direction,
        label: Option<&str>,
    ) -> GraphResult<Vec<Value>> {
        let id = vertex.as_int().ok_or_else(|| GraphError::VertexNotFound(vertex.to_string()))?;
        let mut adjacent = Vec::new();
        for (from, edge, to) in &self.edges {
            if label.is_some_and(|l| l != *edge) {
                continue;
            }
            if *from == id && direction != Direction::In {
                adjacent.push(Value::Int(*to));
            }
            if *to == id && direction != Direction::Out {
                adjacent.push(Value::Int(*from));
            }
        }
        Ok(adjacent)
    }
}

fn ids(values: &[Value]) -> Vec<i64> {
    let mut ids: Vec<i64> = values.iter().filter_map(Value::as_int).collect();
    ids.sort_unstable();
    ids
}

#[test]
fn test_vertices_then_out() {
    let mut traversal = TraversalBuilder::new()
        .with_graph(Arc::new(EdgeList::modern()))
        .vertices()
        .out(Some("created"))
        .build();

    let values = traversal.next_n(100).expect("values");
    assert_eq!(ids(&values), vec![3, 3, 3, 5]);
}

#[test]
fn test_in_and_both() {
    let graph: Arc<dyn Graph> = Arc::new(EdgeList::modern());
    let mut into = TraversalBuilder::new()
        .with_graph(Arc::clone(&graph))
        .inject([Value::Int(3)])
        .in_(None)
        .build();
    assert_eq!(ids(&into.next_n(10).expect("in")), vec![1, 4, 6]);

    let mut both = TraversalBuilder::new()
        .with_graph(graph)
        .inject([Value::Int(4)])
        .both(None)
        .build();
    assert_eq!(ids(&both.next_n(10).expect("both")), vec![1, 3, 5]);
}

#[test]
fn test_path_through_graph() {
    let mut traversal = TraversalBuilder::new()
        .with_graph(Arc::new(EdgeList::modern()))
        .inject([Value::Int(1)])
        .as_("a")
        .out(Some("knows"))
        .out(Some("created"))
        .as_("b")
        .build();

    let mut pairs = Vec::new();
    while let Some(traverser) = traversal.try_next_traverser().expect("pull") {
        let path = traverser.path().expect("labeled path");
        pairs.push((path.get("a").cloned(), path.get("b").cloned()));
    }
    assert_eq!(
        pairs,
        vec![
            (Some(Value::Int(1)), Some(Value::Int(5))),
            (Some(Value::Int(1)), Some(Value::Int(3))),
        ]
    );
}

#[test]
fn test_nested_traversal_sees_graph() {
    let child = TraversalBuilder::anonymous().out(Some("knows")).build();
    let mut traversal = TraversalBuilder::new()
        .inject([Value::Int(1)])
        .local(child)
        .with_graph(Arc::new(EdgeList::modern()))
        .build();

    assert_eq!(ids(&traversal.next_n(10).expect("values")), vec![2, 4]);
}

#[test]
fn test_missing_graph_is_an_error() {
    let mut traversal = TraversalBuilder::new().vertices().build();

    let error = traversal.next().expect_err("no graph");
    assert!(matches!(error, TraversalError::Graph(GraphError::NoGraph)));
}

#[test]
fn test_graph_errors_propagate() {
    let mut traversal = TraversalBuilder::new()
        .with_graph(Arc::new(EdgeList::modern()))
        .inject([Value::from("nope")])
        .out(None)
        .build();

    let error = traversal.next().expect_err("unknown vertex");
    assert!(matches!(error, TraversalError::Graph(GraphError::VertexNotFound(_))));
}
