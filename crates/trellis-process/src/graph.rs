//! Graph source trait for traversal execution.
//!
//! This module provides the [`Graph`] trait that abstracts the data source a
//! traversal reads from. The engine only ever invokes a graph; it never
//! mutates graph data itself. The trait is object-safe so a graph can be
//! stored on a traversal as `Arc<dyn Graph>`.

use std::fmt;

use trellis_core::Value;

/// Direction of adjacency when expanding from a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Follow outgoing edges.
    Out,
    /// Follow incoming edges.
    In,
    /// Follow edges in either direction.
    Both,
}

impl Direction {
    /// Returns the name used for this direction in bytecode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Graph access error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// No graph is bound to the traversal.
    #[error("no graph bound to traversal")]
    NoGraph,
    /// The referenced vertex does not exist.
    #[error("vertex not found: {0}")]
    VertexNotFound(String),
    /// An internal error occurred in the graph implementation.
    #[error("graph error: {0}")]
    Internal(String),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// A read-only data source that traversal steps query.
///
/// Vertices are represented as [`Value`]s (typically an id or a map of
/// properties); what they mean is up to the implementation.
pub trait Graph: Send + Sync {
    /// Returns a short name identifying this graph, used in logs.
    fn name(&self) -> &str;

    /// Returns every vertex in the graph.
    fn vertices(&self) -> GraphResult<Vec<Value>>;

    /// Returns the vertices adjacent to `vertex` in the given direction,
    /// optionally restricted to edges with the given label.
    fn adjacent(
        &self,
        vertex: &Value,
        direction: Direction,
        label: Option<&str>,
    ) -> GraphResult<Vec<Value>>;
}

impl fmt::Debug for dyn Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph").field("name", &self.name()).finish_non_exhaustive()
    }
}
