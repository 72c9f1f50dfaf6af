//! `Trellis` Process
//!
//! A lazy, pull-based traversal engine. A [`Traversal`] is an ordered pipeline
//! of [`Step`]s that pass [`Traverser`]s downstream on demand; nothing runs
//! until a value is pulled.
//!
//! # Overview
//!
//! - **Construction**: [`TraversalBuilder`] appends steps and records [`Bytecode`]
//! - **Strategies**: [`TraversalStrategies`] rewrite the pipeline once, before
//!   the first pull, after which the traversal is locked
//! - **Traversers**: a generator chosen from step requirements decides whether
//!   traversers carry bulk, paths or side effects
//! - **Side effects**: [`SideEffects`] is a shared keyed store with merge operators
//! - **Async**: [`SharedTraversal`] schedules bodies on a worker and returns
//!   cancellable [`Promise`]s
//! - **Remote**: [`RemoteStrategy`](strategy::RemoteStrategy) ships bytecode to a
//!   [`RemoteConnection`] and streams detached traversers back
//!
//! # Example
//!
//! ```
//! use trellis_process::{TraversalBuilder, Value};
//!
//! let mut traversal = TraversalBuilder::new()
//!     .inject((1..=6).map(Value::Int))
//!     .filter(|v| v.as_int().is_some_and(|i| i % 2 == 0))
//!     .map(|v| v.scale(10).unwrap_or(Value::Null))
//!     .build();
//!
//! assert_eq!(traversal.next().unwrap(), Value::Int(20));
//! assert_eq!(traversal.next_n(5).unwrap(), vec![Value::Int(40), Value::Int(60)]);
//! assert!(traversal.next().unwrap_err().is_exhausted());
//! ```
//!
//! # Modules
//!
//! - [`traversal`] - The traversal, its builder and pull API
//! - [`step`] - Pipeline steps
//! - [`strategy`] - Pipeline rewriting
//! - [`traverser`] - Traversers, paths and generators
//! - [`promise`] - Asynchronous evaluation

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod bytecode;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod promise;
pub mod remote;
pub mod side_effects;
pub mod step;
pub mod strategy;
pub mod traversal;
pub mod traverser;

pub use bytecode::{Bytecode, Instruction};
pub use config::EngineConfig;
pub use context::{CancellationToken, StepContext};
pub use error::{TraversalError, TraversalResult};
pub use graph::{Direction, Graph, GraphError};
pub use promise::{DefaultWorker, Promise, SharedTraversal, Worker};
pub use remote::{RemoteConnection, RemoteResults};
pub use side_effects::{MergeOperator, SideEffects};
pub use step::Step;
pub use strategy::{TraversalStrategies, TraversalStrategy};
pub use traversal::{Traversal, TraversalBuilder};
pub use traverser::{DetachedTraverser, Path, Traverser, TraverserRequirement};
pub use trellis_core::Value;
