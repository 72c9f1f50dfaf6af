//! Core data types for `trellis`.
//!
//! This module defines the values carried by traversers as they flow through
//! a traversal pipeline.

mod value;

pub use value::Value;
