//! `Trellis` Core
//!
//! This crate provides the value types that flow through a `trellis`
//! traversal pipeline.
//!
//! # Overview
//!
//! - **Values**: [`Value`] enum supporting scalars, strings, bytes, lists and maps
//! - **Errors**: [`CoreError`] for value-level failures such as incompatible operands
//!
//! # Example
//!
//! ```
//! use trellis_core::Value;
//!
//! let name: Value = "marko".into();
//! let age: Value = 29i64.into();
//!
//! assert_eq!(name.as_str(), Some("marko"));
//! assert_eq!(age.as_int(), Some(29));
//! assert_eq!(age.checked_add(&Value::Int(1)).unwrap(), Value::Int(30));
//! ```
//!
//! # Modules
//!
//! - [`types`] - Core data types ([`Value`])
//! - [`error`] - Error types ([`CoreError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::Value;
