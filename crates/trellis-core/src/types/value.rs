//! Values carried by traversers.
//!
//! This module provides the [`Value`] enum, which represents everything a
//! traverser can hold as it moves through a pipeline.
//!
//! # Example
//!
//! ```
//! use trellis_core::Value;
//!
//! // Plain Rust values convert directly
//! let name: Value = "josh".into();
//! let age: Value = 32i64.into();
//! let weight: Value = 0.4f64.into();
//! let active: Value = true.into();
//!
//! // Typed accessors return `None` on a kind mismatch
//! assert_eq!(name.as_str(), Some("josh"));
//! assert_eq!(age.as_int(), Some(32));
//! assert_eq!(weight.as_float(), Some(0.4));
//! assert_eq!(active.as_bool(), Some(true));
//!
//! // Lists are built from any iterator of values
//! let list: Value = vec![Value::from(1i64), Value::from(2i64)].into();
//! assert_eq!(list.as_list().map(<[Value]>::len), Some(2));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A value flowing through a traversal.
///
/// # Supported Types
///
/// | Variant | Rust Type | Use Case |
/// |---------|-----------|----------|
/// | `Null` | - | Missing/optional values |
/// | `Bool` | `bool` | Boolean flags |
/// | `Int` | `i64` | Integers, counters, element ids |
/// | `Float` | `f64` | Numeric measurements |
/// | `String` | `String` | Text data, labels |
/// | `Bytes` | `Vec<u8>` | Opaque binary payloads |
/// | `List` | `Vec<Value>` | Aggregated collections |
/// | `Map` | `BTreeMap<String, Value>` | Grouped results, property maps |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value; the identity for [`Value::checked_add`].
    Null,
    /// A flag.
    Bool(bool),
    /// Integer, also used for element ids and counts.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
    /// Opaque bytes, never combined arithmetically.
    Bytes(Vec<u8>),
    /// Ordered list of values
    List(Vec<Value>),
    /// String-keyed map of values, ordered by key
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` if the value is null.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as a boolean if it is one.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer if it is one.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float if it is one.
    #[inline]
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is one.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a byte slice if it is one.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as a list slice if it is one.
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value as a map if it is one.
    #[inline]
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the name of this value's type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Returns the value as an `f64` if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Adds two values.
    ///
    /// Integers add with overflow checking, an integer and a float add as
    /// floats, strings concatenate, lists concatenate and maps are merged
    /// key-wise by adding the values of shared keys. `Null` is the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Incompatible`] for operands that do not combine and
    /// [`CoreError::Overflow`] when integer addition overflows.
    pub fn checked_add(&self, other: &Self) -> Result<Self, CoreError> {
        match (self, other) {
            (Self::Null, v) | (v, Self::Null) => Ok(v.clone()),
            (Self::Int(a), Self::Int(b)) => a
                .checked_add(*b)
                .map(Self::Int)
                .ok_or_else(|| CoreError::Overflow(format!("{a} + {b}"))),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                let a = self.as_number().unwrap_or_default();
                let b = other.as_number().unwrap_or_default();
                Ok(Self::Float(a + b))
            }
            (Self::String(a), Self::String(b)) => Ok(Self::String(format!("{a}{b}"))),
            (Self::List(a), Self::List(b)) => {
                Ok(Self::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Self::Map(a), Self::Map(b)) => {
                let mut merged = a.clone();
                for (key, value) in b {
                    let combined = match merged.get(key) {
                        Some(existing) => existing.checked_add(value)?,
                        None => value.clone(),
                    };
                    merged.insert(key.clone(), combined);
                }
                Ok(Self::Map(merged))
            }
            _ => Err(CoreError::incompatible("add", self.type_name(), other.type_name(), other)),
        }
    }

    /// Multiplies a numeric value by a non-negative factor.
    ///
    /// Used to fold a bulked traverser into a sum without repeating the
    /// addition `factor` times.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotNumeric`] for non-numeric values and
    /// [`CoreError::Overflow`] when the product does not fit.
    #[allow(clippy::cast_precision_loss)]
    pub fn scale(&self, factor: u64) -> Result<Self, CoreError> {
        match self {
            Self::Null => Ok(Self::Null),
            Self::Int(i) => i64::try_from(factor)
                .ok()
                .and_then(|f| i.checked_mul(f))
                .map(Self::Int)
                .ok_or_else(|| CoreError::Overflow(format!("{i} * {factor}"))),
            Self::Float(f) => Ok(Self::Float(f * factor as f64)),
            other => Err(CoreError::not_numeric(other.type_name(), other)),
        }
    }

    /// Compares two values of the same kind.
    ///
    /// Numbers compare across `Int`/`Float`; strings, booleans and bytes
    /// compare naturally. Returns `None` for values that have no ordering
    /// relative to each other.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_number()?.partial_cmp(&other.as_number()?)
            }
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    #[inline]
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    #[inline]
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    #[inline]
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    #[inline]
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}
