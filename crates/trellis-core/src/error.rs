//! Value-level failures.

use std::fmt::Display;

use thiserror::Error;

/// Longest operand preview carried in an error, in bytes.
const PREVIEW_LIMIT: usize = 64;

/// Errors raised while combining or converting [`Value`](crate::Value)s.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Two operands of kinds that an operation cannot combine.
    #[error("cannot {operation} {left} with {right} ({preview})")]
    Incompatible {
        /// Name of the operation, e.g. `"add"`.
        operation: &'static str,
        /// Kind of the left operand.
        left: &'static str,
        /// Kind of the right operand.
        right: &'static str,
        /// Shortened rendering of the right operand.
        preview: String,
    },

    /// A numeric operation received a non-numeric operand.
    #[error("expected a number, found {kind} ({preview})")]
    NotNumeric {
        /// Kind of the operand.
        kind: &'static str,
        /// Shortened rendering of the operand.
        preview: String,
    },

    /// Integer arithmetic left the `i64` range.
    #[error("arithmetic overflow: {0}")]
    Overflow(String),
}

impl CoreError {
    /// Operands of kinds `left` and `right` cannot be combined by `operation`.
    #[must_use]
    pub fn incompatible(
        operation: &'static str,
        left: &'static str,
        right: &'static str,
        operand: impl Display,
    ) -> Self {
        Self::Incompatible { operation, left, right, preview: preview(operand) }
    }

    /// `operand`, of kind `kind`, is not a number.
    #[must_use]
    pub fn not_numeric(kind: &'static str, operand: impl Display) -> Self {
        Self::NotNumeric { kind, preview: preview(operand) }
    }
}

/// Renders `operand`, cut at a char boundary once it passes [`PREVIEW_LIMIT`].
fn preview(operand: impl Display) -> String {
    let mut text = operand.to_string();
    if text.len() > PREVIEW_LIMIT {
        let mut cut = PREVIEW_LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}
