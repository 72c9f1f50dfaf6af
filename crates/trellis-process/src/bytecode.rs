//! Serializable description of how a traversal was constructed.
//!
//! [`Bytecode`] is a record of construction calls, split into source
//! instructions (configuration such as strategies or side effects) and step
//! instructions (the pipeline). The engine never executes bytecode; it is
//! carried for cloning and shipped to a [`RemoteConnection`] when evaluation
//! is delegated.
//!
//! [`RemoteConnection`]: crate::remote::RemoteConnection

use std::fmt;

use serde::{Deserialize, Serialize};
use trellis_core::Value;

use crate::error::{TraversalError, TraversalResult};

/// A single construction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    operator: String,
    arguments: Vec<Value>,
}

impl Instruction {
    /// Creates an instruction.
    #[must_use]
    pub fn new(operator: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self { operator: operator.into(), arguments }
    }

    /// Returns the operator name.
    #[must_use]
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Returns the arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operator)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// The ordered construction calls of a traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    source_instructions: Vec<Instruction>,
    step_instructions: Vec<Instruction>,
}

impl Bytecode {
    /// Creates empty bytecode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a source instruction.
    pub fn add_source(&mut self, operator: impl Into<String>, arguments: Vec<Value>) {
        self.source_instructions.push(Instruction::new(operator, arguments));
    }

    /// Records a step instruction.
    pub fn add_step(&mut self, operator: impl Into<String>, arguments: Vec<Value>) {
        self.step_instructions.push(Instruction::new(operator, arguments));
    }

    /// Returns the source instructions.
    #[must_use]
    pub fn source_instructions(&self) -> &[Instruction] {
        &self.source_instructions
    }

    /// Returns the step instructions.
    #[must_use]
    pub fn step_instructions(&self) -> &[Instruction] {
        &self.step_instructions
    }

    /// Returns true if no instructions were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_instructions.is_empty() && self.step_instructions.is_empty()
    }

    /// Encodes the bytecode as JSON for transport.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Encoding`] if serialization fails.
    pub fn to_json(&self) -> TraversalResult<String> {
        serde_json::to_string(self).map_err(|e| TraversalError::Encoding(e.to_string()))
    }

    /// Decodes bytecode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Encoding`] if the input is not valid bytecode.
    pub fn from_json(json: &str) -> TraversalResult<Self> {
        serde_json::from_str(json).map_err(|e| TraversalError::Encoding(e.to_string()))
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |f: &mut fmt::Formatter<'_>, instructions: &[Instruction]| -> fmt::Result {
            f.write_str("[")?;
            for (i, instruction) in instructions.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{instruction}")?;
            }
            f.write_str("]")
        };
        f.write_str("[")?;
        render(f, &self.source_instructions)?;
        f.write_str(", ")?;
        render(f, &self.step_instructions)?;
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bytecode {
        let mut bytecode = Bytecode::new();
        bytecode.add_source("withSideEffect", vec!["a".into()]);
        bytecode.add_step("inject", vec![1i64.into(), 2i64.into()]);
        bytecode.add_step("out", vec!["knows".into()]);
        bytecode
    }

    #[test]
    fn records_instructions_in_order() {
        let bytecode = sample();
        assert_eq!(bytecode.source_instructions().len(), 1);
        let ops: Vec<_> = bytecode.step_instructions().iter().map(Instruction::operator).collect();
        assert_eq!(ops, ["inject", "out"]);
        assert!(!bytecode.is_empty());
        assert!(Bytecode::new().is_empty());
    }

    #[test]
    fn display_lists_both_sections() {
        assert_eq!(sample().to_string(), "[[withSideEffect(a)], [inject(1, 2), out(knows)]]");
    }

    #[test]
    fn json_transport() {
        let bytecode = sample();
        let json = bytecode.to_json().unwrap();
        assert_eq!(Bytecode::from_json(&json).unwrap(), bytecode);
        assert!(matches!(Bytecode::from_json("{"), Err(TraversalError::Encoding(_))));
    }
}
