//! Errors raised while building, compiling or interpreting a circuit.
//!
//! Every failure is fatal to the current build: nothing is retried and no
//! partial netlist is returned.

use thiserror::Error;

use crate::netlist::{GateId, Opcode};

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The netlist arena is full
    #[error("netlist capacity exceeded ({capacity} gates)")]
    CapacityExceeded { capacity: usize },

    /// A gate input refers to a gate that is not allocated yet
    #[error("invalid pin reference g{pin}: next free gate is g{next}")]
    InvalidPinReference { pin: GateId, next: GateId },

    /// The number of supplied inputs does not match the opcode
    #[error("{opcode:?} takes {expected} input(s), got {got}")]
    InvalidArity {
        opcode: Opcode,
        expected: usize,
        got: usize,
    },

    #[error("index {index} out of range for bus of width {width}")]
    IndexOutOfRange { index: usize, width: usize },

    #[error("bus slot {slot} is already bound")]
    AlreadyBound { slot: usize },

    /// An unbound placeholder was used where a concrete gate is required
    #[error("bus slot {slot} is unbound")]
    UnboundSlot { slot: usize },

    #[error("bus width mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("unexpected token sequence: {from} followed by {to}")]
    UnexpectedTokenSequence {
        from: &'static str,
        to: &'static str,
    },

    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    #[error("SELECT on a {selector}-bit selector needs {expected} branches, got {got}")]
    UnsupportedBranchCount {
        selector: usize,
        expected: usize,
        got: usize,
    },

    #[error("expected {expected}, found `{found}`")]
    ParseSyntaxError { expected: String, found: String },

    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("reading source: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The underlying error with any line context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    /// Source line the error was raised on, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub(crate) fn at_line(self, line: usize) -> Error {
        match self {
            located @ Error::AtLine { .. } => located,
            other => Error::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn syntax(expected: impl Into<String>, found: impl Into<String>) -> Error {
        Error::ParseSyntaxError {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
