// This module defines error types for the sira compiler using the thiserror crate for
// idiomatic Rust error handling. CompileError is the main error enum covering the
// user-facing failure scenarios: malformed IR text, undefined or redefined values and
// labels, type mismatches, unresolved callees and structural CFG problems found while
// building a function. Each variant carries the names and context needed to produce a
// readable diagnostic; the parser wraps builder errors with a source position via the
// At variant. Internal invariant violations (orphan uses, missing allocations) are
// deliberately not represented here: those are bugs and panic with context instead of
// flowing through Result. The module also provides CompileResult<T> as a convenience
// alias for Result<T, CompileError>.

//! Error types for the sira compiler.

use thiserror::Error;

use crate::ir::types::Type;

/// Main error type for IR construction and parsing.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("syntax error: expected {expected}, found {found}")]
    Syntax { expected: String, found: String },

    #[error("undefined value: %{name}")]
    UndefinedValue { name: String },

    #[error("value redefined: %{name}")]
    DuplicateValue { name: String },

    #[error("undefined label: ^{name}")]
    UndefinedLabel { name: String },

    #[error("label redefined: ^{name}")]
    DuplicateLabel { name: String },

    #[error("unresolved callee: @{name}")]
    UnresolvedCallee { name: String },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: Type,
        found: Type,
    },

    #[error("invalid operand in {context}: {reason}")]
    InvalidOperand { context: String, reason: String },

    #[error("instruction outside any block in @{function}")]
    InstructionOutsideBlock { function: String },

    #[error("block ^{block} has no terminator")]
    MissingTerminator { block: String },

    #[error("instruction after terminator in block ^{block}")]
    InstructionAfterTerminator { block: String },

    #[error("block ^{block} is unreachable from the entry block")]
    UnreachableBlock { block: String },

    #[error("function @{name} already defined")]
    DuplicateFunction { name: String },

    #[error("{line}:{col}: {source}")]
    At {
        line: u32,
        col: u32,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Attaches a source position. Used by the parser when a builder
    /// error maps back to a concrete token.
    pub fn at(self, line: u32, col: u32) -> CompileError {
        match self {
            // Keep the innermost position; it is the most precise one.
            CompileError::At { .. } => self,
            other => CompileError::At {
                line,
                col,
                source: Box::new(other),
            },
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
