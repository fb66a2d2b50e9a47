// This module defines error types for the minicc back end using the thiserror crate for
// idiomatic Rust error handling. CompileError is the main error enum covering the
// unrecoverable contract violations of the pipeline: a value missing from the offset
// map when a memory location is required, a memory access against a cell that was
// never planned a frame slot, a conditional branch whose condition is not a
// comparison, and malformed instruction shapes handed over by the front end. Each
// variant carries relevant context for debugging. The module also provides
// CompileResult<T> as a convenience type alias. There is no retry model anywhere:
// every stage either succeeds and hands its output forward, or compilation of the
// function fails with one of these errors.

//! Error types for the minicc back end.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use crate::ir::Opcode;

/// Main error type for back-end compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("value {value} has no stack slot but a memory location is required")]
    MissingStackSlot { value: String },

    #[error("memory cell %{cell} accessed before it was given a frame slot")]
    UnplannedCell { cell: u32 },

    #[error("{opcode:?} memory operand is not a stack cell")]
    InvalidCell { opcode: Opcode },

    #[error("conditional branch condition {value} is not a comparison")]
    InvalidCondition { value: String },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
