//! sira - Typed SSA IR and x86-64 register allocation.
//!
//! sira parses a small textual SSA IR into a CFG of basic blocks, runs
//! dominance and liveness analyses over it, folds the results into
//! congruence-grouped live intervals, and assigns every value a physical
//! register or stack slot with a linear scan against the SysV x86-64
//! calling convention. The crate stops at the operand-assignment
//! boundary: an [`x64::Emitter`] implementation turns a function and its
//! [`x64::RegisterAllocation`] into real output.
//!
//! # Primary Usage
//!
//! ```
//! use sira::parse::parse_module;
//!
//! let module = parse_module(
//!     "fn sum(i64 %a, i64 %b): i64 {\n\
//!      entry:\n\
//!        %c = add i64 %a, %b\n\
//!        ret i64 %c\n\
//!      }",
//! )
//! .unwrap();
//! let func = module.find_function("sum").unwrap();
//! let alloc = func.register_allocation();
//! for arg in func.args() {
//!     let _where = alloc.operand(sira::ir::LocalValue::Argument(arg.id));
//! }
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - types, values, instructions, blocks, builder
//! - [`parse`] - the IR text format
//! - [`analysis`] - dominance, liveness, live intervals
//! - [`x64`] - calling convention, register pool, linear scan
//! - [`error`] - the `CompileError` enum

pub mod analysis;
pub mod error;
pub mod ir;
pub mod parse;
pub mod x64;

pub use error::{CompileError, CompileResult};
pub use ir::{FunctionData, Module, ModuleBuilder};
pub use x64::{Emitter, LinearScan, RegisterAllocation, TextEmitter};
