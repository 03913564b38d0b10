// This module groups the IR data model: the type lattice, value identity,
// the closed instruction enum, basic blocks, the function/module containers
// and the builder that assembles them from source-order definitions. The
// re-exports below are the surface the parser, the analyses and the x64
// allocator program against.

//! The sira intermediate representation.

pub mod block;
pub mod builder;
pub mod inst;
pub mod module;
pub mod types;
pub mod value;

pub use block::{BasicBlock, BasicBlocks, BlockId};
pub use builder::{FunctionDataBuilder, ModuleBuilder, PhiOperand};
pub use inst::{BinaryOp, CastKind, Inst, IntPredicate};
pub use module::{ArgumentValue, FunctionData, FunctionPrototype, InstNode, Module};
pub use types::Type;
pub use value::{ArgId, Constant, FloatKind, InstId, IntKind, LocalValue, Value};
