// This module groups the x86-64 target layer: register and operand
// definitions, the SysV calling convention data, frame slot management, the
// argument classifiers, the register pool, the linear-scan allocator, its
// immutable result and the emitter boundary.

//! x86-64 registers, calling convention and register allocation.

pub mod allocation;
pub mod args;
pub mod call_convention;
pub mod emit;
pub mod frame;
pub mod pool;
pub mod reg;
pub mod regalloc;

pub use allocation::RegisterAllocation;
pub use emit::{Emitter, TextEmitter};
pub use reg::{GpReg, Operand, XmmReg};
pub use regalloc::LinearScan;
