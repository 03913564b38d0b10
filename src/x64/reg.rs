// This module defines the physical register sets of x86-64 and the Operand
// type the allocator produces. GpReg and XmmReg are plain enums with SysV
// names; Operand is either a register of one of the two banks, a negative
// rbp-relative spill slot, or a positive rbp-relative argument slot (incoming
// stack argument or outgoing overflow slot at a call site).

//! x86-64 registers and allocator operands.

use std::fmt;

/// General purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpReg {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl GpReg {
    pub fn name(self) -> &'static str {
        match self {
            GpReg::Rax => "rax",
            GpReg::Rcx => "rcx",
            GpReg::Rdx => "rdx",
            GpReg::Rbx => "rbx",
            GpReg::Rsp => "rsp",
            GpReg::Rbp => "rbp",
            GpReg::Rsi => "rsi",
            GpReg::Rdi => "rdi",
            GpReg::R8 => "r8",
            GpReg::R9 => "r9",
            GpReg::R10 => "r10",
            GpReg::R11 => "r11",
            GpReg::R12 => "r12",
            GpReg::R13 => "r13",
            GpReg::R14 => "r14",
            GpReg::R15 => "r15",
        }
    }
}

impl fmt::Display for GpReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SSE registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum XmmReg {
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    Xmm10,
    Xmm11,
    Xmm12,
    Xmm13,
    Xmm14,
    Xmm15,
}

impl XmmReg {
    pub fn name(self) -> &'static str {
        match self {
            XmmReg::Xmm0 => "xmm0",
            XmmReg::Xmm1 => "xmm1",
            XmmReg::Xmm2 => "xmm2",
            XmmReg::Xmm3 => "xmm3",
            XmmReg::Xmm4 => "xmm4",
            XmmReg::Xmm5 => "xmm5",
            XmmReg::Xmm6 => "xmm6",
            XmmReg::Xmm7 => "xmm7",
            XmmReg::Xmm8 => "xmm8",
            XmmReg::Xmm9 => "xmm9",
            XmmReg::Xmm10 => "xmm10",
            XmmReg::Xmm11 => "xmm11",
            XmmReg::Xmm12 => "xmm12",
            XmmReg::Xmm13 => "xmm13",
            XmmReg::Xmm14 => "xmm14",
            XmmReg::Xmm15 => "xmm15",
        }
    }
}

impl fmt::Display for XmmReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a value lives for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Gp(GpReg),
    Xmm(XmmReg),
    /// Spill or `alloc` slot; negative offset from rbp.
    Slot { offset: i32 },
    /// Positive rbp-relative incoming argument slot, or an outgoing
    /// overflow slot below rsp at a call site.
    ArgSlot { offset: i32 },
}

impl Operand {
    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Gp(_) | Operand::Xmm(_))
    }

    pub fn is_memory(&self) -> bool {
        !self.is_register()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Gp(r) => write!(f, "{r}"),
            Operand::Xmm(r) => write!(f, "{r}"),
            Operand::Slot { offset } => write!(f, "[rbp{offset}]"),
            Operand::ArgSlot { offset } => write!(f, "[rbp+{offset}]"),
        }
    }
}
