// This module pins down the SysV x86-64 calling convention facts the
// allocator relies on: the integer and float argument register orders, the
// callee-saved set, and the pools of registers the allocator may hand out.
// rax and rdx are reserved as scratch/division registers, rbx as a second
// scratch, rbp as the frame pointer and rsp as the stack pointer; none of
// them are allocatable. Pools list caller-saved registers first so
// callee-saved ones (which cost a push/pop in the prologue) are only touched
// under pressure, and the order is fixed so allocation is reproducible.

//! SysV x86-64 calling convention data.

use crate::x64::reg::{GpReg, XmmReg};

/// Integer/pointer argument registers, in ABI order.
pub const GP_ARGUMENT_REGS: [GpReg; 6] = [
    GpReg::Rdi,
    GpReg::Rsi,
    GpReg::Rdx,
    GpReg::Rcx,
    GpReg::R8,
    GpReg::R9,
];

/// Float argument registers, in ABI order.
pub const XMM_ARGUMENT_REGS: [XmmReg; 8] = [
    XmmReg::Xmm0,
    XmmReg::Xmm1,
    XmmReg::Xmm2,
    XmmReg::Xmm3,
    XmmReg::Xmm4,
    XmmReg::Xmm5,
    XmmReg::Xmm6,
    XmmReg::Xmm7,
];

/// Registers a callee must preserve (rsp aside).
pub const GP_CALLEE_SAVED: [GpReg; 6] = [
    GpReg::Rbx,
    GpReg::Rbp,
    GpReg::R12,
    GpReg::R13,
    GpReg::R14,
    GpReg::R15,
];

/// Incoming stack arguments start past the saved rbp and the return
/// address.
pub const ARGUMENT_AREA_BASE: i32 = 16;

pub fn is_callee_saved(reg: GpReg) -> bool {
    GP_CALLEE_SAVED.contains(&reg)
}

/// GP registers the allocator may hand out, caller-saved first, minus
/// the reserved scratch set and this function's own argument registers.
pub fn available_gp_registers(used_args: &[GpReg]) -> Vec<GpReg> {
    const POOL: [GpReg; 11] = [
        GpReg::Rcx,
        GpReg::Rsi,
        GpReg::Rdi,
        GpReg::R8,
        GpReg::R9,
        GpReg::R10,
        GpReg::R11,
        GpReg::R12,
        GpReg::R13,
        GpReg::R14,
        GpReg::R15,
    ];
    POOL.iter()
        .copied()
        .filter(|r| !used_args.contains(r))
        .collect()
}

/// XMM registers the allocator may hand out. xmm0 is the float return
/// register and xmm8 the float scratch; both stay reserved.
pub fn available_xmm_registers(used_args: &[XmmReg]) -> Vec<XmmReg> {
    const POOL: [XmmReg; 14] = [
        XmmReg::Xmm1,
        XmmReg::Xmm2,
        XmmReg::Xmm3,
        XmmReg::Xmm4,
        XmmReg::Xmm5,
        XmmReg::Xmm6,
        XmmReg::Xmm7,
        XmmReg::Xmm9,
        XmmReg::Xmm10,
        XmmReg::Xmm11,
        XmmReg::Xmm12,
        XmmReg::Xmm13,
        XmmReg::Xmm14,
        XmmReg::Xmm15,
    ];
    POOL.iter()
        .copied()
        .filter(|r| !used_args.contains(r))
        .collect()
}
