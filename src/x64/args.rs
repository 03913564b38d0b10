// This module classifies argument lists against the SysV convention, for
// both sides of a call. The walk is the same either way: integers and
// pointers consume GP argument registers, floats consume XMM registers,
// and whatever overflows goes to 8-byte stack slots in order. The callee
// view addresses overflow slots above the frame header (rbp + 16 + 8*slot);
// the caller view addresses the outgoing overflow area it must reserve
// below rsp at the call (8*slot), and reports its total size.

//! Argument classification for the SysV convention.

use crate::ir::types::Type;
use crate::x64::call_convention::{ARGUMENT_AREA_BASE, GP_ARGUMENT_REGS, XMM_ARGUMENT_REGS};
use crate::x64::reg::Operand;

/// ABI locations of a function's own parameters.
pub fn callee_arguments(params: &[Type]) -> Vec<Operand> {
    classify(params, |slot| Operand::ArgSlot {
        offset: ARGUMENT_AREA_BASE + 8 * slot,
    })
}

/// ABI locations of a call's arguments from the caller's side, plus the
/// outgoing overflow area size in bytes.
pub fn caller_arguments(params: &[Type]) -> (Vec<Operand>, u32) {
    let operands = classify(params, |slot| Operand::ArgSlot { offset: 8 * slot });
    let overflow = operands
        .iter()
        .filter(|op| matches!(op, Operand::ArgSlot { .. }))
        .count() as u32
        * 8;
    (operands, overflow)
}

fn classify(params: &[Type], mem_slot: impl Fn(i32) -> Operand) -> Vec<Operand> {
    let mut gp = 0usize;
    let mut xmm = 0usize;
    let mut mem = 0i32;
    let mut out = Vec::with_capacity(params.len());
    for ty in params {
        let op = if ty.is_float() {
            if xmm < XMM_ARGUMENT_REGS.len() {
                xmm += 1;
                Operand::Xmm(XMM_ARGUMENT_REGS[xmm - 1])
            } else {
                mem += 1;
                mem_slot(mem - 1)
            }
        } else {
            // Integers, pointers and flags all travel in GP registers.
            if gp < GP_ARGUMENT_REGS.len() {
                gp += 1;
                Operand::Gp(GP_ARGUMENT_REGS[gp - 1])
            } else {
                mem += 1;
                mem_slot(mem - 1)
            }
        };
        out.push(op);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::reg::{GpReg, XmmReg};

    #[test]
    fn eight_int_args_split_registers_and_stack() {
        let params = vec![Type::I64; 8];
        let ops = callee_arguments(&params);
        assert_eq!(ops[0], Operand::Gp(GpReg::Rdi));
        assert_eq!(ops[1], Operand::Gp(GpReg::Rsi));
        assert_eq!(ops[2], Operand::Gp(GpReg::Rdx));
        assert_eq!(ops[3], Operand::Gp(GpReg::Rcx));
        assert_eq!(ops[4], Operand::Gp(GpReg::R8));
        assert_eq!(ops[5], Operand::Gp(GpReg::R9));
        assert_eq!(ops[6], Operand::ArgSlot { offset: 16 });
        assert_eq!(ops[7], Operand::ArgSlot { offset: 24 });
    }

    #[test]
    fn floats_use_their_own_register_file() {
        let params = vec![Type::F64, Type::I64, Type::F32];
        let ops = callee_arguments(&params);
        assert_eq!(ops[0], Operand::Xmm(XmmReg::Xmm0));
        assert_eq!(ops[1], Operand::Gp(GpReg::Rdi));
        assert_eq!(ops[2], Operand::Xmm(XmmReg::Xmm1));
    }

    #[test]
    fn caller_overflow_area_is_counted() {
        let params = vec![Type::I64; 8];
        let (ops, overflow) = caller_arguments(&params);
        assert_eq!(ops[6], Operand::ArgSlot { offset: 0 });
        assert_eq!(ops[7], Operand::ArgSlot { offset: 8 });
        assert_eq!(overflow, 16);
    }
}
