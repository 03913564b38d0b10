// This module owns the operand supply of the linear scan: the two register
// free lists and the stack frame. The pool is primed per function, with the
// reserved scratch registers and this function's own argument registers
// removed up front. Register picks scan the free list in its fixed order,
// skipping any register the caller excludes (used for registers pinned to
// simultaneously-live call arguments); a callee-saved register is recorded
// the first time it is handed out so the prologue knows what to preserve.
// When a bank runs dry the pool falls back to a frame slot, so allocation
// itself can never fail. Released registers return to the front of their
// list and released slots to the frame's free list.

//! Register and slot supply for the allocator.

use std::collections::VecDeque;

use log::trace;

use crate::ir::module::FunctionData;
use crate::ir::types::Type;
use crate::x64::args::callee_arguments;
use crate::x64::call_convention::{available_gp_registers, available_xmm_registers, is_callee_saved};
use crate::x64::frame::StackFrame;
use crate::x64::reg::{GpReg, Operand, XmmReg};

pub struct VirtualRegisterPool {
    frame: StackFrame,
    gp_free: VecDeque<GpReg>,
    xmm_free: VecDeque<XmmReg>,
    used_callee_saved: Vec<GpReg>,
    argument_operands: Vec<Operand>,
}

impl VirtualRegisterPool {
    /// Primes the pool for one function: argument locations are fixed
    /// by the convention and their registers leave the free lists.
    pub fn for_function(func: &FunctionData) -> VirtualRegisterPool {
        let param_types: Vec<Type> = func.args().iter().map(|a| a.ty.clone()).collect();
        let argument_operands = callee_arguments(&param_types);

        let used_gp: Vec<GpReg> = argument_operands
            .iter()
            .filter_map(|op| match op {
                Operand::Gp(r) => Some(*r),
                _ => None,
            })
            .collect();
        let used_xmm: Vec<XmmReg> = argument_operands
            .iter()
            .filter_map(|op| match op {
                Operand::Xmm(r) => Some(*r),
                _ => None,
            })
            .collect();

        VirtualRegisterPool {
            frame: StackFrame::new(),
            gp_free: available_gp_registers(&used_gp).into(),
            xmm_free: available_xmm_registers(&used_xmm).into(),
            used_callee_saved: Vec::new(),
            argument_operands,
        }
    }

    /// The ABI location of the function's i-th parameter.
    pub fn argument_operand(&self, index: usize) -> Operand {
        self.argument_operands[index]
    }

    /// An operand for a value of `ty`: a register of the matching bank
    /// if one is free and not excluded, otherwise a frame slot. Pinned
    /// slots (for `alloc` storage) bypass the registers entirely.
    pub fn allocate(
        &mut self,
        ty: &Type,
        pinned_slot: bool,
        exclude: impl Fn(Operand) -> bool,
    ) -> Operand {
        if pinned_slot {
            return Operand::Slot {
                offset: self.frame.take_pinned_slot(ty.size_of()),
            };
        }
        if ty.is_float() {
            if let Some(r) = take_first(&mut self.xmm_free, |&r| !exclude(Operand::Xmm(r))) {
                trace!("allocated {r}");
                return Operand::Xmm(r);
            }
        } else if let Some(r) = take_first(&mut self.gp_free, |&r| !exclude(Operand::Gp(r))) {
            if is_callee_saved(r) && !self.used_callee_saved.contains(&r) {
                self.used_callee_saved.push(r);
            }
            trace!("allocated {r}");
            return Operand::Gp(r);
        }
        let offset = self.frame.take_slot(ty.size_of());
        trace!("spilled to rbp{offset}");
        Operand::Slot { offset }
    }

    /// Returns an expired binding to the pool. Argument slots stay
    /// where the convention put them.
    pub fn release(&mut self, op: Operand, size: usize) {
        match op {
            Operand::Gp(r) => self.gp_free.push_front(r),
            Operand::Xmm(r) => self.xmm_free.push_front(r),
            Operand::Slot { offset } => self.frame.return_slot(offset, size),
            Operand::ArgSlot { .. } => {}
        }
    }

    pub fn spilled_size(&self) -> u32 {
        self.frame.size()
    }

    pub fn used_callee_saved(&self) -> &[GpReg] {
        &self.used_callee_saved
    }
}

fn take_first<T: Copy>(deque: &mut VecDeque<T>, pred: impl Fn(&T) -> bool) -> Option<T> {
    let pos = deque.iter().position(pred)?;
    deque.remove(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ModuleBuilder;
    use crate::ir::inst::BinaryOp;
    use crate::ir::value::{IntKind, Value};

    fn two_arg_function() -> FunctionData {
        let mut mb = ModuleBuilder::new();
        let mut b = mb
            .create_function(
                "f",
                vec![
                    ("a".to_string(), Type::I64),
                    ("x".to_string(), Type::F64),
                ],
                Type::I64,
            )
            .unwrap();
        b.switch_to("entry").unwrap();
        let a = b.use_value("a").unwrap();
        let c = b
            .binary("c", BinaryOp::Add, Type::I64, a, Value::int(IntKind::I64, 1))
            .unwrap();
        b.ret(Some(c)).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn argument_registers_leave_the_pool() {
        let func = two_arg_function();
        let mut pool = VirtualRegisterPool::for_function(&func);
        assert_eq!(pool.argument_operand(0), Operand::Gp(GpReg::Rdi));
        assert_eq!(pool.argument_operand(1), Operand::Xmm(XmmReg::Xmm0));
        // rdi is taken; repeated allocation never yields it.
        for _ in 0..16 {
            let op = pool.allocate(&Type::I64, false, |_| false);
            assert_ne!(op, Operand::Gp(GpReg::Rdi));
        }
    }

    #[test]
    fn exhausted_bank_falls_back_to_slots() {
        let func = two_arg_function();
        let mut pool = VirtualRegisterPool::for_function(&func);
        let mut slots = 0;
        for _ in 0..16 {
            if let Operand::Slot { .. } = pool.allocate(&Type::I64, false, |_| false) {
                slots += 1;
            }
        }
        assert!(slots > 0);
        assert!(pool.spilled_size() > 0);
    }

    #[test]
    fn callee_saved_usage_is_tracked() {
        let func = two_arg_function();
        let mut pool = VirtualRegisterPool::for_function(&func);
        while pool
            .allocate(&Type::I64, false, |_| false)
            .is_register()
        {}
        assert!(pool.used_callee_saved().contains(&GpReg::R12));
    }
}
