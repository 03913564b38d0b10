// This module defines the immutable result of register allocation: the
// value-to-operand map, the spill area size the prologue must reserve, the
// callee-saved registers the pool touched, and the outgoing overflow area
// size per call site. Looking up a value the allocator never bound is an
// internal error and panics with context; by construction every allocatable
// local of a built function is bound.

//! The allocator's output.

use std::fmt;

use hashbrown::HashMap;

use crate::ir::module::FunctionData;
use crate::ir::value::{InstId, LocalValue};
use crate::x64::reg::{GpReg, Operand};

#[derive(Debug)]
pub struct RegisterAllocation {
    map: HashMap<LocalValue, Operand>,
    spilled_area_size: u32,
    callee_saved: Vec<GpReg>,
    call_overflow: HashMap<InstId, u32>,
}

impl RegisterAllocation {
    pub(crate) fn new(
        map: HashMap<LocalValue, Operand>,
        spilled_area_size: u32,
        callee_saved: Vec<GpReg>,
        call_overflow: HashMap<InstId, u32>,
    ) -> RegisterAllocation {
        RegisterAllocation {
            map,
            spilled_area_size,
            callee_saved,
            call_overflow,
        }
    }

    /// Where `value` lives. Panics for values the allocator never
    /// bound; that is a bug, not an input error.
    pub fn operand(&self, value: LocalValue) -> Operand {
        match self.map.get(&value) {
            Some(&op) => op,
            None => panic!("no operand bound for {value}"),
        }
    }

    pub fn try_operand(&self, value: LocalValue) -> Option<Operand> {
        self.map.get(&value).copied()
    }

    /// Spill area in bytes, already 8-aligned.
    pub fn spilled_area_size(&self) -> u32 {
        self.spilled_area_size
    }

    /// Callee-saved registers the prologue must push.
    pub fn callee_save_registers(&self) -> &[GpReg] {
        &self.callee_saved
    }

    /// Outgoing stack argument area of a call, in bytes.
    pub fn call_overflow_area(&self, call: InstId) -> u32 {
        self.call_overflow.get(&call).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalValue, Operand)> + '_ {
        self.map.iter().map(|(&v, &op)| (v, op))
    }

    /// Listing for `--dump alloc`, sorted for reproducibility.
    pub fn display<'a>(&'a self, func: &'a FunctionData) -> AllocationDisplay<'a> {
        AllocationDisplay { alloc: self, func }
    }
}

pub struct AllocationDisplay<'a> {
    alloc: &'a RegisterAllocation,
    func: &'a FunctionData,
}

impl fmt::Display for AllocationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocation of @{}:", self.func.name())?;
        let mut entries: Vec<(LocalValue, Operand)> = self.alloc.iter().collect();
        entries.sort_by_key(|(v, _)| *v);
        for (v, op) in entries {
            writeln!(f, "  %{} -> {op}", self.func.value_name(v))?;
        }
        writeln!(f, "  spill area: {} bytes", self.alloc.spilled_area_size())?;
        write!(f, "  callee saved:")?;
        for r in self.alloc.callee_save_registers() {
            write!(f, " {r}")?;
        }
        writeln!(f)
    }
}
