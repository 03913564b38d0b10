// This module is the boundary to code emission. The crate stops at operand
// assignment; an Emitter implementation takes a function and its finished
// allocation and produces whatever output it wants, reading the prologue
// facts (spill area, callee-saved registers) and per-value operands from the
// allocation. TextEmitter is the implementation shipped here: a readable
// per-instruction listing with resolved operands, used by the driver. Real
// instruction encoding lives outside this crate.

//! Emitter boundary and the text listing emitter.

use std::fmt::Write;

use crate::ir::inst::Inst;
use crate::ir::module::FunctionData;
use crate::ir::value::{LocalValue, Value};
use crate::x64::allocation::RegisterAllocation;

/// Consumes a function and its allocation.
pub trait Emitter {
    type Output;

    fn emit(&mut self, func: &FunctionData, alloc: &RegisterAllocation) -> Self::Output;
}

/// Renders each instruction with the operands the allocator chose.
#[derive(Debug, Default)]
pub struct TextEmitter;

impl TextEmitter {
    fn operand_of(&self, func: &FunctionData, alloc: &RegisterAllocation, v: Value) -> String {
        match v.local() {
            Some(lv) => match alloc.try_operand(lv) {
                Some(op) => op.to_string(),
                // Flags and tuples carry no operand of their own.
                None => format!("%{}", func.value_name(lv)),
            },
            None => v_const(v),
        }
    }
}

fn v_const(v: Value) -> String {
    match v {
        Value::Constant(c) => format!("${c}"),
        _ => unreachable!("non-constant without a local identity"),
    }
}

impl Emitter for TextEmitter {
    type Output = String;

    fn emit(&mut self, func: &FunctionData, alloc: &RegisterAllocation) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "@{}:", func.name());
        let _ = writeln!(
            out,
            "  ; frame {} bytes, callee saved: {:?}",
            alloc.spilled_area_size(),
            alloc
                .callee_save_registers()
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>()
        );
        for (_, block) in func.blocks().iter() {
            let _ = writeln!(out, "{}:", block.name);
            for &inst_id in block.insts() {
                let node = func.inst(inst_id);
                let dst = if node.defines_value() {
                    match alloc.try_operand(LocalValue::Local(inst_id)) {
                        Some(op) => format!("{op} <- "),
                        None => String::new(),
                    }
                } else {
                    String::new()
                };
                let operands: Vec<String> = node
                    .inst
                    .operands()
                    .into_iter()
                    .map(|v| self.operand_of(func, alloc, v))
                    .collect();
                let mnemonic = match &node.inst {
                    Inst::Copy { .. } => "copy".to_string(),
                    Inst::Binary { op, .. } => op.mnemonic().to_string(),
                    Inst::IntCompare { pred, .. } => format!("icmp.{}", pred.mnemonic()),
                    Inst::Load { .. } => "load".to_string(),
                    Inst::Store { .. } => "store".to_string(),
                    Inst::Alloc { .. } => "alloc".to_string(),
                    Inst::Cast { kind, .. } => kind.mnemonic().to_string(),
                    Inst::Phi { .. } => "phi".to_string(),
                    Inst::Call { callee, .. } => format!("call @{}", callee.name),
                    Inst::DivRem { .. } => "divrem".to_string(),
                    Inst::Proj { index, .. } => format!("proj.{index}"),
                    Inst::Branch { target } => {
                        format!("jmp {}", func.blocks().get(*target).name)
                    }
                    Inst::BranchCond { targets, .. } => format!(
                        "jcc {}, {}",
                        func.blocks().get(targets[0]).name,
                        func.blocks().get(targets[1]).name
                    ),
                    Inst::Return { .. } => "ret".to_string(),
                };
                let _ = writeln!(out, "  {dst}{mnemonic} {}", operands.join(", "));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ModuleBuilder;
    use crate::ir::inst::BinaryOp;
    use crate::ir::types::Type;
    use crate::ir::value::{IntKind, Value};

    #[test]
    fn listing_shows_resolved_operands() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb
            .create_function(
                "sum",
                vec![
                    ("a".to_string(), Type::I64),
                    ("b".to_string(), Type::I64),
                ],
                Type::I64,
            )
            .unwrap();
        b.switch_to("entry").unwrap();
        let a = b.use_value("a").unwrap();
        let bb = b.use_value("b").unwrap();
        let c = b.binary("c", BinaryOp::Add, Type::I64, a, bb).unwrap();
        let d = b
            .binary("d", BinaryOp::Add, Type::I64, c, Value::int(IntKind::I64, 1))
            .unwrap();
        b.ret(Some(d)).unwrap();
        let func = b.build().unwrap();

        let listing = TextEmitter.emit(&func, func.register_allocation());
        assert!(listing.contains("@sum:"));
        assert!(listing.contains("rdi"));
        assert!(listing.contains("rsi"));
        assert!(listing.contains("$1"));
    }
}
