// This module is the linear-scan register allocator. It walks the merged
// live intervals in begin order after two precoloring steps: the function's
// own parameters are bound to their ABI locations (their registers never
// enter the pool), and every call argument copy is pinned to the callee's
// convention slot up front. Pinned register bindings stay on a fixed-interval
// list; when the scan hands out a register it excludes any register pinned
// to a fixed interval that is simultaneously live, which is what keeps a
// pinned rdi from being reused across its call. Active bindings expire by
// intersection test against the current interval and return their operands
// to the pool; a congruence group is allocated once and every member bound
// to the same operand. Values the registers cannot hold (tuples, flags) are
// skipped; alloc storage gets a pinned frame slot. The scan cannot fail:
// the pool falls back to the stack.

//! Linear-scan register allocation.

use hashbrown::HashMap;
use log::{debug, trace};

use crate::analysis::intervals::{LiveIntervals, LiveRange};
use crate::ir::inst::Inst;
use crate::ir::module::FunctionData;
use crate::ir::types::Type;
use crate::ir::value::{InstId, LocalValue, Value};
use crate::x64::allocation::RegisterAllocation;
use crate::x64::args::caller_arguments;
use crate::x64::pool::VirtualRegisterPool;
use crate::x64::reg::Operand;

pub struct LinearScan<'f> {
    func: &'f FunctionData,
    intervals: &'f LiveIntervals,
    pool: VirtualRegisterPool,
    map: HashMap<LocalValue, Operand>,
    /// Currently live pool bindings, one entry per group.
    active: Vec<(LocalValue, Operand)>,
    /// Pinned call-argument bindings that can still conflict.
    fixed: Vec<(LiveRange, Operand)>,
    call_overflow: HashMap<InstId, u32>,
}

impl<'f> LinearScan<'f> {
    pub fn run(func: &FunctionData) -> RegisterAllocation {
        let mut scan = LinearScan {
            func,
            intervals: func.live_intervals(),
            pool: VirtualRegisterPool::for_function(func),
            map: HashMap::new(),
            active: Vec::new(),
            fixed: Vec::new(),
            call_overflow: HashMap::new(),
        };
        scan.bind_arguments();
        scan.pin_call_arguments();
        scan.walk();
        scan.verify_complete();
        debug!(
            "{}: allocated, spill area {} bytes, {} callee-saved",
            func.name(),
            scan.pool.spilled_size(),
            scan.pool.used_callee_saved().len()
        );
        let spilled = scan.pool.spilled_size();
        let callee_saved = scan.pool.used_callee_saved().to_vec();
        RegisterAllocation::new(scan.map, spilled, callee_saved, scan.call_overflow)
    }

    /// Parameters live where the convention put them; their registers
    /// were removed from the pool when it was primed.
    fn bind_arguments(&mut self) {
        for arg in self.func.args() {
            let op = self.pool.argument_operand(arg.id.index());
            self.bind(LocalValue::Argument(arg.id), op);
        }
    }

    /// Pins every call argument copy to the callee's convention slot
    /// and remembers register bindings as fixed intervals.
    fn pin_call_arguments(&mut self) {
        for inst_id in self.func.inst_ids() {
            let Inst::Call { callee, args } = &self.func.inst(inst_id).inst else {
                continue;
            };
            let (operands, overflow) = caller_arguments(&callee.params);
            for (arg, op) in args.iter().zip(operands) {
                let Value::Local(copy) = arg else {
                    panic!(
                        "call argument in {} is not an isolated copy",
                        self.func.name()
                    );
                };
                let lv = LocalValue::Local(*copy);
                self.bind(lv, op);
                if op.is_register() {
                    self.fixed.push((self.intervals.get(lv), op));
                }
                trace!("{}: pinned {lv} to {op}", self.func.name());
            }
            if overflow > 0 {
                self.call_overflow.insert(inst_id, overflow);
            }
        }
    }

    fn walk(&mut self) {
        let intervals = self.intervals;
        let ordered: Vec<(LocalValue, LiveRange)> = intervals.iter().collect();
        for (value, range) in ordered {
            let ty = self.func.type_of(value);
            if !ty.is_allocatable() {
                continue;
            }
            // Pinned values and later members of an already-allocated
            // group are bound already.
            if self.map.contains_key(&value) {
                continue;
            }

            self.fixed.retain(|(r, _)| !r.ends_before(range));
            {
                let pool = &mut self.pool;
                let func = self.func;
                self.active.retain(|&(v, op)| {
                    if intervals.get(v).intersects(range) {
                        true
                    } else {
                        pool.release(op, func.type_of(v).size_of());
                        false
                    }
                });
            }

            let op = self.allocate_group_operand(value, range);
            match intervals.group(value) {
                Some(members) => {
                    for &m in members {
                        self.bind(m, op);
                    }
                }
                None => self.bind(value, op),
            }
            self.active.push((value, op));
        }
    }

    fn allocate_group_operand(&mut self, value: LocalValue, range: LiveRange) -> Operand {
        let (ty, pinned_slot) = self.storage_type(value);
        let fixed = &self.fixed;
        let op = self.pool.allocate(&ty, pinned_slot, |candidate| {
            fixed
                .iter()
                .any(|&(r, pinned)| pinned == candidate && r.intersects(range))
        });
        trace!("{}: {value} -> {op} over {range}", self.func.name());
        op
    }

    /// The type that determines operand size, and whether the value is
    /// alloc storage needing a pinned frame slot.
    fn storage_type(&self, value: LocalValue) -> (Type, bool) {
        if let LocalValue::Local(id) = value {
            if let Inst::Alloc { allocated } = &self.func.inst(id).inst {
                return (allocated.clone(), true);
            }
        }
        (self.func.type_of(value).clone(), false)
    }

    fn bind(&mut self, value: LocalValue, op: Operand) {
        let previous = self.map.insert(value, op);
        assert!(
            previous.is_none(),
            "{value} in {} allocated twice: {:?} then {op}",
            self.func.name(),
            previous
        );
    }

    /// Every allocatable value with a live interval must be bound.
    fn verify_complete(&self) {
        for (value, _) in self.intervals.iter() {
            if self.func.type_of(value).is_allocatable() {
                assert!(
                    self.map.contains_key(&value),
                    "{value} in {} left without an operand",
                    self.func.name()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::{ModuleBuilder, PhiOperand};
    use crate::ir::inst::{BinaryOp, IntPredicate};
    use crate::ir::value::{IntKind, Value};
    use crate::x64::call_convention::GP_ARGUMENT_REGS;
    use crate::x64::reg::GpReg;

    fn i64v(v: i64) -> Value {
        Value::int(IntKind::I64, v)
    }

    #[test]
    fn diamond_phi_group_shares_one_operand() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        b.switch_to("entry").unwrap();
        let c = b
            .icmp("c", IntPredicate::Eq, Type::I64, i64v(1), i64v(2))
            .unwrap();
        b.branch_cond(c, "left", "right").unwrap();
        b.switch_to("left").unwrap();
        let x = b.binary("x", BinaryOp::Add, Type::I64, i64v(1), i64v(2)).unwrap();
        b.branch("join").unwrap();
        b.switch_to("right").unwrap();
        let y = b.binary("y", BinaryOp::Mul, Type::I64, i64v(3), i64v(4)).unwrap();
        b.branch("join").unwrap();
        b.switch_to("join").unwrap();
        let p = b
            .phi(
                "p",
                Type::I64,
                vec![
                    ("left".to_string(), PhiOperand::Value(x)),
                    ("right".to_string(), PhiOperand::Value(y)),
                ],
            )
            .unwrap();
        b.ret(Some(p)).unwrap();
        let func = b.build().unwrap();

        let alloc = func.register_allocation();
        let ivs = func.live_intervals();
        let group = ivs.group(p.local().unwrap()).unwrap();
        let shared = alloc.operand(group[0]);
        for &m in group {
            assert_eq!(alloc.operand(m), shared);
        }
    }

    #[test]
    fn pressure_spills_and_reuses_slots() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        b.switch_to("entry").unwrap();
        // Twelve values alive until the final sum exhaust the eleven
        // allocatable GP registers.
        let mut long_lived = Vec::new();
        for i in 0..12 {
            let v = b
                .binary(&format!("v{i}"), BinaryOp::Add, Type::I64, i64v(i), i64v(1))
                .unwrap();
            long_lived.push(v);
        }
        // Two short-lived values with disjoint lifetimes, both created
        // under full pressure.
        let s1 = b
            .binary("s1", BinaryOp::Add, Type::I64, i64v(1), i64v(2))
            .unwrap();
        let t1 = b
            .binary("t1", BinaryOp::Add, Type::I64, s1, i64v(0))
            .unwrap();
        let s2 = b
            .binary("s2", BinaryOp::Add, Type::I64, i64v(3), i64v(4))
            .unwrap();
        let t2 = b
            .binary("t2", BinaryOp::Add, Type::I64, s2, i64v(0))
            .unwrap();
        let mut sum = b
            .binary("sum0", BinaryOp::Add, Type::I64, t1, t2)
            .unwrap();
        for (i, v) in long_lived.iter().enumerate() {
            sum = b
                .binary(&format!("sum{}", i + 1), BinaryOp::Add, Type::I64, sum, *v)
                .unwrap();
        }
        b.ret(Some(sum)).unwrap();
        let func = b.build().unwrap();

        let alloc = func.register_allocation();
        let spilled: Vec<Operand> = long_lived
            .iter()
            .filter_map(|v| match alloc.operand(v.local().unwrap()) {
                op @ Operand::Slot { .. } => Some(op),
                _ => None,
            })
            .collect();
        assert!(!spilled.is_empty(), "no long-lived value was spilled");
        assert!(alloc.spilled_area_size() > 0);
        assert_eq!(alloc.spilled_area_size() % 8, 0);

        // The two short-lived spills never overlap, so the second one
        // reuses the first one's slot.
        let o1 = alloc.operand(s1.local().unwrap());
        let o2 = alloc.operand(s2.local().unwrap());
        assert!(matches!(o1, Operand::Slot { .. }));
        assert_eq!(o1, o2);
    }

    #[test]
    fn call_arguments_are_pinned_to_the_convention() {
        let mut mb = ModuleBuilder::new();
        mb.declare_extern("sink", vec![Type::I64; 8], Type::Void)
            .unwrap();
        let mut b = mb.create_function("f", vec![], Type::Void).unwrap();
        b.switch_to("entry").unwrap();
        let args: Vec<Value> = (0..8).map(i64v).collect();
        b.call(None, "sink", args).unwrap();
        b.ret(None).unwrap();
        let func = b.build().unwrap();

        let alloc = func.register_allocation();
        let mut call_args = Vec::new();
        let mut call_id = None;
        for id in func.inst_ids() {
            if let Inst::Call { args, .. } = &func.inst(id).inst {
                call_args = args.clone();
                call_id = Some(id);
            }
        }
        assert_eq!(call_args.len(), 8);
        for (i, arg) in call_args.iter().take(6).enumerate() {
            let op = alloc.operand(arg.local().unwrap());
            assert_eq!(op, Operand::Gp(GP_ARGUMENT_REGS[i]));
        }
        let o6 = alloc.operand(call_args[6].local().unwrap());
        let o7 = alloc.operand(call_args[7].local().unwrap());
        assert_eq!(o6, Operand::ArgSlot { offset: 0 });
        assert_eq!(o7, Operand::ArgSlot { offset: 8 });
        assert_eq!(alloc.call_overflow_area(call_id.unwrap()), 16);
    }

    #[test]
    fn pinned_registers_are_excluded_while_live() {
        let mut mb = ModuleBuilder::new();
        mb.declare_extern("sink", vec![Type::I64], Type::Void)
            .unwrap();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        b.switch_to("entry").unwrap();
        // Occupy the registers preceding rdi in the pool order so that
        // `keep`, which is live across the call, would be handed rdi if
        // the pinned argument copy did not exclude it.
        let k1 = b
            .binary("k1", BinaryOp::Add, Type::I64, i64v(1), i64v(2))
            .unwrap();
        let k2 = b
            .binary("k2", BinaryOp::Add, Type::I64, i64v(3), i64v(4))
            .unwrap();
        let keep = b
            .binary("keep", BinaryOp::Add, Type::I64, i64v(5), i64v(6))
            .unwrap();
        b.call(None, "sink", vec![keep]).unwrap();
        let o1 = b.binary("o1", BinaryOp::Add, Type::I64, keep, k1).unwrap();
        let out = b.binary("out", BinaryOp::Add, Type::I64, o1, k2).unwrap();
        b.ret(Some(out)).unwrap();
        let func = b.build().unwrap();

        let alloc = func.register_allocation();
        let keep_op = alloc.operand(keep.local().unwrap());
        assert_ne!(keep_op, Operand::Gp(GpReg::Rdi));
    }

    #[test]
    fn allocation_is_sound_and_complete_on_mixed_program() {
        let mut mb = ModuleBuilder::new();
        mb.declare_extern("observe", vec![Type::I64], Type::I64)
            .unwrap();
        let mut b = mb
            .create_function(
                "f",
                vec![
                    ("a".to_string(), Type::I64),
                    ("b".to_string(), Type::I64),
                ],
                Type::I64,
            )
            .unwrap();
        b.switch_to("entry").unwrap();
        let a = b.use_value("a").unwrap();
        let bv = b.use_value("b").unwrap();
        let t = b.divrem("t", Type::I64, a, bv).unwrap();
        let q = b.proj("q", t, 0).unwrap();
        let r = b.proj("r", t, 1).unwrap();
        let c = b.icmp("c", IntPredicate::Gt, Type::I64, q, r).unwrap();
        b.branch_cond(c, "left", "right").unwrap();
        b.switch_to("left").unwrap();
        let x = b.call(Some("x"), "observe", vec![q]).unwrap();
        b.branch("join").unwrap();
        b.switch_to("right").unwrap();
        let y = b.binary("y", BinaryOp::Mul, Type::I64, r, i64v(3)).unwrap();
        b.branch("join").unwrap();
        b.switch_to("join").unwrap();
        let p = b
            .phi(
                "p",
                Type::I64,
                vec![
                    ("left".to_string(), PhiOperand::Value(x)),
                    ("right".to_string(), PhiOperand::Value(y)),
                ],
            )
            .unwrap();
        b.ret(Some(p)).unwrap();
        let func = b.build().unwrap();

        let alloc = func.register_allocation();
        let ivs = func.live_intervals();
        let entries: Vec<(LocalValue, LiveRange)> = ivs
            .iter()
            .filter(|(v, _)| func.type_of(*v).is_allocatable())
            .collect();
        // Completeness: every allocatable value is bound.
        for (v, _) in &entries {
            assert!(alloc.try_operand(*v).is_some(), "{v} unbound");
        }
        // Soundness: intersecting values only share an operand inside
        // one congruence group.
        for (i, &(va, ra)) in entries.iter().enumerate() {
            for &(vb, rb) in &entries[i + 1..] {
                if !ra.intersects(rb) {
                    continue;
                }
                if alloc.operand(va) != alloc.operand(vb) {
                    continue;
                }
                let same_group = ivs
                    .group(va)
                    .is_some_and(|g| g.contains(&vb));
                assert!(
                    same_group,
                    "{va} and {vb} share {} while live together",
                    alloc.operand(va)
                );
            }
        }
    }
}
