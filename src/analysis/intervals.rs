// This module builds live intervals on top of block liveness and merges them
// into congruence groups. Every block gets a base ordering, the prefix sum
// of block sizes over the linear order; arguments open at negative positions
// so they precede every instruction; each defining instruction opens its
// interval at its global ordering, every (non-phi) use extends it, and every
// live-out value is extended to the end of its block. Phi operands are uses
// on their incoming edges and are covered by the live-out extension, never
// by the phi's own position. A phi and its operand copies are then merged
// into one group sharing one range, and every divrem tuple merges its range
// into each of its projections. The allocator walks the result in begin
// order.

//! Live intervals and congruence groups.

use std::fmt;

use hashbrown::HashMap;
use log::{debug, trace};

use crate::ir::inst::Inst;
use crate::ir::module::FunctionData;
use crate::ir::value::{LocalValue, Value};

/// Half-open is a lie here: both ends are inclusive orderings, matching
/// how uses extend an interval in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub begin: i64,
    pub end: i64,
}

impl LiveRange {
    pub fn point(at: i64) -> LiveRange {
        LiveRange { begin: at, end: at }
    }

    /// Extends the range to cover a use at `at`.
    pub fn register_use(&mut self, at: i64) {
        if at > self.end {
            self.end = at;
        }
    }

    pub fn merge(self, other: LiveRange) -> LiveRange {
        LiveRange {
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }

    pub fn intersects(self, other: LiveRange) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }

    pub fn ends_before(self, other: LiveRange) -> bool {
        self.end < other.begin
    }
}

impl fmt::Display for LiveRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

/// Live intervals of a function, sorted by begin, with the phi and
/// tuple congruence groups.
#[derive(Debug, Clone)]
pub struct LiveIntervals {
    ranges: HashMap<LocalValue, LiveRange>,
    /// Begin-ordered view the allocator walks.
    ordered: Vec<(LocalValue, LiveRange)>,
    groups: Vec<Vec<LocalValue>>,
    group_of: HashMap<LocalValue, u32>,
}

impl LiveIntervals {
    pub fn compute(func: &FunctionData) -> LiveIntervals {
        let liveness = func.liveness();
        let order = liveness.linear_order();

        // Base ordering of every block: prefix sums of block sizes.
        let mut base = vec![0i64; func.blocks().len()];
        let mut next = 0i64;
        for &b in order {
            base[b.index()] = next;
            next += func.blocks().get(b).len() as i64;
        }

        let mut ranges: HashMap<LocalValue, LiveRange> = HashMap::new();

        // Arguments precede every instruction.
        let nargs = func.args().len() as i64;
        for arg in func.args() {
            let at = arg.id.index() as i64 - nargs;
            ranges.insert(LocalValue::Argument(arg.id), LiveRange::point(at));
        }

        // Definitions open intervals at their global ordering.
        for &b in order {
            for (k, &inst_id) in func.blocks().get(b).insts().iter().enumerate() {
                if func.inst(inst_id).defines_value() {
                    let at = base[b.index()] + k as i64;
                    ranges.insert(LocalValue::Local(inst_id), LiveRange::point(at));
                }
            }
        }

        // Uses extend intervals. Live-out values reach the end of the
        // block; phi operands are edge uses and are covered by exactly
        // that extension.
        for &b in order {
            let block = func.blocks().get(b);
            let block_end = base[b.index()] + block.len() as i64;
            for &lv in liveness.live_out(b) {
                match ranges.get_mut(&lv) {
                    Some(r) => r.register_use(block_end),
                    None => panic!(
                        "{lv} is live out of {} in {} but has no interval",
                        block.name,
                        func.name()
                    ),
                }
            }
            for (k, &inst_id) in block.insts().iter().enumerate() {
                let node = func.inst(inst_id);
                if node.inst.is_phi() {
                    continue;
                }
                let at = base[b.index()] + k as i64;
                for op in node.inst.operands() {
                    let Some(lv) = op.local() else { continue };
                    match ranges.get_mut(&lv) {
                        Some(r) => r.register_use(at),
                        None => panic!(
                            "use of {lv} at {} in {} without a live interval",
                            node.inst,
                            func.name()
                        ),
                    }
                }
            }
        }

        let (groups, group_of) = merge_groups(func, &mut ranges);

        let mut ordered: Vec<(LocalValue, LiveRange)> =
            ranges.iter().map(|(&v, &r)| (v, r)).collect();
        ordered.sort_by(|a, b| a.1.begin.cmp(&b.1.begin).then(a.0.cmp(&b.0)));
        debug!(
            "{}: {} live intervals, {} merged group(s)",
            func.name(),
            ordered.len(),
            groups.len()
        );

        LiveIntervals {
            ranges,
            ordered,
            groups,
            group_of,
        }
    }

    /// The interval of a value. Panics if the value has none; every
    /// storage-owning value in a built function has one.
    pub fn get(&self, v: LocalValue) -> LiveRange {
        match self.ranges.get(&v) {
            Some(&r) => r,
            None => panic!("no live interval for {v}"),
        }
    }

    pub fn try_get(&self, v: LocalValue) -> Option<LiveRange> {
        self.ranges.get(&v).copied()
    }

    /// Intervals in begin order, group ranges already merged.
    pub fn iter(&self) -> impl Iterator<Item = (LocalValue, LiveRange)> + '_ {
        self.ordered.iter().copied()
    }

    /// The congruence group of a value, if it belongs to a merged one.
    pub fn group(&self, v: LocalValue) -> Option<&[LocalValue]> {
        self.group_of
            .get(&v)
            .map(|&g| self.groups[g as usize].as_slice())
    }
}

/// Merges phi groups (phi plus its operand copies) into one shared
/// range, and tuple ranges into their projections.
fn merge_groups(
    func: &FunctionData,
    ranges: &mut HashMap<LocalValue, LiveRange>,
) -> (Vec<Vec<LocalValue>>, HashMap<LocalValue, u32>) {
    let mut groups: Vec<Vec<LocalValue>> = Vec::new();
    let mut group_of: HashMap<LocalValue, u32> = HashMap::new();

    for inst_id in func.inst_ids() {
        match &func.inst(inst_id).inst {
            Inst::Phi { incoming } => {
                let mut members = vec![LocalValue::Local(inst_id)];
                for (_, v) in incoming {
                    let Value::Local(op) = v else {
                        panic!(
                            "phi operand in {} is not an isolated copy",
                            func.name()
                        );
                    };
                    assert!(
                        matches!(func.inst(*op).inst, Inst::Copy { .. }),
                        "phi operand %{} in {} is not a copy",
                        op.0,
                        func.name()
                    );
                    members.push(LocalValue::Local(*op));
                }
                let mut merged = ranges[&members[0]];
                for m in &members[1..] {
                    merged = merged.merge(ranges[m]);
                }
                for m in &members {
                    ranges.insert(*m, merged);
                    group_of.insert(*m, groups.len() as u32);
                }
                trace!(
                    "{}: phi group of {} values shares {merged}",
                    func.name(),
                    members.len()
                );
                groups.push(members);
            }
            Inst::Proj { tuple, .. } => {
                let t = LocalValue::Local(*tuple);
                let p = LocalValue::Local(inst_id);
                let merged = ranges[&p].merge(ranges[&t]);
                ranges.insert(p, merged);
            }
            _ => {}
        }
    }
    (groups, group_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::{ModuleBuilder, PhiOperand};
    use crate::ir::inst::{BinaryOp, IntPredicate};
    use crate::ir::types::Type;
    use crate::ir::value::{IntKind, Value};

    fn i64v(v: i64) -> Value {
        Value::int(IntKind::I64, v)
    }

    #[test]
    fn ranges_merge_and_intersect() {
        let a = LiveRange { begin: 0, end: 4 };
        let b = LiveRange { begin: 3, end: 9 };
        let c = LiveRange { begin: 5, end: 6 };
        assert!(a.intersects(b));
        assert!(!a.intersects(c));
        assert!(a.ends_before(c));
        assert_eq!(a.merge(c), LiveRange { begin: 0, end: 6 });
    }

    #[test]
    fn arguments_open_at_negative_positions() {
        let mut mb = ModuleBuilder::new();
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
        let bb = b.use_value("b").unwrap();
        let c = b.binary("c", BinaryOp::Add, Type::I64, a, bb).unwrap();
        b.ret(Some(c)).unwrap();
        let func = b.build().unwrap();

        let ivs = func.live_intervals();
        let ra = ivs.get(a.local().unwrap());
        let rb = ivs.get(bb.local().unwrap());
        assert_eq!(ra.begin, -2);
        assert_eq!(rb.begin, -1);
        // Both are used by the add at ordering 0.
        assert_eq!(ra.end, 0);
        assert_eq!(rb.end, 0);
    }

    #[test]
    fn diamond_phi_forms_one_group_with_shared_range() {
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

        let ivs = func.live_intervals();
        let group = ivs.group(p.local().unwrap()).unwrap();
        assert_eq!(group.len(), 3);
        let shared = ivs.get(p.local().unwrap());
        for &m in group {
            assert_eq!(ivs.get(m), shared);
        }
        // The non-phi members are the operand copies.
        for &m in &group[1..] {
            let LocalValue::Local(id) = m else {
                panic!("group member is not a local")
            };
            assert!(matches!(func.inst(id).inst, Inst::Copy { .. }));
        }
        assert!(shared.begin < shared.end);
    }

    #[test]
    fn phi_operand_extends_to_end_of_incoming_block_only() {
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

        // The check runs on the liveness layer; after group merging the
        // copies deliberately share the phi's merged range.
        let live = func.liveness();
        for id in func.inst_ids() {
            if let Inst::Phi { incoming } = &func.inst(id).inst {
                for (from, v) in incoming {
                    let lv = v.local().unwrap();
                    assert!(live.is_live_out(*from, lv));
                    assert!(!live.live_in(func.inst(id).block).contains(&lv));
                }
            }
        }
    }

    #[test]
    fn divrem_range_covers_both_projections() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        b.switch_to("entry").unwrap();
        let t = b.divrem("t", Type::I64, i64v(7), i64v(3)).unwrap();
        let q = b.proj("q", t, 0).unwrap();
        let r = b.proj("r", t, 1).unwrap();
        let s = b.binary("s", BinaryOp::Add, Type::I64, q, r).unwrap();
        b.ret(Some(s)).unwrap();
        let func = b.build().unwrap();

        let ivs = func.live_intervals();
        let rt = ivs.get(t.local().unwrap());
        let rq = ivs.get(q.local().unwrap());
        let rr = ivs.get(r.local().unwrap());
        // Each projection's range reaches back to the tuple's def.
        assert_eq!(rq.begin, rt.begin);
        assert_eq!(rr.begin, rt.begin);
        assert!(rq.end >= rt.end);
    }
}
