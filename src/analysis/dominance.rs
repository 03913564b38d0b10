// This module computes the dominator tree of a function with the iterative
// fixpoint over postorder numbers: blocks are numbered so the entry receives
// the highest number, then reverse-postorder sweeps intersect the immediate
// dominators of each block's processed predecessors with the classic
// two-finger walk until nothing changes. The tree exposes idom lookups,
// dominance queries by chain walking, full dominator chains, and dominance
// frontiers computed with the predecessor walk up to (and excluding) the
// immediate dominator. Unreachable blocks never reach this pass; the builder
// rejects them.

//! Dominator tree and dominance frontiers.

use log::debug;

use crate::analysis::postorder;
use crate::ir::block::BlockId;
use crate::ir::module::FunctionData;

const UNDEFINED: u32 = u32::MAX;

/// Immediate-dominator tree of a function's CFG.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// Immediate dominator per block; the entry maps to itself.
    idoms: Vec<BlockId>,
    /// Predecessor lists, kept for the frontier computation.
    preds: Vec<Vec<BlockId>>,
}

impl DominatorTree {
    pub fn compute(func: &FunctionData) -> DominatorTree {
        let order = postorder(func);
        let n = order.len();

        // Postorder number per block; the entry ends up with n - 1.
        let mut number = vec![0u32; n];
        for (num, b) in order.iter().enumerate() {
            number[b.index()] = num as u32;
        }
        let entry = n as u32 - 1;
        debug_assert_eq!(number[func.blocks().entry().index()], entry);

        // Predecessors in postorder-number space.
        let mut preds_by_num: Vec<Vec<u32>> = vec![Vec::new(); n];
        for (id, block) in func.blocks().iter() {
            for &p in block.preds() {
                preds_by_num[number[id.index()] as usize].push(number[p.index()]);
            }
        }

        let mut doms = vec![UNDEFINED; n];
        doms[entry as usize] = entry;
        let mut changed = true;
        let mut sweeps = 0u32;
        while changed {
            changed = false;
            sweeps += 1;
            // Reverse postorder, entry excluded.
            for num in (0..entry).rev() {
                let mut new_idom = UNDEFINED;
                for &p in &preds_by_num[num as usize] {
                    if doms[p as usize] == UNDEFINED {
                        continue;
                    }
                    new_idom = if new_idom == UNDEFINED {
                        p
                    } else {
                        intersect(&doms, new_idom, p)
                    };
                }
                debug_assert_ne!(new_idom, UNDEFINED, "block with no processed predecessor");
                if doms[num as usize] != new_idom {
                    doms[num as usize] = new_idom;
                    changed = true;
                }
            }
        }
        debug!(
            "dominators of {} converged after {sweeps} sweep(s) over {n} blocks",
            func.name()
        );

        let mut idoms = vec![BlockId(0); n];
        for (num, &b) in order.iter().enumerate() {
            idoms[b.index()] = order[doms[num] as usize];
        }
        let preds = func
            .blocks()
            .iter()
            .map(|(_, b)| b.preds().to_vec())
            .collect();
        DominatorTree { idoms, preds }
    }

    /// Immediate dominator; `None` for the entry block.
    pub fn idom(&self, b: BlockId) -> Option<BlockId> {
        let d = self.idoms[b.index()];
        if d == b {
            None
        } else {
            Some(d)
        }
    }

    /// Whether `a` dominates `b` (reflexive).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            let up = self.idoms[cur.index()];
            if up == cur {
                return false;
            }
            cur = up;
        }
    }

    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Dominator chain of `b`, from `b` itself up to the entry.
    pub fn dominators(&self, b: BlockId) -> Vec<BlockId> {
        let mut chain = vec![b];
        let mut cur = b;
        loop {
            let up = self.idoms[cur.index()];
            if up == cur {
                break;
            }
            chain.push(up);
            cur = up;
        }
        chain
    }

    /// Dominance frontier per block: for every join (two or more
    /// predecessors), each predecessor and its dominators up to but
    /// excluding the join's idom get the join in their frontier.
    pub fn frontiers(&self) -> Vec<Vec<BlockId>> {
        let n = self.idoms.len();
        let mut frontiers: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        for b in 0..n {
            let join = BlockId(b as u32);
            if self.preds[b].len() < 2 {
                continue;
            }
            let idom = self.idoms[b];
            for &p in &self.preds[b] {
                let mut runner = p;
                while runner != idom {
                    let f = &mut frontiers[runner.index()];
                    if !f.contains(&join) {
                        f.push(join);
                    }
                    runner = self.idoms[runner.index()];
                }
            }
        }
        frontiers
    }
}

fn intersect(doms: &[u32], a: u32, b: u32) -> u32 {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while finger1 < finger2 {
            finger1 = doms[finger1 as usize];
        }
        while finger2 < finger1 {
            finger2 = doms[finger2 as usize];
        }
    }
    finger1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ModuleBuilder;
    use crate::ir::inst::IntPredicate;
    use crate::ir::types::Type;
    use crate::ir::value::{IntKind, Value};

    fn i32v(v: i64) -> Value {
        Value::int(IntKind::I32, v)
    }

    /// entry -> b1 -> {b2, b3}; b3 -> b4 -> {b6, b5}; b6 -> b4 (back
    /// edge); b2 and b5 meet at exit.
    fn loop_cfg() -> FunctionData {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("hello", vec![], Type::U16).unwrap();
        b.switch_to("entry").unwrap();
        b.branch("b1").unwrap();

        b.switch_to("b1").unwrap();
        let c1 = b
            .icmp("c1", IntPredicate::Ne, Type::I32, i32v(12), i32v(43))
            .unwrap();
        b.branch_cond(c1, "b2", "b3").unwrap();

        b.switch_to("b3").unwrap();
        b.branch("b4").unwrap();

        b.switch_to("b4").unwrap();
        let c4 = b
            .icmp("c4", IntPredicate::Ne, Type::I32, i32v(152), i32v(443))
            .unwrap();
        b.branch_cond(c4, "b6", "b5").unwrap();

        b.switch_to("b6").unwrap();
        b.branch("b4").unwrap();

        b.switch_to("b5").unwrap();
        b.branch("exit").unwrap();

        b.switch_to("b2").unwrap();
        b.branch("exit").unwrap();

        b.switch_to("exit").unwrap();
        b.ret(Some(Value::int(IntKind::U16, 0))).unwrap();
        b.build().unwrap()
    }

    fn named(func: &FunctionData, name: &str) -> BlockId {
        func.blocks()
            .iter()
            .find(|(_, b)| b.name == name)
            .map(|(id, _)| id)
            .unwrap()
    }

    #[test]
    fn dominators_of_loop_cfg() {
        let func = loop_cfg();
        let dom = func.dominator_tree();
        let b = |n: &str| named(&func, n);

        assert!(dom.dominates(b("entry"), b("b1")));
        assert!(dom.dominates(b("b1"), b("b2")));
        assert!(dom.dominates(b("b1"), b("b3")));
        assert!(dom.dominates(b("b1"), b("exit")));
        assert!(dom.dominates(b("b3"), b("b4")));
        assert!(dom.dominates(b("b4"), b("b5")));
        assert!(dom.dominates(b("b4"), b("b6")));

        assert!(!dom.dominates(b("b2"), b("exit")));
        assert!(!dom.dominates(b("b5"), b("exit")));
        assert_eq!(dom.idom(b("exit")), Some(b("b1")));
        assert_eq!(dom.idom(b("b4")), Some(b("b3")));
        assert_eq!(dom.idom(b("entry")), None);
    }

    #[test]
    fn dominator_chain_walks_to_entry() {
        let func = loop_cfg();
        let dom = func.dominator_tree();
        let chain = dom.dominators(named(&func, "b6"));
        assert_eq!(
            chain,
            vec![
                named(&func, "b6"),
                named(&func, "b4"),
                named(&func, "b3"),
                named(&func, "b1"),
                named(&func, "entry"),
            ]
        );
    }

    #[test]
    fn diamond_frontiers() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("d", vec![], Type::Void).unwrap();
        b.switch_to("entry").unwrap();
        let c = b
            .icmp("c", IntPredicate::Eq, Type::I32, i32v(0), i32v(1))
            .unwrap();
        b.branch_cond(c, "left", "right").unwrap();
        b.switch_to("left").unwrap();
        b.branch("join").unwrap();
        b.switch_to("right").unwrap();
        b.branch("join").unwrap();
        b.switch_to("join").unwrap();
        b.ret(None).unwrap();
        let func = b.build().unwrap();

        let dom = func.dominator_tree();
        let frontiers = dom.frontiers();
        let join = named(&func, "join");
        assert_eq!(frontiers[named(&func, "left").index()], vec![join]);
        assert_eq!(frontiers[named(&func, "right").index()], vec![join]);
        assert!(frontiers[named(&func, "entry").index()].is_empty());
        assert!(frontiers[join.index()].is_empty());
    }
}
