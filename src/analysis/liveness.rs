// This module computes block-level liveness. Each block gets kill and gen
// sets (a phi's operands are deliberately not gen at the phi's block; they
// are uses on the incoming edges), then a backward fixpoint over the linear
// block order runs until no live-in set changes. Afterwards the phi edge
// patch adds the i-th phi operand to the live-out set of the i-th incoming
// block, which is what keeps an operand alive to the end of its own block
// instead of to the phi's position. The linear order itself (reverse
// postorder) is computed here and shared with the interval builder.

//! Block-level liveness analysis.

use hashbrown::HashSet;
use log::debug;

use crate::analysis::reverse_postorder;
use crate::ir::block::BlockId;
use crate::ir::inst::Inst;
use crate::ir::module::FunctionData;
use crate::ir::value::LocalValue;

/// Live-in and live-out sets per block, plus the linear block order the
/// rest of the backend walks.
#[derive(Debug, Clone)]
pub struct LivenessInfo {
    order: Vec<BlockId>,
    live_in: Vec<HashSet<LocalValue>>,
    live_out: Vec<HashSet<LocalValue>>,
}

impl LivenessInfo {
    pub fn compute(func: &FunctionData) -> LivenessInfo {
        let order = reverse_postorder(func);
        let n = func.blocks().len();

        let mut gen: Vec<HashSet<LocalValue>> = vec![HashSet::new(); n];
        let mut kill: Vec<HashSet<LocalValue>> = vec![HashSet::new(); n];
        for (id, block) in func.blocks().iter() {
            let b = id.index();
            for &inst_id in block.insts() {
                let node = func.inst(inst_id);
                if !node.inst.is_phi() {
                    for op in node.inst.operands() {
                        if let Some(lv) = op.local() {
                            if !kill[b].contains(&lv) {
                                gen[b].insert(lv);
                            }
                        }
                    }
                }
                if node.defines_value() {
                    kill[b].insert(LocalValue::Local(inst_id));
                }
            }
        }

        let mut live_in: Vec<HashSet<LocalValue>> = vec![HashSet::new(); n];
        let mut live_out: Vec<HashSet<LocalValue>> = vec![HashSet::new(); n];
        let mut rounds = 0u32;
        let mut changed = true;
        while changed {
            changed = false;
            rounds += 1;
            for &id in order.iter().rev() {
                let b = id.index();
                let mut out = HashSet::new();
                for &s in func.blocks().get(id).succs() {
                    for &v in &live_in[s.index()] {
                        out.insert(v);
                    }
                }
                let mut inn = gen[b].clone();
                for &v in &out {
                    if !kill[b].contains(&v) {
                        inn.insert(v);
                    }
                }
                if inn != live_in[b] {
                    live_in[b] = inn;
                    changed = true;
                }
                live_out[b] = out;
            }
        }
        debug!(
            "liveness of {} converged after {rounds} round(s)",
            func.name()
        );

        // Phi edge patch: the i-th operand is a use on the i-th incoming
        // edge, so it is live out of that block and nowhere else.
        for inst_id in func.inst_ids() {
            if let Inst::Phi { incoming } = &func.inst(inst_id).inst {
                for (from, v) in incoming {
                    if let Some(lv) = v.local() {
                        live_out[from.index()].insert(lv);
                    }
                }
            }
        }

        LivenessInfo {
            order,
            live_in,
            live_out,
        }
    }

    /// The linear block order (reverse postorder).
    pub fn linear_order(&self) -> &[BlockId] {
        &self.order
    }

    pub fn live_in(&self, b: BlockId) -> &HashSet<LocalValue> {
        &self.live_in[b.index()]
    }

    pub fn live_out(&self, b: BlockId) -> &HashSet<LocalValue> {
        &self.live_out[b.index()]
    }

    pub fn is_live_out(&self, b: BlockId, v: LocalValue) -> bool {
        self.live_out[b.index()].contains(&v)
    }
}
