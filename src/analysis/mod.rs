// This module groups the per-function CFG analyses: dominator tree,
// block-level liveness and live intervals with congruence groups. All of
// them are demanded lazily through FunctionData and memoized there. The
// postorder helper below is the one traversal both dominance and the
// liveness linear order are derived from.

//! CFG analyses: dominance, liveness, live intervals.

pub mod dominance;
pub mod intervals;
pub mod liveness;

use bumpalo::Bump;

use crate::ir::block::BlockId;
use crate::ir::module::FunctionData;

/// Postorder over the CFG from the entry block. The builder rejects
/// unreachable blocks, so this visits every block exactly once.
pub(crate) fn postorder(func: &FunctionData) -> Vec<BlockId> {
    let scratch = Bump::new();
    let n = func.blocks().len();
    let mut seen = bumpalo::collections::Vec::from_iter_in(std::iter::repeat(false).take(n), &scratch);
    // Stack of (block, next successor index to visit).
    let mut stack = bumpalo::collections::Vec::with_capacity_in(n, &scratch);
    let mut order = Vec::with_capacity(n);

    let entry = func.blocks().entry();
    seen[entry.index()] = true;
    stack.push((entry, 0usize));
    while let Some(&(b, i)) = stack.last() {
        let succs = func.blocks().get(b).succs();
        if i < succs.len() {
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            let s = succs[i];
            if !seen[s.index()] {
                seen[s.index()] = true;
                stack.push((s, 0));
            }
        } else {
            stack.pop();
            order.push(b);
        }
    }
    debug_assert_eq!(order.len(), n, "CFG contains unreachable blocks");
    order
}

/// Reverse postorder, the linear order liveness and the allocator walk
/// blocks in.
pub(crate) fn reverse_postorder(func: &FunctionData) -> Vec<BlockId> {
    let mut order = postorder(func);
    order.reverse();
    order
}
