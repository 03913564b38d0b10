// This module defines basic blocks and the dense block table of a function.
// A block is an ordered list of instruction ids with predecessor and
// successor edge lists; the terminator is always the last instruction and
// there is exactly one per block once a function is built. Blocks are
// addressed by dense BlockId indices; after builder normalization the entry
// block is index 0 and the table is in entry-first preorder, which makes
// analysis results reproducible run to run.

//! Basic blocks and the per-function block table.

use std::fmt;

use crate::ir::value::InstId;

/// Dense index of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.0)
    }
}

/// A single basic block: instruction list plus CFG edges.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub name: String,
    insts: Vec<InstId>,
    preds: Vec<BlockId>,
    succs: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(name: String) -> BasicBlock {
        BasicBlock {
            name,
            insts: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
        }
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn push(&mut self, inst: InstId) {
        self.insts.push(inst);
    }

    /// Inserts an instruction just before the terminator slot. Used for
    /// the copies the builder materializes for phi operands.
    pub fn insert_before_terminator(&mut self, inst: InstId) {
        debug_assert!(!self.insts.is_empty(), "block has no terminator yet");
        let at = self.insts.len() - 1;
        self.insts.insert(at, inst);
    }

    pub fn terminator(&self) -> Option<InstId> {
        self.insts.last().copied()
    }

    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }

    pub fn succs(&self) -> &[BlockId] {
        &self.succs
    }

    pub(crate) fn add_pred(&mut self, b: BlockId) {
        if !self.preds.contains(&b) {
            self.preds.push(b);
        }
    }

    pub(crate) fn add_succ(&mut self, b: BlockId) {
        if !self.succs.contains(&b) {
            self.succs.push(b);
        }
    }

    pub(crate) fn clear_edges(&mut self) {
        self.preds.clear();
        self.succs.clear();
    }
}

/// Dense table of a function's basic blocks. Entry is block 0.
#[derive(Debug, Clone, Default)]
pub struct BasicBlocks {
    blocks: Vec<BasicBlock>,
}

impl BasicBlocks {
    pub fn new() -> BasicBlocks {
        BasicBlocks { blocks: Vec::new() }
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn push(&mut self, block: BasicBlock) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(block);
        id
    }

    pub fn get(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(i as u32), b))
    }

    /// Reorders blocks by `perm` (old index -> new index), used by
    /// builder normalization. The caller remaps instruction block
    /// references and rebuilds edges afterwards.
    pub(crate) fn permute(&mut self, perm: &[u32]) {
        debug_assert_eq!(perm.len(), self.blocks.len());
        let mut reordered: Vec<BasicBlock> = vec![BasicBlock::default(); self.blocks.len()];
        for (old, block) in self.blocks.drain(..).enumerate() {
            reordered[perm[old] as usize] = block;
        }
        self.blocks = reordered;
    }
}
