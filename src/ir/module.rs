// This module defines the top-level IR containers. FunctionPrototype is the
// callable surface (name, parameter types, return type) shared by externs and
// definitions through Rc so call instructions never need a module lookup.
// FunctionData owns a function body: argument values, the instruction arena
// (instruction + result type + optional source name), and the block table.
// It also memoizes the per-function analyses behind OnceCell so dominator
// tree, liveness, live intervals and the register allocation are each
// computed at most once and shared by reference; the crate is single
// threaded by design. Module is the list of functions and externs plus the
// per-module integer constant cache.

//! Functions, prototypes and the module container.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::analysis::dominance::DominatorTree;
use crate::analysis::intervals::LiveIntervals;
use crate::analysis::liveness::LivenessInfo;
use crate::ir::block::{BasicBlocks, BlockId};
use crate::ir::inst::Inst;
use crate::ir::types::Type;
use crate::ir::value::{ArgId, Constant, InstId, IntKind, LocalValue, Value};
use crate::x64::allocation::RegisterAllocation;
use crate::x64::regalloc::LinearScan;

/// The callable surface of a function, shared between its definition,
/// its callers and extern declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPrototype {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

/// A function argument with its declared name.
#[derive(Debug, Clone)]
pub struct ArgumentValue {
    pub id: ArgId,
    pub name: String,
    pub ty: Type,
}

/// One slot of the instruction arena.
#[derive(Debug, Clone)]
pub struct InstNode {
    pub inst: Inst,
    /// Result type; `Void` for instructions without a result.
    pub ty: Type,
    /// Source name, if the instruction was bound to one.
    pub name: Option<String>,
    pub block: BlockId,
}

impl InstNode {
    /// Whether this instruction produces a value other passes can use.
    pub fn defines_value(&self) -> bool {
        self.ty != Type::Void
    }
}

#[derive(Debug, Default)]
struct AnalysisCache {
    dominators: OnceCell<DominatorTree>,
    liveness: OnceCell<LivenessInfo>,
    intervals: OnceCell<LiveIntervals>,
    allocation: OnceCell<RegisterAllocation>,
}

/// A function definition: body plus memoized analyses.
#[derive(Debug)]
pub struct FunctionData {
    pub(crate) prototype: Rc<FunctionPrototype>,
    pub(crate) args: Vec<ArgumentValue>,
    pub(crate) insts: Vec<InstNode>,
    pub(crate) blocks: BasicBlocks,
    cache: AnalysisCache,
}

impl FunctionData {
    pub(crate) fn new(
        prototype: Rc<FunctionPrototype>,
        args: Vec<ArgumentValue>,
        insts: Vec<InstNode>,
        blocks: BasicBlocks,
    ) -> FunctionData {
        FunctionData {
            prototype,
            args,
            insts,
            blocks,
            cache: AnalysisCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.prototype.name
    }

    pub fn prototype(&self) -> &Rc<FunctionPrototype> {
        &self.prototype
    }

    pub fn args(&self) -> &[ArgumentValue] {
        &self.args
    }

    pub fn blocks(&self) -> &BasicBlocks {
        &self.blocks
    }

    pub fn inst(&self, id: InstId) -> &InstNode {
        &self.insts[id.index()]
    }

    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> + '_ {
        (0..self.insts.len() as u32).map(InstId)
    }

    /// Type of a storage-owning value.
    pub fn type_of(&self, value: LocalValue) -> &Type {
        match value {
            LocalValue::Argument(a) => &self.args[a.index()].ty,
            LocalValue::Local(i) => &self.insts[i.index()].ty,
        }
    }

    /// Type of any operand value, if it has one. `Undef` adopts its use
    /// site's type and reports `None`.
    pub fn value_type(&self, value: Value) -> Option<Type> {
        match value {
            Value::Argument(a) => Some(self.args[a.index()].ty.clone()),
            Value::Local(i) => Some(self.insts[i.index()].ty.clone()),
            Value::Constant(c) => c.ty(),
        }
    }

    /// Printable name of a local value, falling back to its index.
    pub fn value_name(&self, value: LocalValue) -> String {
        match value {
            LocalValue::Argument(a) => self.args[a.index()].name.clone(),
            LocalValue::Local(i) => match &self.insts[i.index()].name {
                Some(n) => n.clone(),
                None => format!("t{}", i.0),
            },
        }
    }

    pub fn dominator_tree(&self) -> &DominatorTree {
        self.cache
            .dominators
            .get_or_init(|| DominatorTree::compute(self))
    }

    pub fn liveness(&self) -> &LivenessInfo {
        self.cache.liveness.get_or_init(|| LivenessInfo::compute(self))
    }

    pub fn live_intervals(&self) -> &LiveIntervals {
        self.cache
            .intervals
            .get_or_init(|| LiveIntervals::compute(self))
    }

    pub fn register_allocation(&self) -> &RegisterAllocation {
        self.cache
            .allocation
            .get_or_init(|| LinearScan::run(self))
    }

    pub fn display(&self) -> FunctionDisplay<'_> {
        FunctionDisplay { func: self }
    }

    fn fmt_value(&self, f: &mut fmt::Formatter<'_>, value: Value) -> fmt::Result {
        match value {
            Value::Constant(c) => write!(f, "{c}"),
            Value::Argument(a) => write!(f, "%{}", self.args[a.index()].name),
            Value::Local(i) => write!(f, "%{}", self.value_name(LocalValue::Local(i))),
        }
    }
}

/// Human-readable listing of a function body, in the IR text syntax.
pub struct FunctionDisplay<'a> {
    func: &'a FunctionData,
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.func;
        write!(f, "fn {}(", func.prototype.name)?;
        for (i, arg) in func.args.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %{}", arg.ty, arg.name)?;
        }
        writeln!(f, "): {} {{", func.prototype.return_type)?;
        for (_, block) in func.blocks.iter() {
            writeln!(f, "{}:", block.name)?;
            for &inst_id in block.insts() {
                let node = func.inst(inst_id);
                write!(f, "  ")?;
                if node.defines_value() {
                    write!(
                        f,
                        "%{} = ",
                        func.value_name(LocalValue::Local(inst_id))
                    )?;
                }
                self.fmt_inst(f, inst_id)?;
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl FunctionDisplay<'_> {
    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, id: InstId) -> fmt::Result {
        let func = self.func;
        let node = func.inst(id);
        match &node.inst {
            Inst::Copy { value } => {
                write!(f, "copy {} ", node.ty)?;
                func.fmt_value(f, *value)
            }
            Inst::Binary { op, lhs, rhs } => {
                write!(f, "{} {} ", op.mnemonic(), node.ty)?;
                func.fmt_value(f, *lhs)?;
                write!(f, ", ")?;
                func.fmt_value(f, *rhs)
            }
            Inst::IntCompare { pred, lhs, rhs } => {
                write!(f, "icmp {} ", pred.mnemonic())?;
                func.fmt_value(f, *lhs)?;
                write!(f, ", ")?;
                func.fmt_value(f, *rhs)
            }
            Inst::Load { ptr } => {
                write!(f, "load {} ", node.ty)?;
                func.fmt_value(f, *ptr)
            }
            Inst::Store { value, ptr } => {
                write!(f, "store ")?;
                func.fmt_value(f, *value)?;
                write!(f, ", ")?;
                func.fmt_value(f, *ptr)
            }
            Inst::Alloc { allocated } => write!(f, "alloc {allocated}"),
            Inst::Cast { kind, value } => {
                write!(f, "{} {} ", kind.mnemonic(), node.ty)?;
                func.fmt_value(f, *value)
            }
            Inst::Phi { incoming } => {
                write!(f, "phi {}", node.ty)?;
                for (i, (b, v)) in incoming.iter().enumerate() {
                    if i != 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " [")?;
                    func.fmt_value(f, *v)?;
                    write!(f, ", ^{}]", func.blocks.get(*b).name)?;
                }
                Ok(())
            }
            Inst::Call { callee, args } => {
                write!(f, "call {} @{}(", node.ty, callee.name)?;
                for (i, a) in args.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    func.fmt_value(f, *a)?;
                }
                write!(f, ")")
            }
            Inst::DivRem { lhs, rhs } => {
                write!(f, "divrem {} ", node.ty)?;
                func.fmt_value(f, *lhs)?;
                write!(f, ", ")?;
                func.fmt_value(f, *rhs)
            }
            Inst::Proj { tuple, index } => {
                write!(
                    f,
                    "proj %{}, {index}",
                    func.value_name(LocalValue::Local(*tuple))
                )
            }
            Inst::Branch { target } => {
                write!(f, "br ^{}", func.blocks.get(*target).name)
            }
            Inst::BranchCond { cond, targets } => {
                write!(f, "condbr ")?;
                func.fmt_value(f, *cond)?;
                write!(
                    f,
                    ", ^{}, ^{}",
                    func.blocks.get(targets[0]).name,
                    func.blocks.get(targets[1]).name
                )
            }
            Inst::Return { value: Some(v) } => {
                write!(f, "ret {} ", func.prototype.return_type)?;
                func.fmt_value(f, *v)
            }
            Inst::Return { value: None } => write!(f, "ret void"),
        }
    }
}

/// Per-module cache for integer constants. Constants are plain value
/// types, so this is only a dedup map; all constant state is scoped to
/// the module that owns it.
#[derive(Debug, Default)]
pub struct ConstantPool {
    ints: HashMap<(IntKind, i64), Constant>,
}

impl ConstantPool {
    pub fn intern_int(&mut self, kind: IntKind, value: i64) -> Constant {
        *self
            .ints
            .entry((kind, value))
            .or_insert_with(|| Constant::int(kind, value))
    }
}

/// A compiled module: function definitions plus extern prototypes.
#[derive(Debug)]
pub struct Module {
    pub(crate) functions: Vec<FunctionData>,
    pub(crate) externs: Vec<Rc<FunctionPrototype>>,
    pub(crate) constants: ConstantPool,
}

impl Module {
    pub fn functions(&self) -> &[FunctionData] {
        &self.functions
    }

    pub fn externs(&self) -> &[Rc<FunctionPrototype>] {
        &self.externs
    }

    pub fn constants(&mut self) -> &mut ConstantPool {
        &mut self.constants
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionData> {
        self.functions.iter().find(|f| f.prototype.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ModuleBuilder;
    use crate::ir::inst::BinaryOp;

    #[test]
    fn containers_are_debug_printable() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb
            .create_function(
                "sum",
                vec![("a".to_string(), Type::I64)],
                Type::I64,
            )
            .unwrap();
        b.switch_to("entry").unwrap();
        let a = b.use_value("a").unwrap();
        let c = b
            .binary("c", BinaryOp::Add, Type::I64, a, Value::int(IntKind::I64, 1))
            .unwrap();
        b.ret(Some(c)).unwrap();
        let func = b.build().unwrap();
        assert!(format!("{func:?}").contains("sum"));
        mb.add_function(func);
        let module = mb.build();
        assert!(format!("{module:?}").contains("sum"));
    }
}
