// This module defines the closed instruction set of the sira IR as a single
// Inst enum. Every instruction names its operands as Values and, for
// terminators, carries its successor blocks explicitly, so the CFG is fully
// determined by the instruction stream. The enum exposes a small uniform
// surface the analyses rely on: operands() in a stable slot order,
// replace_operand() addressing the same slots, successors(), and the
// terminator/result predicates. Phi incoming lists keep blocks and values
// parallel; calls hold the resolved callee prototype so later passes never
// need a module lookup.

//! The IR instruction set.

use std::fmt;
use std::rc::Rc;

use crate::ir::block::BlockId;
use crate::ir::module::FunctionPrototype;
use crate::ir::value::{InstId, Value};

/// Two-operand arithmetic and bitwise operations. Integer or float
/// according to the instruction's result type; shifts are integer only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
        }
    }
}

/// Integer comparison predicates. Signedness comes from the operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Gt => "gt",
            IntPredicate::Ge => "ge",
            IntPredicate::Lt => "lt",
            IntPredicate::Le => "le",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Sext,
    Zext,
    Trunc,
    Bitcast,
    IntToFloat,
    FloatToInt,
}

impl CastKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastKind::Sext => "sext",
            CastKind::Zext => "zext",
            CastKind::Trunc => "trunc",
            CastKind::Bitcast => "bitcast",
            CastKind::IntToFloat => "int2fp",
            CastKind::FloatToInt => "fp2int",
        }
    }
}

/// An IR instruction. The result type lives alongside the instruction in
/// the function's arena, not in the enum.
#[derive(Debug, Clone)]
pub enum Inst {
    /// Identity move. The builder materializes one per phi operand and
    /// per call argument; congruence grouping depends on that.
    Copy { value: Value },
    Binary { op: BinaryOp, lhs: Value, rhs: Value },
    IntCompare {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    Load { ptr: Value },
    Store { value: Value, ptr: Value },
    /// Stack storage of the given type. Result is a pointer into the
    /// frame; the slot is pinned for the whole function.
    Alloc { allocated: crate::ir::types::Type },
    Cast { kind: CastKind, value: Value },
    /// Blocks and values are parallel and always the same length.
    Phi { incoming: Vec<(BlockId, Value)> },
    Call {
        callee: Rc<FunctionPrototype>,
        args: Vec<Value>,
    },
    /// Quotient and remainder in one instruction. Result is a tuple;
    /// values are extracted with `Proj`.
    DivRem { lhs: Value, rhs: Value },
    Proj { tuple: InstId, index: u32 },
    Branch { target: BlockId },
    BranchCond {
        cond: Value,
        /// `[on_true, on_false]`.
        targets: [BlockId; 2],
    },
    Return { value: Option<Value> },
}

impl Inst {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Inst::Branch { .. } | Inst::BranchCond { .. } | Inst::Return { .. }
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Inst::Phi { .. })
    }

    /// Successor blocks of a terminator; empty for everything else.
    pub fn successors(&self) -> &[BlockId] {
        match self {
            Inst::Branch { target } => std::slice::from_ref(target),
            Inst::BranchCond { targets, .. } => targets,
            _ => &[],
        }
    }

    /// Value operands in stable slot order. Phi yields its incoming
    /// values in incoming-block order; calls yield their arguments.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Inst::Copy { value } | Inst::Cast { value, .. } => vec![*value],
            Inst::Binary { lhs, rhs, .. }
            | Inst::IntCompare { lhs, rhs, .. }
            | Inst::DivRem { lhs, rhs } => vec![*lhs, *rhs],
            Inst::Load { ptr } => vec![*ptr],
            Inst::Store { value, ptr } => vec![*value, *ptr],
            Inst::Alloc { .. } | Inst::Branch { .. } => vec![],
            Inst::Phi { incoming } => incoming.iter().map(|(_, v)| *v).collect(),
            Inst::Call { args, .. } => args.clone(),
            Inst::Proj { .. } => vec![],
            Inst::BranchCond { cond, .. } => vec![*cond],
            Inst::Return { value } => value.iter().copied().collect(),
        }
    }

    /// Replaces the operand in the slot `operands()` reported at `slot`.
    ///
    /// Panics on an out-of-range slot; the caller addresses slots it
    /// just enumerated.
    pub fn replace_operand(&mut self, slot: usize, new: Value) {
        match self {
            Inst::Copy { value } | Inst::Cast { value, .. } => {
                assert_eq!(slot, 0, "operand slot {slot} out of range");
                *value = new;
            }
            Inst::Binary { lhs, rhs, .. }
            | Inst::IntCompare { lhs, rhs, .. }
            | Inst::DivRem { lhs, rhs } => match slot {
                0 => *lhs = new,
                1 => *rhs = new,
                _ => panic!("operand slot {slot} out of range"),
            },
            Inst::Load { ptr } => {
                assert_eq!(slot, 0, "operand slot {slot} out of range");
                *ptr = new;
            }
            Inst::Store { value, ptr } => match slot {
                0 => *value = new,
                1 => *ptr = new,
                _ => panic!("operand slot {slot} out of range"),
            },
            Inst::Phi { incoming } => incoming[slot].1 = new,
            Inst::Call { args, .. } => args[slot] = new,
            Inst::BranchCond { cond, .. } => {
                assert_eq!(slot, 0, "operand slot {slot} out of range");
                *cond = new;
            }
            Inst::Return { value } => {
                assert_eq!(slot, 0, "operand slot {slot} out of range");
                *value = Some(new);
            }
            Inst::Alloc { .. } | Inst::Branch { .. } | Inst::Proj { .. } => {
                panic!("instruction has no operand slots")
            }
        }
    }

    /// Visits every block reference in the instruction. The builder
    /// uses this to remap block ids during normalization.
    pub fn for_each_block_mut(&mut self, mut f: impl FnMut(&mut BlockId)) {
        match self {
            Inst::Branch { target } => f(target),
            Inst::BranchCond { targets, .. } => {
                f(&mut targets[0]);
                f(&mut targets[1]);
            }
            Inst::Phi { incoming } => {
                for (b, _) in incoming.iter_mut() {
                    f(b);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Copy { value } => write!(f, "copy {value:?}"),
            Inst::Binary { op, lhs, rhs } => {
                write!(f, "{} {lhs:?}, {rhs:?}", op.mnemonic())
            }
            Inst::IntCompare { pred, lhs, rhs } => {
                write!(f, "icmp {} {lhs:?}, {rhs:?}", pred.mnemonic())
            }
            Inst::Load { ptr } => write!(f, "load {ptr:?}"),
            Inst::Store { value, ptr } => write!(f, "store {value:?}, {ptr:?}"),
            Inst::Alloc { allocated } => write!(f, "alloc {allocated}"),
            Inst::Cast { kind, value } => write!(f, "{} {value:?}", kind.mnemonic()),
            Inst::Phi { incoming } => {
                write!(f, "phi")?;
                for (i, (b, v)) in incoming.iter().enumerate() {
                    if i != 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " [{v:?}, ^{}]", b.0)?;
                }
                Ok(())
            }
            Inst::Call { callee, args } => {
                write!(f, "call @{}(", callee.name)?;
                for (i, a) in args.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a:?}")?;
                }
                write!(f, ")")
            }
            Inst::DivRem { lhs, rhs } => write!(f, "divrem {lhs:?}, {rhs:?}"),
            Inst::Proj { tuple, index } => write!(f, "proj %{}, {index}", tuple.0),
            Inst::Branch { target } => write!(f, "br ^{}", target.0),
            Inst::BranchCond { cond, targets } => {
                write!(f, "condbr {cond:?}, ^{}, ^{}", targets[0].0, targets[1].0)
            }
            Inst::Return { value: Some(v) } => write!(f, "ret {v:?}"),
            Inst::Return { value: None } => write!(f, "ret void"),
        }
    }
}
