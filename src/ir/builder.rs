// This module builds functions and modules from a stream of definitions in
// source order. The builder owns the name resolution the text format needs:
// labels are created lazily on first mention so forward branches work, named
// values error on redefinition, and phi operands are recorded as raw names in
// a side table and resolved in build() once every definition has been seen.
// build() also materializes a Copy per phi operand in the operand's incoming
// block (the congruence grouping in the interval builder depends on it),
// verifies every block ends in exactly one terminator, rejects unreachable
// blocks, and normalizes block order to entry-first preorder so analyses are
// reproducible. Call arguments are likewise isolated behind copies at append
// time; their callee is resolved against the module's prototype registry.

//! IR construction: `ModuleBuilder` and `FunctionDataBuilder`.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use log::trace;

use crate::error::{CompileError, CompileResult};
use crate::ir::block::{BasicBlock, BasicBlocks, BlockId};
use crate::ir::inst::{BinaryOp, CastKind, Inst, IntPredicate};
use crate::ir::module::{
    ArgumentValue, ConstantPool, FunctionData, FunctionPrototype, InstNode, Module,
};
use crate::ir::types::Type;
use crate::ir::value::{ArgId, InstId, IntKind, Value};

type Registry = Rc<RefCell<HashMap<String, Rc<FunctionPrototype>>>>;

/// Builds a [`Module`] function by function. Prototypes become visible
/// to later functions as soon as they are declared, so calls may target
/// externs and any earlier (or the current) definition.
pub struct ModuleBuilder {
    functions: Vec<FunctionData>,
    externs: Vec<Rc<FunctionPrototype>>,
    registry: Registry,
    constants: ConstantPool,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBuilder {
    pub fn new() -> ModuleBuilder {
        ModuleBuilder {
            functions: Vec::new(),
            externs: Vec::new(),
            registry: Rc::new(RefCell::new(HashMap::new())),
            constants: ConstantPool::default(),
        }
    }

    pub fn declare_extern(
        &mut self,
        name: &str,
        params: Vec<Type>,
        return_type: Type,
    ) -> CompileResult<Rc<FunctionPrototype>> {
        let proto = Rc::new(FunctionPrototype {
            name: name.to_string(),
            params,
            return_type,
        });
        self.register(proto.clone())?;
        self.externs.push(proto.clone());
        Ok(proto)
    }

    /// Starts a function definition. The returned builder is finished
    /// with [`FunctionDataBuilder::build`] and handed back via
    /// [`ModuleBuilder::add_function`].
    pub fn create_function(
        &mut self,
        name: &str,
        params: Vec<(String, Type)>,
        return_type: Type,
    ) -> CompileResult<FunctionDataBuilder> {
        let proto = Rc::new(FunctionPrototype {
            name: name.to_string(),
            params: params.iter().map(|(_, t)| t.clone()).collect(),
            return_type,
        });
        self.register(proto.clone())?;
        FunctionDataBuilder::new(proto, params, self.registry.clone())
    }

    pub fn add_function(&mut self, func: FunctionData) {
        self.functions.push(func);
    }

    pub fn intern_int(&mut self, kind: IntKind, value: i64) -> Value {
        Value::Constant(self.constants.intern_int(kind, value))
    }

    pub fn build(self) -> Module {
        Module {
            functions: self.functions,
            externs: self.externs,
            constants: self.constants,
        }
    }

    fn register(&mut self, proto: Rc<FunctionPrototype>) -> CompileResult<()> {
        let mut reg = self.registry.borrow_mut();
        if reg.contains_key(&proto.name) {
            return Err(CompileError::DuplicateFunction {
                name: proto.name.clone(),
            });
        }
        reg.insert(proto.name.clone(), proto);
        Ok(())
    }
}

/// A phi operand as first recorded: either a name to resolve at
/// build() time or an already-known value.
#[derive(Debug, Clone)]
pub enum PhiOperand {
    Name(String),
    Value(Value),
}

struct IncompletePhi {
    inst: InstId,
    incoming: Vec<(String, PhiOperand)>,
}

/// Builds one function body in source order.
pub struct FunctionDataBuilder {
    prototype: Rc<FunctionPrototype>,
    args: Vec<ArgumentValue>,
    insts: Vec<InstNode>,
    blocks: BasicBlocks,
    registry: Registry,
    values: HashMap<String, Value>,
    labels: HashMap<String, BlockId>,
    defined_labels: HashSet<BlockId>,
    incomplete_phis: Vec<IncompletePhi>,
    entry: Option<BlockId>,
    cursor: Option<BlockId>,
}

impl FunctionDataBuilder {
    fn new(
        prototype: Rc<FunctionPrototype>,
        params: Vec<(String, Type)>,
        registry: Registry,
    ) -> CompileResult<FunctionDataBuilder> {
        let mut values = HashMap::new();
        let mut args = Vec::with_capacity(params.len());
        for (i, (name, ty)) in params.into_iter().enumerate() {
            let id = ArgId(i as u32);
            if values.insert(name.clone(), Value::Argument(id)).is_some() {
                return Err(CompileError::DuplicateValue { name });
            }
            args.push(ArgumentValue { id, name, ty });
        }
        Ok(FunctionDataBuilder {
            prototype,
            args,
            insts: Vec::new(),
            blocks: BasicBlocks::new(),
            registry,
            values,
            labels: HashMap::new(),
            defined_labels: HashSet::new(),
            incomplete_phis: Vec::new(),
            entry: None,
            cursor: None,
        })
    }

    /// Block for a label, creating it on first mention.
    pub fn block(&mut self, name: &str) -> BlockId {
        if let Some(&id) = self.labels.get(name) {
            return id;
        }
        let id = self.blocks.push(BasicBlock::new(name.to_string()));
        self.labels.insert(name.to_string(), id);
        id
    }

    /// Begins the body of a label and positions the append cursor. The
    /// first label defined becomes the entry block.
    pub fn switch_to(&mut self, name: &str) -> CompileResult<BlockId> {
        let id = self.block(name);
        if !self.defined_labels.insert(id) {
            return Err(CompileError::DuplicateLabel {
                name: name.to_string(),
            });
        }
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        self.cursor = Some(id);
        Ok(id)
    }

    /// Resolves a value name. Non-phi operands must already be defined.
    pub fn use_value(&self, name: &str) -> CompileResult<Value> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UndefinedValue {
                name: name.to_string(),
            })
    }

    pub fn return_type(&self) -> &Type {
        &self.prototype.return_type
    }

    pub fn find_callee(&self, name: &str) -> CompileResult<Rc<FunctionPrototype>> {
        self.registry
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UnresolvedCallee {
                name: name.to_string(),
            })
    }

    pub fn binary(
        &mut self,
        name: &str,
        op: BinaryOp,
        ty: Type,
        lhs: Value,
        rhs: Value,
    ) -> CompileResult<Value> {
        if !ty.is_integer() && !ty.is_float() && !ty.is_pointer() {
            return Err(CompileError::InvalidOperand {
                context: op.mnemonic().to_string(),
                reason: format!("result type {ty} is not numeric"),
            });
        }
        self.check_type(op.mnemonic(), &ty, lhs)?;
        self.check_type(op.mnemonic(), &ty, rhs)?;
        let id = self.append(Inst::Binary { op, lhs, rhs }, ty, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn icmp(
        &mut self,
        name: &str,
        pred: IntPredicate,
        ty: Type,
        lhs: Value,
        rhs: Value,
    ) -> CompileResult<Value> {
        if !ty.is_integer() && !ty.is_pointer() {
            return Err(CompileError::InvalidOperand {
                context: "icmp".to_string(),
                reason: format!("operand type {ty} is not comparable"),
            });
        }
        self.check_type("icmp", &ty, lhs)?;
        self.check_type("icmp", &ty, rhs)?;
        let id = self.append(Inst::IntCompare { pred, lhs, rhs }, Type::Flag, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn copy(&mut self, name: &str, ty: Type, value: Value) -> CompileResult<Value> {
        self.check_type("copy", &ty, value)?;
        let id = self.append(Inst::Copy { value }, ty, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn load(&mut self, name: &str, ty: Type, ptr: Value) -> CompileResult<Value> {
        self.check_type("load", &Type::Ptr, ptr)?;
        let id = self.append(Inst::Load { ptr }, ty, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn store(&mut self, ty: Type, value: Value, ptr: Value) -> CompileResult<()> {
        self.check_type("store", &ty, value)?;
        self.check_type("store", &Type::Ptr, ptr)?;
        self.append(Inst::Store { value, ptr }, Type::Void, None)?;
        Ok(())
    }

    pub fn alloc(&mut self, name: &str, allocated: Type) -> CompileResult<Value> {
        let id = self.append(Inst::Alloc { allocated }, Type::Ptr, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn cast(
        &mut self,
        name: &str,
        kind: CastKind,
        to: Type,
        value: Value,
    ) -> CompileResult<Value> {
        if !to.is_allocatable() {
            return Err(CompileError::InvalidOperand {
                context: kind.mnemonic().to_string(),
                reason: format!("cannot cast to {to}"),
            });
        }
        let id = self.append(Inst::Cast { kind, value }, to, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn divrem(
        &mut self,
        name: &str,
        ty: Type,
        lhs: Value,
        rhs: Value,
    ) -> CompileResult<Value> {
        if !ty.is_integer() {
            return Err(CompileError::InvalidOperand {
                context: "divrem".to_string(),
                reason: format!("operand type {ty} is not an integer"),
            });
        }
        self.check_type("divrem", &ty, lhs)?;
        self.check_type("divrem", &ty, rhs)?;
        let tuple_ty = Type::Tuple(vec![ty.clone(), ty]);
        let id = self.append(Inst::DivRem { lhs, rhs }, tuple_ty, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    pub fn proj(&mut self, name: &str, tuple: Value, index: u32) -> CompileResult<Value> {
        let Value::Local(tuple_id) = tuple else {
            return Err(CompileError::InvalidOperand {
                context: "proj".to_string(),
                reason: "operand is not a multi-result instruction".to_string(),
            });
        };
        let elem = {
            let node = &self.insts[tuple_id.index()];
            match node.ty.tuple_element(index as usize) {
                Some(t) => t.clone(),
                None => {
                    return Err(CompileError::InvalidOperand {
                        context: "proj".to_string(),
                        reason: format!("no element {index} in {}", node.ty),
                    })
                }
            }
        };
        let id = self.append(Inst::Proj { tuple: tuple_id, index }, elem, Some(name))?;
        self.memorize(name, Value::Local(id))
    }

    /// Appends a call. Every argument is isolated behind a `Copy` so
    /// the allocator can pin the copies to the callee's argument
    /// locations without constraining the original values.
    pub fn call(
        &mut self,
        name: Option<&str>,
        callee: &str,
        args: Vec<Value>,
    ) -> CompileResult<Value> {
        let proto = self.find_callee(callee)?;
        if proto.params.len() != args.len() {
            return Err(CompileError::InvalidOperand {
                context: format!("call @{callee}"),
                reason: format!(
                    "expected {} arguments, found {}",
                    proto.params.len(),
                    args.len()
                ),
            });
        }
        let mut copies = Vec::with_capacity(args.len());
        for (arg, param_ty) in args.into_iter().zip(proto.params.clone()) {
            self.check_type(&format!("call @{callee}"), &param_ty, arg)?;
            let copy = self.append(Inst::Copy { value: arg }, param_ty, None)?;
            copies.push(Value::Local(copy));
        }
        let ret = proto.return_type.clone();
        let id = self.append(Inst::Call { callee: proto, args: copies }, ret.clone(), name)?;
        match name {
            Some(n) if ret != Type::Void => self.memorize(n, Value::Local(id)),
            Some(n) => Err(CompileError::InvalidOperand {
                context: format!("call @{callee}"),
                reason: format!("void call cannot define %{n}"),
            }),
            None => Ok(Value::Local(id)),
        }
    }

    /// Appends a phi. Operands may be raw names; they are resolved in
    /// [`build`](Self::build) once every definition has been seen.
    pub fn phi(
        &mut self,
        name: &str,
        ty: Type,
        incoming: Vec<(String, PhiOperand)>,
    ) -> CompileResult<Value> {
        let id = self.append(Inst::Phi { incoming: Vec::new() }, ty, Some(name))?;
        self.incomplete_phis.push(IncompletePhi { inst: id, incoming });
        self.memorize(name, Value::Local(id))
    }

    pub fn branch(&mut self, target: &str) -> CompileResult<()> {
        let target = self.block(target);
        let from = self.append(Inst::Branch { target }, Type::Void, None)?;
        self.connect(self.insts[from.index()].block, target);
        Ok(())
    }

    pub fn branch_cond(
        &mut self,
        cond: Value,
        on_true: &str,
        on_false: &str,
    ) -> CompileResult<()> {
        self.check_type("condbr", &Type::Flag, cond)?;
        let t = self.block(on_true);
        let e = self.block(on_false);
        let from = self.append(Inst::BranchCond { cond, targets: [t, e] }, Type::Void, None)?;
        let b = self.insts[from.index()].block;
        self.connect(b, t);
        self.connect(b, e);
        Ok(())
    }

    pub fn ret(&mut self, value: Option<Value>) -> CompileResult<()> {
        match (&value, &self.prototype.return_type) {
            (None, Type::Void) => {}
            (None, other) => {
                return Err(CompileError::TypeMismatch {
                    context: "ret".to_string(),
                    expected: other.clone(),
                    found: Type::Void,
                })
            }
            (Some(v), ty) => {
                let ty = ty.clone();
                self.check_type("ret", &ty, *v)?;
            }
        }
        self.append(Inst::Return { value }, Type::Void, None)?;
        Ok(())
    }

    /// Finishes the function: resolves phis, inserts phi operand
    /// copies, verifies terminators, rejects unreachable blocks and
    /// normalizes block order to entry-first preorder.
    pub fn build(mut self) -> CompileResult<FunctionData> {
        // Every mentioned label needs a body.
        for (name, &id) in &self.labels {
            if !self.defined_labels.contains(&id) {
                return Err(CompileError::UndefinedLabel { name: name.clone() });
            }
        }
        let Some(entry) = self.entry else {
            return Err(CompileError::MissingTerminator {
                block: self.prototype.name.clone(),
            });
        };
        for (_, block) in self.blocks.iter() {
            let terminated = block
                .terminator()
                .is_some_and(|t| self.insts[t.index()].inst.is_terminator());
            if !terminated {
                return Err(CompileError::MissingTerminator {
                    block: block.name.clone(),
                });
            }
        }

        self.resolve_phis()?;
        self.normalize(entry)?;

        trace!(
            "built function {} with {} blocks, {} instructions",
            self.prototype.name,
            self.blocks.len(),
            self.insts.len()
        );
        Ok(FunctionData::new(
            self.prototype,
            self.args,
            self.insts,
            self.blocks,
        ))
    }

    fn resolve_phis(&mut self) -> CompileResult<()> {
        let pending = std::mem::take(&mut self.incomplete_phis);
        for phi in pending {
            let phi_block = self.insts[phi.inst.index()].block;
            let phi_ty = self.insts[phi.inst.index()].ty.clone();
            let mut resolved = Vec::with_capacity(phi.incoming.len());
            for (label, operand) in phi.incoming {
                let Some(&from) = self.labels.get(&label) else {
                    return Err(CompileError::UndefinedLabel { name: label });
                };
                if !self.blocks.get(phi_block).preds().contains(&from) {
                    return Err(CompileError::InvalidOperand {
                        context: "phi".to_string(),
                        reason: format!(
                            "^{} is not a predecessor of ^{}",
                            self.blocks.get(from).name,
                            self.blocks.get(phi_block).name
                        ),
                    });
                }
                let value = match operand {
                    PhiOperand::Name(n) => self.use_value(&n)?,
                    PhiOperand::Value(v) => v,
                };
                self.check_type("phi", &phi_ty, value)?;
                // Isolate the operand behind a copy in its incoming
                // block; the interval builder merges phi groups over
                // exactly these copies.
                let copy = InstId(self.insts.len() as u32);
                self.insts.push(InstNode {
                    inst: Inst::Copy { value },
                    ty: phi_ty.clone(),
                    name: None,
                    block: from,
                });
                self.blocks.get_mut(from).insert_before_terminator(copy);
                resolved.push((from, Value::Local(copy)));
            }
            let Inst::Phi { incoming } = &mut self.insts[phi.inst.index()].inst else {
                unreachable!("incomplete phi entry points at a non-phi");
            };
            *incoming = resolved;
        }
        Ok(())
    }

    /// Reorders blocks into entry-first preorder and rewrites every
    /// block reference. Errors on blocks unreachable from the entry.
    fn normalize(&mut self, entry: BlockId) -> CompileResult<()> {
        let n = self.blocks.len();
        let mut order = Vec::with_capacity(n);
        let mut seen = vec![false; n];
        let mut stack = vec![entry];
        while let Some(b) = stack.pop() {
            if seen[b.index()] {
                continue;
            }
            seen[b.index()] = true;
            order.push(b);
            let succs = self.blocks.get(b).succs();
            for &s in succs.iter().rev() {
                if !seen[s.index()] {
                    stack.push(s);
                }
            }
        }
        if order.len() != n {
            let unreachable = self
                .blocks
                .iter()
                .find(|(id, _)| !seen[id.index()])
                .map(|(_, b)| b.name.clone())
                .unwrap_or_default();
            return Err(CompileError::UnreachableBlock { block: unreachable });
        }

        let mut perm = vec![0u32; n];
        for (new, old) in order.iter().enumerate() {
            perm[old.index()] = new as u32;
        }
        self.blocks.permute(&perm);
        for node in &mut self.insts {
            node.block = BlockId(perm[node.block.index()]);
            node.inst.for_each_block_mut(|b| *b = BlockId(perm[b.index()]));
        }

        // Rebuild edges from the remapped terminators.
        for id in self.blocks.ids().collect::<Vec<_>>() {
            self.blocks.get_mut(id).clear_edges();
        }
        for id in self.blocks.ids().collect::<Vec<_>>() {
            let Some(term) = self.blocks.get(id).terminator() else {
                continue;
            };
            let succs = self.insts[term.index()].inst.successors().to_vec();
            for s in succs {
                self.blocks.get_mut(id).add_succ(s);
                self.blocks.get_mut(s).add_pred(id);
            }
        }
        Ok(())
    }

    fn connect(&mut self, from: BlockId, to: BlockId) {
        self.blocks.get_mut(from).add_succ(to);
        self.blocks.get_mut(to).add_pred(from);
    }

    fn append(
        &mut self,
        inst: Inst,
        ty: Type,
        name: Option<&str>,
    ) -> CompileResult<InstId> {
        let Some(block) = self.cursor else {
            return Err(CompileError::InstructionOutsideBlock {
                function: self.prototype.name.clone(),
            });
        };
        if let Some(term) = self.blocks.get(block).terminator() {
            if self.insts[term.index()].inst.is_terminator() {
                return Err(CompileError::InstructionAfterTerminator {
                    block: self.blocks.get(block).name.clone(),
                });
            }
        }
        let id = InstId(self.insts.len() as u32);
        self.insts.push(InstNode {
            inst,
            ty,
            name: name.map(str::to_string),
            block,
        });
        self.blocks.get_mut(block).push(id);
        Ok(id)
    }

    fn memorize(&mut self, name: &str, value: Value) -> CompileResult<Value> {
        if self.values.contains_key(name) {
            return Err(CompileError::DuplicateValue {
                name: name.to_string(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(value)
    }

    fn check_type(&self, context: &str, expected: &Type, v: Value) -> CompileResult<()> {
        let found = match v {
            Value::Argument(a) => self.args[a.index()].ty.clone(),
            Value::Local(i) => self.insts[i.index()].ty.clone(),
            Value::Constant(c) => match c.ty() {
                Some(t) => t,
                // Undef adopts the expected type.
                None => return Ok(()),
            },
        };
        if &found != expected {
            return Err(CompileError::TypeMismatch {
                context: context.to_string(),
                expected: expected.clone(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::IntKind;

    fn i64v(v: i64) -> Value {
        Value::int(IntKind::I64, v)
    }

    fn simple_proto() -> Vec<(String, Type)> {
        vec![("a".to_string(), Type::I64), ("b".to_string(), Type::I64)]
    }

    #[test]
    fn builds_straight_line_function() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb
            .create_function("sum", simple_proto(), Type::I64)
            .unwrap();
        b.switch_to("entry").unwrap();
        let a = b.use_value("a").unwrap();
        let bb = b.use_value("b").unwrap();
        let c = b.binary("c", BinaryOp::Add, Type::I64, a, bb).unwrap();
        b.ret(Some(c)).unwrap();
        let func = b.build().unwrap();
        assert_eq!(func.name(), "sum");
        assert_eq!(func.blocks().len(), 1);
        assert_eq!(func.blocks().get(func.blocks().entry()).len(), 2);
    }

    #[test]
    fn duplicate_value_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb
            .create_function("f", simple_proto(), Type::I64)
            .unwrap();
        b.switch_to("entry").unwrap();
        b.binary("x", BinaryOp::Add, Type::I64, i64v(1), i64v(2))
            .unwrap();
        let err = b
            .binary("x", BinaryOp::Mul, Type::I64, i64v(3), i64v(4))
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateValue { .. }));
    }

    #[test]
    fn instruction_before_any_label_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        let err = b
            .binary("x", BinaryOp::Add, Type::I64, i64v(1), i64v(2))
            .unwrap_err();
        assert!(matches!(err, CompileError::InstructionOutsideBlock { .. }));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::Void).unwrap();
        b.switch_to("entry").unwrap();
        b.branch("next").unwrap();
        b.switch_to("next").unwrap();
        let err = b.switch_to("entry").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateLabel { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb
            .create_function("f", simple_proto(), Type::I64)
            .unwrap();
        b.switch_to("entry").unwrap();
        let a = b.use_value("a").unwrap();
        let err = b
            .binary("x", BinaryOp::Add, Type::I32, a, Value::int(IntKind::I32, 1))
            .unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));
    }

    #[test]
    fn unresolved_callee_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::Void).unwrap();
        b.switch_to("entry").unwrap();
        let err = b.call(None, "missing", vec![]).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedCallee { .. }));
    }

    #[test]
    fn phi_type_mismatch_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        b.switch_to("entry").unwrap();
        let flag = b
            .icmp("c", IntPredicate::Eq, Type::I64, i64v(1), i64v(2))
            .unwrap();
        b.branch_cond(flag, "left", "right").unwrap();
        b.switch_to("left").unwrap();
        b.binary("x", BinaryOp::Add, Type::I32, Value::int(IntKind::I32, 1), Value::int(IntKind::I32, 2))
            .unwrap();
        b.branch("join").unwrap();
        b.switch_to("right").unwrap();
        b.branch("join").unwrap();
        b.switch_to("join").unwrap();
        b.phi(
            "p",
            Type::I64,
            vec![
                ("left".to_string(), PhiOperand::Name("x".to_string())),
                ("right".to_string(), PhiOperand::Value(i64v(0))),
            ],
        )
        .unwrap();
        let p = b.use_value("p").unwrap();
        b.ret(Some(p)).unwrap();
        let err = b.build().unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));
    }

    #[test]
    fn unreachable_block_is_rejected() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::Void).unwrap();
        b.switch_to("entry").unwrap();
        b.ret(None).unwrap();
        b.switch_to("island").unwrap();
        b.ret(None).unwrap();
        let err = b.build().unwrap_err();
        assert!(matches!(err, CompileError::UnreachableBlock { .. }));
    }

    #[test]
    fn phi_fixup_inserts_copies_in_predecessors() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::I64).unwrap();
        b.switch_to("entry").unwrap();
        let flag = b
            .icmp("c", IntPredicate::Eq, Type::I64, i64v(1), i64v(2))
            .unwrap();
        b.branch_cond(flag, "left", "right").unwrap();
        b.switch_to("left").unwrap();
        let x = b.binary("x", BinaryOp::Add, Type::I64, i64v(1), i64v(2)).unwrap();
        b.branch("join").unwrap();
        b.switch_to("right").unwrap();
        let y = b.binary("y", BinaryOp::Mul, Type::I64, i64v(3), i64v(4)).unwrap();
        b.branch("join").unwrap();
        b.switch_to("join").unwrap();
        b.phi(
            "p",
            Type::I64,
            vec![
                ("left".to_string(), PhiOperand::Value(x)),
                ("right".to_string(), PhiOperand::Value(y)),
            ],
        )
        .unwrap();
        let p = b.use_value("p").unwrap();
        b.ret(Some(p)).unwrap();
        let func = b.build().unwrap();

        // Each phi operand must now be a copy sitting in its incoming
        // block, just before that block's terminator.
        let mut phi_ops = Vec::new();
        for id in func.inst_ids() {
            if let Inst::Phi { incoming } = &func.inst(id).inst {
                phi_ops = incoming.clone();
            }
        }
        assert_eq!(phi_ops.len(), 2);
        for (from, v) in phi_ops {
            let Value::Local(copy) = v else {
                panic!("phi operand is not a local")
            };
            let node = func.inst(copy);
            assert!(matches!(node.inst, Inst::Copy { .. }));
            assert_eq!(node.block, from);
            let insts = func.blocks().get(from).insts();
            assert_eq!(insts[insts.len() - 2], copy);
        }
    }

    #[test]
    fn blocks_are_normalized_to_preorder() {
        let mut mb = ModuleBuilder::new();
        let mut b = mb.create_function("f", vec![], Type::Void).unwrap();
        // Mention "late" before defining "early" so raw creation order
        // differs from control-flow order.
        b.switch_to("entry").unwrap();
        let flag = b
            .icmp("c", IntPredicate::Eq, Type::I64, i64v(1), i64v(2))
            .unwrap();
        b.branch_cond(flag, "late", "early").unwrap();
        b.switch_to("early").unwrap();
        b.ret(None).unwrap();
        b.switch_to("late").unwrap();
        b.ret(None).unwrap();
        let func = b.build().unwrap();
        assert_eq!(func.blocks().get(BlockId(0)).name, "entry");
        assert_eq!(func.blocks().get(BlockId(1)).name, "late");
        assert_eq!(func.blocks().get(BlockId(2)).name, "early");
        // Edges survive the renumbering.
        assert_eq!(func.blocks().get(BlockId(1)).preds(), &[BlockId(0)]);
        assert_eq!(func.blocks().get(BlockId(2)).preds(), &[BlockId(0)]);
    }
}
