// This module parses the textual IR into a Module. It is a hand-written
// recursive-descent parser over the raw bytes with line/column tracking;
// every syntax error reports what was expected and what was found, and
// builder errors (undefined value, type mismatch, duplicate definition) are
// wrapped with the position of the token that caused them. The parser only
// tokenizes and shapes the input: all semantic checking, name resolution and
// CFG assembly happen in the builder it feeds. Values read %name, blocks
// ^name, functions @name; integer and float literals take their type from
// the instruction's declared type. Comments run from ';' to end of line.
//
// Grammar sketch:
//   module  := { extern | function }
//   extern  := "extern" "fn" name "(" types ")" ":" type
//   function:= "fn" name "(" params ")" ":" type "{" body "}"
//   body    := { label ":" | inst }
//   inst    := "%" name "=" expr | "store" ... | "ret" ... | "br" ...
//            | "condbr" ... | "call" "void" ...

//! Text format parser.

use std::rc::Rc;

use crate::error::{CompileError, CompileResult};
use crate::ir::builder::{FunctionDataBuilder, ModuleBuilder, PhiOperand};
use crate::ir::inst::{BinaryOp, CastKind, IntPredicate};
use crate::ir::module::{FunctionPrototype, Module};
use crate::ir::types::Type;
use crate::ir::value::{Constant, FloatKind, IntKind, Value};

/// Parses a complete module from IR text.
pub fn parse_module(src: &str) -> CompileResult<Module> {
    Parser::new(src).parse()
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Parser<'a> {
        Parser {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn parse(mut self) -> CompileResult<Module> {
        let mut mb = ModuleBuilder::new();
        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            let at = self.here();
            let kw = self.ident("'fn' or 'extern'")?;
            match kw.as_str() {
                "extern" => self.parse_extern(&mut mb)?,
                "fn" => self.parse_function(&mut mb)?,
                other => {
                    return Err(self.expected_at(at, "'fn' or 'extern'", other));
                }
            }
        }
        Ok(mb.build())
    }

    fn parse_extern(&mut self, mb: &mut ModuleBuilder) -> CompileResult<()> {
        self.keyword("fn")?;
        let at = self.here();
        let name = self.ident("function name")?;
        self.punct("(")?;
        let mut params = Vec::new();
        if !self.eat(")") {
            loop {
                params.push(self.parse_type()?);
                if !self.eat(",") {
                    break;
                }
            }
            self.punct(")")?;
        }
        self.punct(":")?;
        let ret = self.parse_type()?;
        mb.declare_extern(&name, params, ret)
            .map_err(|e| e.at(at.0, at.1))?;
        Ok(())
    }

    fn parse_function(&mut self, mb: &mut ModuleBuilder) -> CompileResult<()> {
        let at = self.here();
        let name = self.ident("function name")?;
        self.punct("(")?;
        let mut params = Vec::new();
        if !self.eat(")") {
            loop {
                let ty = self.parse_type()?;
                self.punct("%")?;
                let pname = self.ident("parameter name")?;
                params.push((pname, ty));
                if !self.eat(",") {
                    break;
                }
            }
            self.punct(")")?;
        }
        self.punct(":")?;
        let ret = self.parse_type()?;
        self.punct("{")?;

        let mut fb = mb
            .create_function(&name, params, ret)
            .map_err(|e| e.at(at.0, at.1))?;
        loop {
            self.skip_trivia();
            if self.eat("}") {
                break;
            }
            if self.at_end() {
                return Err(self.expected("'}'", "end of input"));
            }
            self.parse_body_item(mb, &mut fb)?;
        }
        let func = fb.build().map_err(|e| e.at(at.0, at.1))?;
        mb.add_function(func);
        Ok(())
    }

    fn parse_body_item(
        &mut self,
        mb: &mut ModuleBuilder,
        fb: &mut FunctionDataBuilder,
    ) -> CompileResult<()> {
        let at = self.here();
        if self.eat("%") {
            let name = self.ident("value name")?;
            self.punct("=")?;
            return self.parse_definition(mb, fb, &name, at);
        }
        let word = self.ident("label or instruction")?;
        if self.eat(":") {
            fb.switch_to(&word).map_err(|e| e.at(at.0, at.1))?;
            return Ok(());
        }
        match word.as_str() {
            "store" => {
                let ty = self.parse_type()?;
                let value = self.parse_value(mb, fb, &ty)?;
                self.punct(",")?;
                let ptr = self.parse_value(mb, fb, &Type::Ptr)?;
                fb.store(ty, value, ptr).map_err(|e| e.at(at.0, at.1))
            }
            "ret" => {
                if self.eat("void") {
                    return fb.ret(None).map_err(|e| e.at(at.0, at.1));
                }
                let ty = self.parse_type()?;
                if ty != *fb.return_type() {
                    return Err(CompileError::TypeMismatch {
                        context: "ret".to_string(),
                        expected: fb.return_type().clone(),
                        found: ty,
                    }
                    .at(at.0, at.1));
                }
                let value = self.parse_value(mb, fb, &ty)?;
                fb.ret(Some(value)).map_err(|e| e.at(at.0, at.1))
            }
            "br" => {
                let target = self.block_ref()?;
                fb.branch(&target).map_err(|e| e.at(at.0, at.1))
            }
            "condbr" => {
                let cond = self.parse_value(mb, fb, &Type::Flag)?;
                self.punct(",")?;
                let on_true = self.block_ref()?;
                self.punct(",")?;
                let on_false = self.block_ref()?;
                fb.branch_cond(cond, &on_true, &on_false)
                    .map_err(|e| e.at(at.0, at.1))
            }
            "call" => {
                self.keyword("void")?;
                let (proto, args) = self.call_tail(mb, fb, at)?;
                if proto.return_type != Type::Void {
                    return Err(CompileError::TypeMismatch {
                        context: format!("call @{}", proto.name),
                        expected: proto.return_type.clone(),
                        found: Type::Void,
                    }
                    .at(at.0, at.1));
                }
                fb.call(None, &proto.name, args)
                    .map(|_| ())
                    .map_err(|e| e.at(at.0, at.1))
            }
            other => Err(self.expected_at(at, "label or instruction", other)),
        }
    }

    fn parse_definition(
        &mut self,
        mb: &mut ModuleBuilder,
        fb: &mut FunctionDataBuilder,
        name: &str,
        at: (u32, u32),
    ) -> CompileResult<()> {
        let op = self.ident("instruction")?;
        let result = match op.as_str() {
            "add" | "sub" | "mul" | "and" | "or" | "xor" | "shl" | "shr" => {
                let bin = binary_op(&op);
                let ty = self.parse_type()?;
                let lhs = self.parse_value(mb, fb, &ty)?;
                self.punct(",")?;
                let rhs = self.parse_value(mb, fb, &ty)?;
                fb.binary(name, bin, ty, lhs, rhs)
            }
            "icmp" => {
                let pat = self.here();
                let pred_word = self.ident("comparison predicate")?;
                let Some(pred) = int_predicate(&pred_word) else {
                    return Err(self.expected_at(pat, "comparison predicate", &pred_word));
                };
                let ty = self.parse_type()?;
                let lhs = self.parse_value(mb, fb, &ty)?;
                self.punct(",")?;
                let rhs = self.parse_value(mb, fb, &ty)?;
                fb.icmp(name, pred, ty, lhs, rhs)
            }
            "copy" => {
                let ty = self.parse_type()?;
                let value = self.parse_value(mb, fb, &ty)?;
                fb.copy(name, ty, value)
            }
            "load" => {
                let ty = self.parse_type()?;
                let ptr = self.parse_value(mb, fb, &Type::Ptr)?;
                fb.load(name, ty, ptr)
            }
            "alloc" => {
                let ty = self.parse_type()?;
                fb.alloc(name, ty)
            }
            "sext" | "zext" | "trunc" | "bitcast" | "int2fp" | "fp2int" => {
                let kind = cast_kind(&op);
                let ty = self.parse_type()?;
                // The operand's own type carries the source width.
                let value = self.parse_operand_any(mb, fb, &ty)?;
                fb.cast(name, kind, ty, value)
            }
            "phi" => {
                let ty = self.parse_type()?;
                let mut incoming = Vec::new();
                loop {
                    self.punct("[")?;
                    let operand = self.parse_phi_operand(mb, &ty)?;
                    self.punct(",")?;
                    let label = self.block_ref()?;
                    self.punct("]")?;
                    incoming.push((label, operand));
                    if !self.eat(",") {
                        break;
                    }
                }
                fb.phi(name, ty, incoming)
            }
            "divrem" => {
                let ty = self.parse_type()?;
                let lhs = self.parse_value(mb, fb, &ty)?;
                self.punct(",")?;
                let rhs = self.parse_value(mb, fb, &ty)?;
                fb.divrem(name, ty, lhs, rhs)
            }
            "proj" => {
                self.punct("%")?;
                let vat = self.here();
                let tuple_name = self.ident("value name")?;
                let tuple = fb
                    .use_value(&tuple_name)
                    .map_err(|e| e.at(vat.0, vat.1))?;
                self.punct(",")?;
                let index = self.integer()? as u32;
                fb.proj(name, tuple, index)
            }
            "call" => {
                let ty = self.parse_type()?;
                let (proto, args) = self.call_tail(mb, fb, at)?;
                if ty != proto.return_type {
                    Err(CompileError::TypeMismatch {
                        context: format!("call @{}", proto.name),
                        expected: proto.return_type.clone(),
                        found: ty,
                    })
                } else {
                    fb.call(Some(name), &proto.name, args)
                }
            }
            other => return Err(self.expected_at(at, "instruction", other)),
        };
        result.map(|_| ()).map_err(|e| e.at(at.0, at.1))
    }

    /// `@callee(arg, ...)`; argument literals take the callee's
    /// parameter types.
    fn call_tail(
        &mut self,
        mb: &mut ModuleBuilder,
        fb: &mut FunctionDataBuilder,
        at: (u32, u32),
    ) -> CompileResult<(Rc<FunctionPrototype>, Vec<Value>)> {
        self.punct("@")?;
        let callee = self.ident("function name")?;
        let proto = fb.find_callee(&callee).map_err(|e| e.at(at.0, at.1))?;
        self.punct("(")?;
        let mut args = Vec::new();
        if !self.eat(")") {
            loop {
                let expected = proto.params.get(args.len()).cloned().unwrap_or(Type::I64);
                args.push(self.parse_value(mb, fb, &expected)?);
                if !self.eat(",") {
                    break;
                }
            }
            self.punct(")")?;
        }
        Ok((proto, args))
    }

    fn parse_phi_operand(
        &mut self,
        mb: &mut ModuleBuilder,
        ty: &Type,
    ) -> CompileResult<PhiOperand> {
        self.skip_trivia();
        if self.eat("%") {
            let name = self.ident("value name")?;
            return Ok(PhiOperand::Name(name));
        }
        Ok(PhiOperand::Value(self.parse_literal(mb, ty)?))
    }

    /// A value whose expected type is known from context.
    fn parse_value(
        &mut self,
        mb: &mut ModuleBuilder,
        fb: &FunctionDataBuilder,
        ty: &Type,
    ) -> CompileResult<Value> {
        self.skip_trivia();
        if self.eat("%") {
            let at = self.here();
            let name = self.ident("value name")?;
            return fb.use_value(&name).map_err(|e| e.at(at.0, at.1));
        }
        self.parse_literal(mb, ty)
    }

    /// A value whose type is not constrained by the instruction (cast
    /// sources); literals are not allowed here.
    fn parse_operand_any(
        &mut self,
        _mb: &mut ModuleBuilder,
        fb: &FunctionDataBuilder,
        _to: &Type,
    ) -> CompileResult<Value> {
        self.punct("%")?;
        let at = self.here();
        let name = self.ident("value name")?;
        fb.use_value(&name).map_err(|e| e.at(at.0, at.1))
    }

    fn parse_literal(&mut self, mb: &mut ModuleBuilder, ty: &Type) -> CompileResult<Value> {
        self.skip_trivia();
        let at = self.here();
        if self.eat("null") {
            return Ok(Value::Constant(Constant::Null));
        }
        if self.eat("undef") {
            return Ok(Value::Constant(Constant::Undef));
        }
        match self.peek() {
            Some(c) if c == b'-' || c.is_ascii_digit() => {
                if ty.is_float() {
                    let text = self.number_text()?;
                    let parsed: f64 = text.parse().map_err(|_| {
                        self.expected_at(at, "float literal", &text)
                    })?;
                    let kind = if *ty == Type::F32 {
                        FloatKind::F32
                    } else {
                        FloatKind::F64
                    };
                    Ok(Value::float(kind, parsed))
                } else if let Some(kind) = IntKind::of(ty) {
                    let value = self.integer()?;
                    Ok(mb.intern_int(kind, value))
                } else {
                    Err(self.expected_at(
                        at,
                        "a value usable here",
                        &format!("literal of type {ty}"),
                    ))
                }
            }
            Some(c) => {
                let c = c as char;
                Err(self.expected_at(at, "value", &c.to_string()))
            }
            None => Err(self.expected_at(at, "value", "end of input")),
        }
    }

    fn parse_type(&mut self) -> CompileResult<Type> {
        self.skip_trivia();
        if self.eat("{") {
            let mut fields = Vec::new();
            if !self.eat("}") {
                loop {
                    fields.push(self.parse_type()?);
                    if !self.eat(",") {
                        break;
                    }
                }
                self.punct("}")?;
            }
            return Ok(Type::Aggregate { fields });
        }
        let at = self.here();
        let word = self.ident("type")?;
        match word.as_str() {
            "void" => Ok(Type::Void),
            "flag" => Ok(Type::Flag),
            "i8" => Ok(Type::I8),
            "i16" => Ok(Type::I16),
            "i32" => Ok(Type::I32),
            "i64" => Ok(Type::I64),
            "u8" => Ok(Type::U8),
            "u16" => Ok(Type::U16),
            "u32" => Ok(Type::U32),
            "u64" => Ok(Type::U64),
            "f32" => Ok(Type::F32),
            "f64" => Ok(Type::F64),
            "ptr" => Ok(Type::Ptr),
            other => Err(self.expected_at(at, "type", other)),
        }
    }

    fn block_ref(&mut self) -> CompileResult<String> {
        self.punct("^")?;
        self.ident("label")
    }

    // Lexing helpers.

    fn here(&mut self) -> (u32, u32) {
        self.skip_trivia();
        (self.line, self.col)
    }

    fn at_end(&mut self) -> bool {
        self.skip_trivia();
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b';') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Consumes `text` if it is next (identifiers only match whole).
    fn eat(&mut self, text: &str) -> bool {
        self.skip_trivia();
        let bytes = text.as_bytes();
        if self.src[self.pos..].starts_with(bytes) {
            let whole_word = bytes[0].is_ascii_alphabetic();
            if whole_word {
                if let Some(&next) = self.src.get(self.pos + bytes.len()) {
                    if next.is_ascii_alphanumeric() || next == b'_' {
                        return false;
                    }
                }
            }
            for _ in 0..bytes.len() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    fn punct(&mut self, text: &str) -> CompileResult<()> {
        if self.eat(text) {
            Ok(())
        } else {
            let found = self.found_here();
            Err(self.expected(&format!("'{text}'"), &found))
        }
    }

    fn keyword(&mut self, word: &str) -> CompileResult<()> {
        self.punct(word)
    }

    fn ident(&mut self, what: &str) -> CompileResult<String> {
        self.skip_trivia();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                        self.bump();
                    } else {
                        break;
                    }
                }
                Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
            }
            _ => {
                let found = self.found_here();
                Err(self.expected(what, &found))
            }
        }
    }

    fn integer(&mut self) -> CompileResult<i64> {
        let text = self.number_text()?;
        text.parse()
            .map_err(|_| self.expected("integer literal", &text))
    }

    fn number_text(&mut self) -> CompileResult<String> {
        self.skip_trivia();
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        let digits_start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'.' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == digits_start {
            let found = self.found_here();
            return Err(self.expected("number", &found));
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn found_here(&mut self) -> String {
        self.skip_trivia();
        match self.peek() {
            Some(c) => (c as char).to_string(),
            None => "end of input".to_string(),
        }
    }

    fn expected(&self, expected: &str, found: &str) -> CompileError {
        CompileError::Syntax {
            expected: expected.to_string(),
            found: found.to_string(),
        }
        .at(self.line, self.col)
    }

    fn expected_at(&self, at: (u32, u32), expected: &str, found: &str) -> CompileError {
        CompileError::Syntax {
            expected: expected.to_string(),
            found: found.to_string(),
        }
        .at(at.0, at.1)
    }
}

fn binary_op(word: &str) -> BinaryOp {
    match word {
        "add" => BinaryOp::Add,
        "sub" => BinaryOp::Sub,
        "mul" => BinaryOp::Mul,
        "and" => BinaryOp::And,
        "or" => BinaryOp::Or,
        "xor" => BinaryOp::Xor,
        "shl" => BinaryOp::Shl,
        "shr" => BinaryOp::Shr,
        _ => unreachable!("checked by the caller"),
    }
}

fn int_predicate(word: &str) -> Option<IntPredicate> {
    Some(match word {
        "eq" => IntPredicate::Eq,
        "ne" => IntPredicate::Ne,
        "gt" => IntPredicate::Gt,
        "ge" => IntPredicate::Ge,
        "lt" => IntPredicate::Lt,
        "le" => IntPredicate::Le,
        _ => return None,
    })
}

fn cast_kind(word: &str) -> CastKind {
    match word {
        "sext" => CastKind::Sext,
        "zext" => CastKind::Zext,
        "trunc" => CastKind::Trunc,
        "bitcast" => CastKind::Bitcast,
        "int2fp" => CastKind::IntToFloat,
        "fp2int" => CastKind::FloatToInt,
        _ => unreachable!("checked by the caller"),
    }
}
