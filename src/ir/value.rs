// This module defines value identity for the sira IR. A Value is either a
// function argument (ArgId), a constant, or a local produced by an
// instruction (InstId, a dense index into the function's instruction arena).
// Identity is by index, never structural: two adds of the same operands are
// distinct values. Constants are plain Copy data compared by value; float
// payloads are stored as raw bits so Eq and Hash are total. LocalValue is the
// subset of values that own storage (arguments and locals) and is the key
// type of the liveness sets, interval table and register allocation map.

//! Values: arguments, constants and instruction results.

use std::fmt;

use crate::ir::types::Type;

/// Index of a function argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgId(pub u32);

/// Index into the function's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl ArgId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Integer constant kind. Mirrors the integer members of [`Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    pub fn ty(self) -> Type {
        match self {
            IntKind::I8 => Type::I8,
            IntKind::I16 => Type::I16,
            IntKind::I32 => Type::I32,
            IntKind::I64 => Type::I64,
            IntKind::U8 => Type::U8,
            IntKind::U16 => Type::U16,
            IntKind::U32 => Type::U32,
            IntKind::U64 => Type::U64,
        }
    }

    pub fn of(ty: &Type) -> Option<IntKind> {
        Some(match ty {
            Type::I8 => IntKind::I8,
            Type::I16 => IntKind::I16,
            Type::I32 => IntKind::I32,
            Type::I64 => IntKind::I64,
            Type::U8 => IntKind::U8,
            Type::U16 => IntKind::U16,
            Type::U32 => IntKind::U32,
            Type::U64 => IntKind::U64,
            _ => return None,
        })
    }
}

/// Float constant kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn ty(self) -> Type {
        match self {
            FloatKind::F32 => Type::F32,
            FloatKind::F64 => Type::F64,
        }
    }
}

/// A constant operand. Compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Int { kind: IntKind, value: i64 },
    /// Payload kept as raw bits so equality and hashing are total.
    Float { kind: FloatKind, bits: u64 },
    Null,
    Undef,
}

impl Constant {
    pub fn int(kind: IntKind, value: i64) -> Constant {
        Constant::Int { kind, value }
    }

    pub fn float(kind: FloatKind, value: f64) -> Constant {
        let bits = match kind {
            FloatKind::F32 => (value as f32).to_bits() as u64,
            FloatKind::F64 => value.to_bits(),
        };
        Constant::Float { kind, bits }
    }

    /// The constant's type, if it has an intrinsic one. `Undef` adopts
    /// the type of its use site and reports none.
    pub fn ty(&self) -> Option<Type> {
        match self {
            Constant::Int { kind, .. } => Some(kind.ty()),
            Constant::Float { kind, .. } => Some(kind.ty()),
            Constant::Null => Some(Type::Ptr),
            Constant::Undef => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { value, .. } => write!(f, "{value}"),
            Constant::Float { kind, bits } => match kind {
                FloatKind::F32 => write!(f, "{}", f32::from_bits(*bits as u32)),
                FloatKind::F64 => write!(f, "{}", f64::from_bits(*bits)),
            },
            Constant::Null => write!(f, "null"),
            Constant::Undef => write!(f, "undef"),
        }
    }
}

/// A value usable as an instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Argument(ArgId),
    Constant(Constant),
    Local(InstId),
}

impl Value {
    pub fn int(kind: IntKind, value: i64) -> Value {
        Value::Constant(Constant::int(kind, value))
    }

    pub fn float(kind: FloatKind, value: f64) -> Value {
        Value::Constant(Constant::float(kind, value))
    }

    /// The storage-owning identity of this value, if any.
    pub fn local(&self) -> Option<LocalValue> {
        match self {
            Value::Argument(a) => Some(LocalValue::Argument(*a)),
            Value::Local(i) => Some(LocalValue::Local(*i)),
            Value::Constant(_) => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }
}

impl From<LocalValue> for Value {
    fn from(v: LocalValue) -> Value {
        match v {
            LocalValue::Argument(a) => Value::Argument(a),
            LocalValue::Local(i) => Value::Local(i),
        }
    }
}

/// A value that owns storage: a function argument or an instruction
/// result. Keys the liveness sets, the interval table and the final
/// register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocalValue {
    Argument(ArgId),
    Local(InstId),
}

impl fmt::Display for LocalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalValue::Argument(a) => write!(f, "%arg{}", a.0),
            LocalValue::Local(i) => write!(f, "%{}", i.0),
        }
    }
}
