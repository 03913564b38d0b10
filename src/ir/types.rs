// This module defines the type lattice for the sira IR. Types are plain data:
// the scalar kinds (signed and unsigned integers, floats, pointers), the Flag
// type produced by comparisons and consumed directly by conditional branches,
// Void for instructions without a result, Tuple for multi-result instructions
// (divrem), and Aggregate for struct-shaped stack storage. Layout queries
// (size_of, align_of, field_offset) follow the x86-64 SysV rules the rest of
// the crate assumes: scalars are naturally aligned, aggregates pad fields to
// their alignment. Classification predicates tell the allocator which values
// get registers at all.

//! IR types and layout queries.

use std::fmt;

/// A value type in the IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Compare result. Lives in the CPU flags, never in a register.
    Flag,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Ptr,
    /// Result of a multi-result instruction. Not addressable as a whole.
    Tuple(Vec<Type>),
    /// Struct-shaped stack storage, only reachable through `alloc`.
    Aggregate { fields: Vec<Type> },
}

impl Type {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Type::Tuple(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Aggregate { .. })
    }

    /// Whether values of this type receive a register or spill slot.
    /// Flags stay in the CPU flags, tuples are carried by their
    /// projections, and void/aggregate values have no scalar identity.
    pub fn is_allocatable(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_pointer()
    }

    /// Size in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            Type::Void | Type::Flag => 0,
            Type::I8 | Type::U8 => 1,
            Type::I16 | Type::U16 => 2,
            Type::I32 | Type::U32 | Type::F32 => 4,
            Type::I64 | Type::U64 | Type::F64 | Type::Ptr => 8,
            Type::Tuple(elems) => elems.iter().map(Type::size_of).sum(),
            Type::Aggregate { fields } => {
                let mut size = 0usize;
                for f in fields {
                    size = align_to(size, f.align_of());
                    size += f.size_of();
                }
                align_to(size, self.align_of())
            }
        }
    }

    /// Natural alignment in bytes.
    pub fn align_of(&self) -> usize {
        match self {
            Type::Void | Type::Flag => 1,
            Type::Aggregate { fields } => fields.iter().map(Type::align_of).max().unwrap_or(1),
            Type::Tuple(elems) => elems.iter().map(Type::align_of).max().unwrap_or(1),
            other => other.size_of().max(1),
        }
    }

    /// Byte offset of field `index` within an aggregate.
    ///
    /// Panics if the type is not an aggregate or the index is out of
    /// range; callers validate indices when the IR is built.
    pub fn field_offset(&self, index: usize) -> usize {
        let Type::Aggregate { fields } = self else {
            panic!("field_offset on non-aggregate type {self}");
        };
        assert!(
            index < fields.len(),
            "field index {index} out of range for {self}"
        );
        let mut offset = 0usize;
        for f in &fields[..index] {
            offset = align_to(offset, f.align_of());
            offset += f.size_of();
        }
        align_to(offset, fields[index].align_of())
    }

    /// Element type of a tuple at `index`.
    pub fn tuple_element(&self, index: usize) -> Option<&Type> {
        match self {
            Type::Tuple(elems) => elems.get(index),
            _ => None,
        }
    }
}

pub(crate) fn align_to(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Flag => write!(f, "flag"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Ptr => write!(f, "ptr"),
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Type::Aggregate { fields } => {
                write!(f, "{{")?;
                for (i, e) in fields.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
