//! The type system: `Char`, `Int`, `Pointer`, `Array`, `Struct`.
//!
//! Types are built once, during parsing, and never mutated afterwards.
//! `Pointer` and `Array` hold their base type behind an `Rc` so that
//! repeated uses of the same declared type (e.g. every parameter of type
//! `int *`) don't each allocate a fresh chain — compilation here is
//! strictly single-threaded (no worker pool, no shared queue), so `Rc`
//! is the right shared-ownership primitive; there is no `Arc` anywhere
//! in this crate.

use std::rc::Rc;

/// A member of a [`Type::Struct`], with the byte offset assigned at
/// struct-construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: Type,
    pub offset: usize,
}

#[derive(Debug, PartialEq)]
pub struct StructLayout {
    pub members: Vec<Member>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Char,
    Int,
    Pointer(Rc<Type>),
    Array(Rc<Type>, usize),
    Struct(Rc<StructLayout>),
}

impl Type {
    #[must_use]
    pub fn pointer_to(self) -> Type {
        Type::Pointer(Rc::new(self))
    }

    #[must_use]
    pub fn array_of(self, len: usize) -> Type {
        Type::Array(Rc::new(self), len)
    }

    /// Members are packed in declaration order with no padding; offset
    /// `i` equals the running sum of the sizes of members `0..i`.
    #[must_use]
    pub fn struct_of(members: Vec<(String, Type)>) -> Type {
        let mut offset = 0;
        let mut laid_out = Vec::with_capacity(members.len());
        for (name, ty) in members {
            let size = ty.size();
            laid_out.push(Member { name, ty, offset });
            offset += size;
        }
        Type::Struct(Rc::new(StructLayout {
            members: laid_out,
            size: offset,
        }))
    }

    /// Size in bytes: `Char` is 1, `Int` and `Pointer` are 8 (the word
    /// size on this compiler's only target), `Array` is `base.size() *
    /// len`, `Struct` is the packed sum of its members.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Type::Char => 1,
            Type::Int | Type::Pointer(_) => 8,
            Type::Array(base, len) => base.size() * len,
            Type::Struct(layout) => layout.size,
        }
    }

    /// The type pointer/array arithmetic scales by: `sizeof(base)`.
    #[must_use]
    pub fn base(&self) -> Option<&Type> {
        match self {
            Type::Pointer(base) | Type::Array(base, _) => Some(base),
            Type::Char | Type::Int | Type::Struct(_) => None,
        }
    }

    #[must_use]
    pub fn is_pointerlike(&self) -> bool {
        matches!(self, Type::Pointer(_) | Type::Array(_, _))
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_, _))
    }

    #[must_use]
    pub fn as_struct(&self) -> Option<&StructLayout> {
        match self {
            Type::Struct(layout) => Some(layout),
            _ => None,
        }
    }
}
