//! The typed abstract syntax tree, shared by the parser, the type
//! resolver, the layout pass and the code generator.
//!
//! `Node` is a single tagged sum — one variant per syntactic form, exactly
//! as laid out in the grammar — rather than a family of dynamically
//! dispatched statement/expression traits. Every pass below matches on
//! `NodeKind` exhaustively, so adding a form is a compile error everywhere
//! it isn't yet handled instead of a silently-skipped default case.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::diagnostics::Loc;
use crate::types::Type;

/// A named storage location. Identity is by `Rc` pointer, not by name —
/// two scopes may each declare a variable called `x` and they are
/// distinct objects sharing nothing but a name.
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub is_local: bool,
    /// Byte offset from `rbp`, assigned by the layout pass. Always 0
    /// (and unused) for globals.
    pub offset: Cell<usize>,
    /// Globals only: the initial contents to place in `.data`. `None`
    /// means zero-initialized (`.zero N`); `Some(bytes)` is a decoded
    /// string literal's payload.
    pub global_init: Option<Vec<u8>>,
}

pub type VarRef = Rc<Variable>;

impl Variable {
    #[must_use]
    pub fn new_local(name: String, ty: Type) -> VarRef {
        Rc::new(Variable {
            name,
            ty,
            is_local: true,
            offset: Cell::new(0),
            global_init: None,
        })
    }

    #[must_use]
    pub fn new_global(name: String, ty: Type, global_init: Option<Vec<u8>>) -> VarRef {
        Rc::new(Variable {
            name,
            ty,
            is_local: false,
            offset: Cell::new(0),
            global_init,
        })
    }
}

/// One syntactic form. Expression forms get their resolved [`Type`]
/// written into the owning [`Node`]'s `ty` field by the type resolver;
/// statement forms (`If`, `While`, `For`, `Block`, `Return`, `ExprStmt`,
/// `Null`) leave it `None` forever.
pub enum NodeKind {
    Num(i64),
    Var(VarRef),
    Member {
        base: Box<Node>,
        name: String,
        offset: Cell<usize>,
    },
    Address(Box<Node>),
    Deref(Box<Node>),
    Sizeof(Box<Node>),
    Return(Box<Node>),
    ExprStmt(Box<Node>),
    Assign(Box<Node>, Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    Eq(Box<Node>, Box<Node>),
    Ne(Box<Node>, Box<Node>),
    Lt(Box<Node>, Box<Node>),
    Le(Box<Node>, Box<Node>),
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        cond: Option<Box<Node>>,
        inc: Option<Box<Node>>,
        body: Box<Node>,
    },
    Block(Vec<Node>),
    FuncCall {
        name: String,
        args: Vec<Node>,
    },
    /// No-op; produced by bare declarations (`int x;`) with no initializer.
    Null,
}

pub struct Node {
    pub kind: NodeKind,
    pub loc: Loc,
    ty: RefCell<Option<Type>>,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind, loc: Loc) -> Self {
        Self {
            kind,
            loc,
            ty: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn boxed(kind: NodeKind, loc: Loc) -> Box<Self> {
        Box::new(Self::new(kind, loc))
    }

    /// The type resolver's verdict for this expression. `None` before
    /// the type pass has run, and forever for statement-shaped nodes.
    #[must_use]
    pub fn ty(&self) -> Option<Type> {
        self.ty.borrow().clone()
    }

    pub fn set_ty(&self, ty: Type) {
        *self.ty.borrow_mut() = Some(ty);
    }
}

/// A function definition: parameters are locals that happen to be
/// initialized from argument registers in the prologue; `locals`
/// includes them, in declaration order, for the layout pass.
pub struct Function {
    pub name: String,
    pub params: Vec<VarRef>,
    pub body: Vec<Node>,
    pub locals: Vec<VarRef>,
    pub frame_size: Cell<usize>,
}

pub struct Program {
    pub globals: Vec<VarRef>,
    pub functions: Vec<Function>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_round_trips() {
        let n = Node::new(NodeKind::Num(5), Loc::START);
        assert!(n.ty().is_none());
        n.set_ty(Type::Int);
        assert_eq!(n.ty(), Some(Type::Int));
    }

    #[test]
    fn variable_identity_is_by_object() {
        let a = Variable::new_local("x".to_string(), Type::Int);
        let b = Variable::new_local("x".to_string(), Type::Int);
        assert!(!Rc::ptr_eq(&a, &b));
    }
}
