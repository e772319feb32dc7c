//! Type resolution. Walks each function body after parsing and annotates
//! every expression [`Node`] with the [`Type`] the code generator will
//! need to choose instruction widths, pointer scaling and member offsets.
//!
//! Name resolution already happened in the parser; this pass only
//! computes types and, for `Member`, the byte offset a name resolves to.

use crate::ast::{Function, Node, NodeKind, Program};
use crate::diagnostics::{Error, Result};
use crate::types::Type;

pub fn resolve_program(prog: &Program) -> Result<()> {
    for f in &prog.functions {
        resolve_function(f)?;
    }
    Ok(())
}

fn resolve_function(f: &Function) -> Result<()> {
    for stmt in &f.body {
        resolve(stmt)?;
    }
    Ok(())
}

/// The type an `Add`/`Sub` between operands of type `lhs`/`rhs` produces.
/// Exactly one of two pointer-like operands scales the arithmetic: if
/// both are pointer-like it's either a pointer difference (`Sub` yields
/// `Int`) or left unscaled; if exactly one is, the result is a pointer to
/// that operand's base type.
fn add_sub_type(is_sub: bool, lhs: &Type, rhs: &Type) -> Type {
    let lp = lhs.is_pointerlike();
    let rp = rhs.is_pointerlike();
    match (lp, rp) {
        (true, true) if is_sub => Type::Int,
        (true, _) => lhs.base().unwrap().clone().pointer_to(),
        (false, true) => rhs.base().unwrap().clone().pointer_to(),
        (false, false) => Type::Int,
    }
}

/// `true` for the node kinds [`crate::codegen`]'s `gen_addr` can take an
/// address of: a named variable, a dereference, or a struct member.
fn is_lvalue(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Var(_) | NodeKind::Deref(_) | NodeKind::Member { .. }
    )
}

fn resolve(node: &Node) -> Result<()> {
    match &node.kind {
        NodeKind::Num(_) => node.set_ty(Type::Int),

        NodeKind::Var(v) => node.set_ty(v.ty.clone()),

        NodeKind::Member { base, name, offset } => {
            resolve(base)?;
            let base_ty = base.ty().expect("resolved operand");
            let layout = base_ty.as_struct().ok_or(Error::NotAStruct { loc: node.loc })?;
            let member = layout
                .members
                .iter()
                .find(|m| &m.name == name)
                .ok_or_else(|| Error::UnknownMember {
                    loc: node.loc,
                    name: name.clone(),
                })?;
            offset.set(member.offset);
            node.set_ty(member.ty.clone());
        }

        NodeKind::Address(e) => {
            resolve(e)?;
            if !is_lvalue(e) {
                return Err(Error::NotAnLvalue { loc: node.loc });
            }
            let ety = e.ty().expect("resolved operand");
            let pointee = match &ety {
                Type::Array(base, _) => (**base).clone(),
                other => other.clone(),
            };
            node.set_ty(pointee.pointer_to());
        }

        NodeKind::Deref(e) => {
            resolve(e)?;
            let ety = e.ty().expect("resolved operand");
            let base = ety
                .base()
                .ok_or(Error::NotAPointerOrArray { loc: node.loc })?;
            node.set_ty(base.clone());
        }

        NodeKind::Sizeof(e) => {
            resolve(e)?;
            node.set_ty(Type::Int);
        }

        NodeKind::Return(e) | NodeKind::ExprStmt(e) => {
            resolve(e)?;
        }

        NodeKind::Assign(lhs, rhs) => {
            resolve(lhs)?;
            resolve(rhs)?;
            if !is_lvalue(lhs) {
                return Err(Error::NotAnLvalue { loc: node.loc });
            }
            node.set_ty(lhs.ty().expect("resolved operand"));
        }

        NodeKind::Add(lhs, rhs) | NodeKind::Sub(lhs, rhs) => {
            resolve(lhs)?;
            resolve(rhs)?;
            let is_sub = matches!(node.kind, NodeKind::Sub(_, _));
            let lty = lhs.ty().expect("resolved operand");
            let rty = rhs.ty().expect("resolved operand");
            node.set_ty(add_sub_type(is_sub, &lty, &rty));
        }

        NodeKind::Mul(lhs, rhs)
        | NodeKind::Div(lhs, rhs)
        | NodeKind::Eq(lhs, rhs)
        | NodeKind::Ne(lhs, rhs)
        | NodeKind::Lt(lhs, rhs)
        | NodeKind::Le(lhs, rhs) => {
            resolve(lhs)?;
            resolve(rhs)?;
            node.set_ty(Type::Int);
        }

        NodeKind::If { cond, then_branch, else_branch } => {
            resolve(cond)?;
            resolve(then_branch)?;
            if let Some(e) = else_branch {
                resolve(e)?;
            }
        }

        NodeKind::While { cond, body } => {
            resolve(cond)?;
            resolve(body)?;
        }

        NodeKind::For { init, cond, inc, body } => {
            if let Some(i) = init {
                resolve(i)?;
            }
            if let Some(c) = cond {
                resolve(c)?;
            }
            if let Some(i) = inc {
                resolve(i)?;
            }
            resolve(body)?;
        }

        NodeKind::Block(stmts) => {
            for s in stmts {
                resolve(s)?;
            }
        }

        NodeKind::FuncCall { args, .. } => {
            for a in args {
                resolve(a)?;
            }
            node.set_ty(Type::Int);
        }

        NodeKind::Null => {}
    }
    Ok(())
}
