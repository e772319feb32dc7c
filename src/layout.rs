//! Stack frame layout. Assigns every local (including parameters) a
//! byte offset from `rbp` and records each function's total frame size.
//!
//! Locals are packed in declaration order with no padding, mirroring how
//! [`crate::types::Type::struct_of`] packs struct members: offset `i+1`
//! is offset `i` plus the size of local `i`.

use crate::ast::Program;

pub fn layout_program(prog: &Program) {
    for f in &prog.functions {
        let mut offset = 0usize;
        for local in &f.locals {
            offset += local.ty.size();
            local.offset.set(offset);
        }
        f.frame_size.set(offset);
    }
}
