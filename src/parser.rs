//! Recursive-descent parser. Builds a [`Program`] from a token stream,
//! resolving every identifier to a [`Variable`] object as it goes (name
//! lookup is a parse-time concern; only the *type* of each expression is
//! deferred to the later type-resolver pass).

use std::cell::Cell;

use crate::ast::{Function, Node, NodeKind, Program, VarRef, Variable};
use crate::diagnostics::{Error, Loc, Result};
use crate::lexer::{Token, TokenKind};
use crate::types::Type;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    globals: Vec<VarRef>,
    functions: Vec<Function>,
    /// Visible locals of the function currently being parsed,
    /// innermost-first; entering a block snapshots its length, leaving
    /// truncates back to it.
    scope: Vec<VarRef>,
    /// Every local ever declared in the current function, including ones
    /// whose block has since closed — the layout pass needs all of them.
    locals: Vec<VarRef>,
    string_count: usize,
}

/// Parse a full translation unit.
pub fn parse_program(tokens: &[Token]) -> Result<Program> {
    let mut p = Parser {
        tokens,
        pos: 0,
        globals: Vec::new(),
        functions: Vec::new(),
        scope: Vec::new(),
        locals: Vec::new(),
        string_count: 0,
    };
    p.program()
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn loc(&self) -> Loc {
        self.cur().loc
    }

    fn at_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn consume(&mut self, op: &str) -> bool {
        if self.cur().is(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &'static str) -> Result<()> {
        if !self.consume(op) {
            return Err(Error::ExpectedPunct {
                loc: self.loc(),
                want: op,
                found: self.cur().text.clone(),
            });
        }
        Ok(())
    }

    fn expect_ident(&mut self) -> Result<String> {
        if self.cur().kind != TokenKind::Ident {
            return Err(Error::ExpectedIdent {
                loc: self.loc(),
                found: self.cur().text.clone(),
            });
        }
        let name = self.cur().text.clone();
        self.pos += 1;
        Ok(name)
    }

    fn expect_number(&mut self) -> Result<i32> {
        if self.cur().kind != TokenKind::Num {
            return Err(Error::ExpectedNumber {
                loc: self.loc(),
                found: self.cur().text.clone(),
            });
        }
        let v = self.cur().value;
        self.pos += 1;
        Ok(v)
    }

    fn is_type_start(&self) -> bool {
        self.cur().is("int") || self.cur().is("char") || self.cur().is("struct")
    }

    fn find_var(&self, name: &str) -> Option<VarRef> {
        self.scope
            .iter()
            .rev()
            .chain(self.globals.iter().rev())
            .find(|v| v.name == name)
            .cloned()
    }

    // ---- grammar: program := (function | global_var)* ----

    fn program(&mut self) -> Result<Program> {
        while !self.at_eof() {
            if self.looks_like_function() {
                let func = self.function()?;
                self.functions.push(func);
            } else {
                self.global_var()?;
            }
        }
        Ok(Program {
            globals: std::mem::take(&mut self.globals),
            functions: std::mem::take(&mut self.functions),
        })
    }

    /// Speculatively consume `basetype ident "("`; restore the cursor if
    /// any of the three fails. This is the only backtracking point in
    /// the grammar.
    fn looks_like_function(&mut self) -> bool {
        let save = self.pos;
        let ok = self
            .basetype()
            .ok()
            .and_then(|_| {
                if self.cur().kind == TokenKind::Ident {
                    self.pos += 1;
                    Some(())
                } else {
                    None
                }
            })
            .map(|()| self.cur().is("("))
            .unwrap_or(false);
        self.pos = save;
        ok
    }

    fn function(&mut self) -> Result<Function> {
        self.basetype()?; // return type is not tracked (see typecheck::FuncCall)
        let name = self.expect_ident()?;
        self.expect("(")?;

        self.scope.clear();
        self.locals.clear();
        let mut params = Vec::new();
        if !self.cur().is(")") {
            loop {
                let ty = self.basetype()?;
                let pname = self.expect_ident()?;
                let ty = self.type_suffix(ty)?;
                let v = Variable::new_local(pname, ty);
                self.scope.push(v.clone());
                self.locals.push(v.clone());
                params.push(v);
                if !self.consume(",") {
                    break;
                }
            }
        }
        self.expect(")")?;

        self.expect("{")?;
        let mut body = Vec::new();
        while !self.consume("}") {
            body.push(self.stmt()?);
        }

        Ok(Function {
            name,
            params,
            body,
            locals: std::mem::take(&mut self.locals),
            frame_size: Cell::new(0),
        })
    }

    fn global_var(&mut self) -> Result<()> {
        let base = self.basetype()?;
        let name = self.expect_ident()?;
        let ty = self.type_suffix(base)?;
        self.expect(";")?;
        self.globals.push(Variable::new_global(name, ty, None));
        Ok(())
    }

    // ---- types ----

    /// `basetype := ("char" | "int" | struct_decl) ("*")*`
    fn basetype(&mut self) -> Result<Type> {
        let mut ty = if self.consume("char") {
            Type::Char
        } else if self.consume("int") {
            Type::Int
        } else if self.cur().is("struct") {
            self.struct_decl()?
        } else {
            return Err(Error::UnexpectedEof {
                loc: self.loc(),
                while_parsing: "a type",
            });
        };
        while self.consume("*") {
            ty = ty.pointer_to();
        }
        Ok(ty)
    }

    /// `struct_decl := "struct" "{" member* "}"`
    fn struct_decl(&mut self) -> Result<Type> {
        self.expect("struct")?;
        self.expect("{")?;
        let mut members = Vec::new();
        while !self.consume("}") {
            let base = self.basetype()?;
            let name = self.expect_ident()?;
            let ty = self.type_suffix(base)?;
            self.expect(";")?;
            members.push((name, ty));
        }
        Ok(Type::struct_of(members))
    }

    /// `type_suffix := ("[" number "]")*`, right-associative: the last
    /// bracket in source order is the innermost array dimension.
    fn type_suffix(&mut self, base: Type) -> Result<Type> {
        let mut dims = Vec::new();
        while self.consume("[") {
            let n = self.expect_number()?;
            self.expect("]")?;
            dims.push(n.max(0) as usize);
        }
        Ok(dims.into_iter().rev().fold(base, Type::array_of))
    }

    // ---- statements ----

    fn stmt(&mut self) -> Result<Node> {
        let loc = self.loc();

        if self.consume("return") {
            let e = self.expr()?;
            self.expect(";")?;
            return Ok(Node::new(NodeKind::Return(Box::new(e)), loc));
        }

        if self.consume("if") {
            self.expect("(")?;
            let cond = self.expr()?;
            self.expect(")")?;
            let then_branch = Box::new(self.stmt()?);
            let else_branch = if self.consume("else") {
                Some(Box::new(self.stmt()?))
            } else {
                None
            };
            return Ok(Node::new(
                NodeKind::If {
                    cond: Box::new(cond),
                    then_branch,
                    else_branch,
                },
                loc,
            ));
        }

        if self.consume("while") {
            self.expect("(")?;
            let cond = self.expr()?;
            self.expect(")")?;
            let body = Box::new(self.stmt()?);
            return Ok(Node::new(
                NodeKind::While {
                    cond: Box::new(cond),
                    body,
                },
                loc,
            ));
        }

        if self.consume("for") {
            self.expect("(")?;
            let init = if !self.cur().is(";") {
                Some(Box::new(self.expr_stmt()?))
            } else {
                None
            };
            self.expect(";")?;
            let cond = if !self.cur().is(";") {
                Some(Box::new(self.expr()?))
            } else {
                None
            };
            self.expect(";")?;
            let inc = if !self.cur().is(")") {
                Some(Box::new(self.expr_stmt()?))
            } else {
                None
            };
            self.expect(")")?;
            let body = Box::new(self.stmt()?);
            return Ok(Node::new(NodeKind::For { init, cond, inc, body }, loc));
        }

        if self.consume("{") {
            let mark = self.scope.len();
            let mut stmts = Vec::new();
            while !self.consume("}") {
                stmts.push(self.stmt()?);
            }
            self.scope.truncate(mark);
            return Ok(Node::new(NodeKind::Block(stmts), loc));
        }

        if self.is_type_start() {
            return self.declaration();
        }

        let e = self.expr_stmt()?;
        self.expect(";")?;
        Ok(e)
    }

    /// An expression used as a statement; also used (without the
    /// trailing `;`) for a `for` loop's init/inc clauses.
    fn expr_stmt(&mut self) -> Result<Node> {
        let loc = self.loc();
        let e = self.expr()?;
        Ok(Node::new(NodeKind::ExprStmt(Box::new(e)), loc))
    }

    /// `declaration := basetype ident type_suffix ("=" expr)? ";"`
    fn declaration(&mut self) -> Result<Node> {
        let loc = self.loc();
        let base = self.basetype()?;
        let name = self.expect_ident()?;
        let ty = self.type_suffix(base)?;

        let var = Variable::new_local(name, ty);
        self.scope.push(var.clone());
        self.locals.push(var.clone());

        if self.consume("=") {
            let init = self.expr()?;
            self.expect(";")?;
            let lhs = Node::new(NodeKind::Var(var), loc);
            let assign = Node::new(NodeKind::Assign(Box::new(lhs), Box::new(init)), loc);
            return Ok(Node::new(NodeKind::ExprStmt(Box::new(assign)), loc));
        }

        self.expect(";")?;
        Ok(Node::new(NodeKind::Null, loc))
    }

    // ---- expressions ----

    fn expr(&mut self) -> Result<Node> {
        self.assign()
    }

    fn assign(&mut self) -> Result<Node> {
        let lhs = self.equality()?;
        if self.consume("=") {
            let loc = self.loc();
            let rhs = self.assign()?;
            return Ok(Node::new(
                NodeKind::Assign(Box::new(lhs), Box::new(rhs)),
                loc,
            ));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Node> {
        let mut lhs = self.relational()?;
        loop {
            let loc = self.loc();
            if self.consume("==") {
                let rhs = self.relational()?;
                lhs = Node::new(NodeKind::Eq(Box::new(lhs), Box::new(rhs)), loc);
            } else if self.consume("!=") {
                let rhs = self.relational()?;
                lhs = Node::new(NodeKind::Ne(Box::new(lhs), Box::new(rhs)), loc);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn relational(&mut self) -> Result<Node> {
        let mut lhs = self.add()?;
        loop {
            let loc = self.loc();
            if self.consume("<") {
                let rhs = self.add()?;
                lhs = Node::new(NodeKind::Lt(Box::new(lhs), Box::new(rhs)), loc);
            } else if self.consume("<=") {
                let rhs = self.add()?;
                lhs = Node::new(NodeKind::Le(Box::new(lhs), Box::new(rhs)), loc);
            } else if self.consume(">") {
                // `a > b` is `b < a`.
                let rhs = self.add()?;
                lhs = Node::new(NodeKind::Lt(Box::new(rhs), Box::new(lhs)), loc);
            } else if self.consume(">=") {
                let rhs = self.add()?;
                lhs = Node::new(NodeKind::Le(Box::new(rhs), Box::new(lhs)), loc);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn add(&mut self) -> Result<Node> {
        let mut lhs = self.mul()?;
        loop {
            let loc = self.loc();
            if self.consume("+") {
                let rhs = self.mul()?;
                lhs = Node::new(NodeKind::Add(Box::new(lhs), Box::new(rhs)), loc);
            } else if self.consume("-") {
                let rhs = self.mul()?;
                lhs = Node::new(NodeKind::Sub(Box::new(lhs), Box::new(rhs)), loc);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn mul(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        loop {
            let loc = self.loc();
            if self.consume("*") {
                let rhs = self.unary()?;
                lhs = Node::new(NodeKind::Mul(Box::new(lhs), Box::new(rhs)), loc);
            } else if self.consume("/") {
                let rhs = self.unary()?;
                lhs = Node::new(NodeKind::Div(Box::new(lhs), Box::new(rhs)), loc);
            } else {
                return Ok(lhs);
            }
        }
    }

    /// `unary := "+" unary | "-" unary | "&" unary | "*" unary | postfix`
    fn unary(&mut self) -> Result<Node> {
        let loc = self.loc();
        if self.consume("+") {
            return self.unary();
        }
        if self.consume("-") {
            let operand = self.unary()?;
            let zero = Node::new(NodeKind::Num(0), loc);
            return Ok(Node::new(
                NodeKind::Sub(Box::new(zero), Box::new(operand)),
                loc,
            ));
        }
        if self.consume("&") {
            let operand = self.unary()?;
            return Ok(Node::new(NodeKind::Address(Box::new(operand)), loc));
        }
        if self.consume("*") {
            let operand = self.unary()?;
            return Ok(Node::new(NodeKind::Deref(Box::new(operand)), loc));
        }
        self.postfix()
    }

    /// `postfix := primary (("[" expr "]") | ("." ident))*`
    fn postfix(&mut self) -> Result<Node> {
        let mut node = self.primary()?;
        loop {
            let loc = self.loc();
            if self.consume("[") {
                let index = self.expr()?;
                self.expect("]")?;
                // `a[i]` desugars to `*(a + i)`.
                let sum = Node::new(NodeKind::Add(Box::new(node), Box::new(index)), loc);
                node = Node::new(NodeKind::Deref(Box::new(sum)), loc);
            } else if self.consume(".") {
                let name = self.expect_ident()?;
                node = Node::new(
                    NodeKind::Member {
                        base: Box::new(node),
                        name,
                        offset: Cell::new(0),
                    },
                    loc,
                );
            } else {
                return Ok(node);
            }
        }
    }

    /// `primary := "(" expr ")" | "sizeof" unary | ident ("(" args? ")")? | string | number`
    fn primary(&mut self) -> Result<Node> {
        let loc = self.loc();

        if self.consume("(") {
            let e = self.expr()?;
            self.expect(")")?;
            return Ok(e);
        }

        if self.consume("sizeof") {
            let operand = self.unary()?;
            return Ok(Node::new(NodeKind::Sizeof(Box::new(operand)), loc));
        }

        if self.cur().kind == TokenKind::Str {
            let bytes = self.cur().bytes.clone();
            self.pos += 1;
            let label = format!(".L.data.{}", self.string_count);
            self.string_count += 1;
            let len = bytes.len();
            let var = Variable::new_global(label, Type::Char.array_of(len), Some(bytes));
            self.globals.push(var.clone());
            return Ok(Node::new(NodeKind::Var(var), loc));
        }

        if self.cur().kind == TokenKind::Num {
            let v = self.cur().value;
            self.pos += 1;
            return Ok(Node::new(NodeKind::Num(i64::from(v)), loc));
        }

        if self.cur().kind == TokenKind::Ident {
            let name = self.cur().text.clone();
            self.pos += 1;
            if self.consume("(") {
                let mut args = Vec::new();
                if !self.cur().is(")") {
                    loop {
                        args.push(self.assign()?);
                        if !self.consume(",") {
                            break;
                        }
                    }
                }
                self.expect(")")?;
                return Ok(Node::new(NodeKind::FuncCall { name, args }, loc));
            }
            let var = self
                .find_var(&name)
                .ok_or(Error::UndefinedIdent { loc, name })?;
            return Ok(Node::new(NodeKind::Var(var), loc));
        }

        Err(Error::UnexpectedEof {
            loc,
            while_parsing: "an expression",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(src: &str) -> Program {
        parse_program(&tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn single_function_with_return() {
        let prog = parse("int main() { return 5+20-4; }");
        assert_eq!(prog.functions.len(), 1);
        assert_eq!(prog.functions[0].name, "main");
    }

    #[test]
    fn function_vs_global_disambiguation() {
        let prog = parse("int g; int main() { return g; }");
        assert_eq!(prog.globals.len(), 1);
        assert_eq!(prog.functions.len(), 1);
    }

    #[test]
    fn nested_block_shadowing_restores_outer_scope() {
        let prog = parse("int main() { int x; { int x; } return x; }");
        let f = &prog.functions[0];
        assert_eq!(f.locals.len(), 2);
    }

    #[test]
    fn for_loop_with_missing_clauses() {
        let prog = parse("int main() { for (;;) return 1; }");
        let f = &prog.functions[0];
        match &f.body[0].kind {
            NodeKind::For { init, cond, inc, .. } => {
                assert!(init.is_none());
                assert!(cond.is_none());
                assert!(inc.is_none());
            }
            _ => panic!("expected For"),
        }
    }

    #[test]
    fn subscript_desugars_to_deref_of_add() {
        let prog = parse("int main() { int a[2]; return a[0]; }");
        let f = &prog.functions[0];
        match &f.body[1].kind {
            NodeKind::Return(e) => match &e.kind {
                NodeKind::Deref(inner) => {
                    assert!(matches!(inner.kind, NodeKind::Add(_, _)));
                }
                _ => panic!("expected Deref"),
            },
            _ => panic!("expected Return"),
        }
    }

    #[test]
    fn greater_than_is_desugared_to_swapped_lt() {
        let prog = parse("int main() { return 1 > 2; }");
        let f = &prog.functions[0];
        match &f.body[0].kind {
            NodeKind::Return(e) => assert!(matches!(e.kind, NodeKind::Lt(_, _))),
            _ => panic!("expected Return"),
        }
    }

    #[test]
    fn string_literal_becomes_unique_global() {
        let prog = parse(r#"int main() { return "abc"[1]; }"#);
        assert_eq!(prog.globals.len(), 1);
        assert_eq!(prog.globals[0].name, ".L.data.0");
        assert_eq!(prog.globals[0].global_init.as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn struct_member_access_parses() {
        let prog = parse("int main() { struct {int a; int b;} x; x.a=1; return x.a; }");
        assert_eq!(prog.functions[0].locals.len(), 1);
    }

    #[test]
    fn undefined_identifier_is_an_error() {
        let toks = tokenize("int main() { return x; }").unwrap();
        assert!(parse_program(&toks).is_err());
    }
}
