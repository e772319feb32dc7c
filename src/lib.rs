//! An ahead-of-time compiler for a small subset of C, targeting x86-64
//! Intel-syntax assembly.
//!
//! The pipeline is a straight line: [`lexer::tokenize`] →
//! [`parser::parse_program`] → [`typecheck::resolve_program`] →
//! [`layout::layout_program`] → [`codegen::emit`]. [`compile`] drives all
//! five stages and returns the emitted assembly text as a `String`;
//! [`main`](../bin/subc/main.rs) is a thin CLI wrapper around it.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod typecheck;

use diagnostics::Result;

/// Compile one translation unit's source text to Intel-syntax x86-64
/// assembly. Stateless and side-effect free: the same input always
/// produces byte-identical output (label and string-literal counters are
/// carried on per-call emitter/parser state, never process-global).
pub fn compile(source: &str) -> Result<String> {
    log::debug!("tokenizing {} bytes of source", source.len());
    let tokens = lexer::tokenize(source)?;

    log::debug!("parsing {} tokens", tokens.len());
    let program = parser::parse_program(&tokens)?;

    log::debug!(
        "resolving types over {} functions",
        program.functions.len()
    );
    typecheck::resolve_program(&program)?;

    layout::layout_program(&program);

    let mut out = Vec::new();
    codegen::emit(&mut out, &program).expect("writing to an in-memory buffer cannot fail");
    Ok(String::from_utf8(out).expect("emitter only writes ASCII assembly text"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_program() {
        let asm = compile("int main() { return 0; }").unwrap();
        assert!(asm.starts_with(".intel_syntax noprefix\n"));
    }

    #[test]
    fn reports_the_first_error_and_nothing_else() {
        let err = compile("int main() { return x; }").unwrap_err();
        assert!(err.to_string().contains("undefined identifier"));
    }

    #[test]
    fn output_is_deterministic() {
        let src = "int f(int n) { if (n < 2) return n; return f(n-1) + f(n-2); }";
        assert_eq!(compile(src).unwrap(), compile(src).unwrap());
    }
}
